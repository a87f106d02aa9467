//! Source provider: reads the file being run as an immutable snapshot.

use std::{fs, path::{Path, PathBuf}};

use anyhow::{bail, Context, Result};

use crate::language::{self, Language};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSnapshot {
    pub filename: String,
    pub text: String,
}

impl SourceSnapshot {
    pub fn new(filename: impl Into<String>, text: impl Into<String>) -> Self {
        Self { filename: filename.into(), text: text.into() }
    }

    /// Read `path` from disk. Only the file name (not the directory) is kept
    /// for display and language resolution.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("Source file '{}' does not exist", path.display());
        }
        if !path.is_file() {
            bail!("'{}' is not a file", path.display());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read source file '{}'", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { filename, text })
    }

    pub fn language(&self) -> Language {
        Language::from_filename(&self.filename)
    }

    pub fn needs_stdin(&self) -> bool {
        language::needs_stdin(&self.filename, &self.text)
    }
}

/// A file the console re-reads on every run.
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Result<SourceSnapshot> {
        SourceSnapshot::load(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_keeps_file_name_and_exact_text() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("main.py");
        fs::write(&path, "name = input()\nprint(name)\n")?;

        let snap = SourceSnapshot::load(&path)?;
        assert_eq!(snap.filename, "main.py");
        assert_eq!(snap.text, "name = input()\nprint(name)\n");
        assert_eq!(snap.language(), Language::Python3);
        assert!(snap.needs_stdin());
        Ok(())
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = SourceSnapshot::load(Path::new("/definitely/not/here.py")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn source_file_rereads_on_each_snapshot() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("a.js");
        fs::write(&path, "console.log(1)")?;
        let file = SourceFile::new(&path);
        assert_eq!(file.snapshot()?.text, "console.log(1)");
        fs::write(&path, "console.log(2)")?;
        assert_eq!(file.snapshot()?.text, "console.log(2)");
        Ok(())
    }
}
