//! Extension-based language resolution for the Piston runtime table.

use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};

/// Token reported for files whose extension is not in the table.
pub const UNSUPPORTED_TOKEN: &str = "unsupported";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python3,
    JavaScript,
    C,
    Cpp,
    Java,
    CSharp,
    Go,
    Rust,
    Ruby,
    Php,
    Kotlin,
    Swift,
    Bash,
    Lua,
    Perl,
    R,
    Unsupported,
}

// (extension, language); first entry for a language is its canonical extension
const EXTENSIONS: &[(&str, Language)] = &[
    ("py", Language::Python3),
    ("js", Language::JavaScript),
    ("mjs", Language::JavaScript),
    ("c", Language::C),
    ("cpp", Language::Cpp),
    ("cc", Language::Cpp),
    ("cxx", Language::Cpp),
    ("java", Language::Java),
    ("cs", Language::CSharp),
    ("go", Language::Go),
    ("rs", Language::Rust),
    ("rb", Language::Ruby),
    ("php", Language::Php),
    ("kt", Language::Kotlin),
    ("swift", Language::Swift),
    ("sh", Language::Bash),
    ("lua", Language::Lua),
    ("pl", Language::Perl),
    ("r", Language::R),
];

/// Extensions whose programs conventionally read stdin explicitly.
const STDIN_EXTENSIONS: &[&str] = &["c", "cpp", "cc", "cxx", "java", "py", "cs", "go", "rs"];

const STDIN_IDIOMS: &[&str] = &["input(", "scanf", "cin >>", "Scanner", "Console.ReadLine", "stdin"];

impl Language {
    /// Resolve a file name to a language. Never fails: unknown or missing
    /// extensions map to [`Language::Unsupported`].
    pub fn from_filename(filename: &str) -> Self {
        match extension_of(filename) {
            Some(ext) => Self::from_extension(&ext),
            None => Self::Unsupported,
        }
    }

    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        EXTENSIONS
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, lang)| *lang)
            .unwrap_or(Self::Unsupported)
    }

    /// Language identifier understood by the Piston API.
    pub fn token(&self) -> &'static str {
        match self {
            Self::Python3 => "python3",
            Self::JavaScript => "javascript",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::Java => "java",
            Self::CSharp => "csharp",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::Ruby => "ruby",
            Self::Php => "php",
            Self::Kotlin => "kotlin",
            Self::Swift => "swift",
            Self::Bash => "bash",
            Self::Lua => "lua",
            Self::Perl => "perl",
            Self::R => "r",
            Self::Unsupported => UNSUPPORTED_TOKEN,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Python3 => "Python",
            Self::JavaScript => "JavaScript",
            Self::C => "C",
            Self::Cpp => "C++",
            Self::Java => "Java",
            Self::CSharp => "C#",
            Self::Go => "Go",
            Self::Rust => "Rust",
            Self::Ruby => "Ruby",
            Self::Php => "PHP",
            Self::Kotlin => "Kotlin",
            Self::Swift => "Swift",
            Self::Bash => "Bash",
            Self::Lua => "Lua",
            Self::Perl => "Perl",
            Self::R => "R",
            Self::Unsupported => "Unsupported",
        }
    }

    pub fn is_supported(&self) -> bool {
        *self != Self::Unsupported
    }

    pub fn extensions(&self) -> Vec<&'static str> {
        EXTENSIONS
            .iter()
            .filter(|(_, lang)| lang == self)
            .map(|(ext, _)| *ext)
            .collect()
    }

    /// File name the source is submitted under. Java needs the public class
    /// name to match, so it gets `Main.java`.
    pub fn synthetic_filename(&self) -> String {
        match self {
            Self::Java => "Main.java".to_string(),
            Self::Unsupported => "main".to_string(),
            other => match other.extensions().first() {
                Some(ext) => format!("main.{}", ext),
                None => "main".to_string(),
            },
        }
    }

    /// Every supported language, in table order.
    pub fn all() -> Vec<Language> {
        let mut out: Vec<Language> = Vec::new();
        for (_, lang) in EXTENSIONS {
            if !out.contains(lang) {
                out.push(*lang);
            }
        }
        out
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Heuristic for surfacing the stdin input box. False positives and
/// negatives are acceptable.
pub fn needs_stdin(filename: &str, source: &str) -> bool {
    let by_extension = extension_of(filename)
        .map(|ext| STDIN_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false);
    by_extension || STDIN_IDIOMS.iter().any(|idiom| source.contains(idiom))
}

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_extensions() {
        assert_eq!(Language::from_filename("main.py"), Language::Python3);
        assert_eq!(Language::from_filename("main.py").token(), "python3");
        assert_eq!(Language::from_filename("a.cpp").token(), "cpp");
        assert_eq!(Language::from_filename("a.cc"), Language::Cpp);
        assert_eq!(Language::from_filename("index.js").token(), "javascript");
        assert_eq!(Language::from_filename("lib.rs").token(), "rust");
        assert_eq!(Language::from_filename("Program.cs").token(), "csharp");
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        assert_eq!(Language::from_filename("MAIN.PY"), Language::Python3);
        assert_eq!(Language::from_filename("Main.Java"), Language::Java);
    }

    #[test]
    fn unknown_or_missing_extensions_are_unsupported() {
        for name in ["main.ts", "Makefile", "", ".bashrc", "notes.", "dir/file.txt", "a.b.unknown"] {
            let lang = Language::from_filename(name);
            assert_eq!(lang, Language::Unsupported, "{name}");
            assert_eq!(lang.token(), UNSUPPORTED_TOKEN);
            assert!(!lang.is_supported());
        }
    }

    #[test]
    fn resolution_uses_last_extension_and_ignores_directories() {
        assert_eq!(Language::from_filename("src/app.test.py"), Language::Python3);
        assert_eq!(Language::from_filename("py/readme"), Language::Unsupported);
    }

    #[test]
    fn synthetic_names_follow_canonical_extension() {
        assert_eq!(Language::Python3.synthetic_filename(), "main.py");
        assert_eq!(Language::Java.synthetic_filename(), "Main.java");
        assert_eq!(Language::Cpp.synthetic_filename(), "main.cpp");
        assert_eq!(Language::JavaScript.synthetic_filename(), "main.js");
    }

    #[test]
    fn all_lists_each_language_once() {
        let all = Language::all();
        assert_eq!(all.len(), 16);
        assert!(!all.contains(&Language::Unsupported));
        assert_eq!(all[0], Language::Python3);
    }

    #[test]
    fn stdin_heuristic() {
        assert!(needs_stdin("main.c", ""));
        assert!(needs_stdin("main.rs", "fn main() {}"));
        assert!(!needs_stdin("main.js", "console.log(1)"));
        assert!(needs_stdin("main.js", "process.stdin.on('data', f)"));
        assert!(needs_stdin("main.rb", "x = input()"));
        assert!(!needs_stdin("script", "echo hi"));
    }

    #[test]
    fn stdin_idioms_outside_stdin_extensions() {
        assert!(!needs_stdin("main.kt", "fun main() = println(1)"));
        assert!(needs_stdin("main.kt", "val sc = Scanner(System.`in`)"));
        assert!(needs_stdin("main.php", "$n = scanf(\"%d\");"));
        assert!(needs_stdin("main.swift", "// cin >> n"));
        assert!(needs_stdin("main.js", "const line = Console.ReadLine();"));
    }
}
