//! Assistant conversation persistence, one JSON file per chat id.

use std::{fs, path::PathBuf};

use anyhow::Result;

use super::ChatMessage;
use crate::config::Config;

/// Chat id that is never written to disk.
pub const TEMP_CHAT: &str = "temp";

#[derive(Debug, Clone)]
pub struct ChatHistory {
    length: usize,
    storage_path: PathBuf,
}

impl ChatHistory {
    pub fn from_config(cfg: &Config) -> Self {
        let len = cfg.get_usize("CHAT_CACHE_LENGTH").unwrap_or(100);
        Self::new(cfg.chat_cache_path(), len)
    }

    pub fn new(storage_path: PathBuf, length: usize) -> Self {
        if let Err(e) = fs::create_dir_all(&storage_path) {
            log::debug!("cannot create chat history dir {}: {}", storage_path.display(), e);
        }
        Self { length, storage_path }
    }

    fn file_path(&self, chat_id: &str) -> PathBuf {
        self.storage_path.join(chat_id)
    }

    pub fn exists(&self, chat_id: &str) -> bool {
        self.file_path(chat_id).exists()
    }

    pub fn invalidate(&self, chat_id: &str) {
        let _ = fs::remove_file(self.file_path(chat_id));
    }

    pub fn read(&self, chat_id: &str) -> Result<Vec<ChatMessage>> {
        let p = self.file_path(chat_id);
        if !p.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(p)?;
        let msgs: Vec<ChatMessage> = serde_json::from_str(&text)?;
        Ok(msgs)
    }

    /// Keep the first (system) message plus the newest `length` messages.
    pub fn write(&self, chat_id: &str, mut messages: Vec<ChatMessage>) -> Result<()> {
        if chat_id == TEMP_CHAT {
            return Ok(());
        }
        if messages.len() > 1 + self.length {
            let first = messages.remove(0);
            let over = messages.len() - self.length;
            messages.drain(..over);
            messages.insert(0, first);
        }

        fs::write(self.file_path(chat_id), serde_json::to_string(&messages)?)?;
        Ok(())
    }

    /// Stored chats, oldest first.
    pub fn list(&self) -> Vec<PathBuf> {
        if let Ok(read_dir) = fs::read_dir(&self.storage_path) {
            let mut files: Vec<PathBuf> = read_dir.filter_map(|e| e.ok().map(|e| e.path())).collect();
            files.sort_by_key(|p| fs::metadata(p).and_then(|m| m.modified()).ok());
            files
        } else {
            Vec::new()
        }
    }
}
