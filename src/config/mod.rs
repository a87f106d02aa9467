use std::{
    collections::HashMap,
    env,
    fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    time::Duration,
};

use directories::BaseDirs;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        Self::load_from(&default_config_path())
    }

    /// Defaults, then the rc file at `config_path`, then the environment.
    pub fn load_from(config_path: &Path) -> Self {
        let mut map = default_map();

        if config_path.exists() {
            if let Ok(file) = fs::File::open(config_path) {
                let reader = BufReader::new(file);
                for line in reader.lines().map_while(Result::ok) {
                    if let Some((k, v)) = parse_line(&line) {
                        map.insert(k, v);
                    }
                }
            }
        }

        // Overlay environment variables (take precedence)
        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self { inner: map, config_path: config_path.to_path_buf() }
    }

    /// Defaults overlaid with explicit pairs; the environment is not consulted.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = default_map();
        for (k, v) in pairs {
            map.insert(k.into(), v.into());
        }
        Self { inner: map, config_path: PathBuf::new() }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.trim().parse::<usize>().ok())
    }

    pub fn chat_cache_path(&self) -> PathBuf {
        self.get("CHAT_CACHE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| env::temp_dir().join("runpad").join("chat_cache"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.get_u64("REQUEST_TIMEOUT").unwrap_or(60))
    }

    pub fn log_level(&self) -> log::LevelFilter {
        self.get("LOG_LEVEL")
            .and_then(|v| v.parse::<log::LevelFilter>().ok())
            .unwrap_or(log::LevelFilter::Warn)
    }
}

fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (k, v) = line.split_once('=')?;
    Some((k.trim().to_string(), v.trim().to_string()))
}

fn is_config_key(k: &str) -> bool {
    const KEYS: &[&str] = &[
        "PISTON_API_URL",
        "COMPILE_TIMEOUT",
        "RUN_TIMEOUT",
        "REQUEST_TIMEOUT",
        "KEEP_OUTPUT_HISTORY",
        "GROQ_API_KEY",
        "ASSISTANT_API_BASE",
        "ASSISTANT_MODEL",
        "ASSISTANT_MAX_TOKENS",
        "CHAT_CACHE_PATH",
        "CHAT_CACHE_LENGTH",
        "PRETTIFY_MARKDOWN",
        "LOG_LEVEL",
    ];

    KEYS.contains(&k) || k.starts_with("RUNPAD_")
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("runpad").join(".runpadrc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();
    let temp = env::temp_dir().join("runpad");

    m.insert(
        "CHAT_CACHE_PATH".into(),
        temp.join("chat_cache").to_string_lossy().into_owned(),
    );

    // Endpoints
    m.insert("PISTON_API_URL".into(), "https://emkc.org/api/v2/piston".into());
    m.insert("ASSISTANT_API_BASE".into(), "https://api.groq.com/openai/v1".into());
    m.insert("ASSISTANT_MODEL".into(), "llama-3.3-70b-versatile".into());

    // Numbers (milliseconds for Piston phases, seconds for the HTTP ceiling)
    m.insert("COMPILE_TIMEOUT".into(), "10000".into());
    m.insert("RUN_TIMEOUT".into(), "3000".into());
    m.insert("REQUEST_TIMEOUT".into(), "60".into());
    m.insert("ASSISTANT_MAX_TOKENS".into(), "1024".into());
    m.insert("CHAT_CACHE_LENGTH".into(), "100".into());

    // Bools as strings
    m.insert("KEEP_OUTPUT_HISTORY".into(), "false".into());
    m.insert("PRETTIFY_MARKDOWN".into(), "true".into());

    m.insert("LOG_LEVEL".into(), "warn".into());

    m
}
