//! Reqwest-based assistant client for OpenAI-compatible Chat Completions
//! streaming (Groq by default).

use std::pin::Pin;

use anyhow::{anyhow, Context, Result};
use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::config::Config;

pub mod code_blocks;
pub mod history;
pub mod prompt;

pub use code_blocks::{extract_code_blocks, CodeBlock};

const DEFAULT_API_BASE: &str = "https://api.groq.com/openai/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl ChatOptions {
    pub fn from_config(cfg: &Config, model: Option<&str>, temperature: f32) -> Self {
        let model = model
            .map(str::to_string)
            .or_else(|| cfg.get("ASSISTANT_MODEL"))
            .unwrap_or_else(|| "llama-3.3-70b-versatile".to_string());
        let max_tokens = cfg
            .get("ASSISTANT_MAX_TOKENS")
            .and_then(|v| v.parse::<u32>().ok());
        Self { model, temperature, max_tokens }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Content(String),
    Done,
}

pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

#[derive(Debug, Clone)]
pub struct AssistantClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl AssistantClient {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base_url = cfg
            .get("ASSISTANT_API_BASE")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let api_key = cfg.get("GROQ_API_KEY").filter(|k| !k.trim().is_empty());
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn chat_stream(&self, messages: Vec<ChatMessage>, opts: ChatOptions) -> ChatStream {
        let http = self.http.clone();
        let url = format!("{}/chat/completions", self.base_url);
        let api_key = self.api_key.clone();

        Box::pin(try_stream! {
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
            if let Some(key) = api_key {
                let hv = HeaderValue::from_str(&format!("Bearer {}", key))?;
                headers.insert(AUTHORIZATION, hv);
            }

            let mut body = serde_json::json!({
                "model": opts.model,
                "temperature": opts.temperature,
                "messages": messages,
                "stream": true,
            });
            if let Some(max_tokens) = opts.max_tokens {
                body["max_tokens"] = serde_json::json!(max_tokens);
            }

            log::debug!("POST {} model={}", url, opts.model);
            let resp = http
                .post(&url)
                .headers(headers)
                .json(&body)
                .send()
                .await
                .context("failed to send chat request")?;

            if !resp.status().is_success() {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                Err(anyhow!("assistant request failed: {} {}", status, text.trim()))?;
                return;
            }

            let mut buf = String::new();
            let mut stream = resp.bytes_stream();

            while let Some(chunk) = stream.next().await {
                let bytes = chunk.context("stream error")?;
                buf.push_str(&String::from_utf8_lossy(&bytes));
                while let Some(pos) = buf.find('\n') {
                    let line = buf[..pos].trim().to_string();
                    buf.drain(..=pos);
                    match parse_sse_line(&line) {
                        Some(SseLine::Done) => {
                            yield StreamEvent::Done;
                            return;
                        }
                        Some(SseLine::Content(parts)) => {
                            for content in parts {
                                yield StreamEvent::Content(content);
                            }
                        }
                        None => {}
                    }
                }
            }
            // Some servers close the stream without a [DONE] sentinel.
            yield StreamEvent::Done;
        })
    }

    /// Collect a whole streamed answer.
    pub async fn complete(&self, messages: Vec<ChatMessage>, opts: ChatOptions) -> Result<String> {
        let mut stream = self.chat_stream(messages, opts);
        let mut text = String::new();
        while let Some(ev) = stream.next().await {
            match ev? {
                StreamEvent::Content(t) => text.push_str(&t),
                StreamEvent::Done => break,
            }
        }
        Ok(text)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SseLine {
    Content(Vec<String>),
    Done,
}

fn parse_sse_line(line: &str) -> Option<SseLine> {
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let payload = line.strip_prefix("data:")?.trim();
    if payload == "[DONE]" {
        return Some(SseLine::Done);
    }
    // malformed lines are skipped
    let chunk = serde_json::from_str::<Chunk>(payload).ok()?;
    let parts: Vec<String> = chunk
        .choices
        .into_iter()
        .filter_map(|c| c.delta.and_then(|d| d.content))
        .filter(|c| !c.is_empty())
        .collect();
    Some(SseLine::Content(parts))
}

#[derive(Debug, Deserialize)]
struct Chunk {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_lines() {
        assert_eq!(parse_sse_line(""), None);
        assert_eq!(parse_sse_line(": keep-alive"), None);
        assert_eq!(parse_sse_line("event: ping"), None);
        assert_eq!(parse_sse_line("data: [DONE]"), Some(SseLine::Done));
        assert_eq!(parse_sse_line("data: {not json"), None);
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#),
            Some(SseLine::Content(vec!["Hi".to_string()]))
        );
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            Some(SseLine::Content(vec![]))
        );
    }

    #[test]
    fn options_fall_back_to_config_model() {
        let cfg = Config::from_pairs([("ASSISTANT_MODEL", "mixtral"), ("ASSISTANT_MAX_TOKENS", "256")]);
        let opts = ChatOptions::from_config(&cfg, None, 0.2);
        assert_eq!(opts.model, "mixtral");
        assert_eq!(opts.max_tokens, Some(256));
        let opts = ChatOptions::from_config(&cfg, Some("llama3"), 0.2);
        assert_eq!(opts.model, "llama3");
    }
}
