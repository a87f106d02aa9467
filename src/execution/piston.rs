//! Reqwest client for the Piston code execution API.

use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{ExecError, ExecutionBackend, ExecutionLimits, ExecutionRequest, ExecutionResult};
use crate::config::Config;

const DEFAULT_PISTON_BASE: &str = "https://emkc.org/api/v2/piston";

#[derive(Debug, Clone)]
pub struct PistonClient {
    http: reqwest::Client,
    base_url: String,
    limits: ExecutionLimits,
}

impl PistonClient {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base_url = cfg
            .get("PISTON_API_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PISTON_BASE.to_string());
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            limits: ExecutionLimits::from_config(cfg),
        })
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ExecutionBackend for PistonClient {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, ExecError> {
        let url = format!("{}/execute", self.base_url);
        let started = Instant::now();
        log::debug!("POST {} language={}", url, request.language);

        let resp = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| ExecError::Transport(e.to_string()))?;

        match resp.status() {
            status if status.is_success() => {
                let body: PistonResponse = resp
                    .json()
                    .await
                    .map_err(|e| ExecError::Decode(e.to_string()))?;
                let elapsed_ms = started.elapsed().as_millis() as u64;
                Ok(compose_result(body, elapsed_ms))
            }
            status => {
                let text = resp.text().await.unwrap_or_default();
                log::warn!("execution service returned {}", status);
                Err(ExecError::Transport(describe_status(status, &text)))
            }
        }
    }
}

fn describe_status(status: StatusCode, body: &str) -> String {
    // Piston reports request errors as {"message": "..."}
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    if detail.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {} - {}", status, detail)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PistonResponse {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub compile: Option<PistonStage>,
    #[serde(default)]
    pub run: Option<PistonStage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PistonStage {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub signal: Option<String>,
}

/// Fold the compile and run phases into one result.
pub fn compose_result(response: PistonResponse, elapsed_ms: u64) -> ExecutionResult {
    let mut output = String::new();
    let mut error = String::new();

    if let Some(compile) = response.compile {
        output.push_str(&compile.stdout);
        if !compile.stderr.is_empty() {
            append_block(&mut error, &format!("Compilation Error:\n{}", compile.stderr));
        }
        // a null code means the compiler never finished
        match (compile.code, compile.signal) {
            (Some(0), _) => {}
            (Some(code), _) => {
                append_block(&mut error, &format!("Compilation failed with exit code {}", code));
            }
            (None, Some(signal)) => {
                append_block(&mut error, &format!("Compilation terminated by signal {}", signal));
            }
            (None, None) => append_block(&mut error, "Compilation failed"),
        }
    }

    // Absent run phase means compilation stopped the pipeline.
    let exit_code = match response.run {
        Some(run) => {
            append_block(&mut output, &run.stdout);
            append_block(&mut error, &run.stderr);
            match (run.code, run.signal) {
                (Some(code), _) => code,
                (None, Some(signal)) => {
                    append_block(&mut error, &format!("Process terminated by signal {}", signal));
                    1
                }
                (None, None) => 1,
            }
        }
        None => 0,
    };

    ExecutionResult {
        stdout: output.trim().to_string(),
        stderr: error.trim().to_string(),
        exit_code,
        elapsed_ms,
    }
}

fn append_block(buf: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !buf.is_empty() && !buf.ends_with('\n') {
        buf.push('\n');
    }
    buf.push_str(text);
}
