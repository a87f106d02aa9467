//! One-shot assistant question, optionally about a source file.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Result};
use futures_util::StreamExt;

use crate::assistant::{
    history::{ChatHistory, TEMP_CHAT},
    prompt, AssistantClient, ChatMessage, ChatOptions, Role, StreamEvent,
};
use crate::config::Config;
use crate::printer::MarkdownPrinter;
use crate::source::SourceSnapshot;

pub struct AskHandler;

impl AskHandler {
    pub async fn run(
        cfg: &Config,
        question: &str,
        file: Option<&Path>,
        chat_id: Option<&str>,
        model: Option<&str>,
        temperature: f32,
        markdown: bool,
    ) -> Result<()> {
        if question.trim().is_empty() {
            bail!("Provide a question after --ask or via stdin");
        }
        let client = AssistantClient::from_config(cfg)?;
        if !client.has_api_key() {
            bail!(
                "GROQ_API_KEY is not set; add it to {} or the environment",
                cfg.config_path.display()
            );
        }
        let history = ChatHistory::from_config(cfg);
        let opts = ChatOptions::from_config(cfg, model, temperature);

        let snapshot = file.map(SourceSnapshot::load).transpose()?;
        let system_text = prompt::system_prompt(snapshot.as_ref());

        // temp chat id shouldn't persist
        if chat_id == Some(TEMP_CHAT) {
            history.invalidate(TEMP_CHAT);
        }

        let mut messages = match chat_id {
            Some(id) if history.exists(id) => history.read(id)?,
            _ => Vec::new(),
        };
        // the file may have changed since the chat was saved
        match messages.first_mut() {
            Some(first) if first.role == Role::System => first.content = system_text,
            _ => messages.insert(0, ChatMessage::new(Role::System, system_text)),
        }
        messages.push(ChatMessage::new(Role::User, question));

        log::info!("assistant request started ({} messages)", messages.len());
        let mut stream = client.chat_stream(messages.clone(), opts);
        let mut answer = String::new();
        while let Some(ev) = stream.next().await {
            match ev? {
                StreamEvent::Content(t) => {
                    answer.push_str(&t);
                    if !markdown {
                        print!("{}", t);
                        io::stdout().flush()?;
                    }
                }
                StreamEvent::Done => {
                    if !markdown {
                        println!();
                    }
                    break;
                }
            }
        }
        log::info!("assistant answer finished ({} chars)", answer.len());
        if markdown && !answer.is_empty() {
            MarkdownPrinter::default().print(&answer);
        }

        if let Some(id) = chat_id {
            if !answer.is_empty() {
                messages.push(ChatMessage::new(Role::Assistant, answer));
                history.write(id, messages)?;
            }
        }
        Ok(())
    }
}
