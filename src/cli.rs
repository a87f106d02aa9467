use std::path::PathBuf;

use clap::{ArgAction, ArgGroup, Parser};

#[derive(Parser, Debug, Clone)]
#[command(name = "runpad", about = "Run source files on a remote Piston sandbox", version)]
#[command(group(ArgGroup::new("mode").args(["console", "ask", "list_languages", "show_chat", "list_chats"]).multiple(false)))]
#[command(group(ArgGroup::new("input").args(["stdin", "stdin_file"]).multiple(false)))]
#[command(group(ArgGroup::new("output").args(["json", "no_md"]).multiple(false)))]
pub struct Cli {
    /// Source file to run; its extension selects the language.
    #[arg(value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Text passed to the program's standard input.
    #[arg(long)]
    pub stdin: Option<String>,

    /// Read the program's standard input from a file.
    #[arg(long = "stdin-file", value_name = "PATH")]
    pub stdin_file: Option<PathBuf>,

    /// Print the finished entry as JSON.
    #[arg(long)]
    pub json: bool,

    /// Open the interactive console for FILE.
    #[arg(long)]
    pub console: bool,

    /// Ask the assistant a question, with FILE as context when given.
    #[arg(long, value_name = "PROMPT")]
    pub ask: Option<String>,

    /// Follow conversation with id, use "temp" for quick session.
    #[arg(long)]
    pub chat: Option<String>,

    /// Assistant model to use.
    #[arg(long)]
    pub model: Option<String>,

    /// Randomness of generated answers.
    #[arg(long, default_value_t = 0.2, value_parser = clap::value_parser!(f32))]
    pub temperature: f32,

    /// Disable Markdown prettifying (print chunks as they arrive).
    #[arg(long = "no-md")]
    pub no_md: bool,

    /// List supported languages and their file extensions.
    #[arg(long = "list-languages")]
    pub list_languages: bool,

    /// Show all messages from provided chat id.
    #[arg(long = "show-chat")]
    pub show_chat: Option<String>,

    /// List all existing chat ids.
    #[arg(short = 'l', long = "list-chats", visible_alias = "lc")]
    pub list_chats: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Log level after applying `-v` on top of the configured level.
    pub fn log_level(&self, configured: log::LevelFilter) -> log::LevelFilter {
        let requested = match self.verbose {
            0 => return configured,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        requested.max(configured)
    }
}
