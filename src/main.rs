mod cli;

use std::fs::{self, OpenOptions};
use std::io::{self, Read};

use anyhow::{bail, Context, Result};
use is_terminal::IsTerminal;
use log::LevelFilter;
use owo_colors::OwoColorize;

use runpad::assistant::{history::ChatHistory, Role};
use runpad::config::Config;
use runpad::handlers::{AskHandler, RunHandler};
use runpad::printer::{language_table, MarkdownPrinter};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    // Load config
    let cfg = Config::load();
    init_logging(args.log_level(cfg.log_level()), args.console);

    if args.list_languages {
        print!("{}", language_table());
        return Ok(());
    }

    let md = !args.no_md && cfg.get_bool("PRETTIFY_MARKDOWN");

    // Show/list chat shortcuts
    if let Some(id) = &args.show_chat {
        let history = ChatHistory::from_config(&cfg);
        if !history.exists(id) {
            bail!("chat not found: {}", cfg.chat_cache_path().join(id).display());
        }
        let messages = history.read(id)?;
        if md {
            let mut md_text = String::new();
            for m in messages {
                md_text.push_str(&format!("### {}\n\n{}\n\n", m.role.as_str(), m.content));
            }
            MarkdownPrinter::default().print(&md_text);
        } else {
            for m in messages {
                let header = match m.role {
                    Role::System => m.role.as_str().cyan().to_string(),
                    Role::User => m.role.as_str().magenta().to_string(),
                    Role::Assistant => m.role.as_str().green().to_string(),
                };
                println!("{}: {}\n", header, m.content);
            }
        }
        return Ok(());
    }
    if args.list_chats {
        for path in ChatHistory::from_config(&cfg).list() {
            println!("{}", path.display());
        }
        return Ok(());
    }

    if args.console {
        let Some(file) = args.file.as_deref() else {
            bail!("--console needs a FILE to work on");
        };
        return runpad::tui::run_console(
            file,
            &cfg,
            args.model.as_deref(),
            args.temperature,
            args.chat.as_deref(),
        )
        .await;
    }

    // stdin handling (pipe support)
    let stdin_is_tty = io::stdin().is_terminal();
    let piped = if stdin_is_tty || args.stdin.is_some() || args.stdin_file.is_some() {
        String::new()
    } else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    };

    if let Some(question) = &args.ask {
        let question = if piped.is_empty() {
            question.clone()
        } else {
            format!("{}\n\n{}", piped, question)
        };
        return AskHandler::run(
            &cfg,
            &question,
            args.file.as_deref(),
            args.chat.as_deref(),
            args.model.as_deref(),
            args.temperature,
            md,
        )
        .await;
    }

    let Some(file) = args.file.as_deref() else {
        bail!("Provide a FILE to run (see --help)");
    };
    let program_stdin = match (&args.stdin, &args.stdin_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read stdin file '{}'", path.display()))?,
        (None, None) => piped,
    };

    let color = io::stdout().is_terminal();
    let code = RunHandler::run(&cfg, file, &program_stdin, args.json, color).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Console mode logs to a file so the terminal UI stays clean.
fn init_logging(level: LevelFilter, console: bool) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    if console {
        let path = std::env::temp_dir().join("runpad.log");
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(log_file) => {
                builder.target(env_logger::Target::Pipe(Box::new(log_file)));
            }
            Err(_) => {
                builder.filter_level(LevelFilter::Off);
            }
        }
    }
    let _ = builder.try_init();
}
