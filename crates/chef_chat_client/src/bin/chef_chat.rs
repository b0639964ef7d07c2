//! chef-chat: terminal front-end for the AI Chef recipe assistant.
//! Asks one question given on the command line, or every line read from
//! stdin, and streams each answer to stdout.

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process;

use chef_chat_client::config::{self, Config};
use chef_chat_client::render::{render_markdown, render_plain};
use chef_chat_client::view::RenderFn;
use chef_chat_client::{
    logging, ChatClient, ChatEngine, DisplayMode, SessionToken, SubmitOutcome, TerminalView,
};
use clap::Parser;
use tokio::io::AsyncBufReadExt;

const PROMPT: &str = "› ";

#[derive(Debug, Parser)]
#[command(name = "chef-chat", version, about = "Chat with the AI Chef recipe assistant")]
struct Cli {
    /// Config file (default: ~/.chef-chat/config.yaml)
    #[arg(long, env = "CHEF_CHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Backend base URL, overrides the config file
    #[arg(long)]
    base_url: Option<String>,

    /// How answers are displayed, overrides the config file
    #[arg(long, value_enum)]
    display: Option<DisplayMode>,

    /// Ask this question and exit instead of reading stdin
    question: Option<String>,
}

fn load_config(cli: &Cli) -> Config {
    let result = match &cli.config {
        Some(path) => config::load(path),
        None => match config::default_config_path() {
            Some(path) => config::load_or_default(&path),
            None => Ok(Config::default()),
        },
    };
    result.unwrap_or_else(|e| {
        eprintln!("Error: failed to load config: {}", e);
        process::exit(1);
    })
}

fn main() {
    logging::init();
    let cli = Cli::parse();

    let mut settings = load_config(&cli).resolve();
    if let Some(url) = &cli.base_url {
        settings.base_url = url.clone();
    }
    if let Some(mode) = cli.display {
        settings.display = mode;
    }

    let session = SessionToken::generate();
    tracing::info!(%session, "session started");

    let client = ChatClient::new(&settings.base_url, &settings.endpoint);
    let engine = ChatEngine::new(client, session, settings.texts.clone());

    let stdout_tty = io::stdout().is_terminal();
    let render: RenderFn = if stdout_tty { render_markdown } else { render_plain };
    let typed_at_prompt = cli.question.is_none() && io::stdin().is_terminal();
    let view = TerminalView::new(io::stdout(), settings.display, render, stdout_tty)
        .with_user_echo(!typed_at_prompt);
    engine.subscribe(view.clone());

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Error: failed to create runtime: {}", e);
            process::exit(1);
        });

    let ok = rt.block_on(async {
        match cli.question.as_deref() {
            Some(question) => ask(&engine, &view, &mut question.to_string()).await,
            None => repl(&engine, &view).await,
        }
    });

    if !ok {
        process::exit(1);
    }
}

/// One exchange. Returns false when the question was empty or the exchange failed.
async fn ask(engine: &ChatEngine, view: &TerminalView<io::Stdout>, input: &mut String) -> bool {
    let outcome = engine.submit_from(input).await;
    match outcome {
        SubmitOutcome::Completed { .. } => {
            view.finish_exchange(&engine.messages());
            true
        }
        SubmitOutcome::Failed(e) => {
            view.finish_exchange(&engine.messages());
            eprintln!("Error: {}", e);
            false
        }
        SubmitOutcome::Ignored(reason) => {
            tracing::debug!(?reason, "submit ignored");
            eprintln!("Error: no question provided");
            false
        }
    }
}

/// Read questions line by line until EOF. Returns the result of the last exchange.
async fn repl(engine: &ChatEngine, view: &TerminalView<io::Stdout>) -> bool {
    let interactive = io::stdin().is_terminal();
    if interactive {
        view.show_transcript(&engine.messages());
    }

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut last_ok = true;
    let mut asked = false;
    loop {
        if interactive {
            print_prompt();
        }
        let mut input = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("Error: failed to read stdin: {}", e);
                return false;
            }
        };
        if input.trim().is_empty() {
            continue;
        }
        asked = true;
        last_ok = ask(engine, view, &mut input).await;
    }

    if !asked && !interactive {
        eprintln!("Error: no question provided on stdin");
        return false;
    }
    last_ok
}

fn print_prompt() {
    use std::io::Write;
    let mut out = io::stdout().lock();
    let _ = write!(out, "{}", PROMPT);
    let _ = out.flush();
}
