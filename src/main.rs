// Skiff — terminal front-end
//
// Three subcommands over the engine: `chat` (talk to a webhook bot),
// `browse` (page through the remote record set), `relay` (run the CORS
// forwarder). All state lives in the engine; this file only reads lines
// and prints view models.

use clap::{Parser, Subcommand};
use skiff::atoms::error::{EngineError, EngineResult};
use skiff::engine::browser::{BrowserConfig, PageBrowser};
use skiff::engine::chat::ChatClient;
use skiff::engine::config::AppConfig;
use skiff::engine::normalize::sanitize_html;
use skiff::engine::render::{format_date, html_to_text};
use skiff::engine::source::EdgeSource;
use skiff::engine::relay;
use skiff::engine::store::PrefStore;
use std::io::Write as _;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;

#[derive(Parser)]
#[command(name = "skiff", version, about = "Webhook chat, record browsing, and CORS relaying")]
struct Cli {
    /// Path to the TOML config file (defaults to the per-user config dir).
    #[arg(long, global = true, env = "SKIFF_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chat with a configured webhook bot.
    Chat {
        /// Bot id from the config. Defaults to the last-used bot, then the
        /// first configured one.
        #[arg(long)]
        bot: Option<String>,
    },
    /// Page through the remote record set.
    Browse {
        /// Rows per page (clamped to 5..=100); overrides the saved value.
        #[arg(long)]
        page_size: Option<u32>,
    },
    /// Run the CORS relay in front of the configured webhooks.
    Relay,
    /// Show or change saved preferences.
    Prefs {
        /// Set the theme ("dark" or "light").
        #[arg(long)]
        theme: Option<String>,
        /// Set the saved browse page size (clamped to 5..=100).
        #[arg(long)]
        page_size: Option<u32>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> EngineResult<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    match cli.command {
        Command::Chat { bot } => run_chat(config, bot).await,
        Command::Browse { page_size } => run_browse(config, page_size).await,
        Command::Relay => relay::run_relay(config.relay).await,
        Command::Prefs { theme, page_size } => run_prefs(theme, page_size),
    }
}

fn run_prefs(theme: Option<String>, page_size: Option<u32>) -> EngineResult<()> {
    let store = PrefStore::open()?;
    if let Some(theme) = theme {
        match theme.as_str() {
            "dark" | "light" => store.set_theme(&theme)?,
            other => {
                return Err(EngineError::validation(format!(
                    "theme must be 'dark' or 'light', not '{other}'"
                )))
            }
        }
    }
    if let Some(size) = page_size {
        store.set_page_size(size)?;
    }

    let show = |value: Option<String>| value.unwrap_or_else(|| "(unset)".into());
    println!("theme:     {}", show(store.theme()?));
    println!("page size: {}", show(store.page_size()?.map(|s| s.to_string())));
    println!("last bot:  {}", show(store.last_bot()?));
    Ok(())
}

/// Preferences are optional comfort: a failure to open the store degrades
/// to defaults instead of blocking the session.
fn open_store() -> Option<PrefStore> {
    match PrefStore::open() {
        Ok(store) => Some(store),
        Err(e) => {
            log::warn!("[main] preference store unavailable: {e}");
            None
        }
    }
}

// ── chat ───────────────────────────────────────────────────────────────────

async fn run_chat(config: AppConfig, bot_arg: Option<String>) -> EngineResult<()> {
    let store = open_store();
    let saved_bot = match (&bot_arg, &store) {
        (None, Some(store)) => store.last_bot()?,
        _ => None,
    };
    let bot_id = bot_arg.or(saved_bot);
    let bot = config.bot(bot_id.as_deref())?.clone();

    if let Some(store) = &store {
        store.set_last_bot(&bot.id).ok();
    }

    let mut chat = ChatClient::new(bot)?;
    println!("{} — /reset clears the thread, /quit leaves.", chat.config().title);
    if let Some(greeting) = chat.conversation().last() {
        println!("{}", html_to_text(&greeting.html));
    }

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break; // EOF
        };

        match line.trim() {
            "/quit" => break,
            "/reset" => {
                chat.reset();
                println!("(thread cleared)");
                continue;
            }
            question => {
                if let Err(e) = chat.send(question).await {
                    eprintln!("[status] {e}");
                }
                // The bot bubble is always there — reply, fallback, or error copy.
                if let Some(reply) = chat.conversation().last() {
                    println!("{}", html_to_text(&reply.html));
                }
            }
        }
    }
    Ok(())
}

// ── browse ─────────────────────────────────────────────────────────────────

async fn run_browse(config: AppConfig, page_size_arg: Option<u32>) -> EngineResult<()> {
    if config.source.url.is_empty() {
        return Err(EngineError::Config("no [source] url configured".into()));
    }

    let store = open_store();
    let saved_size = store.as_ref().and_then(|s| s.page_size().ok().flatten());
    let page_size = page_size_arg.or(saved_size).unwrap_or(config.page_size);

    let timeout = Duration::from_secs(config.source.timeout_secs);
    let source = EdgeSource::new(config.source)?;
    let browser = PageBrowser::new(source, BrowserConfig { page_size, timeout });

    if let Err(e) = browser.load_page(0, false).await {
        eprintln!("[status] {e}");
    }
    print_table(&browser);
    println!("commands: next prev open <n> fwd back size <n> refresh quit");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("browse> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let line = line.trim().to_string();
        let mut words = line.split_whitespace();
        let (command, arg) = (words.next().unwrap_or(""), words.next());

        let outcome = match (command, arg) {
            ("q" | "quit", _) => break,
            ("" | "show", _) => Ok(()),
            ("n" | "next", _) => {
                let page = browser.snapshot().page as i64;
                browser.load_page(page + 1, false).await
            }
            ("p" | "prev", _) => {
                let page = browser.snapshot().page as i64;
                browser.load_page(page - 1, false).await
            }
            ("open", Some(n)) => match n.parse::<usize>() {
                Ok(index) => browser.open_selection(index).map(|record| {
                    print_detail(&record);
                }),
                Err(_) => Err(EngineError::validation(format!("'{n}' is not a row number"))),
            },
            ("f" | "fwd", _) => shift(&browser, 1).await,
            ("b" | "back", _) => shift(&browser, -1).await,
            ("size", Some(n)) => match n.parse::<u32>() {
                Ok(size) => {
                    let result = browser.refresh(size).await;
                    if result.is_ok() {
                        if let Some(store) = &store {
                            store.set_page_size(size).ok();
                        }
                    }
                    result
                }
                Err(_) => Err(EngineError::validation(format!("'{n}' is not a page size"))),
            },
            ("r" | "refresh", _) => {
                let size = browser.snapshot().page_size;
                browser.refresh(size).await
            }
            (other, _) => Err(EngineError::validation(format!("unknown command '{other}'"))),
        };

        if let Err(e) = outcome {
            eprintln!("[status] {e}");
        }
        print_table(&browser);
    }
    Ok(())
}

async fn shift(browser: &PageBrowser<EdgeSource>, offset: i64) -> EngineResult<()> {
    match browser.shift_selection(offset).await? {
        Some(record) => print_detail(&record),
        None => println!("(no record that way)"),
    }
    Ok(())
}

fn print_table(browser: &PageBrowser<EdgeSource>) {
    let snapshot = browser.snapshot();
    let meta = browser.meta();

    println!();
    if snapshot.rows.is_empty() {
        println!("  (no records on this page)");
    }
    for (index, record) in snapshot.rows.iter().enumerate() {
        let date = format_date(record.str_field("pub_date"));
        let summary = truncate(record.str_field("summary").unwrap_or("No summary available."), 80);
        println!("  [{index:>2}] {date:<13} {summary}");
    }

    let range = meta.range_label.clone().unwrap_or_default();
    println!("  {} {}", meta.page_label, range);
    if let Some(error) = &snapshot.last_error {
        println!("  status: {error}");
    }
}

fn print_detail(record: &skiff::atoms::types::Record) {
    println!();
    println!("  Date:    {}", format_date(record.str_field("pub_date")));
    println!("  Summary: {}", record.str_field("summary").unwrap_or("No summary available."));
    let body = record
        .str_field("clean_html")
        .map(sanitize_html)
        .filter(|html| !html.trim().is_empty())
        .map(|html| html_to_text(&html))
        .unwrap_or_else(|| "No content provided.".into());
    println!();
    println!("{}", indent(&body, "  "));
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines().map(|line| format!("{prefix}{line}")).collect::<Vec<_>>().join("\n")
}
