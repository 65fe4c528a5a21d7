//! osteocache - study progress and offline content for osteopathic practice.
//!
//! A command-line front end over `osteocache-core`: track which anatomy,
//! technique, case and quiz items are done, keep the study app's resources
//! cached for offline use, and answer quizzes.

mod app;

use std::io;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;
use osteocache_core::{Category, Config, ItemId};

/// Environment variable overriding the configured origin
const ORIGIN_ENV: &str = "OSTEOCACHE_ORIGIN";

const USAGE: &str = "\
Usage: osteocache <command> [args]

Commands:
  stats                      Completed items per category (default)
  toggle <category> <id>     Flip completion of an item
  mark <category> <id>       Mark an item completed
  list <category>            List items with completion state
  quiz <id> <answer>         Answer a quiz (answer is the option index)
  update                     Install the current cache version and purge old ones
  fetch <path>               Fetch a resource through the offline cache
  buckets                    Show cache buckets

Categories: anatomy, techniques, cases, quizzes";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn parse_category(arg: Option<&String>) -> Result<Category> {
    let arg = arg.context("Missing category")?;
    Ok(arg.parse()?)
}

fn parse_id(arg: Option<&String>) -> Result<ItemId> {
    let arg = arg.context("Missing item id")?;
    arg.parse().with_context(|| format!("Invalid item id: {}", arg))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let mut config = Config::load()?;
    if let Ok(origin) = std::env::var(ORIGIN_ENV) {
        config.origin = origin;
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("stats");
    if matches!(command, "help" | "--help" | "-h") {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut app = App::new(&config)?;
    info!(command = command, origin = %config.origin, "osteocache starting");

    match command {
        "stats" => app.stats(),
        "toggle" => app.toggle(parse_category(args.get(1))?, parse_id(args.get(2))?)?,
        "mark" => app.mark(parse_category(args.get(1))?, parse_id(args.get(2))?)?,
        "list" => app.list(parse_category(args.get(1))?).await?,
        "quiz" => {
            let id = parse_id(args.get(1))?;
            let answer = args
                .get(2)
                .context("Missing answer index")?
                .parse()
                .context("Answer must be an option index")?;
            app.quiz(id, answer).await?;
        }
        "update" => app.update().await?,
        "fetch" => app.fetch(args.get(1).map(String::as_str).unwrap_or("/")).await?,
        "buckets" => app.buckets().await?,
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    }

    Ok(())
}
