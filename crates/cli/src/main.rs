mod echo;
mod reading;

use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use anyhow::{Context, bail};
use clap::{CommandFactory, Parser, Subcommand};
use folio_core::{Engine, EngineConfig, SourceRegistry, SourceTarget};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::echo::{
    format_chapter, format_result, format_source, print_banner, print_error, print_info, print_step, print_timing,
    print_warning,
};
use crate::reading::ReadingPosition;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Output format for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid format: {}. Valid options: text, json", s)),
        }
    }
}

/// Search, list and read web novels from several providers
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(version)]
#[command(about = "Search, list and read web novels from several providers", long_about = None)]
struct Cli {
    /// Source table JSON (default: user config dir, then built-in table)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// HTTP timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List configured providers
    Sources,

    /// Search every provider (or one) for a title
    Search {
        keyword: String,

        /// Only query this provider
        #[arg(short, long, value_name = "NAME")]
        source: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text", value_name = "FORMAT")]
        format: OutputFormat,
    },

    /// List a work's chapters
    Chapters {
        work_url: String,

        /// Provider the work URL came from
        #[arg(short, long, value_name = "NAME")]
        source: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text", value_name = "FORMAT")]
        format: OutputFormat,
    },

    /// Print a chapter's cleaned text
    Read {
        work_url: String,

        /// Provider the work URL came from
        #[arg(short, long, value_name = "NAME")]
        source: String,

        /// Chapter number, starting at 1 (default: the first chapter)
        #[arg(short, long, value_name = "N")]
        chapter: Option<NonZeroUsize>,

        /// Number of consecutive chapters to print
        #[arg(short = 'n', long, default_value_t = 1, value_name = "N")]
        count: usize,

        /// Step back towards the first chapter instead of forward
        #[arg(short, long)]
        reverse: bool,
    },

    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "warn,folio_core=debug,folio_cli=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn build_engine(config_path: Option<&Path>, timeout: Option<u64>) -> anyhow::Result<Engine> {
    let registry = SourceRegistry::load(config_path).context("Failed to load source table")?;
    debug!(sources = registry.len(), "source table loaded");

    let mut config = EngineConfig::builder();
    if let Some(timeout) = timeout {
        config = config.timeout(timeout);
    }

    Engine::new(registry, config.build()).context("Failed to initialise engine")
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        print_banner();
    }

    if let Err(e) = run(cli).await {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let engine = || build_engine(cli.config.as_deref(), cli.timeout);

    match cli.command {
        Command::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "folio", &mut io::stdout());
        }
        Command::Sources => {
            let engine = engine()?;
            for profile in engine.registry().profiles() {
                println!("{}", format_source(profile));
            }
        }
        Command::Search { keyword, source, format } => {
            let engine = engine()?;
            let target = SourceTarget::from_option(source.as_deref());
            let started = Instant::now();
            let results = engine.search(&keyword, &target).await.context("Search failed")?;

            if cli.verbose {
                print_timing("Search", started.elapsed());
            }

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
                OutputFormat::Text if results.is_empty() => print_warning(&format!("No results for {}", keyword)),
                OutputFormat::Text => {
                    for (index, result) in results.iter().enumerate() {
                        println!("{}", format_result(index, result));
                    }
                }
            }
        }
        Command::Chapters { work_url, source, format } => {
            let engine = engine()?;
            let chapters = engine
                .resolve_chapters(&work_url, &source)
                .await
                .with_context(|| format!("Failed to load chapter list from {}", work_url))?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&chapters)?),
                OutputFormat::Text if chapters.is_empty() => print_warning("No chapters found"),
                OutputFormat::Text => {
                    for chapter in &chapters {
                        println!("{}", format_chapter(chapter));
                    }
                }
            }
        }
        Command::Read { work_url, source, chapter, count, reverse } => {
            let walk = Walk { chapter, count, reverse };
            read(&engine()?, &work_url, &source, walk, cli.verbose).await?;
        }
    }

    Ok(())
}

/// Which chapters `read` prints.
struct Walk {
    chapter: Option<NonZeroUsize>,
    count: usize,
    reverse: bool,
}

async fn read(engine: &Engine, work_url: &str, source: &str, walk: Walk, verbose: bool) -> anyhow::Result<()> {
    if verbose {
        print_step(1, 2, "Resolving chapter list");
    }

    let chapters = engine
        .resolve_chapters(work_url, source)
        .await
        .with_context(|| format!("Failed to load chapter list from {}", work_url))?;

    let mut position = ReadingPosition::new(work_url, chapters, 0);
    if position.is_empty() {
        bail!("No chapters found at {}", work_url);
    }
    match walk.chapter {
        None => {
            position.first();
        }
        Some(chapter) if !position.jump(chapter.get() - 1) => {
            print_warning(&format!("Chapter {} is out of range, showing the last chapter", chapter));
            position.last();
        }
        Some(_) => {}
    }

    if verbose {
        print_info(&format!("{} chapters in {}", position.len(), position.work()));
        print_info(&format!("Starting at chapter {}", position.index() + 1));
        print_step(2, 2, "Fetching chapter text");
    }

    for shown in 0..walk.count.max(1) {
        if shown > 0 {
            let moved = if walk.reverse { position.prev() } else { position.next() };
            if !moved {
                break;
            }
            println!();
        }

        let Some(current) = position.current() else { break };
        let text = engine.fetch_chapter_text(&current.url, source).await?;

        println!("{}\n", current.title);
        println!("{}\n", text);
        println!("{}", position.footer());
    }

    Ok(())
}
