use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commitcv::cli::commands::generate::GenerateOptions;

#[derive(Parser)]
#[command(name = "commitcv")]
#[command(
    version,
    about = "Turn a developer's Git commit history into a structured, LLM-written resume"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long)]
    verbose: bool,

    #[arg(long, short)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a CV from a repository's commit history
    Generate {
        #[arg(long, help = "Load configuration from a specific file")]
        config: Option<PathBuf>,
        #[arg(long, help = "Repository path or URL")]
        repo: Option<String>,
        #[arg(long = "branch", help = "Branch to include (repeatable; default: all)")]
        branches: Vec<String>,
        #[arg(
            long = "author-email",
            help = "Author email to include (repeatable; default: all)"
        )]
        authors: Vec<String>,
        #[arg(long, help = "Inclusive start date (per the configured date format)")]
        start: Option<String>,
        #[arg(long, help = "Inclusive end date")]
        end: Option<String>,
        #[arg(
            long = "ignore-keyword",
            help = "Keyword that disqualifies a commit (repeatable)"
        )]
        ignore_keywords: Vec<String>,
        #[arg(long, help = "LLM provider (openai, ollama)")]
        provider: Option<String>,
        #[arg(long, help = "Model to use")]
        model: Option<String>,
        #[arg(long, help = "Language the resume is written in")]
        language: Option<String>,
        #[arg(long, help = "Grammatical person: first or third")]
        person: Option<String>,
        #[arg(long = "author-name", help = "Full name printed on the resume")]
        author_name: Option<String>,
        #[arg(long, short, help = "Output path for the generated CV (JSON)")]
        output: Option<PathBuf>,
    },

    /// Inspect and maintain the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cache keys matching a glob pattern
    List {
        #[arg(default_value = "*", help = "Glob pattern, e.g. 'llm:*'")]
        pattern: String,
    },
    /// Invalidate cache entries matching a glob pattern
    Invalidate {
        #[arg(help = "Glob pattern, e.g. 'llm:*'")]
        pattern: String,
    },
    /// Drop every cache entry and artifact
    Clear,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(long, help = "Print as JSON instead of TOML")]
        json: bool,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration in the current directory
    Init {
        #[arg(long, short, help = "Overwrite existing configuration")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mcommitcv encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }

        eprintln!("\n\x1b[33mPlease report this issue at:\x1b[0m");
        eprintln!("  https://github.com/commitcv/commitcv/issues");
        eprintln!();

        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Generate {
            config,
            repo,
            branches,
            authors,
            start,
            end,
            ignore_keywords,
            provider,
            model,
            language,
            person,
            author_name,
            output,
        } => {
            commitcv::cli::commands::generate::run(GenerateOptions {
                config_file: config,
                repo,
                branches,
                authors,
                start_date: start,
                end_date: end,
                ignore_keywords,
                provider,
                model,
                language,
                person,
                author_name,
                output,
            })?;
        }
        Commands::Cache { action } => match action {
            CacheAction::List { pattern } => {
                commitcv::cli::commands::cache::list(&pattern)?;
            }
            CacheAction::Invalidate { pattern } => {
                commitcv::cli::commands::cache::invalidate(&pattern)?;
            }
            CacheAction::Clear => {
                commitcv::cli::commands::cache::clear()?;
            }
        },
        Commands::Config { action } => match action {
            ConfigAction::Show { json } => {
                commitcv::cli::commands::config::show(json)?;
            }
            ConfigAction::Path => {
                commitcv::cli::commands::config::path()?;
            }
            ConfigAction::Init { force } => {
                commitcv::cli::commands::config::init(force)?;
            }
        },
    }

    Ok(())
}
