//! Pagemark CLI
//!
//! Command-line interface for Pagemark - page and verse bookmarks grouped by tag.

use std::fs::File;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pagemark_core::{Config, SortOrder, StorageError};

mod commands;
mod output;
mod session;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "pagemark")]
#[command(about = "Pagemark - page and verse bookmarks, grouped your way")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the bookmark list (default)
    #[command(alias = "ls")]
    List,
    /// List all tags
    Tags,
    /// Manage tags
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },
    /// Add a bookmark
    Add {
        #[command(subcommand)]
        command: AddCommands,
    },
    /// Delete rows from the list, by the numbers shown in `list`
    #[command(alias = "rm")]
    Delete {
        /// Row numbers
        #[arg(required = true)]
        rows: Vec<usize>,
        /// Only show what the list would look like afterwards
        #[arg(long)]
        dry_run: bool,
    },
    /// Set the bookmark sort order
    Sort {
        #[arg(value_enum)]
        order: SortArg,
    },
    /// Toggle grouping bookmarks by tag
    Group,
    /// Set or clear the last-read page
    Page {
        /// Page number
        #[arg(conflicts_with = "clear")]
        page: Option<i64>,
        /// Forget the last-read page
        #[arg(long)]
        clear: bool,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum TagCommands {
    /// Create a tag
    #[command(alias = "create")]
    Add {
        /// Tag name
        name: String,
    },
    /// Tag an existing bookmark
    Apply {
        /// Bookmark ID
        bookmark: i64,
        /// Tag name
        tag: String,
    },
}

#[derive(Subcommand)]
enum AddCommands {
    /// Bookmark a page
    Page {
        page: u32,
        /// Tags to add (must exist)
        #[arg(short, long)]
        tag: Vec<String>,
    },
    /// Bookmark a verse
    Verse {
        sura: u32,
        ayah: u32,
        /// Page the verse is on
        #[arg(short, long)]
        page: u32,
        /// Tags to add (must exist)
        #[arg(short, long)]
        tag: Vec<String>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, deletion_delay_ms, page_count, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    /// Newest first
    DateAdded,
    /// By position in the mushaf
    Location,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::DateAdded => SortOrder::DateAdded,
            SortArg::Location => SortOrder::Location,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if let Some(hint) = storage_hint(&e) {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

/// Suggestion for the first storage error in the chain, if any
fn storage_hint(error: &anyhow::Error) -> Option<&'static str> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<StorageError>())
        .and_then(StorageError::recovery_suggestion)
}

async fn run(cli: Cli) -> Result<()> {
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands work even when the config cannot be loaded
    if let Some(Commands::Config { command }) = &cli.command {
        return match command {
            Some(ConfigCommands::Show) | None => commands::config::show(&output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key.clone(), value.clone(), &output)
            }
        };
    }

    let config = Config::load()?;
    init_logging(&config);

    match cli.command.unwrap_or(Commands::List) {
        Commands::List => commands::list::show(&config, &output).await,
        Commands::Tags => commands::tag::list(&config, &output),
        Commands::Tag { command } => match command {
            TagCommands::Add { name } => commands::tag::add(&config, name, &output),
            TagCommands::Apply { bookmark, tag } => {
                commands::tag::apply(&config, bookmark, tag, &output)
            }
        },
        Commands::Add { command } => match command {
            AddCommands::Page { page, tag } => {
                commands::bookmark::add_page(&config, page, tag, &output)
            }
            AddCommands::Verse {
                sura,
                ayah,
                page,
                tag,
            } => commands::bookmark::add_verse(&config, sura, ayah, page, tag, &output),
        },
        Commands::Delete { rows, dry_run } => {
            commands::list::delete(&config, rows, dry_run, &output).await
        }
        Commands::Sort { order } => commands::prefs::sort(&config, order.into(), &output).await,
        Commands::Group => commands::prefs::toggle_group(&config, &output).await,
        Commands::Page { page, clear } => {
            commands::prefs::last_page(&config, if clear { None } else { page }, &output)
        }
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

/// Log to a file when PAGEMARK_LOG is set (e.g. PAGEMARK_LOG=debug)
fn init_logging(config: &Config) {
    let Ok(log_level) = std::env::var("PAGEMARK_LOG") else {
        return;
    };

    let log_path = config.log_path();

    let log_file = match File::create(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
            return;
        }
    };

    let env_filter = EnvFilter::new(format!(
        "pagemark_core={},pagemark_cli={}",
        log_level, log_level
    ));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init();

    info!("Logging initialized to {:?}", log_path);
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_storage_hint_found_through_context() {
        let err: anyhow::Error = Err::<(), _>(StorageError::DuplicateTag("dua".into()))
            .context("Failed to create tag")
            .unwrap_err();
        assert!(storage_hint(&err).is_some());

        assert!(storage_hint(&anyhow::anyhow!("plain failure")).is_none());
    }
}
