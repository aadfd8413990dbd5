//! Multigrade CLI - generate and browse teaching content for multigrade
//! classrooms.

mod commands;

use clap::{Parser, Subcommand};
use multigrade_core::MultigradeConfig;
use multigrade_core::logging::{self, LogFormat};
use std::path::PathBuf;

use commands::{agents, config, generate, history, show, split};

/// Multigrade - lesson plans, activities and worksheets for classrooms where
/// several grades learn together.
#[derive(Parser, Debug)]
#[command(name = "multigrade", author, version, about = "Multigrade classroom content assistant")]
struct Args {
    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Emit log lines as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Configuration file, loaded instead of the global and local files
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate content with one agent
    Generate(generate::GenerateArgs),

    /// List stored content for a subject
    History {
        /// Subject to list
        #[arg(long)]
        subject: String,

        /// Restrict to one topic
        #[arg(long)]
        topic: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one stored version by its path
    Show {
        /// Content path, e.g. mathematics/_/addition/worksheet_generator/<id>/v1
        path: String,

        /// Output the stored record as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the available agents
    Agents {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Split a chapter text file into topics
    Split {
        /// Text file to split
        file: PathBuf,

        /// Header pattern (case-insensitive regex) instead of the default headers
        #[arg(long)]
        pattern: Option<String>,

        /// Output topics with their text as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config {
        /// Print the configuration file search paths instead
        #[arg(long)]
        paths: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<MultigradeConfig> {
    let config = match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("configuration file not found: {}", path.display());
            }
            MultigradeConfig::load_layered(std::slice::from_ref(path), |key| std::env::var(key).ok())?
        }
        None => MultigradeConfig::discover_and_load()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    let level = args.log_level.as_deref().unwrap_or(&config.log_level);
    let format = if args.log_json { LogFormat::Json } else { LogFormat::Compact };
    // A subscriber may already be installed when embedded; keep going.
    let _ = logging::init(level, format);

    match args.command {
        Command::Generate(generate_args) => generate::execute(&config, generate_args).await,
        Command::History { subject, topic, json } => {
            history::execute(&config, &subject, topic.as_deref(), json).await
        }
        Command::Show { path, json } => show::execute(&config, &path, json).await,
        Command::Agents { json } => agents::execute(json),
        Command::Split { file, pattern, json } => split::execute(&file, pattern.as_deref(), json),
        Command::Config { paths } => config::execute(&config, paths),
    }
}
