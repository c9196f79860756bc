//! CLI interface for Lark.

pub mod handlers;
pub mod output;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use crate::init::AppContext;
use output::OutputMode;

/// Lark - language identification for short texts
#[derive(Parser)]
#[command(name = "lark", version, about, long_about = None)]
pub struct Cli {
    /// Override data directory (default: ~/.lark)
    #[arg(long, env = "LARK_DATA_PATH", global = true)]
    pub data_path: Option<PathBuf>,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect the language of a single text
    Detect {
        /// Text to classify
        text: String,
        /// Number of ranked candidates to show (default from config)
        #[arg(long)]
        top_k: Option<usize>,
        /// Confidence below which the result is "unknown" (default from config)
        #[arg(long)]
        threshold: Option<f32>,
    },

    /// Detect languages for one text per line from a file or stdin
    Batch {
        /// Input file (reads stdin when omitted)
        #[arg(long, short)]
        file: Option<PathBuf>,
        /// Texts per oracle call (default from config)
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// List supported language codes
    Languages,

    /// Analyze a classification report and recompute filtered accuracy
    Report {
        /// Path to the report text file
        file: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, elvish, powershell)
        shell: clap_complete::Shell,
    },
}

async fn load_context(data_path: Option<PathBuf>) -> anyhow::Result<AppContext> {
    // Model download and weight mapping block.
    let ctx = tokio::task::spawn_blocking(move || AppContext::new(data_path)).await??;
    if let Some(err) = &ctx.weights_error {
        output::print_warning(&format!("Using randomly initialized weights: {}", err));
    }
    Ok(ctx)
}

pub async fn execute(cli: &Cli) -> anyhow::Result<()> {
    let mode = OutputMode::from_json_flag(cli.json);

    match &cli.command {
        Commands::Report { file } => handlers::report::handle_report(file, mode)?,
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "lark", &mut std::io::stdout());
        }
        Commands::Detect {
            text,
            top_k,
            threshold,
        } => {
            let ctx = load_context(cli.data_path.clone()).await?;
            handlers::detect::handle_detect(&ctx, text, *top_k, *threshold, mode).await?
        }
        Commands::Batch { file, chunk_size } => {
            let ctx = load_context(cli.data_path.clone()).await?;
            handlers::detect::handle_batch(&ctx, file.as_deref(), *chunk_size, mode).await?
        }
        Commands::Languages => {
            let ctx = load_context(cli.data_path.clone()).await?;
            handlers::detect::handle_languages(&ctx, mode)?
        }
    }

    Ok(())
}
