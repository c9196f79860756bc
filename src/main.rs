//! Lark - language identification for short texts
//!
//! Usage:
//!   lark detect "Bonjour le monde"   Detect the language of one text
//!   lark batch --file texts.txt      Detect one text per line
//!   lark languages                   List supported language codes
//!   lark report report.txt           Analyze a classification report
//!   lark --help                      Show all commands

use anyhow::Result;
use clap::Parser;

use lark::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Tracing to stderr so JSON output on stdout stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("lark=info".parse()?),
        )
        .init();

    lark::cli::execute(&cli).await
}
