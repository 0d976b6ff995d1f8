use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

mod commands;
mod config;

#[derive(Parser, Debug)]
#[command(name = "deducto", version, about = "Deduction classifier and AU tax estimator")]
struct Cli {
    /// Path to deducto.toml (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database and load the merchant/keyword seeds
    Seed,

    /// Classify a bank CSV and print every verdict
    Classify {
        /// Bank transaction export (CSV)
        #[arg(long)]
        csv: PathBuf,

        /// Override the configured AI backend (heuristic|llm)
        #[arg(long)]
        ai: Option<String>,
    },

    /// Classify, total deductions by category and report the tax position
    Summary {
        /// Bank transaction export (CSV)
        #[arg(long)]
        csv: PathBuf,

        /// Gross annual income
        #[arg(long)]
        income: Decimal,

        /// Scope to an AU financial year by its ending year (e.g. 2025)
        #[arg(long)]
        fy: Option<u16>,

        /// Override the configured AI backend (heuristic|llm)
        #[arg(long)]
        ai: Option<String>,
    },

    /// Tax schedule arithmetic for a given income and deduction total
    Tax {
        /// Gross annual income
        #[arg(long)]
        income: Decimal,

        /// Total deductions to subtract
        #[arg(long, default_value_t = Decimal::ZERO)]
        deductions: Decimal,
    },

    /// Merchant and keyword store statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Seed => commands::seed(&config).await?,
        Command::Classify { csv, ai } => commands::classify(&config, &csv, ai.as_deref()).await?,
        Command::Summary { csv, income, fy, ai } => {
            commands::summary(&config, &csv, income, fy, ai.as_deref()).await?
        }
        Command::Tax { income, deductions } => commands::tax(income, deductions)?,
        Command::Stats => commands::stats(&config).await?,
    }

    Ok(())
}
