mod commands;

use agrolab_common::config::BackendKind;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "agrolab-cli")]
#[command(about = "AgroLab CLI - Grade Python exercise submissions locally", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade a submission file against an exercise
    Grade {
        /// Exercise identifier (e.g., yield_calc, pole_uprawne)
        #[arg(short, long)]
        exercise: String,

        /// Path to the Python source file
        #[arg(short, long)]
        file: PathBuf,

        /// Print the report as JSON instead of text
        #[arg(long, default_value = "false")]
        json: bool,

        /// Sandbox backend (overrides config/grader.json)
        #[arg(short, long)]
        backend: Option<BackendKind>,
    },

    /// List every exercise in the catalog
    List,

    /// Show the public description of one exercise
    Show {
        /// Exercise identifier
        exercise: String,
    },
}

fn init_tracing() {
    // Reports go to stdout; diagnostics stay on stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Grade {
            exercise,
            file,
            json,
            backend,
        } => {
            let passed = commands::grade(&exercise, &file, json, backend).await?;
            if !passed {
                std::process::exit(1);
            }
        }
        Commands::List => {
            commands::list()?;
        }
        Commands::Show { exercise } => {
            commands::show(&exercise)?;
        }
    }

    Ok(())
}
