use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use persona_engine::config::EngineConfig;
use persona_engine::db::{self, PgStore};
use persona_engine::{logging, report, PersonaAssigner, TransitionTracker, WindowType};

#[derive(Parser)]
#[command(name = "persona-engine")]
#[command(about = "Assigns financial behavior personas and tracks transitions", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo signal snapshots
    Seed,
    /// Import signal snapshots from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Assign personas for a user and window
    Assign {
        #[arg(long)]
        user: String,
        /// 30d or 180d
        #[arg(long, default_value = "30d")]
        window: WindowType,
        /// Print the result without storing it
        #[arg(long)]
        dry_run: bool,
    },
    /// Detect a persona transition from the two latest assignments
    Transition {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "30d")]
        window: WindowType,
    },
    /// Write a markdown progress report for a user
    Report {
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = EngineConfig::from_env().context("invalid environment configuration")?;
    logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

    let pool = db::connect(&config)
        .await
        .context("failed to connect to Postgres")?;
    let store = Arc::new(PgStore::new(pool));

    match cli.command {
        Commands::InitDb => {
            db::init_db(store.pool()).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let inserted = db::seed(&store).await?;
            println!("Inserted {inserted} seed snapshots.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&store, &csv)
                .await
                .with_context(|| format!("failed to import {}", csv.display()))?;
            println!("Inserted {inserted} snapshots from {}.", csv.display());
        }
        Commands::Assign {
            user,
            window,
            dry_run,
        } => {
            let assigner = PersonaAssigner::new(store.clone(), store.clone());
            let result = assigner.assign_for_window(&user, window).await?;
            if !dry_run {
                let id = assigner.store_assignment(&result).await?;
                println!("Stored assignment {id}.");
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Transition { user, window } => {
            let tracker = TransitionTracker::new(store.clone());
            let result = tracker.detect_for_window(&user, window).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Report { user, limit, out } => {
            let history = report::load_history(store.as_ref(), &user, limit).await?;
            let markdown = report::build_report(&user, &history);
            std::fs::write(&out, markdown)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
