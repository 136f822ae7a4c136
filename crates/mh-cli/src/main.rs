use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mh_cli::commands::util::read_request;
use mh_cli::commands::{backfill, media, status};
use mh_cli::{BackfillAction, Cli, Commands, Config, InputArgs, MediaAction, StatusAction};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(mh_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = mh_db::Database::open(&config.database_path).with_context(|| {
        format!(
            "failed to open database {}",
            config.database_path.display()
        )
    })?;
    Ok((db, config))
}

fn request<T: serde::de::DeserializeOwned>(args: &InputArgs) -> Result<T> {
    read_request(args.input.as_deref(), io::stdin().lock())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let (db, config) = open_database(cli.config.as_deref())?;
    let mut stdout = io::stdout().lock();

    match command {
        Commands::Status(action) => match action {
            StatusAction::Put(args) => {
                status::put(&db, &mut stdout, &request(args)?, &config, Utc::now()).await?;
            }
            StatusAction::Get(args) => status::get(&db, &mut stdout, &request(args)?).await?,
            StatusAction::Delete(args) => status::delete(&db, &request(args)?).await?,
        },
        Commands::Media(action) => match action {
            MediaAction::Put(args) => {
                media::put(&db, &mut stdout, &request(args)?, Utc::now()).await?;
            }
            MediaAction::Get(args) => media::get(&db, &mut stdout, &request(args)?).await?,
        },
        Commands::Backfill(action) => match action {
            BackfillAction::Put(args) => {
                backfill::put(&db, &mut stdout, &request(args)?, &config).await?;
            }
            BackfillAction::Get(args) => backfill::get(&db, &mut stdout, &request(args)?).await?,
        },
        Commands::BatchWrite(args) => {
            backfill::batch_write(&db, &mut stdout, request(args)?, &config).await?;
        }
    }

    stdout.flush()?;
    Ok(())
}
