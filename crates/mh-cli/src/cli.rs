//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Media history tracker.
///
/// Records reading progress into per-day statistics and imports or exports a
/// user's reading history. Requests are JSON documents read from `--input` or
/// stdin; responses are JSON on stdout.
#[derive(Debug, Parser)]
#[command(name = "mh", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Record, read or delete daily reading stats.
    #[command(subcommand)]
    Status(StatusAction),

    /// Write or read media display info.
    #[command(subcommand)]
    Media(MediaAction),

    /// Import or export a user's media history.
    #[command(subcommand)]
    Backfill(BackfillAction),

    /// Resubmit write requests left over by a previous import.
    BatchWrite(InputArgs),
}

#[derive(Debug, Subcommand)]
pub enum StatusAction {
    /// Apply a batch of progress points.
    Put(InputArgs),
    /// Show one day's stats for a media item.
    Get(InputArgs),
    /// Delete one day's stats for a media item.
    Delete(InputArgs),
}

#[derive(Debug, Subcommand)]
pub enum MediaAction {
    /// Write display name and series for a media item.
    Put(InputArgs),
    /// Show display info for a media item.
    Get(InputArgs),
}

#[derive(Debug, Subcommand)]
pub enum BackfillAction {
    /// Import media entries and daily stats.
    Put(InputArgs),
    /// Export rows updated since a point in time.
    Get(InputArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct InputArgs {
    /// JSON request file. Reads stdin when omitted.
    #[arg(short, long)]
    pub input: Option<PathBuf>,
}
