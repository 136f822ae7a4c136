//! Media history tracker CLI library.
//!
//! This crate provides the CLI interface for the media history tracker.

mod cli;
pub mod commands;
mod config;

pub use cli::{BackfillAction, Cli, Commands, InputArgs, MediaAction, StatusAction};
pub use config::{Config, SettingsError};
