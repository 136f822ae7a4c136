//! CLI subcommand implementations.

pub mod backfill;
pub mod media;
pub mod status;
pub mod util;
