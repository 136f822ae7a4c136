//! Core domain logic for the media history tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Keys: encoding user media rows into the single-table pk/sk layout
//! - Status updates: resolving the reading day and accumulating reading time
//! - Backfill: bulk import and export of a user's media history
//! - Batch writes: fanning write requests out over concurrent store calls
//!
//! Persistence goes through the [`MediaStore`] trait; the caller owns the
//! store and passes it into every operation.

pub mod backfill;
pub mod batch;
pub mod day;
pub mod key;
pub mod media;
pub mod media_info;
mod progress;
pub mod status;
pub mod store;

#[cfg(test)]
mod testing;

pub use backfill::{BackfillArgs, BackfillError, get_backfill, put_backfill};
pub use batch::{BatchWriteArgs, BatchWriteConfig, distributed_batch_writes};
pub use day::{DayBoundaries, DayError, day_rollback};
pub use key::{CompositeKey, KeyError, UserMediaDateKey, UserMediaKey, split_composite_key};
pub use media::{
    EntryUpdate, MediaStat, ProgressPoint, StatUpdate, UserMediaEntry, UserMediaStat,
};
pub use media_info::{MediaInfoError, get_media_info, put_media_info};
pub use progress::{is_stale, process_progress};
pub use status::{
    StatusArgs, StatusError, StatusSettings, StoredStat, delete_status_update,
    get_status_update, put_status_update, which_day,
};
pub use store::{
    Attributes, IndexQuery, Item, MediaStore, RangeCondition, StoreError, WriteRequest,
};
