//! Bulk history import and export.
//!
//! An import turns a user's media entries and daily stats into batch write
//! requests without touching the store; the caller runs them through
//! [`distributed_batch_writes`](crate::batch::distributed_batch_writes). An
//! export reads back every row of one media type changed since a point in
//! time.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::batch::BatchWriteArgs;
use crate::key::{CompositeKey, KeyError, UserMediaDateKey, split_composite_key};
use crate::media::{UserMediaEntry, UserMediaStat};
use crate::store::{IndexQuery, Item, MAX_BATCH_SIZE, MEDIA_TABLE, MediaStore, StoreError, WriteRequest};

/// A user's media history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillArgs {
    pub username: String,
    #[serde(default)]
    pub media_entries: Vec<UserMediaEntry>,
    #[serde(default)]
    pub media_stats: Vec<UserMediaStat>,
}

#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("invalid username")]
    InvalidUsername,

    #[error("no valid data to backfill")]
    NoValidData,

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Builds the batch writes importing `history`.
///
/// Items owned by another user, or whose key cannot be encoded, are logged
/// and skipped. Entries come first, then stats, each in input order.
pub fn put_backfill(history: &BackfillArgs) -> Result<BatchWriteArgs, BackfillError> {
    let username = history.username.as_str();
    if username.is_empty() {
        info!("backfill rejected: empty username");
        return Err(BackfillError::InvalidUsername);
    }

    let mut write_requests = Vec::new();

    for entry in &history.media_entries {
        if entry.key.username != username {
            info!(username, owner = %entry.key.username, "skipping entry: username mismatch");
            continue;
        }
        match entry.key.info_key() {
            Ok(key) => write_requests.push(WriteRequest::Put(Item::from_entity(key, entry)?)),
            Err(err) => info!(key = %entry.key, error = %err, "skipping entry: invalid key"),
        }
    }

    for stat in &history.media_stats {
        if stat.key.username != username {
            info!(username, owner = %stat.key.username, "skipping stat: username mismatch");
            continue;
        }
        let Some(date) = stat.date else {
            info!(key = %stat.key, "skipping stat: missing date");
            continue;
        };
        match stat.key.stat_key(date) {
            Ok(key) => write_requests.push(WriteRequest::Put(Item::from_entity(key, stat)?)),
            Err(err) => info!(key = %stat.key, error = %err, "skipping stat: invalid key"),
        }
    }

    if write_requests.is_empty() {
        info!(username, "backfill rejected: no valid data");
        return Err(BackfillError::NoValidData);
    }

    info!(username, items = write_requests.len(), "backfill prepared");
    Ok(BatchWriteArgs {
        table_name: MEDIA_TABLE.to_string(),
        write_requests,
        max_batch_size: MAX_BATCH_SIZE,
    })
}

/// Exports the rows of `since.key`'s user and media type with a
/// `last_update` at or after `since.date_time`.
///
/// Rows whose key or attributes cannot be decoded are logged and skipped.
pub async fn get_backfill<S>(
    store: &S,
    since: &UserMediaDateKey,
) -> Result<BackfillArgs, BackfillError>
where
    S: MediaStore + ?Sized,
{
    let pk = since.key.partition_key()?;
    let items = store
        .query(&IndexQuery::updated_since(pk, since.date_time))
        .await?;

    let mut history = BackfillArgs {
        username: since.key.username.clone(),
        ..BackfillArgs::default()
    };

    for item in items {
        let (key, date) = match split_composite_key(&item.pk, &item.sk) {
            Ok(split) => split,
            Err(err) => {
                error!(pk = %item.pk, sk = %item.sk, error = %err, "could not split keys");
                continue;
            }
        };

        match date {
            None => match item.to_entity::<UserMediaEntry>() {
                Ok(entry) => history.media_entries.push(UserMediaEntry { key, ..entry }),
                Err(err) => log_undecodable(&item.key(), "entry", &err),
            },
            Some(date) => match item.to_entity::<UserMediaStat>() {
                Ok(stat) => history.media_stats.push(UserMediaStat {
                    key,
                    date: Some(date),
                    ..stat
                }),
                Err(err) => log_undecodable(&item.key(), "stat", &err),
            },
        }
    }

    info!(
        username = %history.username,
        entries = history.media_entries.len(),
        stats = history.media_stats.len(),
        "backfill exported"
    );
    Ok(history)
}

fn log_undecodable(key: &CompositeKey, kind: &str, err: &serde_json::Error) {
    error!(%key, kind, error = %err, "could not decode item");
}
