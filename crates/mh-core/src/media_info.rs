//! Media info rows: display metadata for one media item.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use crate::key::{CompositeKey, KeyError, UserMediaKey};
use crate::media::{EntryUpdate, UserMediaEntry};
use crate::store::{MEDIA_TABLE, MediaStore, StoreError};

#[derive(Debug, Error)]
pub enum MediaInfoError {
    #[error("no media info for {0}")]
    NotFound(UserMediaKey),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("stored media info {key} is unreadable: {source}")]
    Corrupt {
        key: CompositeKey,
        #[source]
        source: serde_json::Error,
    },
}

pub async fn get_media_info<S>(
    store: &S,
    key: &UserMediaKey,
) -> Result<UserMediaEntry, MediaInfoError>
where
    S: MediaStore + ?Sized,
{
    let composite = key.info_key()?;
    let item = store
        .get_item(MEDIA_TABLE, &composite)
        .await?
        .ok_or_else(|| MediaInfoError::NotFound(key.clone()))?;

    let mut entry: UserMediaEntry = item
        .to_entity()
        .map_err(|source| MediaInfoError::Corrupt {
            key: composite,
            source,
        })?;
    entry.key = key.clone();
    Ok(entry)
}

/// Writes `entry` with `last_update` stamped to `now` and returns what was
/// written.
pub async fn put_media_info<S>(
    store: &S,
    entry: &UserMediaEntry,
    now: DateTime<Utc>,
) -> Result<UserMediaEntry, MediaInfoError>
where
    S: MediaStore + ?Sized,
{
    let composite = entry.key.info_key()?;
    let stamped = UserMediaEntry {
        last_update: now.timestamp(),
        ..entry.clone()
    };
    store
        .update_item(MEDIA_TABLE, &composite, EntryUpdate::from(&stamped).attributes())
        .await?;
    info!(key = %composite, "media info updated");
    Ok(stamped)
}
