//! Real-time status updates.
//!
//! A status update carries a batch of progress points for one media item. The
//! first point decides which reading day the batch lands in; the batch is then
//! folded into that day's aggregate and written back with a partial update.

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::day::{
    DayBoundaries, DayError, day_rollback, localize, parse_timezone, previous_marker,
};
use crate::key::{CompositeKey, KeyError, UserMediaDateKey, UserMediaKey};
use crate::media::{MediaStat, ProgressPoint, StatUpdate, UserMediaStat};
use crate::progress::{is_stale, process_progress};
use crate::store::{MEDIA_TABLE, MediaStore, StoreError};

/// A status update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusArgs {
    pub key: UserMediaKey,
    pub stats: MediaStat,
    pub progress: Vec<ProgressPoint>,
    /// IANA timezone of the reader.
    pub timezone: String,
    /// AFK threshold in seconds; the configured default applies when absent.
    #[serde(default)]
    pub max_afk_time: Option<i64>,
}

/// Tunables for status updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSettings {
    pub boundaries: DayBoundaries,
    pub max_afk_time: TimeDelta,
    /// Age of the first progress point past which a warning is logged.
    pub stale_after: TimeDelta,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            boundaries: DayBoundaries::default(),
            max_afk_time: TimeDelta::seconds(120),
            stale_after: TimeDelta::hours(24),
        }
    }
}

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("status update has no progress points")]
    NoProgress,

    #[error("max_afk_time {0}s is out of range")]
    InvalidAfkTime(i64),

    #[error(transparent)]
    Day(#[from] DayError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("stored stat {key} is unreadable: {source}")]
    Corrupt {
        key: CompositeKey,
        #[source]
        source: serde_json::Error,
    },
}

/// A daily aggregate as read from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredStat {
    #[serde(skip)]
    pub key: CompositeKey,
    pub stat: UserMediaStat,
    /// False when the row did not exist and `stat` is a zero-valued default.
    pub found: bool,
}

/// Loads the aggregate for `key` on the day marked `date`.
async fn get_day<S>(store: &S, key: &UserMediaKey, date: i64) -> Result<StoredStat, StatusError>
where
    S: MediaStore + ?Sized,
{
    let composite = key.stat_key(date)?;
    let Some(item) = store.get_item(MEDIA_TABLE, &composite).await? else {
        debug!(key = %composite, "no stat row for day");
        return Ok(StoredStat {
            key: composite,
            stat: UserMediaStat::empty(&key.on(date)),
            found: false,
        });
    };

    let mut stat: UserMediaStat = item.to_entity().map_err(|source| StatusError::Corrupt {
        key: composite.clone(),
        source,
    })?;
    stat.key = key.clone();
    stat.date = Some(date);
    Ok(StoredStat {
        key: composite,
        stat,
        found: true,
    })
}

/// Resolves the reading day for `now` and loads its aggregate.
///
/// When the time falls between the day boundaries, yesterday's row is read to
/// decide. If the session turns out to continue yesterday that row is returned
/// as is, otherwise today's row is read.
pub async fn which_day<S>(
    store: &S,
    now: &DateTime<Tz>,
    key: &UserMediaKey,
    boundaries: &DayBoundaries,
) -> Result<StoredStat, StatusError>
where
    S: MediaStore + ?Sized,
{
    let day = match day_rollback(now, None, boundaries) {
        Ok(day) => day,
        Err(DayError::NeedMoreContext { fallback }) => {
            let yesterday = previous_marker(fallback)?;
            let previous = get_day(store, key, yesterday.timestamp()).await?;
            let last_update = DateTime::from_timestamp(previous.stat.last_update, 0)
                .ok_or(DayError::InvalidTimestamp(previous.stat.last_update))?;

            let day = day_rollback(now, Some(last_update), boundaries)?;
            if day == yesterday {
                debug!(%key, "continuing yesterday's session");
                return Ok(previous);
            }
            day
        }
        Err(err) => return Err(err.into()),
    };
    get_day(store, key, day.timestamp()).await
}

/// Applies a status update and returns the written aggregate.
pub async fn put_status_update<S>(
    store: &S,
    args: &StatusArgs,
    settings: &StatusSettings,
    now: DateTime<Utc>,
) -> Result<StoredStat, StatusError>
where
    S: MediaStore + ?Sized,
{
    let first = args.progress.first().ok_or(StatusError::NoProgress)?;
    if is_stale(first.date_time, now, settings.stale_after) {
        warn!(
            key = %args.key,
            datetime = first.date_time,
            "first progress point is more than {} hours old",
            settings.stale_after.num_hours()
        );
    }

    let max_afk_time = match args.max_afk_time {
        Some(secs) => TimeDelta::try_seconds(secs).ok_or(StatusError::InvalidAfkTime(secs))?,
        None => settings.max_afk_time,
    };

    let tz = parse_timezone(&args.timezone)?;
    let local = localize(first.date_time, tz)?;
    let mut record = which_day(store, &local, &args.key, &settings.boundaries).await?;

    process_progress(&mut record.stat, &args.stats, &args.progress, max_afk_time);

    store
        .update_item(
            MEDIA_TABLE,
            &record.key,
            StatUpdate::from(&record.stat).attributes(),
        )
        .await?;

    info!(
        key = %args.key,
        date = record.stat.date,
        points = args.progress.len(),
        time_read = record.stat.stats.time_read,
        "status update applied"
    );
    record.found = true;
    Ok(record)
}

/// Reads one day's aggregate; a missing row comes back zero-valued with
/// `found` unset.
pub async fn get_status_update<S>(
    store: &S,
    date_key: &UserMediaDateKey,
) -> Result<StoredStat, StatusError>
where
    S: MediaStore + ?Sized,
{
    get_day(store, &date_key.key, date_key.date_time).await
}

pub async fn delete_status_update<S>(
    store: &S,
    date_key: &UserMediaDateKey,
) -> Result<(), StatusError>
where
    S: MediaStore + ?Sized,
{
    let composite = date_key.composite_key()?;
    store.delete_item(MEDIA_TABLE, &composite).await?;
    info!(key = %composite, "status update deleted");
    Ok(())
}
