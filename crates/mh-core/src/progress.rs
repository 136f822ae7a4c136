//! Folding progress points into a daily aggregate.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::media::{MediaStat, ProgressPoint, UserMediaStat};

/// Merges one status update into `stat`.
///
/// Character and line counts from `additive` are added once. Reading time is
/// credited per point, in the given order, for the gap since the previous
/// point (or the stored `last_update` for the first one), but only when the
/// reader was not paused and the gap is positive and shorter than
/// `max_afk_time`. `last_update` and `pause` always move to the point.
pub fn process_progress(
    stat: &mut UserMediaStat,
    additive: &MediaStat,
    progress: &[ProgressPoint],
    max_afk_time: TimeDelta,
) {
    stat.stats.chars_read = stat.stats.chars_read.saturating_add(additive.chars_read.max(0));
    stat.stats.lines_read = stat.stats.lines_read.saturating_add(additive.lines_read.max(0));

    let max_afk_secs = max_afk_time.num_seconds();
    for point in progress {
        let gap = point.date_time.saturating_sub(stat.last_update);
        if !stat.pause && gap > 0 && gap < max_afk_secs {
            stat.stats.time_read = stat.stats.time_read.saturating_add(gap);
        } else {
            debug!(
                gap,
                paused = stat.pause,
                datetime = point.date_time,
                "progress gap not credited"
            );
        }
        stat.last_update = point.date_time;
        stat.pause = point.pause;
    }
}

/// Whether `first` lies more than `window` before `now`.
#[must_use]
pub fn is_stale(first: i64, now: DateTime<Utc>, window: TimeDelta) -> bool {
    now.timestamp().saturating_sub(first) > window.num_seconds()
}
