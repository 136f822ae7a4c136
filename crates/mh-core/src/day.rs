//! Reading-day resolution.
//!
//! A reading day does not end at midnight. Activity between midnight and the
//! night-end hour still belongs to the previous day, activity after the
//! morning-start hour belongs to the new day, and anything in between joins
//! yesterday only if it continues a session that was active within the
//! intermittent period.
//!
//! Days are identified by a marker: midnight UTC of the user's *local*
//! calendar date. The marker is a label, not an instant in the user's zone.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Longest stretch of nonexistent local time skipped when placing a marker.
const MAX_GAP_MINUTES: i64 = 48 * 60;

/// Hour boundaries of a reading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBoundaries {
    /// Local hour before which activity always belongs to yesterday.
    pub night_end_hour: u32,
    /// Local hour after which activity always belongs to today.
    pub morning_start_hour: u32,
    /// How recently yesterday must have been active for the window between
    /// the two hours to continue it.
    pub intermittent_period: TimeDelta,
}

impl Default for DayBoundaries {
    fn default() -> Self {
        Self {
            night_end_hour: 4,
            morning_start_hour: 6,
            intermittent_period: TimeDelta::hours(1),
        }
    }
}

impl DayBoundaries {
    pub fn validate(&self) -> Result<(), DayError> {
        if self.night_end_hour > self.morning_start_hour || self.morning_start_hour > 23 {
            return Err(DayError::InvalidBoundaries {
                night_end_hour: self.night_end_hour,
                morning_start_hour: self.morning_start_hour,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DayError {
    #[error("invalid timezone: {name}")]
    InvalidTimezone { name: String },

    /// The time falls between the two boundaries and the previous day's last
    /// activity is needed to decide. `fallback` is today's marker.
    #[error("yesterday's last update is needed to resolve the day")]
    NeedMoreContext { fallback: DateTime<Utc> },

    #[error(
        "night end hour {night_end_hour} must not be after morning start hour {morning_start_hour}"
    )]
    InvalidBoundaries {
        night_end_hour: u32,
        morning_start_hour: u32,
    },

    #[error("timestamp {0} is out of range")]
    InvalidTimestamp(i64),

    #[error("no valid local time at or after {local}")]
    NonexistentLocalTime { local: NaiveDateTime },
}

/// Parses an IANA timezone name such as `Australia/Sydney`.
pub fn parse_timezone(name: &str) -> Result<Tz, DayError> {
    name.parse::<Tz>().map_err(|_| DayError::InvalidTimezone {
        name: name.to_string(),
    })
}

/// Converts epoch seconds into local time in `tz`.
pub fn localize(epoch: i64, tz: Tz) -> Result<DateTime<Tz>, DayError> {
    DateTime::from_timestamp(epoch, 0)
        .map(|time| time.with_timezone(&tz))
        .ok_or(DayError::InvalidTimestamp(epoch))
}

/// Marker of a local calendar date.
#[must_use]
pub fn day_marker(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Decides which day `now` belongs to.
///
/// Times strictly before the night-end hour resolve to yesterday and times
/// strictly after the morning-start hour resolve to today. In between, the
/// answer depends on `yesterday_last_update`: without it the result is
/// [`DayError::NeedMoreContext`] carrying today as a fallback; with it, `now`
/// continues yesterday when it is less than the intermittent period after
/// that update.
pub fn day_rollback(
    now: &DateTime<Tz>,
    yesterday_last_update: Option<DateTime<Utc>>,
    boundaries: &DayBoundaries,
) -> Result<DateTime<Utc>, DayError> {
    boundaries.validate()?;

    let date = now.date_naive();
    let today = day_marker(date);
    let yesterday = previous_marker(today)?;

    // Naming follows the boundaries: the evening of yesterday ends at
    // night_end_hour, the morning of today starts at morning_start_hour.
    let evening_marker = local_marker(now, date, boundaries.night_end_hour)?;
    let morning_marker = local_marker(now, date, boundaries.morning_start_hour)?;

    if *now < evening_marker {
        return Ok(yesterday);
    }
    if *now > morning_marker {
        return Ok(today);
    }

    let Some(last_update) = yesterday_last_update else {
        return Err(DayError::NeedMoreContext { fallback: today });
    };

    let session_end = last_update
        .checked_add_signed(boundaries.intermittent_period)
        .ok_or(DayError::InvalidTimestamp(last_update.timestamp()))?;
    if now.with_timezone(&Utc) < session_end {
        Ok(yesterday)
    } else {
        Ok(today)
    }
}

/// Marker of the day before `marker`.
pub fn previous_marker(marker: DateTime<Utc>) -> Result<DateTime<Utc>, DayError> {
    marker
        .checked_sub_days(Days::new(1))
        .ok_or(DayError::InvalidTimestamp(marker.timestamp()))
}

/// `hour:00` on `date` in the zone of `now`.
///
/// An ambiguous local time takes the earlier instant. A local time inside a
/// DST gap moves to the first valid minute after the gap.
fn local_marker(now: &DateTime<Tz>, date: NaiveDate, hour: u32) -> Result<DateTime<Tz>, DayError> {
    let tz = now.timezone();
    let local = NaiveTime::from_hms_opt(hour, 0, 0)
        .map(|time| date.and_time(time))
        .ok_or(DayError::InvalidBoundaries {
            night_end_hour: hour,
            morning_start_hour: hour,
        })?;

    (0..=MAX_GAP_MINUTES)
        .find_map(|minutes| {
            local
                .checked_add_signed(TimeDelta::minutes(minutes))
                .and_then(|shifted| tz.from_local_datetime(&shifted).earliest())
        })
        .ok_or(DayError::NonexistentLocalTime { local })
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono_tz::America::New_York;
    use chrono_tz::Asia::Tokyo;
    use chrono_tz::UTC;

    fn at(tz: Tz, y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        tz.with_ymd_and_hms(y, m, d, h, min, 0).earliest().unwrap()
    }

    fn marker(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        day_marker(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn resolve(now: &DateTime<Tz>, last: Option<DateTime<Utc>>) -> Result<DateTime<Utc>, DayError> {
        day_rollback(now, last, &DayBoundaries::default())
    }

    #[test]
    fn before_night_end_is_yesterday_without_context() {
        let now = at(UTC, 2024, 3, 15, 3, 0);
        assert_eq!(resolve(&now, None), Ok(marker(2024, 3, 14)));
    }

    #[test]
    fn after_morning_start_is_today_without_context() {
        let now = at(UTC, 2024, 3, 15, 7, 0);
        assert_eq!(resolve(&now, None), Ok(marker(2024, 3, 15)));
    }

    #[test]
    fn boundary_hours_themselves_need_context() {
        for hour in [4, 5, 6] {
            let now = at(UTC, 2024, 3, 15, hour, 0);
            assert_eq!(
                resolve(&now, None),
                Err(DayError::NeedMoreContext {
                    fallback: marker(2024, 3, 15)
                }),
                "hour {hour}"
            );
        }
    }

    #[test]
    fn recent_activity_continues_yesterday() {
        let now = at(UTC, 2024, 3, 15, 5, 0);
        let last = at(UTC, 2024, 3, 15, 4, 30).with_timezone(&Utc);
        assert_eq!(resolve(&now, Some(last)), Ok(marker(2024, 3, 14)));
    }

    #[test]
    fn stale_activity_starts_today() {
        let now = at(UTC, 2024, 3, 15, 5, 0);
        let last = at(UTC, 2024, 3, 15, 4, 0).with_timezone(&Utc);
        // Exactly one period later is no longer a continuation.
        assert_eq!(resolve(&now, Some(last)), Ok(marker(2024, 3, 15)));

        // Never active yesterday.
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        assert_eq!(resolve(&now, Some(epoch)), Ok(marker(2024, 3, 15)));
    }

    #[test]
    fn overflowing_continuation_is_an_error() {
        let now = at(UTC, 2024, 3, 15, 5, 0);
        let last = DateTime::from_timestamp(DateTime::<Utc>::MAX_UTC.timestamp(), 0).unwrap();
        assert_eq!(
            resolve(&now, Some(last)),
            Err(DayError::InvalidTimestamp(last.timestamp()))
        );
    }

    #[test]
    fn first_representable_day_has_no_yesterday() {
        let now = localize(DateTime::<Utc>::MIN_UTC.timestamp(), UTC).unwrap();
        assert!(matches!(
            resolve(&now, None),
            Err(DayError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn markers_use_the_local_calendar_date() {
        // 2024-01-01T17:00Z is 02:00 on January 2nd in Tokyo.
        let now = localize(1_704_128_400, Tokyo).unwrap();
        assert_eq!(resolve(&now, None), Ok(marker(2024, 1, 1)));

        // 2024-01-01T22:00Z is 07:00 on January 2nd in Tokyo.
        let now = localize(1_704_146_400, Tokyo).unwrap();
        assert_eq!(resolve(&now, None), Ok(marker(2024, 1, 2)));
    }

    #[test]
    fn marker_inside_dst_gap_moves_past_the_gap() {
        // 02:00-03:00 does not exist in New York on 2024-03-10.
        let boundaries = DayBoundaries {
            night_end_hour: 2,
            ..DayBoundaries::default()
        };
        let before_gap = at(New_York, 2024, 3, 10, 1, 30);
        assert_eq!(
            day_rollback(&before_gap, None, &boundaries),
            Ok(marker(2024, 3, 9))
        );

        let after_gap = at(New_York, 2024, 3, 10, 3, 0);
        assert!(matches!(
            day_rollback(&after_gap, None, &boundaries),
            Err(DayError::NeedMoreContext { .. })
        ));
    }

    #[test]
    fn ambiguous_marker_uses_earlier_instant() {
        // 01:00-02:00 happens twice in New York on 2024-11-03.
        let boundaries = DayBoundaries {
            night_end_hour: 1,
            ..DayBoundaries::default()
        };
        // 01:30 EDT is after 01:00 EDT but before 01:00 EST.
        let first_pass = at(New_York, 2024, 11, 3, 1, 30);
        assert!(matches!(
            day_rollback(&first_pass, None, &boundaries),
            Err(DayError::NeedMoreContext { .. })
        ));
    }

    #[test]
    fn rejects_unknown_timezone() {
        assert_eq!(
            parse_timezone("Mars/Olympus_Mons"),
            Err(DayError::InvalidTimezone {
                name: "Mars/Olympus_Mons".to_string()
            })
        );
        assert_eq!(parse_timezone("Australia/Sydney").unwrap().name(), "Australia/Sydney");
    }

    #[test]
    fn rejects_inverted_boundaries() {
        let boundaries = DayBoundaries {
            night_end_hour: 7,
            morning_start_hour: 6,
            ..DayBoundaries::default()
        };
        let now = at(UTC, 2024, 3, 15, 12, 0);
        assert!(matches!(
            day_rollback(&now, None, &boundaries),
            Err(DayError::InvalidBoundaries { .. })
        ));
    }
}
