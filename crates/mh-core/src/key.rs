//! Composite key codec for the single-table media layout.
//!
//! Every row in the `media` table is addressed by a two-part key:
//!
//! - **pk**: `{media_type}#{username}`
//! - **sk**: `{media_identifier}` for media info rows, or
//!   `{zero_padded_date}#{media_identifier}` for daily stat rows
//!
//! Dates are zero padded to [`DATE_WIDTH`] characters so that the store's
//! lexicographic sort key ordering matches numeric ordering for epochs in
//! `0..10^16`. Wider values still round-trip but no longer sort.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between key segments.
pub const KEY_SEPARATOR: char = '#';

/// Width of a zero padded date segment (16 on 64-bit targets).
pub const DATE_WIDTH: usize = (usize::BITS / 4) as usize;

/// Errors produced while encoding or decoding composite keys.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The partition or sort key was empty.
    #[error("empty {which} key")]
    EmptyKey { which: &'static str },

    /// The partition key did not split into two non-empty segments.
    #[error("partition key {pk:?} must be two non-empty `#`-separated segments")]
    MalformedPartitionKey { pk: String },

    /// The sort key had the wrong number of segments or an empty segment.
    #[error("sort key {sk:?} must be one or two non-empty `#`-separated segments")]
    MalformedSortKey { sk: String },

    /// The date segment of a stat sort key was not an integer.
    #[error("sort key date segment {segment:?} is not an epoch value")]
    MalformedDate {
        segment: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// A key component was empty while encoding.
    #[error("{field} cannot be empty")]
    EmptySegment { field: &'static str },

    /// A key component contained the segment separator while encoding.
    #[error("{field} cannot contain `#`: {value:?}")]
    SeparatorInSegment { field: &'static str, value: String },
}

/// Identifies one piece of media owned by one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserMediaKey {
    pub username: String,
    pub media_type: String,
    #[serde(default)]
    pub media_identifier: String,
}

impl UserMediaKey {
    pub fn new(
        username: impl Into<String>,
        media_type: impl Into<String>,
        media_identifier: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            media_type: media_type.into(),
            media_identifier: media_identifier.into(),
        }
    }

    /// Partition key shared by every row of this user's media type.
    pub fn partition_key(&self) -> Result<String, KeyError> {
        combine_partition_key(&self.media_type, &self.username)
    }

    /// Key of the media info row.
    pub fn info_key(&self) -> Result<CompositeKey, KeyError> {
        let sk = checked_segment("media identifier", &self.media_identifier)?;
        Ok(CompositeKey {
            pk: self.partition_key()?,
            sk: sk.to_string(),
        })
    }

    /// Key of the daily stat row for `date`.
    pub fn stat_key(&self, date: i64) -> Result<CompositeKey, KeyError> {
        Ok(CompositeKey {
            pk: self.partition_key()?,
            sk: combine_sort_key(date, &self.media_identifier)?,
        })
    }

    /// Pairs this key with a day marker.
    #[must_use]
    pub fn on(&self, date_time: i64) -> UserMediaDateKey {
        UserMediaDateKey {
            key: self.clone(),
            date_time,
        }
    }
}

impl fmt::Display for UserMediaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.username, self.media_type, self.media_identifier
        )
    }
}

/// Identifies one daily aggregate for one media item.
///
/// `date_time` is a day marker (midnight UTC of the resolved day), never a raw
/// event time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserMediaDateKey {
    pub key: UserMediaKey,
    #[serde(rename = "datetime")]
    pub date_time: i64,
}

impl UserMediaDateKey {
    /// Key of the daily stat row this date key addresses.
    pub fn composite_key(&self) -> Result<CompositeKey, KeyError> {
        self.key.stat_key(self.date_time)
    }
}

/// A store primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompositeKey {
    pub pk: String,
    pub sk: String,
}

impl CompositeKey {
    /// Decodes this key back into the media key and optional day marker.
    pub fn split(&self) -> Result<(UserMediaKey, Option<i64>), KeyError> {
        split_composite_key(&self.pk, &self.sk)
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.pk, self.sk)
    }
}

/// Zero pads an epoch value to [`DATE_WIDTH`] digits.
#[must_use]
pub fn zero_pad(date: i64) -> String {
    format!("{date:0width$}", width = DATE_WIDTH)
}

/// Builds `{media_type}#{username}`.
pub fn combine_partition_key(media_type: &str, username: &str) -> Result<String, KeyError> {
    let media_type = checked_segment("media type", media_type)?;
    let username = checked_segment("username", username)?;
    Ok(format!("{media_type}{KEY_SEPARATOR}{username}"))
}

/// Builds `{zero_padded_date}#{media_identifier}`.
pub fn combine_sort_key(date: i64, media_identifier: &str) -> Result<String, KeyError> {
    let media_identifier = checked_segment("media identifier", media_identifier)?;
    Ok(format!("{}{KEY_SEPARATOR}{media_identifier}", zero_pad(date)))
}

/// Splits a stored `(pk, sk)` pair back into its media key.
///
/// A one-segment sort key is a media info row and yields no date. A
/// two-segment sort key is a stat row and yields its day marker.
pub fn split_composite_key(pk: &str, sk: &str) -> Result<(UserMediaKey, Option<i64>), KeyError> {
    if pk.is_empty() {
        return Err(KeyError::EmptyKey { which: "partition" });
    }
    if sk.is_empty() {
        return Err(KeyError::EmptyKey { which: "sort" });
    }

    let (media_type, username) = match pk.split(KEY_SEPARATOR).collect::<Vec<_>>()[..] {
        [media_type, username] if !media_type.is_empty() && !username.is_empty() => {
            (media_type, username)
        }
        _ => {
            return Err(KeyError::MalformedPartitionKey { pk: pk.to_string() });
        }
    };

    let (media_identifier, date) = match sk.split(KEY_SEPARATOR).collect::<Vec<_>>()[..] {
        [identifier] => (identifier, None),
        [date, identifier] if !date.is_empty() && !identifier.is_empty() => {
            let parsed = date.parse::<i64>().map_err(|source| KeyError::MalformedDate {
                segment: date.to_string(),
                source,
            })?;
            (identifier, Some(parsed))
        }
        _ => return Err(KeyError::MalformedSortKey { sk: sk.to_string() }),
    };

    Ok((
        UserMediaKey::new(username, media_type, media_identifier),
        date,
    ))
}

fn checked_segment<'a>(field: &'static str, value: &'a str) -> Result<&'a str, KeyError> {
    if value.is_empty() {
        return Err(KeyError::EmptySegment { field });
    }
    if value.contains(KEY_SEPARATOR) {
        return Err(KeyError::SeparatorInSegment {
            field,
            value: value.to_string(),
        });
    }
    Ok(value)
}
