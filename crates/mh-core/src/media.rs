//! Media history records and their partial update sets.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::key::{UserMediaDateKey, UserMediaKey};
use crate::store::Attributes;

/// Additive reading counters for one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStat {
    /// Seconds spent reading.
    #[serde(default)]
    pub time_read: i64,
    #[serde(default)]
    pub chars_read: i64,
    #[serde(default)]
    pub lines_read: i64,
}

impl MediaStat {
    fn to_attribute(self) -> Value {
        json!({
            "time_read": self.time_read,
            "chars_read": self.chars_read,
            "lines_read": self.lines_read,
        })
    }
}

/// Metadata for one piece of media, one row per media item per user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMediaEntry {
    #[serde(default)]
    pub key: UserMediaKey,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub series: String,
    #[serde(default)]
    pub last_update: i64,
}

/// Daily reading aggregate, one row per user, media item and day.
///
/// `last_update` and `pause` describe the last progress point folded in and
/// drive how the next batch of progress is credited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMediaStat {
    #[serde(default)]
    pub key: UserMediaKey,
    #[serde(default)]
    pub date: Option<i64>,
    #[serde(default)]
    pub stats: MediaStat,
    #[serde(default)]
    pub last_update: i64,
    #[serde(default)]
    pub pause: bool,
}

impl UserMediaStat {
    /// Zero-valued aggregate used when a day has no row yet.
    #[must_use]
    pub fn empty(date_key: &UserMediaDateKey) -> Self {
        Self {
            key: date_key.key.clone(),
            date: Some(date_key.date_time),
            ..Self::default()
        }
    }
}

/// A reading checkpoint sent by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressPoint {
    /// Event time in epoch seconds.
    #[serde(rename = "datetime")]
    pub date_time: i64,
    /// Whether reading is paused from this point onwards.
    #[serde(rename = "status_change", default)]
    pub pause: bool,
}

impl ProgressPoint {
    #[must_use]
    pub const fn new(date_time: i64, pause: bool) -> Self {
        Self { date_time, pause }
    }
}

/// Attributes to write on a stat row. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatUpdate {
    pub date: Option<i64>,
    pub stats: Option<MediaStat>,
    pub last_update: Option<i64>,
    pub pause: Option<bool>,
}

impl StatUpdate {
    /// Flattens the present fields into store attributes.
    #[must_use]
    pub fn attributes(&self) -> Attributes {
        let mut attributes = Attributes::new();
        set(&mut attributes, "date", self.date.map(Value::from));
        set(
            &mut attributes,
            "stats",
            self.stats.map(MediaStat::to_attribute),
        );
        set(&mut attributes, "last_update", self.last_update.map(Value::from));
        set(&mut attributes, "pause", self.pause.map(Value::from));
        attributes
    }
}

impl From<&UserMediaStat> for StatUpdate {
    fn from(stat: &UserMediaStat) -> Self {
        Self {
            date: stat.date,
            stats: Some(stat.stats),
            last_update: Some(stat.last_update),
            pause: Some(stat.pause),
        }
    }
}

/// Attributes to write on a media info row. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryUpdate {
    pub display_name: Option<String>,
    pub series: Option<String>,
    pub last_update: Option<i64>,
}

impl EntryUpdate {
    /// Flattens the present fields into store attributes.
    #[must_use]
    pub fn attributes(&self) -> Attributes {
        let mut attributes = Attributes::new();
        set(
            &mut attributes,
            "display_name",
            self.display_name.clone().map(Value::from),
        );
        set(&mut attributes, "series", self.series.clone().map(Value::from));
        set(&mut attributes, "last_update", self.last_update.map(Value::from));
        attributes
    }
}

impl From<&UserMediaEntry> for EntryUpdate {
    fn from(entry: &UserMediaEntry) -> Self {
        Self {
            display_name: Some(entry.display_name.clone()),
            series: Some(entry.series.clone()),
            last_update: Some(entry.last_update),
        }
    }
}

fn set(attributes: &mut Attributes, name: &str, value: Option<Value>) {
    if let Some(value) = value {
        attributes.insert(name.to_string(), value);
    }
}
