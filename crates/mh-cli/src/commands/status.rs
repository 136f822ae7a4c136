//! Status commands: apply, read and delete daily reading stats.

use std::io::Write;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use mh_core::{
    MediaStore, StatusArgs, UserMediaDateKey, delete_status_update, get_status_update,
    put_status_update,
};

use crate::Config;
use crate::commands::util::write_json;

/// Applies `request` and prints the resulting day's stats.
pub async fn put<S, W>(
    store: &S,
    writer: &mut W,
    request: &StatusArgs,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<()>
where
    S: MediaStore + ?Sized,
    W: Write,
{
    let settings = config
        .status_settings()
        .context("invalid status configuration")?;
    let record = put_status_update(store, request, &settings, now)
        .await
        .with_context(|| format!("failed to apply status update for {}", request.key))?;
    write_json(writer, &record.stat)
}

pub async fn get<S, W>(store: &S, writer: &mut W, date_key: &UserMediaDateKey) -> Result<()>
where
    S: MediaStore + ?Sized,
    W: Write,
{
    let record = get_status_update(store, date_key)
        .await
        .with_context(|| format!("failed to read status for {}", date_key.key))?;
    if !record.found {
        bail!(
            "no status update for {} on day {}",
            date_key.key,
            date_key.date_time
        );
    }
    write_json(writer, &record.stat)
}

pub async fn delete<S>(store: &S, date_key: &UserMediaDateKey) -> Result<()>
where
    S: MediaStore + ?Sized,
{
    delete_status_update(store, date_key)
        .await
        .with_context(|| format!("failed to delete status for {}", date_key.key))
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use mh_core::{MediaStat, ProgressPoint, UserMediaKey};
    use mh_db::Database;

    /// 2024-03-15T00:00:00Z
    const DAY: i64 = 1_710_460_800;

    fn request() -> StatusArgs {
        StatusArgs {
            key: UserMediaKey::new("alice", "vn", "novel"),
            stats: MediaStat {
                time_read: 0,
                chars_read: 320,
                lines_read: 9,
            },
            progress: vec![
                ProgressPoint::new(DAY + 36_000, false),
                ProgressPoint::new(DAY + 36_040, false),
            ],
            timezone: "Asia/Tokyo".to_string(),
            max_afk_time: None,
        }
    }

    #[tokio::test]
    async fn put_then_get_prints_stats() {
        let db = Database::open_in_memory().unwrap();
        let now = DateTime::from_timestamp(DAY + 43_200, 0).unwrap();
        let mut output = Vec::new();
        put(&db, &mut output, &request(), &Config::default(), now)
            .await
            .unwrap();

        let mut output = Vec::new();
        let date_key = request().key.on(DAY);
        get(&db, &mut output, &date_key).await.unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap().trim_end(), @r#"
        {
          "key": {
            "username": "alice",
            "media_type": "vn",
            "media_identifier": "novel"
          },
          "date": 1710460800,
          "stats": {
            "time_read": 40,
            "chars_read": 320,
            "lines_read": 9
          },
          "last_update": 1710496840,
          "pause": false
        }
        "#);

        delete(&db, &date_key).await.unwrap();
        let err = get(&db, &mut Vec::new(), &date_key).await.unwrap_err();
        assert!(err.to_string().contains("no status update"));
    }

    #[tokio::test]
    async fn put_reports_invalid_timezone() {
        let db = Database::open_in_memory().unwrap();
        let mut bad = request();
        bad.timezone = "Atlantis/Capital".to_string();
        let err = put(&db, &mut Vec::new(), &bad, &Config::default(), Utc::now())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("invalid timezone"));
    }
}
