//! Media info commands.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use mh_core::{MediaStore, UserMediaEntry, UserMediaKey, get_media_info, put_media_info};

use crate::commands::util::write_json;

pub async fn put<S, W>(
    store: &S,
    writer: &mut W,
    entry: &UserMediaEntry,
    now: DateTime<Utc>,
) -> Result<()>
where
    S: MediaStore + ?Sized,
    W: Write,
{
    let written = put_media_info(store, entry, now)
        .await
        .with_context(|| format!("failed to write media info for {}", entry.key))?;
    write_json(writer, &written)
}

pub async fn get<S, W>(store: &S, writer: &mut W, key: &UserMediaKey) -> Result<()>
where
    S: MediaStore + ?Sized,
    W: Write,
{
    let entry = get_media_info(store, key)
        .await
        .with_context(|| format!("failed to read media info for {key}"))?;
    write_json(writer, &entry)
}
