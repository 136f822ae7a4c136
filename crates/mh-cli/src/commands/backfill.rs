//! Backfill and batch write commands.
//!
//! Imports are written through the distributed batch writer. Anything the
//! store leaves unprocessed is printed as a batch write request and the
//! command fails, so the output can be fed straight back into
//! `mh batch-write`.

use std::io::Write;

use anyhow::{Context, Result, bail};
use mh_core::{
    BackfillArgs, BatchWriteArgs, MediaStore, UserMediaDateKey, distributed_batch_writes,
    get_backfill, put_backfill,
};

use crate::Config;
use crate::commands::util::write_json;

pub async fn put<S, W>(
    store: &S,
    writer: &mut W,
    history: &BackfillArgs,
    config: &Config,
) -> Result<()>
where
    S: MediaStore + ?Sized,
    W: Write,
{
    let args = put_backfill(history)
        .with_context(|| format!("failed to prepare backfill for {:?}", history.username))?;
    batch_write(store, writer, args, config).await
}

pub async fn get<S, W>(store: &S, writer: &mut W, since: &UserMediaDateKey) -> Result<()>
where
    S: MediaStore + ?Sized,
    W: Write,
{
    let history = get_backfill(store, since)
        .await
        .with_context(|| format!("failed to export history for {}", since.key))?;
    write_json(writer, &history)
}

/// Writes `args` and prints whatever is left over.
pub async fn batch_write<S, W>(
    store: &S,
    writer: &mut W,
    args: BatchWriteArgs,
    config: &Config,
) -> Result<()>
where
    S: MediaStore + ?Sized,
    W: Write,
{
    let total = args.write_requests.len();
    let leftover = distributed_batch_writes(store, args, &config.batch_config()).await;
    write_json(writer, &leftover)?;

    if !leftover.is_complete() {
        bail!(
            "{} of {total} write requests were not processed; resubmit the output with `mh batch-write`",
            leftover.write_requests.len()
        );
    }
    tracing::info!(items = total, "batch write complete");
    Ok(())
}
