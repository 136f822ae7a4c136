//! Distributed batch writes.
//!
//! A list of write requests is split into contiguous chunks no larger than the
//! store's batch ceiling. Each chunk is sent as its own `batch_write_item` call
//! and all calls run concurrently inside the caller's task. Whatever the store
//! could not commit is collected and handed back for the caller to resubmit.

use futures::StreamExt;
use futures::future::join_all;
use futures::stream;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::store::{MAX_BATCH_SIZE, MediaStore, WriteRequest};

/// A batch write job, and the shape of its leftovers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchWriteArgs {
    pub table_name: String,
    pub write_requests: Vec<WriteRequest>,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl BatchWriteArgs {
    /// True once nothing is left to write.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.write_requests.is_empty()
    }
}

const fn default_max_batch_size() -> usize {
    MAX_BATCH_SIZE
}

/// Fan-out settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchWriteConfig {
    /// Cap on concurrent chunk calls. `None` sends every chunk at once.
    pub max_in_flight: Option<usize>,
}

/// Writes every request and returns the ones left unprocessed.
///
/// `max_batch_size` outside `1..=MAX_BATCH_SIZE` is reset to
/// [`MAX_BATCH_SIZE`]. A chunk whose call fails outright comes back whole,
/// since none of it was confirmed written; other chunks are unaffected.
pub async fn distributed_batch_writes<S>(
    store: &S,
    args: BatchWriteArgs,
    config: &BatchWriteConfig,
) -> BatchWriteArgs
where
    S: MediaStore + ?Sized,
{
    let table_name = args.table_name;
    let max_batch_size = effective_batch_size(&table_name, args.max_batch_size);

    let calls = args
        .write_requests
        .chunks(max_batch_size)
        .enumerate()
        .map(|(chunk, requests)| write_chunk(store, &table_name, chunk, requests));

    let results: Vec<Vec<WriteRequest>> = match config.max_in_flight {
        Some(limit) => {
            stream::iter(calls)
                .buffer_unordered(limit.max(1))
                .collect()
                .await
        }
        None => join_all(calls).await,
    };

    let write_requests: Vec<WriteRequest> = results.into_iter().flatten().collect();
    if !write_requests.is_empty() {
        warn!(
            table_name = %table_name,
            unprocessed = write_requests.len(),
            "batch writes left unprocessed items"
        );
    }

    BatchWriteArgs {
        table_name,
        write_requests,
        max_batch_size,
    }
}

fn effective_batch_size(table_name: &str, requested: usize) -> usize {
    if (1..=MAX_BATCH_SIZE).contains(&requested) {
        requested
    } else {
        info!(
            table_name,
            max_batch_size = requested,
            "invalid max batch size, using the store limit"
        );
        MAX_BATCH_SIZE
    }
}

async fn write_chunk<S>(
    store: &S,
    table_name: &str,
    chunk: usize,
    requests: &[WriteRequest],
) -> Vec<WriteRequest>
where
    S: MediaStore + ?Sized,
{
    match store.batch_write_item(table_name, requests).await {
        Ok(unprocessed) => {
            info!(
                table_name,
                chunk,
                items = requests.len(),
                unprocessed = unprocessed.len(),
                "batch write succeeded"
            );
            unprocessed
        }
        Err(err) => {
            let keys: Vec<String> = requests.iter().map(|r| r.key().to_string()).collect();
            error!(
                table_name,
                chunk,
                error = %err,
                ?keys,
                "batch write failed"
            );
            requests.to_vec()
        }
    }
}
