//! In-memory store used by the unit tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;

use crate::key::CompositeKey;
use crate::store::{
    Attributes, IndexQuery, Item, LAST_UPDATED_INDEX, MediaStore, StoreError, WriteRequest,
};

type Row = (String, String, String);

#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<BTreeMap<Row, Attributes>>,
    batch_sizes: Mutex<Vec<usize>>,
    poisoned: Mutex<HashSet<String>>,
    unreadable: Mutex<HashSet<String>>,
    throttled: Mutex<HashSet<String>>,
    gets: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

fn row(table: &str, key: &CompositeKey) -> Row {
    (table.to_string(), key.pk.clone(), key.sk.clone())
}

impl MemoryStore {
    pub fn insert(&self, table: &str, key: &CompositeKey, attributes: Attributes) {
        self.items.lock().unwrap().insert(row(table, key), attributes);
    }

    pub fn attributes(&self, table: &str, key: &CompositeKey) -> Option<Attributes> {
        self.items.lock().unwrap().get(&row(table, key)).cloned()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }

    pub fn max_concurrent_batches(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Any batch containing this sort key fails outright.
    pub fn poison(&self, sk: &str) {
        self.poisoned.lock().unwrap().insert(sk.to_string());
    }

    /// Reads of this sort key fail with a backend error.
    pub fn fail_reads(&self, sk: &str) {
        self.unreadable.lock().unwrap().insert(sk.to_string());
    }

    /// Requests for this sort key are reported as unprocessed.
    pub fn throttle(&self, sk: &str) {
        self.throttled.lock().unwrap().insert(sk.to_string());
    }
}

#[async_trait]
impl MediaStore for MemoryStore {
    async fn get_item(&self, table: &str, key: &CompositeKey) -> Result<Option<Item>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.unreadable.lock().unwrap().contains(&key.sk) {
            return Err(StoreError::backend("get_item", "read failed"));
        }
        Ok(self
            .attributes(table, key)
            .map(|attributes| Item::new(key.clone(), attributes)))
    }

    async fn update_item(
        &self,
        table: &str,
        key: &CompositeKey,
        attributes: Attributes,
    ) -> Result<(), StoreError> {
        let mut items = self.items.lock().unwrap();
        let stored = items.entry(row(table, key)).or_default();
        stored.extend(attributes);
        Ok(())
    }

    async fn delete_item(&self, table: &str, key: &CompositeKey) -> Result<(), StoreError> {
        self.items.lock().unwrap().remove(&row(table, key));
        Ok(())
    }

    async fn query(&self, query: &IndexQuery) -> Result<Vec<Item>, StoreError> {
        if query.index != LAST_UPDATED_INDEX {
            return Err(StoreError::UnknownIndex(query.index.clone()));
        }
        let items = self.items.lock().unwrap();
        let mut found: Vec<Item> = items
            .iter()
            .filter(|((table, pk, _), _)| *table == query.table && *pk == query.pk)
            .map(|((_, pk, sk), attributes)| {
                Item::new(
                    CompositeKey {
                        pk: pk.clone(),
                        sk: sk.clone(),
                    },
                    attributes.clone(),
                )
            })
            .filter(|item| item.last_update().is_some_and(|v| query.condition.matches(v)))
            .collect();
        found.sort_by(|a, b| (a.last_update(), &a.sk).cmp(&(b.last_update(), &b.sk)));
        Ok(found)
    }

    async fn batch_write_item(
        &self,
        table: &str,
        requests: &[WriteRequest],
    ) -> Result<Vec<WriteRequest>, StoreError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.batch_sizes.lock().unwrap().push(requests.len());

        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let poisoned = self.poisoned.lock().unwrap().clone();
        if requests.iter().any(|r| poisoned.contains(&r.key().sk)) {
            return Err(StoreError::backend("batch_write_item", "poisoned batch"));
        }

        let throttled = self.throttled.lock().unwrap().clone();
        let mut unprocessed = Vec::new();
        let mut items = self.items.lock().unwrap();
        for request in requests {
            let key = request.key();
            if throttled.contains(&key.sk) {
                unprocessed.push(request.clone());
                continue;
            }
            match request {
                WriteRequest::Put(item) => {
                    items.insert(row(table, &key), item.attributes.clone());
                }
                WriteRequest::Delete(_) => {
                    items.remove(&row(table, &key));
                }
            }
        }
        Ok(unprocessed)
    }
}

/// A put for `vn#alice` with the given sort key.
pub fn put_request(sk: &str) -> WriteRequest {
    let mut attributes = Attributes::new();
    attributes.insert("last_update".to_string(), json!(0));
    WriteRequest::Put(Item::new(
        CompositeKey {
            pk: "vn#alice".to_string(),
            sk: sk.to_string(),
        },
        attributes,
    ))
}
