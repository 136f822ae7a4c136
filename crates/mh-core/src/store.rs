//! Backing key-value store contract.
//!
//! The engine talks to a single-table store through [`MediaStore`]. Items are
//! addressed by a [`CompositeKey`] and carry a flat attribute map; the entity's
//! own `key` field is never stored because it is redundant with pk/sk.
//!
//! The store is constructed by the caller and passed by reference into every
//! operation. Implementations must be safe to share across tasks.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::key::CompositeKey;

/// Table holding media info and daily stat rows.
pub const MEDIA_TABLE: &str = "media";

/// Secondary index ordering a partition's rows by [`LAST_UPDATE_ATTRIBUTE`].
pub const LAST_UPDATED_INDEX: &str = "lastUpdatedIndex";

/// Numeric attribute backing [`LAST_UPDATED_INDEX`].
pub const LAST_UPDATE_ATTRIBUTE: &str = "last_update";

/// Hard ceiling on requests per `batch_write_item` call.
pub const MAX_BATCH_SIZE: usize = 25;

/// Item attributes beyond the primary key.
pub type Attributes = Map<String, Value>;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend failed to serve the request.
    #[error("{operation} failed: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// A batch exceeded [`MAX_BATCH_SIZE`].
    #[error("batch of {len} writes exceeds the limit of {max}", max = MAX_BATCH_SIZE)]
    BatchTooLarge { len: usize },
    /// The query named an index the table does not have.
    #[error("unknown index {0:?}")]
    UnknownIndex(String),
    /// Stored attributes could not be encoded or decoded.
    #[error("invalid item attributes: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn backend(
        operation: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Backend {
            operation,
            source: source.into(),
        }
    }
}

/// A stored row: primary key plus attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub pk: String,
    pub sk: String,
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl Item {
    #[must_use]
    pub fn new(key: CompositeKey, attributes: Attributes) -> Self {
        Self {
            pk: key.pk,
            sk: key.sk,
            attributes,
        }
    }

    /// Serializes an entity into an item, dropping its `key` field.
    pub fn from_entity<T: Serialize>(key: CompositeKey, entity: &T) -> Result<Self, StoreError> {
        let mut attributes = match serde_json::to_value(entity)? {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::Serialization(serde::ser::Error::custom(
                    format!("expected an object, got {other}"),
                )));
            }
        };
        attributes.remove("key");
        Ok(Self::new(key, attributes))
    }

    /// Deserializes the attributes into an entity.
    pub fn to_entity<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.attributes.clone()))
    }

    #[must_use]
    pub fn key(&self) -> CompositeKey {
        CompositeKey {
            pk: self.pk.clone(),
            sk: self.sk.clone(),
        }
    }

    /// Value of the index attribute, if present and numeric.
    #[must_use]
    pub fn last_update(&self) -> Option<i64> {
        self.attributes
            .get(LAST_UPDATE_ATTRIBUTE)
            .and_then(Value::as_i64)
    }
}

/// One entry of a batch write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteRequest {
    /// Replace the whole item.
    Put(Item),
    /// Remove the item with this key.
    Delete(CompositeKey),
}

impl WriteRequest {
    #[must_use]
    pub fn key(&self) -> CompositeKey {
        match self {
            Self::Put(item) => item.key(),
            Self::Delete(key) => key.clone(),
        }
    }
}

/// Condition on an index's range attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeCondition {
    /// Inclusive lower bound.
    AtLeast(i64),
}

impl RangeCondition {
    #[must_use]
    pub const fn matches(self, value: i64) -> bool {
        match self {
            Self::AtLeast(bound) => value >= bound,
        }
    }
}

/// Query over one partition of a secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexQuery {
    pub table: String,
    pub index: String,
    pub pk: String,
    /// Applied to [`LAST_UPDATE_ATTRIBUTE`].
    pub condition: RangeCondition,
}

impl IndexQuery {
    /// Rows of `pk` in the media table updated at or after `since`.
    #[must_use]
    pub fn updated_since(pk: impl Into<String>, since: i64) -> Self {
        Self {
            table: MEDIA_TABLE.to_string(),
            index: LAST_UPDATED_INDEX.to_string(),
            pk: pk.into(),
            condition: RangeCondition::AtLeast(since),
        }
    }
}

/// The single-table store the engine persists into.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Fetches one item; `Ok(None)` when it does not exist.
    async fn get_item(&self, table: &str, key: &CompositeKey) -> Result<Option<Item>, StoreError>;

    /// Creates or partially updates an item: only the given attributes are
    /// written, every other stored attribute is kept.
    async fn update_item(
        &self,
        table: &str,
        key: &CompositeKey,
        attributes: Attributes,
    ) -> Result<(), StoreError>;

    /// Removes an item. Removing a missing item is not an error.
    async fn delete_item(&self, table: &str, key: &CompositeKey) -> Result<(), StoreError>;

    /// Returns the partition's items whose index attribute satisfies the
    /// query condition, ordered by that attribute.
    async fn query(&self, query: &IndexQuery) -> Result<Vec<Item>, StoreError>;

    /// Applies up to [`MAX_BATCH_SIZE`] writes and returns the requests the
    /// store did not process.
    async fn batch_write_item(
        &self,
        table: &str,
        requests: &[WriteRequest],
    ) -> Result<Vec<WriteRequest>, StoreError>;
}
