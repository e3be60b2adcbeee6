//! In-memory store
//!
//! Mimics the API server semantics the sync engine relies on:
//! - create assigns a uid and a resourceVersion and rejects duplicates
//! - every write bumps the resourceVersion
//! - update and update_status reject stale resourceVersions with Conflict
//! - update never touches status, update_status touches nothing but status
//!
//! Every successful write is recorded so tests can assert on exactly which
//! writes a pass made.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use tracing::debug;

use super::{Store, StoreError};
use crate::crd::Object;

/// Store operation, used for write records and failure injection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `Store::get`
    Get,
    /// `Store::create`
    Create,
    /// `Store::update`
    Update,
    /// `Store::update_status`
    UpdateStatus,
}

/// A successful write made through the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteRecord {
    /// Which operation wrote
    pub operation: Operation,
    /// Namespace of the written record
    pub namespace: String,
    /// Name of the written record
    pub name: String,
    /// resourceVersion assigned by the write
    pub resource_version: String,
}

struct Inner<K> {
    records: BTreeMap<(String, String), K>,
    writes: Vec<WriteRecord>,
    failures: HashMap<Operation, StoreError>,
    version: u64,
}

impl<K> Inner<K> {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }
}

/// Store keeping records of one kind in process
pub struct MemoryStore<K> {
    inner: RwLock<Inner<K>>,
}

impl<K> Default for MemoryStore<K> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Inner {
                records: BTreeMap::new(),
                writes: Vec::new(),
                failures: HashMap::new(),
                version: 0,
            }),
        }
    }
}

impl<K> Debug for MemoryStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("MemoryStore")
            .field("records", &inner.records.len())
            .field("writes", &inner.writes.len())
            .finish()
    }
}

impl<K: Object> MemoryStore<K> {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record without recording a write
    ///
    /// Assigns a uid and resourceVersion when missing, like `create` would.
    pub fn insert(&self, mut record: K) -> K {
        let mut inner = self.inner.write();
        let meta = record.meta_mut();
        if meta.uid.is_none() {
            meta.uid = Some(uuid::Uuid::new_v4().to_string());
        }
        meta.resource_version = Some(inner.next_version());
        inner.records.insert(key_of(&record), record.clone());
        record
    }

    /// Current copy of a record
    pub fn object(&self, namespace: &str, name: &str) -> Option<K> {
        self.inner
            .read()
            .records
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Change a record as another writer would, bumping its resourceVersion
    ///
    /// Returns false if the record does not exist. Not recorded as a write.
    pub fn modify(&self, namespace: &str, name: &str, change: impl FnOnce(&mut K)) -> bool {
        let mut inner = self.inner.write();
        let version = inner.next_version();
        match inner
            .records
            .get_mut(&(namespace.to_string(), name.to_string()))
        {
            Some(record) => {
                change(record);
                record.meta_mut().resource_version = Some(version);
                true
            }
            None => false,
        }
    }

    /// Remove a record, returning it
    pub fn remove(&self, namespace: &str, name: &str) -> Option<K> {
        self.inner
            .write()
            .records
            .remove(&(namespace.to_string(), name.to_string()))
    }

    /// Fail the next call of `operation` with `error`
    pub fn fail_next(&self, operation: Operation, error: StoreError) {
        self.inner.write().failures.insert(operation, error);
    }

    /// All writes made since creation or the last `clear_writes`
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.inner.read().writes.clone()
    }

    /// Number of writes made since creation or the last `clear_writes`
    pub fn write_count(&self) -> usize {
        self.inner.read().writes.len()
    }

    /// Forget recorded writes
    pub fn clear_writes(&self) {
        self.inner.write().writes.clear();
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_injected(inner: &mut Inner<K>, operation: Operation) -> Result<(), StoreError> {
        match inner.failures.remove(&operation) {
            Some(err) => {
                debug!(?operation, error = %err, "injected store failure");
                Err(err)
            }
            None => Ok(()),
        }
    }

    /// Look up the stored record a write applies to, enforcing optimistic
    /// concurrency on the caller's resourceVersion
    fn current<'a>(inner: &'a Inner<K>, record: &K) -> Result<&'a K, StoreError> {
        let (namespace, name) = key_of(record);
        let stored = inner
            .records
            .get(&(namespace.clone(), name.clone()))
            .ok_or_else(|| StoreError::not_found(K::kind(&()), &namespace, &name))?;

        let expected = record.meta().resource_version.as_deref();
        let actual = stored.meta().resource_version.as_deref();
        if expected.is_some() && expected != actual {
            return Err(StoreError::Conflict(format!(
                "{} {}/{} has resourceVersion {}, write was based on {}",
                K::kind(&()),
                namespace,
                name,
                actual.unwrap_or_default(),
                expected.unwrap_or_default()
            )));
        }
        Ok(stored)
    }

    fn commit(inner: &mut Inner<K>, operation: Operation, mut record: K) -> K {
        let version = inner.next_version();
        record.meta_mut().resource_version = Some(version.clone());
        let (namespace, name) = key_of(&record);
        inner.writes.push(WriteRecord {
            operation,
            namespace: namespace.clone(),
            name: name.clone(),
            resource_version: version,
        });
        inner.records.insert((namespace, name), record.clone());
        record
    }
}

fn key_of<K: Object>(record: &K) -> (String, String) {
    let meta = record.meta();
    (
        meta.namespace.clone().unwrap_or_default(),
        meta.name.clone().unwrap_or_default(),
    )
}

fn to_json<K: Object>(record: &K) -> Result<JsonValue, StoreError> {
    serde_json::to_value(record)
        .map_err(|e| StoreError::Other(format!("failed to serialize {}: {}", K::kind(&()), e)))
}

fn from_json<K: Object>(value: JsonValue) -> Result<K, StoreError> {
    serde_json::from_value(value)
        .map_err(|e| StoreError::Other(format!("failed to deserialize {}: {}", K::kind(&()), e)))
}

/// Copy `status` from `source` into `into`, removing it when `source` has none
fn splice_status(into: &mut JsonValue, source: &JsonValue) {
    if let Some(fields) = into.as_object_mut() {
        match source.get("status") {
            Some(status) => {
                fields.insert("status".to_string(), status.clone());
            }
            None => {
                fields.remove("status");
            }
        }
    }
}

#[async_trait]
impl<K: Object> Store<K> for MemoryStore<K> {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError> {
        let mut inner = self.inner.write();
        Self::check_injected(&mut inner, Operation::Get)?;
        Ok(inner
            .records
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn create(&self, record: &K) -> Result<K, StoreError> {
        let mut inner = self.inner.write();
        Self::check_injected(&mut inner, Operation::Create)?;

        let key = key_of(record);
        if inner.records.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "{} {}/{} already exists",
                K::kind(&()),
                key.0,
                key.1
            )));
        }

        let mut created = record.clone();
        let meta = created.meta_mut();
        meta.uid = Some(uuid::Uuid::new_v4().to_string());
        meta.generation = Some(1);
        Ok(Self::commit(&mut inner, Operation::Create, created))
    }

    async fn update(&self, record: &K) -> Result<K, StoreError> {
        let mut inner = self.inner.write();
        Self::check_injected(&mut inner, Operation::Update)?;

        let stored = Self::current(&inner, record)?;
        let stored_json = to_json(stored)?;
        let uid = stored.meta().uid.clone();
        let generation = stored.meta().generation.unwrap_or(0) + 1;

        let mut next = to_json(record)?;
        splice_status(&mut next, &stored_json);
        let mut updated: K = from_json(next)?;
        let meta = updated.meta_mut();
        meta.uid = uid;
        meta.generation = Some(generation);
        Ok(Self::commit(&mut inner, Operation::Update, updated))
    }

    async fn update_status(&self, record: &K) -> Result<K, StoreError> {
        let mut inner = self.inner.write();
        Self::check_injected(&mut inner, Operation::UpdateStatus)?;

        let stored = Self::current(&inner, record)?;
        let mut next = to_json(stored)?;
        splice_status(&mut next, &to_json(record)?);
        let updated: K = from_json(next)?;
        Ok(Self::commit(&mut inner, Operation::UpdateStatus, updated))
    }
}
