//! Resource store abstraction
//!
//! The sync engine only needs four operations on a namespaced kind:
//! `get`, `create`, `update` and `update_status`. [`KubeStore`] forwards them
//! to the API server; [`MemoryStore`] keeps records in process for tests and
//! offline use.

mod memory;

use std::fmt::Debug;
use std::marker::PhantomData;

use async_trait::async_trait;
use kube::api::{Api, PostParams};
use kube::{Client, ResourceExt};
use thiserror::Error;

use crate::crd::Object;

pub use memory::{MemoryStore, Operation, WriteRecord};

/// Errors returned by a [`Store`]
#[derive(Debug, Error)]
pub enum StoreError {
    /// The record does not exist
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Kind of the missing record
        kind: String,
        /// Namespace of the missing record
        namespace: String,
        /// Name of the missing record
        name: String,
    },

    /// The write lost an optimistic concurrency race or the record exists
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other store failure
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Create a not found error for the given record
    pub fn not_found(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Whether the record was missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether the write conflicted with another writer
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Classify a kube API error for the given record
    pub fn from_kube(e: kube::Error, kind: &str, namespace: &str, name: &str) -> Self {
        match e {
            kube::Error::Api(resp) if resp.code == 404 => Self::not_found(kind, namespace, name),
            other => Self::from(other),
        }
    }
}

impl From<kube::Error> for StoreError {
    fn from(e: kube::Error) -> Self {
        match e {
            kube::Error::Api(resp) if resp.code == 409 => Self::Conflict(resp.message),
            other => Self::Other(other.to_string()),
        }
    }
}

/// Read and write access to one namespaced kind
#[async_trait]
pub trait Store<K>: Send + Sync {
    /// Fetch a record, `None` if it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError>;

    /// Create a new record, returning it as stored
    async fn create(&self, record: &K) -> Result<K, StoreError>;

    /// Replace a record's spec and metadata, returning it as stored
    ///
    /// Fails with [`StoreError::Conflict`] if the record's resourceVersion is
    /// stale.
    async fn update(&self, record: &K) -> Result<K, StoreError>;

    /// Replace a record's status only, returning it as stored
    async fn update_status(&self, record: &K) -> Result<K, StoreError>;
}

/// Store backed by the Kubernetes API server
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeStore<K> {
    /// Create a store using the given client
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

impl<K> Clone for KubeStore<K> {
    fn clone(&self) -> Self {
        Self::new(self.client.clone())
    }
}

impl<K> Debug for KubeStore<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl<K: Object> KubeStore<K> {
    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn identity(record: &K) -> Result<(String, String), StoreError> {
        let name = record.name_any();
        let ns = record
            .namespace()
            .ok_or_else(|| StoreError::Other(format!("{} {} has no namespace", K::kind(&()), name)))?;
        Ok((ns, name))
    }

    fn classify(e: kube::Error, namespace: &str, name: &str) -> StoreError {
        StoreError::from_kube(e, &K::kind(&()), namespace, name)
    }
}

#[async_trait]
impl<K: Object> Store<K> for KubeStore<K> {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError> {
        self.api(namespace)
            .get_opt(name)
            .await
            .map_err(|e| Self::classify(e, namespace, name))
    }

    async fn create(&self, record: &K) -> Result<K, StoreError> {
        let (ns, name) = Self::identity(record)?;
        self.api(&ns)
            .create(&PostParams::default(), record)
            .await
            .map_err(|e| Self::classify(e, &ns, &name))
    }

    async fn update(&self, record: &K) -> Result<K, StoreError> {
        let (ns, name) = Self::identity(record)?;
        self.api(&ns)
            .replace(&name, &PostParams::default(), record)
            .await
            .map_err(|e| Self::classify(e, &ns, &name))
    }

    async fn update_status(&self, record: &K) -> Result<K, StoreError> {
        let (ns, name) = Self::identity(record)?;
        let body = serde_json::to_vec(record)
            .map_err(|e| StoreError::Other(format!("failed to serialize status: {}", e)))?;
        self.api(&ns)
            .replace_status(&name, &PostParams::default(), body)
            .await
            .map_err(|e| Self::classify(e, &ns, &name))
    }
}
