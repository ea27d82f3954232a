//! # Object Store
//!
//! The authoritative store of resource objects the reconciler converges against.
//!
//! Every read and write the reconciler performs goes through [`ObjectStore`], so the
//! convergence engine never touches `kube::Api` directly. Two implementations exist:
//!
//! - [`KubeStore`] - the Kubernetes API server, each call bounded by a deadline
//! - [`MemoryStore`] - an in-process versioned map with optimistic concurrency,
//!   used by the test suite
//!
//! Outcomes the reconciler branches on (not found, already exists, conflict) are
//! distinct [`StoreError`] variants rather than status codes buried in a message.

mod cluster;
mod memory;

pub use cluster::KubeStore;
pub use memory::{InjectedFailure, MemoryStore, Verb, WriteRecord};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use std::time::Duration;
use thiserror::Error;

/// Object types the store can hold
///
/// Every typed Kubernetes object with a static type (built-in `k8s-openapi` kinds and
/// `#[derive(CustomResource)]` kinds) satisfies this bound.
pub trait StoreObject:
    kube::Resource<DynamicType = ()>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> StoreObject for K where
    K: kube::Resource<DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Errors returned by store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: String, key: String },

    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: String, key: String },

    #[error("{kind} {key} was modified concurrently")]
    Conflict { kind: String, key: String },

    #[error("{operation} {kind} {key} timed out after {}s", .timeout.as_secs())]
    Timeout {
        operation: &'static str,
        kind: String,
        key: String,
        timeout: Duration,
    },

    #[error("{kind} {key} rejected: {reason}")]
    Rejected {
        kind: String,
        key: String,
        reason: String,
    },

    #[error("Kubernetes API error: {0}")]
    Api(#[source] kube::Error),

    #[error("Failed to convert {kind}: {source}")]
    Serialization {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Access to the resource store
///
/// Cluster-scoped kinds are addressed with `namespace = None`. Writes take the
/// object itself; its metadata carries the name, namespace and (for updates) the
/// resourceVersion used for optimistic concurrency.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one object. A missing object is [`StoreError::NotFound`].
    async fn get<K: StoreObject>(&self, namespace: Option<&str>, name: &str)
        -> Result<K, StoreError>;

    /// Create an object. An existing object is [`StoreError::AlreadyExists`].
    async fn create<K: StoreObject>(&self, object: &K) -> Result<K, StoreError>;

    /// Replace an object. A stale resourceVersion is [`StoreError::Conflict`].
    async fn update<K: StoreObject>(&self, object: &K) -> Result<K, StoreError>;

    /// Request deletion. A missing object is [`StoreError::NotFound`].
    async fn delete<K: StoreObject>(&self, namespace: Option<&str>, name: &str)
        -> Result<(), StoreError>;

    /// List objects, optionally filtered by an equality label selector (`k=v,k2=v2`)
    async fn list<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<K>, StoreError>;

    /// Write the status sub-resource of an object
    async fn update_status<K: StoreObject>(&self, object: &K) -> Result<(), StoreError>;

    /// Fetch one object, mapping not-found to `None`
    async fn get_opt<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<K>, StoreError> {
        match self.get::<K>(namespace, name).await {
            Ok(object) => Ok(Some(object)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Display key for log lines and errors (`namespace/name` or `name`)
pub(crate) fn object_key(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{ns}/{name}"),
        None => name.to_string(),
    }
}

/// Kind name of a static type, for error messages and metrics
pub(crate) fn kind_of<K: StoreObject>() -> String {
    K::kind(&()).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_namespaced() {
        assert_eq!(object_key(Some("platform"), "console-ui"), "platform/console-ui");
    }

    #[test]
    fn test_object_key_cluster_scoped() {
        assert_eq!(object_key(None, "console-ui-platform"), "console-ui-platform");
    }

    #[test]
    fn test_error_predicates() {
        let not_found = StoreError::NotFound {
            kind: "ConfigMap".into(),
            key: "ns/a".into(),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_conflict());

        let conflict = StoreError::Conflict {
            kind: "Deployment".into(),
            key: "ns/a".into(),
        };
        assert!(conflict.is_conflict());
        assert!(!conflict.is_already_exists());
    }

    #[test]
    fn test_timeout_message_reports_seconds() {
        let err = StoreError::Timeout {
            operation: "get",
            kind: "Route".into(),
            key: "ns/console-ui".into(),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "get Route ns/console-ui timed out after 30s");
    }
}
