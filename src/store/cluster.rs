//! # Kubernetes Store
//!
//! [`ObjectStore`] backed by the Kubernetes API server.
//!
//! Calls go through `Api<DynamicObject>` built from the static type's `ApiResource`,
//! so one code path serves built-in kinds and foreign CRDs alike. Objects are
//! converted to and from their typed form at this boundary.

use super::{kind_of, object_key, ObjectStore, StoreError, StoreObject};
use crate::constants::OPERATOR_NAME;
use async_trait::async_trait;
use kube::api::{
    Api, ApiResource, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams,
};
use kube::Client;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Store backed by the Kubernetes API
///
/// Every call is bounded by `call_timeout`; expiry surfaces as [`StoreError::Timeout`].
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    call_timeout: Duration,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore")
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client, call_timeout: Duration) -> Self {
        Self {
            client,
            call_timeout,
        }
    }

    /// Underlying client, for watches set up by the runtime
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn api<K: StoreObject>(&self, namespace: Option<&str>) -> Api<DynamicObject> {
        let resource = ApiResource::erase::<K>(&());
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        }
    }

    async fn bounded<T, F>(
        &self,
        operation: &'static str,
        kind: String,
        key: String,
        call: F,
    ) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, kube::Error>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(classify(error, kind, key)),
            Err(_elapsed) => Err(StoreError::Timeout {
                operation,
                kind,
                key,
                timeout: self.call_timeout,
            }),
        }
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(OPERATOR_NAME.to_string()),
        ..Default::default()
    }
}

/// Map API status codes onto the outcomes the reconciler branches on
fn classify(error: kube::Error, kind: String, key: String) -> StoreError {
    match &error {
        kube::Error::Api(response) if response.code == 404 => StoreError::NotFound { kind, key },
        kube::Error::Api(response) if response.code == 409 && response.reason == "AlreadyExists" => {
            StoreError::AlreadyExists { kind, key }
        }
        kube::Error::Api(response) if response.code == 409 => StoreError::Conflict { kind, key },
        _ => StoreError::Api(error),
    }
}

fn to_dynamic<K: StoreObject>(object: &K) -> Result<DynamicObject, StoreError> {
    serde_json::to_value(object)
        .and_then(serde_json::from_value)
        .map_err(|source| StoreError::Serialization {
            kind: kind_of::<K>(),
            source,
        })
}

fn from_dynamic<K: StoreObject>(object: DynamicObject) -> Result<K, StoreError> {
    serde_json::to_value(object)
        .and_then(serde_json::from_value)
        .map_err(|source| StoreError::Serialization {
            kind: kind_of::<K>(),
            source,
        })
}

fn name_of<K: StoreObject>(object: &K) -> Result<String, StoreError> {
    object
        .meta()
        .name
        .clone()
        .ok_or_else(|| StoreError::Rejected {
            kind: kind_of::<K>(),
            key: String::new(),
            reason: "metadata.name is required".to_string(),
        })
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<K, StoreError> {
        let api = self.api::<K>(namespace);
        let object = self
            .bounded("get", kind_of::<K>(), object_key(namespace, name), api.get(name))
            .await?;
        from_dynamic(object)
    }

    async fn create<K: StoreObject>(&self, object: &K) -> Result<K, StoreError> {
        let name = name_of(object)?;
        let namespace = object.meta().namespace.as_deref();
        let api = self.api::<K>(namespace);
        let body = to_dynamic(object)?;
        let pp = post_params();
        let created = self
            .bounded(
                "create",
                kind_of::<K>(),
                object_key(namespace, &name),
                api.create(&pp, &body),
            )
            .await?;
        from_dynamic(created)
    }

    async fn update<K: StoreObject>(&self, object: &K) -> Result<K, StoreError> {
        let name = name_of(object)?;
        let namespace = object.meta().namespace.as_deref();
        let api = self.api::<K>(namespace);
        let body = to_dynamic(object)?;
        let pp = post_params();
        let updated = self
            .bounded(
                "update",
                kind_of::<K>(),
                object_key(namespace, &name),
                api.replace(&name, &pp, &body),
            )
            .await?;
        from_dynamic(updated)
    }

    async fn delete<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError> {
        let api = self.api::<K>(namespace);
        let dp = DeleteParams::background();
        self.bounded(
            "delete",
            kind_of::<K>(),
            object_key(namespace, name),
            api.delete(name, &dp),
        )
        .await?;
        Ok(())
    }

    async fn list<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<K>, StoreError> {
        let api = self.api::<K>(namespace);
        let lp = match label_selector {
            Some(selector) => ListParams::default().labels(selector),
            None => ListParams::default(),
        };
        let list = self
            .bounded(
                "list",
                kind_of::<K>(),
                namespace.unwrap_or("*").to_string(),
                api.list(&lp),
            )
            .await?;
        list.items.into_iter().map(from_dynamic).collect()
    }

    async fn update_status<K: StoreObject>(&self, object: &K) -> Result<(), StoreError> {
        let name = name_of(object)?;
        let namespace = object.meta().namespace.as_deref();
        let api = self.api::<K>(namespace);
        let value = serde_json::to_value(object).map_err(|source| StoreError::Serialization {
            kind: kind_of::<K>(),
            source,
        })?;
        let status = value.get("status").cloned().unwrap_or_default();
        let patch = serde_json::json!({ "status": status });
        let pp = PatchParams::apply(OPERATOR_NAME);

        debug!(kind = %kind_of::<K>(), name = %name, "patching status");
        self.bounded(
            "update_status",
            kind_of::<K>(),
            object_key(namespace, &name),
            api.patch_status(&name, &pp, &Patch::Merge(&patch)),
        )
        .await?;
        Ok(())
    }
}
