//! # In-Memory Store
//!
//! [`ObjectStore`] over an in-process map, with the API server behaviours the
//! reconciler depends on:
//!
//! - resourceVersion optimistic concurrency on update
//! - status sub-resource semantics (a main-resource update never changes status)
//! - finalizers (delete only marks an object while finalizers remain)
//! - owner-reference garbage collection when an owner is removed
//!
//! Every successful write is appended to a log so tests can assert exactly which
//! mutations a pass issued. Failures can be injected per (verb, kind, name).

use super::{kind_of, object_key, ObjectStore, StoreError, StoreObject};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Write operation kinds recorded in the write log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Create,
    Update,
    Delete,
    UpdateStatus,
}

/// One successful write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub verb: Verb,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

/// Failure injected into the next matching write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectedFailure {
    /// A concurrent writer created the object first
    AlreadyExists,
    Conflict,
    Timeout,
    Rejected(String),
}

#[derive(Debug)]
struct Injection {
    verb: Verb,
    kind: String,
    name: String,
    failure: InjectedFailure,
}

/// (apiVersion, kind, namespace, name)
type ObjectId = (String, String, String, String);

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<ObjectId, Value>,
    version: u64,
    writes: Vec<WriteRecord>,
    injections: Vec<Injection>,
}

impl State {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }

    fn take_injection(&mut self, verb: Verb, kind: &str, name: &str) -> Option<InjectedFailure> {
        let index = self
            .injections
            .iter()
            .position(|i| i.verb == verb && i.kind == kind && i.name == name)?;
        Some(self.injections.remove(index).failure)
    }

    fn record(&mut self, verb: Verb, kind: String, namespace: Option<&str>, name: &str) {
        self.writes.push(WriteRecord {
            verb,
            kind,
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        });
    }

    /// Remove an object and everything that transitively names it as owner
    fn remove_cascading(&mut self, id: &ObjectId) {
        let mut pending: Vec<String> = self
            .objects
            .remove(id)
            .and_then(|v| uid_of(&v))
            .into_iter()
            .collect();

        while let Some(owner_uid) = pending.pop() {
            let dependents: Vec<ObjectId> = self
                .objects
                .iter()
                .filter(|(_, v)| owned_by(v, &owner_uid))
                .map(|(id, _)| id.clone())
                .collect();
            for dependent in dependents {
                if let Some(uid) = self.objects.remove(&dependent).and_then(|v| uid_of(&v)) {
                    pending.push(uid);
                }
            }
        }
    }
}

/// Versioned in-process object store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed or overwrite an object without recording a write
    ///
    /// Assigns a uid and resourceVersion the way the API server would. The status is
    /// taken as given, which makes this the way to simulate other controllers.
    pub fn insert<K: StoreObject>(&self, object: &K) -> Result<K, StoreError> {
        let mut value = to_value(object)?;
        let id = id_of::<K>(object)?;
        let mut state = self.lock();
        let uid = state
            .objects
            .get(&id)
            .and_then(uid_of)
            .or_else(|| uid_of(&value))
            .unwrap_or_else(|| format!("uid-{}", state.version + 1));
        value["metadata"]["uid"] = json!(uid);
        value["metadata"]["resourceVersion"] = json!(state.next_version());
        state.objects.insert(id, value.clone());
        from_value(value)
    }

    /// Whether an object of this kind exists (including objects marked for deletion)
    #[must_use]
    pub fn contains<K: StoreObject>(&self, namespace: Option<&str>, name: &str) -> bool {
        let id = make_id::<K>(namespace, name);
        self.lock().objects.contains_key(&id)
    }

    /// Every successful write since creation or the last [`MemoryStore::clear_writes`]
    #[must_use]
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    /// Fail the next `verb` on the named object of `kind`
    pub fn inject_failure(&self, verb: Verb, kind: &str, name: &str, failure: InjectedFailure) {
        self.lock().injections.push(Injection {
            verb,
            kind: kind.to_string(),
            name: name.to_string(),
            failure,
        });
    }

    /// Number of stored objects
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn injected_error(
    failure: InjectedFailure,
    operation: &'static str,
    kind: String,
    key: String,
) -> StoreError {
    match failure {
        InjectedFailure::AlreadyExists => StoreError::AlreadyExists { kind, key },
        InjectedFailure::Conflict => StoreError::Conflict { kind, key },
        InjectedFailure::Timeout => StoreError::Timeout {
            operation,
            kind,
            key,
            timeout: Duration::ZERO,
        },
        InjectedFailure::Rejected(reason) => StoreError::Rejected { kind, key, reason },
    }
}

fn make_id<K: StoreObject>(namespace: Option<&str>, name: &str) -> ObjectId {
    (
        K::api_version(&()).into_owned(),
        K::kind(&()).into_owned(),
        namespace.unwrap_or_default().to_string(),
        name.to_string(),
    )
}

fn id_of<K: StoreObject>(object: &K) -> Result<ObjectId, StoreError> {
    let meta = object.meta();
    let name = meta.name.as_deref().ok_or_else(|| StoreError::Rejected {
        kind: kind_of::<K>(),
        key: String::new(),
        reason: "metadata.name is required".to_string(),
    })?;
    Ok(make_id::<K>(meta.namespace.as_deref(), name))
}

fn to_value<K: StoreObject>(object: &K) -> Result<Value, StoreError> {
    serde_json::to_value(object).map_err(|source| StoreError::Serialization {
        kind: kind_of::<K>(),
        source,
    })
}

fn from_value<K: StoreObject>(value: Value) -> Result<K, StoreError> {
    serde_json::from_value(value).map_err(|source| StoreError::Serialization {
        kind: kind_of::<K>(),
        source,
    })
}

fn uid_of(value: &Value) -> Option<String> {
    value
        .pointer("/metadata/uid")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn owned_by(value: &Value, owner_uid: &str) -> bool {
    value
        .pointer("/metadata/ownerReferences")
        .and_then(Value::as_array)
        .is_some_and(|refs| {
            refs.iter()
                .any(|r| r.get("uid").and_then(Value::as_str) == Some(owner_uid))
        })
}

fn has_finalizers(value: &Value) -> bool {
    value
        .pointer("/metadata/finalizers")
        .and_then(Value::as_array)
        .is_some_and(|f| !f.is_empty())
}

fn is_deleting(value: &Value) -> bool {
    value
        .pointer("/metadata/deletionTimestamp")
        .is_some_and(|v| !v.is_null())
}

fn labels_match(value: &Value, selector: &str) -> bool {
    let labels = value.pointer("/metadata/labels");
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, expected)) => {
                labels
                    .and_then(|l| l.get(key.trim()))
                    .and_then(Value::as_str)
                    == Some(expected.trim())
            }
            None => labels.and_then(|l| l.get(term)).is_some(),
        })
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<K, StoreError> {
        let id = make_id::<K>(namespace, name);
        let value = self.lock().objects.get(&id).cloned();
        match value {
            Some(value) => from_value(value),
            None => Err(StoreError::NotFound {
                kind: kind_of::<K>(),
                key: object_key(namespace, name),
            }),
        }
    }

    async fn create<K: StoreObject>(&self, object: &K) -> Result<K, StoreError> {
        let id = id_of::<K>(object)?;
        let mut value = to_value(object)?;
        let namespace = object.meta().namespace.clone();
        let key = object_key(namespace.as_deref(), &id.3);

        let mut state = self.lock();
        if let Some(failure) = state.take_injection(Verb::Create, &id.1, &id.3) {
            return Err(injected_error(failure, "create", kind_of::<K>(), key));
        }
        if state.objects.contains_key(&id) {
            return Err(StoreError::AlreadyExists {
                kind: kind_of::<K>(),
                key,
            });
        }

        let version = state.next_version();
        value["metadata"]["uid"] = json!(format!("uid-{version}"));
        value["metadata"]["resourceVersion"] = json!(version);
        value["metadata"]["generation"] = json!(1);
        if let Some(meta) = value["metadata"].as_object_mut() {
            meta.remove("deletionTimestamp");
        }
        state.objects.insert(id.clone(), value.clone());
        state.record(Verb::Create, kind_of::<K>(), namespace.as_deref(), &id.3);
        drop(state);

        from_value(value)
    }

    async fn update<K: StoreObject>(&self, object: &K) -> Result<K, StoreError> {
        let id = id_of::<K>(object)?;
        let mut value = to_value(object)?;
        let namespace = object.meta().namespace.clone();
        let key = object_key(namespace.as_deref(), &id.3);

        let mut state = self.lock();
        if let Some(failure) = state.take_injection(Verb::Update, &id.1, &id.3) {
            return Err(injected_error(failure, "update", kind_of::<K>(), key));
        }
        let Some(stored) = state.objects.get(&id).cloned() else {
            return Err(StoreError::NotFound {
                kind: kind_of::<K>(),
                key,
            });
        };

        let stored_version = stored.pointer("/metadata/resourceVersion").cloned();
        if let Some(incoming) = value.pointer("/metadata/resourceVersion") {
            if Some(incoming) != stored_version.as_ref() {
                return Err(StoreError::Conflict {
                    kind: kind_of::<K>(),
                    key,
                });
            }
        }

        // Server-owned metadata and the status sub-resource survive a replace
        for field in ["uid", "deletionTimestamp", "generation"] {
            match stored.pointer(&format!("/metadata/{field}")) {
                Some(v) => value["metadata"][field] = v.clone(),
                None => {
                    if let Some(meta) = value["metadata"].as_object_mut() {
                        meta.remove(field);
                    }
                }
            }
        }
        if let Some(obj) = value.as_object_mut() {
            match stored.get("status") {
                Some(status) => {
                    obj.insert("status".to_string(), status.clone());
                }
                None => {
                    obj.remove("status");
                }
            }
        }
        if value.get("spec") != stored.get("spec") {
            let generation = stored
                .pointer("/metadata/generation")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            value["metadata"]["generation"] = json!(generation + 1);
        }
        value["metadata"]["resourceVersion"] = json!(state.next_version());

        state.record(Verb::Update, kind_of::<K>(), namespace.as_deref(), &id.3);
        if is_deleting(&value) && !has_finalizers(&value) {
            state.remove_cascading(&id);
        } else {
            state.objects.insert(id, value.clone());
        }
        drop(state);

        from_value(value)
    }

    async fn delete<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError> {
        let id = make_id::<K>(namespace, name);
        let key = object_key(namespace, name);

        let mut state = self.lock();
        if let Some(failure) = state.take_injection(Verb::Delete, &id.1, name) {
            return Err(injected_error(failure, "delete", kind_of::<K>(), key));
        }
        let Some(stored) = state.objects.get(&id).cloned() else {
            return Err(StoreError::NotFound {
                kind: kind_of::<K>(),
                key,
            });
        };

        if has_finalizers(&stored) {
            if !is_deleting(&stored) {
                let version = state.next_version();
                if let Some(value) = state.objects.get_mut(&id) {
                    value["metadata"]["deletionTimestamp"] = json!(chrono::Utc::now()
                        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true));
                    value["metadata"]["resourceVersion"] = json!(version);
                }
            }
        } else {
            state.remove_cascading(&id);
        }
        state.record(Verb::Delete, kind_of::<K>(), namespace, name);
        Ok(())
    }

    async fn list<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<K>, StoreError> {
        let api_version = K::api_version(&()).into_owned();
        let kind = K::kind(&()).into_owned();
        let matching: Vec<Value> = self
            .lock()
            .objects
            .iter()
            .filter(|((av, k, ns, _), _)| {
                *av == api_version && *k == kind && namespace.is_none_or(|want| ns == want)
            })
            .filter(|(_, v)| label_selector.is_none_or(|s| labels_match(v, s)))
            .map(|(_, v)| v.clone())
            .collect();
        matching.into_iter().map(from_value).collect()
    }

    async fn update_status<K: StoreObject>(&self, object: &K) -> Result<(), StoreError> {
        let id = id_of::<K>(object)?;
        let value = to_value(object)?;
        let namespace = object.meta().namespace.clone();
        let key = object_key(namespace.as_deref(), &id.3);

        let mut state = self.lock();
        if let Some(failure) = state.take_injection(Verb::UpdateStatus, &id.1, &id.3) {
            return Err(injected_error(failure, "update_status", kind_of::<K>(), key));
        }
        if !state.objects.contains_key(&id) {
            return Err(StoreError::NotFound {
                kind: kind_of::<K>(),
                key,
            });
        }
        let version = state.next_version();
        if let Some(stored) = state.objects.get_mut(&id) {
            stored["status"] = value.get("status").cloned().unwrap_or_default();
            stored["metadata"]["resourceVersion"] = json!(version);
        }
        state.record(Verb::UpdateStatus, kind_of::<K>(), namespace.as_deref(), &id.3);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::ObjectMeta;

    fn config_map(name: &str, data: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("platform".to_string()),
                ..Default::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let store = MemoryStore::new();
        let created = store.create(&config_map("a", &[("k", "v")])).await.unwrap();
        assert!(created.metadata.resource_version.is_some());
        assert!(created.metadata.uid.is_some());

        let fetched: ConfigMap = store.get(Some("platform"), "a").await.unwrap();
        assert_eq!(fetched.data.unwrap().get("k").map(String::as_str), Some("v"));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get::<ConfigMap>(Some("platform"), "missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.get_opt::<ConfigMap>(Some("platform"), "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_existing_is_already_exists() {
        let store = MemoryStore::new();
        store.create(&config_map("a", &[])).await.unwrap();
        let err = store.create(&config_map("a", &[])).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_update_with_stale_version_conflicts() {
        let store = MemoryStore::new();
        let first = store.create(&config_map("a", &[("k", "1")])).await.unwrap();

        let mut second = first.clone();
        second.data = Some(BTreeMap::from([("k".to_string(), "2".to_string())]));
        store.update(&second).await.unwrap();

        // first still carries the original resourceVersion
        let err = store.update(&first).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_delete_with_finalizer_marks_for_deletion() {
        let store = MemoryStore::new();
        let mut cm = config_map("a", &[]);
        cm.metadata.finalizers = Some(vec!["example.io/guard".to_string()]);
        let created = store.create(&cm).await.unwrap();

        store.delete::<ConfigMap>(Some("platform"), "a").await.unwrap();
        let marked: ConfigMap = store.get(Some("platform"), "a").await.unwrap();
        assert!(marked.metadata.deletion_timestamp.is_some());

        let mut released = marked.clone();
        released.metadata.finalizers = Some(vec![]);
        store.update(&released).await.unwrap();
        assert!(!store.contains::<ConfigMap>(Some("platform"), "a"));
        assert!(created.metadata.uid.is_some());
    }

    #[tokio::test]
    async fn test_owner_removal_collects_dependents() {
        let store = MemoryStore::new();
        let owner = store.create(&config_map("owner", &[])).await.unwrap();

        let mut dependent = config_map("dependent", &[]);
        dependent.metadata.owner_references = Some(vec![
            k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference {
                api_version: "v1".to_string(),
                kind: "ConfigMap".to_string(),
                name: "owner".to_string(),
                uid: owner.metadata.uid.clone().unwrap(),
                controller: Some(true),
                ..Default::default()
            },
        ]);
        store.create(&dependent).await.unwrap();

        store.delete::<ConfigMap>(Some("platform"), "owner").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_list_filters_by_namespace_and_labels() {
        let store = MemoryStore::new();
        let mut labelled = config_map("a", &[]);
        labelled.metadata.labels = Some(BTreeMap::from([("app".to_string(), "x".to_string())]));
        store.create(&labelled).await.unwrap();
        store.create(&config_map("b", &[])).await.unwrap();

        let all: Vec<ConfigMap> = store.list(Some("platform"), None).await.unwrap();
        assert_eq!(all.len(), 2);
        let selected: Vec<ConfigMap> = store.list(Some("platform"), Some("app=x")).await.unwrap();
        assert_eq!(selected.len(), 1);
        let elsewhere: Vec<ConfigMap> = store.list(Some("other"), None).await.unwrap();
        assert!(elsewhere.is_empty());
    }

    #[tokio::test]
    async fn test_writes_are_logged_and_injections_fire_once() {
        let store = MemoryStore::new();
        store.inject_failure(Verb::Create, "ConfigMap", "a", InjectedFailure::Conflict);

        assert!(store.create(&config_map("a", &[])).await.unwrap_err().is_conflict());
        store.create(&config_map("a", &[])).await.unwrap();

        assert_eq!(
            store.writes(),
            vec![WriteRecord {
                verb: Verb::Create,
                kind: "ConfigMap".to_string(),
                namespace: Some("platform".to_string()),
                name: "a".to_string(),
            }]
        );
        store.clear_writes();
        assert!(store.writes().is_empty());
    }
}
