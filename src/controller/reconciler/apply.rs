//! # Convergence Applier
//!
//! The get, compare, create-or-update sequence shared by every managed kind.
//!
//! 1. Fetch the observed object; not found selects the create path
//! 2. Copy externally owned values from observed into desired
//! 3. Compare the kind's field table
//! 4. In sync: nothing to do. Immutable drift: delete and recreate. Mutable drift:
//!    overlay the listed fields onto the observed object and update it
//!
//! The applier never reads back its own write within a pass.

use crate::controller::reconciler::compare::{detect, overlay, Drift, Managed};
use crate::controller::reconciler::types::{KindOutcome, ReconcilerError};
use crate::crd::ConsoleUI;
use crate::observability::metrics;
use crate::store::{kind_of, object_key, ObjectStore, StoreError, StoreObject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;
use serde_json::Value;
use tracing::{debug, info};

/// What the applier did to one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Created,
    /// Deleted and created again because an immutable field changed
    Recreated,
    Updated,
    Unchanged,
}

impl Applied {
    /// Creation changes the set of objects the next pass observes
    #[must_use]
    pub fn requeue(self) -> bool {
        matches!(self, Applied::Created | Applied::Recreated)
    }

    #[must_use]
    pub fn outcome(self) -> KindOutcome {
        KindOutcome {
            changed: self.requeue(),
        }
    }
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

/// Converges objects against a store, optionally owned by an instance
#[derive(Debug)]
pub struct Applier<'a, S> {
    store: &'a S,
    owner: Option<OwnerReference>,
}

impl<'a, S: ObjectStore> Applier<'a, S> {
    /// Applier whose created objects are garbage-collected with `instance`
    ///
    /// # Errors
    ///
    /// Returns `InvalidObject` when the instance has no uid to reference.
    pub fn owned(store: &'a S, instance: &ConsoleUI) -> Result<Self, ReconcilerError> {
        let owner = instance
            .controller_owner_ref(&())
            .ok_or_else(|| ReconcilerError::invalid("ConsoleUI", "instance has no uid"))?;
        Ok(Self {
            store,
            owner: Some(owner),
        })
    }

    /// Applier for objects that cannot carry an owner reference (cluster-scoped)
    #[must_use]
    pub fn unowned(store: &'a S) -> Self {
        Self { store, owner: None }
    }

    fn attach_owner<K: StoreObject>(&self, object: &mut K) {
        if let Some(owner) = &self.owner {
            object.meta_mut().owner_references = Some(vec![owner.clone()]);
        }
    }

    async fn create<K: StoreObject>(&self, mut desired: K, key: &str) -> Result<(), ReconcilerError> {
        let kind = kind_of::<K>();
        desired.meta_mut().resource_version = None;
        desired.meta_mut().uid = None;
        self.attach_owner(&mut desired);
        match self.store.create(&desired).await {
            Ok(_) => {
                metrics::record_store_write(&kind, "create");
                info!(kind = %kind, object = %key, "✅ Created");
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                debug!(kind = %kind, object = %key, "Already exists, treating create as done");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Converge one object toward `desired`
    ///
    /// # Errors
    ///
    /// Store failures other than the not-found / already-exists signals, including
    /// `Conflict` when the object changed between the read and the update.
    pub async fn apply<K: Managed>(&self, mut desired: K) -> Result<Applied, ReconcilerError> {
        let kind = kind_of::<K>();
        let namespace = desired.meta().namespace.clone();
        let name = desired
            .meta()
            .name
            .clone()
            .ok_or_else(|| ReconcilerError::invalid(&kind, "desired object has no name"))?;
        let key = object_key(namespace.as_deref(), &name);

        let Some(observed) = self.store.get_opt::<K>(namespace.as_deref(), &name).await? else {
            self.create(desired, &key).await?;
            return Ok(Applied::Created);
        };

        K::preserve(&observed, &mut desired);
        let desired_value = to_value(&desired)?;
        let mut observed_value = to_value(&observed)?;

        match detect(K::fields(), &desired_value, &observed_value) {
            Drift::InSync => {
                debug!(kind = %kind, object = %key, "In sync");
                Ok(Applied::Unchanged)
            }
            Drift::Immutable(pointer) => {
                info!(kind = %kind, object = %key, field = pointer, "Immutable field changed, recreating");
                match self.store.delete::<K>(namespace.as_deref(), &name).await {
                    Ok(()) => metrics::record_store_write(&kind, "delete"),
                    Err(e) if e.is_not_found() => {}
                    Err(e) => return Err(e.into()),
                }
                self.create(desired, &key).await?;
                metrics::record_store_write(&kind, "recreate");
                Ok(Applied::Recreated)
            }
            Drift::Mutable(pointers) => {
                info!(kind = %kind, object = %key, fields = ?pointers, "Drift detected, updating");
                overlay(K::fields(), &desired_value, &mut observed_value);
                let updated: K = from_value(observed_value)?;
                self.store.update(&updated).await?;
                metrics::record_store_write(&kind, "update");
                Ok(Applied::Updated)
            }
        }
    }

    /// Delete an object if it exists; returns whether a deletion was requested
    ///
    /// # Errors
    ///
    /// Store failures other than not-found.
    pub async fn remove<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<bool, ReconcilerError> {
        let kind = kind_of::<K>();
        match self.store.delete::<K>(namespace, name).await {
            Ok(()) => {
                metrics::record_store_write(&kind, "delete");
                info!(kind = %kind, object = %object_key(namespace, name), "🗑️ Deleted");
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
