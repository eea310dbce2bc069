//! In-memory object store
//!
//! Data is lost on restart. Suitable for development, tests and the
//! `serve` demo; a real deployment puts a cluster client behind
//! [`ObjectStore`] instead.

use super::watch::{WatchBus, WatchEvent};
use super::{ObjectStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use runbridge_api::{
    Build, ExecutionRequest, ExecutionStatus, Invocation, ObjectKey, ObjectMeta, BUILD_RUN_KIND,
    RUN_KIND,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct State {
    invocations: HashMap<ObjectKey, Invocation>,
    executions: HashMap<ObjectKey, ExecutionRequest>,
    builds: HashMap<ObjectKey, Build>,
}

/// In-memory [`ObjectStore`] with resource versions, generations,
/// owner-reference cascade and a watch stream
pub struct InMemoryStore {
    state: RwLock<State>,
    bus: WatchBus,
    version: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Owner key of an object, from its controller owner reference
fn owner_key(meta: &ObjectMeta) -> Option<ObjectKey> {
    meta.controller_owner()
        .filter(|o| o.kind == RUN_KIND)
        .map(|o| ObjectKey::new(meta.namespace.clone(), o.name.clone()))
}

/// Fill in the fields a store assigns on create
fn stamp_new(meta: &mut ObjectMeta, version: u64) {
    if meta.uid.is_empty() {
        meta.uid = Uuid::new_v4().to_string();
    }
    meta.generation = 1;
    meta.resource_version = version;
    if meta.creation_timestamp.is_none() {
        meta.creation_timestamp = Some(Utc::now());
    }
}

impl InMemoryStore {
    /// Create an empty store whose watch stream buffers `watch_capacity` events
    #[must_use]
    pub fn new(watch_capacity: usize) -> Self {
        Self {
            state: RwLock::new(State::default()),
            bus: WatchBus::new(watch_capacity),
            version: AtomicU64::new(0),
        }
    }

    fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Create an invocation, or replace the spec of an existing one.
    ///
    /// This is the orchestrator's write path. The generation is bumped only
    /// when the spec actually changes; the status is never touched here.
    pub async fn apply_invocation(&self, mut invocation: Invocation) -> Invocation {
        let key = invocation.key();
        let mut state = self.state.write().await;
        let version = self.next_version();

        let stored = match state.invocations.get_mut(&key) {
            Some(current) => {
                if current.spec != invocation.spec {
                    current.spec = invocation.spec;
                    current.metadata.generation += 1;
                }
                current.metadata.labels = invocation.metadata.labels;
                current.metadata.resource_version = version;
                current.clone()
            }
            None => {
                stamp_new(&mut invocation.metadata, version);
                state.invocations.insert(key.clone(), invocation.clone());
                invocation
            }
        };
        drop(state);

        debug!(key = %key, version, "Invocation applied");
        self.bus.publish(WatchEvent::InvocationChanged { key });
        stored
    }

    /// Delete an invocation and cascade to every execution it owns
    pub async fn delete_invocation(&self, key: &ObjectKey) -> bool {
        let mut state = self.state.write().await;
        let Some(removed) = state.invocations.remove(key) else {
            return false;
        };

        let uid = removed.metadata.uid;
        let owned: Vec<ObjectKey> = state
            .executions
            .values()
            .filter(|e| e.metadata.namespace == key.namespace && e.metadata.is_owned_by(&uid))
            .map(ExecutionRequest::key)
            .collect();
        for execution_key in &owned {
            state.executions.remove(execution_key);
        }
        drop(state);

        debug!(key = %key, cascaded = owned.len(), "Invocation deleted");
        self.bus
            .publish(WatchEvent::InvocationDeleted { key: key.clone() });
        for execution_key in owned {
            self.bus.publish(WatchEvent::ExecutionDeleted {
                key: execution_key,
                owner: Some(key.clone()),
            });
        }
        true
    }

    /// Create or replace a build
    pub async fn apply_build(&self, mut build: Build) -> Build {
        let key = build.metadata.key();
        let version = self.next_version();
        let mut state = self.state.write().await;

        match state.builds.get(&key) {
            Some(current) => {
                build.metadata.uid = current.metadata.uid.clone();
                build.metadata.creation_timestamp = current.metadata.creation_timestamp;
                build.metadata.generation = current.metadata.generation
                    + i64::from(current.spec != build.spec);
                build.metadata.resource_version = version;
            }
            None => stamp_new(&mut build.metadata, version),
        }
        state.builds.insert(key.clone(), build.clone());
        drop(state);

        self.bus.publish(WatchEvent::BuildChanged { key });
        build
    }

    /// Delete a build
    pub async fn delete_build(&self, key: &ObjectKey) -> bool {
        let removed = self.state.write().await.builds.remove(key).is_some();
        if removed {
            self.bus.publish(WatchEvent::BuildChanged { key: key.clone() });
        }
        removed
    }

    /// Create or replace an execution, bypassing create-only semantics.
    ///
    /// Seeds pre-existing executions from manifests and tests.
    pub async fn apply_execution(&self, mut execution: ExecutionRequest) -> ExecutionRequest {
        let key = execution.key();
        let version = self.next_version();
        let mut state = self.state.write().await;

        match state.executions.get(&key) {
            Some(current) => {
                execution.metadata.uid = current.metadata.uid.clone();
                execution.metadata.creation_timestamp = current.metadata.creation_timestamp;
                execution.metadata.generation = current.metadata.generation;
                execution.metadata.resource_version = version;
            }
            None => stamp_new(&mut execution.metadata, version),
        }
        state.executions.insert(key.clone(), execution.clone());
        drop(state);

        let owner = owner_key(&execution.metadata);
        self.bus.publish(WatchEvent::ExecutionChanged { key, owner });
        execution
    }

    /// Replace the status of an execution.
    ///
    /// This is the build engine's write path.
    pub async fn update_execution_status(
        &self,
        key: &ObjectKey,
        status: ExecutionStatus,
    ) -> StoreResult<ExecutionRequest> {
        let version = self.next_version();
        let mut state = self.state.write().await;
        let execution = state
            .executions
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound {
                kind: BUILD_RUN_KIND,
                key: key.clone(),
            })?;

        execution.status = status;
        execution.metadata.resource_version = version;
        let updated = execution.clone();
        drop(state);

        let owner = owner_key(&updated.metadata);
        self.bus.publish(WatchEvent::ExecutionChanged {
            key: key.clone(),
            owner,
        });
        Ok(updated)
    }

    /// List every execution
    pub async fn list_executions(&self) -> Vec<ExecutionRequest> {
        let state = self.state.read().await;
        let mut executions: Vec<_> = state.executions.values().cloned().collect();
        executions.sort_by(|a, b| a.key().cmp(&b.key()));
        executions
    }

    /// The watch bus this store publishes on
    #[must_use]
    pub fn bus(&self) -> &WatchBus {
        &self.bus
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn list_invocations(&self) -> StoreResult<Vec<Invocation>> {
        let state = self.state.read().await;
        let mut invocations: Vec<_> = state.invocations.values().cloned().collect();
        invocations.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(invocations)
    }

    async fn get_invocation(&self, key: &ObjectKey) -> StoreResult<Option<Invocation>> {
        Ok(self.state.read().await.invocations.get(key).cloned())
    }

    async fn update_invocation_status(&self, invocation: &Invocation) -> StoreResult<Invocation> {
        let key = invocation.key();
        let mut state = self.state.write().await;
        let current = state
            .invocations
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound {
                kind: RUN_KIND,
                key: key.clone(),
            })?;

        if current.metadata.resource_version != invocation.metadata.resource_version {
            return Err(StoreError::Conflict {
                kind: RUN_KIND,
                key,
                expected: invocation.metadata.resource_version,
                actual: current.metadata.resource_version,
            });
        }

        current.status = invocation.status.clone();
        current.metadata.resource_version = self.next_version();
        let updated = current.clone();
        drop(state);

        self.bus.publish(WatchEvent::InvocationChanged { key });
        Ok(updated)
    }

    async fn get_execution(&self, key: &ObjectKey) -> StoreResult<Option<ExecutionRequest>> {
        Ok(self.state.read().await.executions.get(key).cloned())
    }

    async fn create_execution(&self, mut execution: ExecutionRequest) -> StoreResult<ExecutionRequest> {
        let key = execution.key();
        let mut state = self.state.write().await;
        if state.executions.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: BUILD_RUN_KIND,
                key,
            });
        }

        stamp_new(&mut execution.metadata, self.next_version());
        state.executions.insert(key.clone(), execution.clone());
        drop(state);

        let owner = owner_key(&execution.metadata);
        self.bus.publish(WatchEvent::ExecutionChanged { key, owner });
        Ok(execution)
    }

    async fn update_execution_spec(
        &self,
        execution: &ExecutionRequest,
    ) -> StoreResult<ExecutionRequest> {
        let key = execution.key();
        let mut state = self.state.write().await;
        let current = state
            .executions
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound {
                kind: BUILD_RUN_KIND,
                key: key.clone(),
            })?;

        if current.metadata.resource_version != execution.metadata.resource_version {
            return Err(StoreError::Conflict {
                kind: BUILD_RUN_KIND,
                key,
                expected: execution.metadata.resource_version,
                actual: current.metadata.resource_version,
            });
        }

        if current.spec != execution.spec {
            current.spec = execution.spec.clone();
            current.metadata.generation += 1;
        }
        current.metadata.resource_version = self.next_version();
        let updated = current.clone();
        drop(state);

        let owner = owner_key(&updated.metadata);
        self.bus.publish(WatchEvent::ExecutionChanged { key, owner });
        Ok(updated)
    }

    async fn get_build(&self, key: &ObjectKey) -> StoreResult<Option<Build>> {
        Ok(self.state.read().await.builds.get(key).cloned())
    }

    fn watch(&self) -> broadcast::Receiver<WatchEvent> {
        self.bus.subscribe()
    }
}
