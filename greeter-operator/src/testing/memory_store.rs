//! Versioned in-memory [`GreeterStore`] and a silent [`EventPublisher`].

use crate::controller::{EventPublisher, GreeterStore, ObjectKey};
use crate::crd::{Greeter, GreeterSpec};
use crate::error::{OperatorError, OperatorResult};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::core::ErrorResponse;
use kube::runtime::events::EventType;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// In-memory Greeter store with optimistic concurrency.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<ObjectKey, Greeter>,
    next_version: u64,
    status_writes: usize,
    fail_next_get: Option<u16>,
    fail_next_update: Option<u16>,
}

impl Inner {
    fn bump_version(&mut self) -> String {
        self.next_version += 1;
        self.next_version.to_string()
    }
}

fn api_error(code: u16, message: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: if code == 409 { "Conflict" } else { "InternalError" }.to_string(),
        code,
    })
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic in another test thread must not hide this store's state.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create an object the way a user would: status is dropped, generation
    /// starts at 1 and a fresh resource version is assigned. An existing
    /// object with the same key is replaced.
    pub fn create(&self, mut greeter: Greeter) -> OperatorResult<ObjectKey> {
        let key = ObjectKey::from_resource(&greeter)?;
        let mut inner = self.lock();
        greeter.status = None;
        greeter.metadata.generation = Some(1);
        greeter.metadata.resource_version = Some(inner.bump_version());
        inner.objects.insert(key.clone(), greeter);
        Ok(key)
    }

    /// Replace the spec of an existing object, bumping generation and version.
    /// Returns `false` when the object does not exist.
    pub fn update_spec(&self, key: &ObjectKey, spec: GreeterSpec) -> bool {
        let mut inner = self.lock();
        let version = inner.bump_version();
        match inner.objects.get_mut(key) {
            Some(stored) => {
                stored.spec = spec;
                stored.metadata.generation = Some(stored.metadata.generation.unwrap_or(0) + 1);
                stored.metadata.resource_version = Some(version);
                true
            }
            None => false,
        }
    }

    /// Delete an object. Returns whether it existed.
    pub fn delete(&self, key: &ObjectKey) -> bool {
        self.lock().objects.remove(key).is_some()
    }

    /// Current stored copy of an object.
    pub fn snapshot(&self, key: &ObjectKey) -> Option<Greeter> {
        self.lock().objects.get(key).cloned()
    }

    /// Number of accepted status writes.
    pub fn status_writes(&self) -> usize {
        self.lock().status_writes
    }

    /// Make the next `get` fail with the given HTTP status code.
    pub fn fail_next_get(&self, code: u16) {
        self.lock().fail_next_get = Some(code);
    }

    /// Make the next `update_status` fail with the given HTTP status code.
    pub fn fail_next_update(&self, code: u16) {
        self.lock().fail_next_update = Some(code);
    }
}

#[async_trait]
impl GreeterStore for MemoryStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<Greeter>, OperatorError> {
        let mut inner = self.lock();
        if let Some(code) = inner.fail_next_get.take() {
            return Err(OperatorError::FetchFailed {
                key: key.clone(),
                source: api_error(code, "injected get failure"),
            });
        }
        Ok(inner.objects.get(key).cloned())
    }

    async fn update_status(&self, greeter: &Greeter) -> Result<Greeter, OperatorError> {
        let key = ObjectKey::from_resource(greeter)?;
        let mut inner = self.lock();

        if let Some(code) = inner.fail_next_update.take() {
            return Err(match code {
                409 => OperatorError::Conflict { key },
                _ => OperatorError::WriteFailed {
                    key,
                    source: api_error(code, "injected update failure"),
                },
            });
        }

        let stored_version = match inner.objects.get(&key) {
            Some(stored) => stored.metadata.resource_version.clone(),
            None => {
                return Err(OperatorError::WriteFailed {
                    key,
                    source: api_error(404, "greeter not found"),
                });
            }
        };
        if stored_version != greeter.metadata.resource_version {
            return Err(OperatorError::Conflict { key });
        }

        let version = inner.bump_version();
        inner.status_writes += 1;
        let Some(stored) = inner.objects.get_mut(&key) else {
            return Err(OperatorError::Conflict { key });
        };
        // Status subresource: spec and metadata from the caller are ignored.
        stored.status = greeter.status.clone();
        stored.metadata.resource_version = Some(version);
        Ok(stored.clone())
    }
}

/// Event publisher that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEvents;

#[async_trait]
impl EventPublisher for NoopEvents {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}
