//! Access to Greeter objects in the API server.

use super::ObjectKey;
use crate::crd::Greeter;
use crate::error::OperatorError;
use async_trait::async_trait;
use kube::api::{Api, PostParams};
use kube::Client;

#[cfg(test)]
use mockall::automock;

/// Versioned store of Greeter objects.
///
/// Implementations must reject status writes carrying a stale resource
/// version with [`OperatorError::Conflict`], and must only persist the status
/// portion of the object passed to [`GreeterStore::update_status`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GreeterStore: Send + Sync {
    /// Get a Greeter by identity. Returns `Ok(None)` when it does not exist.
    async fn get(&self, key: &ObjectKey) -> Result<Option<Greeter>, OperatorError>;

    /// Replace the status subresource, guarded by the object's resource version.
    async fn update_status(&self, greeter: &Greeter) -> Result<Greeter, OperatorError>;
}

/// Store backed by the Kubernetes API.
pub struct KubeGreeterStore {
    client: Client,
}

impl KubeGreeterStore {
    /// Create a new store wrapping the given client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Greeter> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl GreeterStore for KubeGreeterStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<Greeter>, OperatorError> {
        map_fetch(key, self.api(&key.namespace).get(&key.name).await)
    }

    async fn update_status(&self, greeter: &Greeter) -> Result<Greeter, OperatorError> {
        let key = ObjectKey::from_resource(greeter)?;
        // The body carries metadata.resourceVersion, so the API server rejects stale writes.
        let body = serde_json::to_vec(greeter)?;

        let result = self
            .api(&key.namespace)
            .replace_status(&key.name, &PostParams::default(), body)
            .await;
        map_write(key, result)
    }
}

/// Absence (404) is not an error.
fn map_fetch(
    key: &ObjectKey,
    result: Result<Greeter, kube::Error>,
) -> Result<Option<Greeter>, OperatorError> {
    match result {
        Ok(greeter) => Ok(Some(greeter)),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
        Err(source) => Err(OperatorError::FetchFailed {
            key: key.clone(),
            source,
        }),
    }
}

/// A stale resource version (409) is a conflict.
fn map_write(
    key: ObjectKey,
    result: Result<Greeter, kube::Error>,
) -> Result<Greeter, OperatorError> {
    match result {
        Ok(updated) => Ok(updated),
        Err(kube::Error::Api(ae)) if ae.code == 409 => Err(OperatorError::Conflict { key }),
        Err(source) => Err(OperatorError::WriteFailed { key, source }),
    }
}
