//! Kubernetes controllers for Greeter resources.
//!
//! - [`GreeterController`]: reconciles a Greeter's status from its spec
//! - [`Reconciler`]: the per-kind capability bound into the kube-runtime controller
//! - [`GreeterStore`], [`EventPublisher`]: seams over the API server
//!
//! # Usage with kube-runtime
//!
//! ```ignore
//! use greeter_operator::controller::{
//!     ControllerContext, Dispatcher, GreeterController, run_controller,
//! };
//!
//! let ctx = Arc::new(ControllerContext::new(client.clone(), &config));
//! let dispatcher = Dispatcher::new(
//!     GreeterController::new(ctx),
//!     shutdown,
//!     config.reconcile_timeout(),
//! );
//! run_controller(Api::<Greeter>::all(client), Arc::new(dispatcher)).await;
//! ```

mod events;
mod greeter;
mod runtime;
mod store;

pub use events::{EventPublisher, KubeEventPublisher};
pub use greeter::{
    DEFAULT_GREETING, GreeterController, GreeterPhase, desired_status, effective_prefix, greeting,
};
pub use runtime::{Dispatcher, Reconciler, run_controller};
pub use store::{GreeterStore, KubeGreeterStore};

use crate::config::{OperatorConfig, RequeuePolicy};
use crate::error::{OperatorError, OperatorResult};
use kube::Resource;
use std::fmt;
use std::sync::Arc;

/// Identity of a namespaced resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    /// Resource namespace.
    pub namespace: String,
    /// Resource name.
    pub name: String,
}

impl ObjectKey {
    /// Create a key from namespace and name.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of an existing object. Fails when name or namespace is unset.
    pub fn from_resource<K: Resource>(obj: &K) -> OperatorResult<Self> {
        let meta = obj.meta();
        let name = meta
            .name
            .clone()
            .ok_or_else(|| OperatorError::InvalidResource("metadata.name is not set".into()))?;
        let namespace = meta.namespace.clone().ok_or_else(|| {
            OperatorError::InvalidResource(format!("{name} must be namespaced"))
        })?;
        Ok(Self { namespace, name })
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Shared context for controllers.
pub struct ControllerContext {
    /// Greeter store.
    pub store: Arc<dyn GreeterStore>,
    /// Event sink.
    pub events: Arc<dyn EventPublisher>,
    /// Retry delays.
    pub requeue: RequeuePolicy,
}

impl ControllerContext {
    /// Create a context backed by the Kubernetes API.
    pub fn new(client: kube::Client, config: &OperatorConfig) -> Self {
        Self {
            store: Arc::new(KubeGreeterStore::new(client.clone())),
            events: Arc::new(KubeEventPublisher::new(client, &config.controller_name)),
            requeue: config.requeue_policy(),
        }
    }

    /// Create a context from explicit parts.
    pub fn from_parts(
        store: Arc<dyn GreeterStore>,
        events: Arc<dyn EventPublisher>,
        requeue: RequeuePolicy,
    ) -> Self {
        Self {
            store,
            events,
            requeue,
        }
    }
}

/// Result type for reconciliation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Requeue after the specified duration.
    Requeue(std::time::Duration),
    /// Don't requeue (reconciliation complete).
    Done,
}

impl ReconcileAction {
    /// Convert to the kube-runtime scheduling directive.
    pub fn into_action(self) -> kube::runtime::controller::Action {
        match self {
            Self::Requeue(duration) => kube::runtime::controller::Action::requeue(duration),
            Self::Done => kube::runtime::controller::Action::await_change(),
        }
    }
}
