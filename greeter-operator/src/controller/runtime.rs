//! Binding of reconcilers into the kube-runtime controller.
//!
//! The kube-runtime [`Controller`] owns the watch, the work queue, per-object
//! serialization and retry scheduling. This module reduces each triggered
//! object to its [`ObjectKey`], bounds the attempt by a deadline, and maps
//! outcomes to scheduling directives.

use super::{GreeterController, ObjectKey, ReconcileAction};
use crate::crd::Greeter;
use crate::error::{OperatorError, OperatorResult};
use async_trait::async_trait;
use futures::StreamExt;
use kube::runtime::Controller;
use kube::runtime::controller::Action;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Api, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Reconciliation capability for one resource kind.
#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    /// The resource kind this reconciler converges.
    type Resource: Resource<DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static;

    /// Converge the object identified by `key`.
    async fn reconcile(
        &self,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> OperatorResult<ReconcileAction>;

    /// Retry schedule after a failed attempt.
    fn error_policy(&self, error: &OperatorError) -> ReconcileAction;
}

#[async_trait]
impl Reconciler for GreeterController {
    type Resource = Greeter;

    async fn reconcile(
        &self,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> OperatorResult<ReconcileAction> {
        GreeterController::reconcile(self, key, cancel).await
    }

    fn error_policy(&self, error: &OperatorError) -> ReconcileAction {
        GreeterController::error_policy(self, error)
    }
}

/// Runs attempts of a [`Reconciler`] under a deadline and a shutdown signal.
pub struct Dispatcher<R> {
    reconciler: R,
    shutdown: CancellationToken,
    reconcile_timeout: Duration,
}

impl<R: Reconciler> Dispatcher<R> {
    /// Create a dispatcher. Cancelling `shutdown` aborts in-flight attempts.
    pub fn new(reconciler: R, shutdown: CancellationToken, reconcile_timeout: Duration) -> Self {
        Self {
            reconciler,
            shutdown,
            reconcile_timeout,
        }
    }

    /// Run one attempt for `key`.
    ///
    /// An attempt past its deadline is dropped and reported as
    /// [`OperatorError::Cancelled`].
    pub async fn dispatch(&self, key: &ObjectKey) -> OperatorResult<ReconcileAction> {
        let cancel = self.shutdown.child_token();
        match tokio::time::timeout(
            self.reconcile_timeout,
            self.reconciler.reconcile(key, &cancel),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    key = %key,
                    timeout = ?self.reconcile_timeout,
                    "Reconciliation deadline exceeded"
                );
                Err(OperatorError::Cancelled { key: key.clone() })
            }
        }
    }

    /// Retry schedule for a failed attempt.
    pub fn on_error(&self, error: &OperatorError) -> ReconcileAction {
        if error.is_retryable() {
            self.reconciler.error_policy(error)
        } else {
            // Not fixable by retrying; wait for the object to change.
            ReconcileAction::Done
        }
    }
}

async fn reconcile_object<R: Reconciler>(
    obj: Arc<R::Resource>,
    ctx: Arc<Dispatcher<R>>,
) -> OperatorResult<Action> {
    let key = ObjectKey::from_resource(obj.as_ref())?;
    ctx.dispatch(&key).await.map(ReconcileAction::into_action)
}

fn error_policy<R: Reconciler>(
    _obj: Arc<R::Resource>,
    error: &OperatorError,
    ctx: Arc<Dispatcher<R>>,
) -> Action {
    error!(error = %error, reason = error.reason(), "Reconciliation error");
    ctx.on_error(error).into_action()
}

/// Watch `api` and reconcile every object through `dispatcher` until shutdown.
pub async fn run_controller<R: Reconciler>(
    api: Api<R::Resource>,
    dispatcher: Arc<Dispatcher<R>>,
) {
    let shutdown = dispatcher.shutdown.clone();

    Controller::new(api, WatcherConfig::default())
        .graceful_shutdown_on(async move { shutdown.cancelled().await })
        .run(reconcile_object::<R>, error_policy::<R>, dispatcher)
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => {
                    debug!(
                        name = %obj.name,
                        namespace = ?obj.namespace,
                        ?action,
                        "Reconciled object"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "Controller stream error");
                }
            }
        })
        .await;
}
