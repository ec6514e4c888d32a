//! Greeter controller.
//!
//! Reconciles a Greeter's status from its spec. The status is a pure
//! function of the spec and the object's identity, so the reconcile is safe
//! to run any number of times and in any order.

use super::{ControllerContext, ObjectKey, ReconcileAction};
use crate::crd::{
    CONDITION_READY, Condition, ConditionStatus, Greeter, GreeterSpec, GreeterStatus,
    set_condition,
};
use crate::error::{OperatorError, OperatorResult};
use chrono::{DateTime, Utc};
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Greeting prefix used when the spec leaves `message` empty.
pub const DEFAULT_GREETING: &str = "Hello";

const REASON_RECONCILED: &str = "Reconciled";
const REASON_UPDATE_FAILED: &str = "StatusUpdateFailed";
const ACTION_UPDATE_STATUS: &str = "UpdateStatus";

/// The prefix to greet with: `spec.message` unless absent or empty.
pub fn effective_prefix(spec: &GreeterSpec) -> &str {
    spec.message
        .as_deref()
        .filter(|message| !message.is_empty())
        .unwrap_or(DEFAULT_GREETING)
}

/// The greeting sentence for a spec.
pub fn greeting(spec: &GreeterSpec) -> String {
    format!(
        "{}, {}! Welcome to Kubernetes Operators!",
        effective_prefix(spec),
        spec.name
    )
}

/// The status a Greeter should have.
///
/// Conditions already present on the stored status are kept; the Ready
/// condition keeps its transition time when it was already True, so an
/// unchanged spec always yields an identical status.
pub fn desired_status(greeter: &Greeter, now: DateTime<Utc>) -> GreeterStatus {
    let mut status = greeter.status.clone().unwrap_or_default();
    status.name = greeter.name_any();
    status.message = greeting(&greeter.spec);
    set_condition(
        &mut status.conditions,
        Condition::new(
            CONDITION_READY,
            ConditionStatus::True,
            REASON_RECONCILED,
            "Greeting computed",
            now,
        )
        .with_observed_generation(greeter.metadata.generation),
    );
    status
}

/// Lifecycle of a Greeter as seen from outside the controller.
///
/// Deletion is not represented: a deleted Greeter has no phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreeterPhase {
    /// No status has been written yet.
    Unknown,
    /// The stored status does not reflect the current spec.
    Reconciling,
    /// The stored status matches the current spec.
    Converged,
}

impl GreeterPhase {
    /// Phase of a Greeter as read from the store.
    pub fn of(greeter: &Greeter) -> Self {
        match &greeter.status {
            None => Self::Unknown,
            Some(status) if *status == desired_status(greeter, Utc::now()) => Self::Converged,
            Some(_) => Self::Reconciling,
        }
    }
}

/// Controller for Greeter resources.
#[derive(Clone)]
pub struct GreeterController {
    ctx: Arc<ControllerContext>,
}

impl GreeterController {
    /// Create a new Greeter controller.
    pub fn new(ctx: Arc<ControllerContext>) -> Self {
        Self { ctx }
    }

    /// Reconcile the Greeter identified by `key`.
    ///
    /// 1. Fetches the current object (absent objects are a no-op)
    /// 2. Computes the desired status from the spec
    /// 3. Writes the status subresource if it differs from the stored one
    ///
    /// Every failure is retryable. Cancellation of `cancel` abandons the
    /// in-flight store call and returns [`OperatorError::Cancelled`].
    #[instrument(skip(self, cancel), fields(namespace = %key.namespace, name = %key.name))]
    pub async fn reconcile(
        &self,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> OperatorResult<ReconcileAction> {
        debug!("Reconciling Greeter");

        let fetched = match guarded(key, cancel, || self.ctx.store.get(key)).await {
            Ok(fetched) => fetched,
            Err(e) => {
                error!(error = %e, "Failed to get Greeter");
                return Err(e);
            }
        };

        let Some(greeter) = fetched else {
            info!("Greeter resource not found. Ignoring since object must be deleted");
            return Ok(ReconcileAction::Done);
        };

        let status = desired_status(&greeter, Utc::now());
        if greeter.status.as_ref() == Some(&status) {
            debug!("Greeter status already up to date");
            return Ok(ReconcileAction::Done);
        }

        let message = status.message.clone();
        let mut updated = greeter.clone();
        updated.status = Some(status);

        if let Err(e) = guarded(key, cancel, || self.ctx.store.update_status(&updated)).await {
            self.report_write_failure(&greeter, &e).await;
            return Err(e);
        }

        info!(message = %message, "Successfully reconciled Greeter");
        self.ctx
            .events
            .publish(
                &greeter.object_ref(&()),
                EventType::Normal,
                REASON_RECONCILED,
                ACTION_UPDATE_STATUS,
                Some(message),
            )
            .await;

        Ok(ReconcileAction::Done)
    }

    /// Retry schedule for a failed attempt.
    pub fn error_policy(&self, error: &OperatorError) -> ReconcileAction {
        match error {
            OperatorError::Conflict { .. } => {
                ReconcileAction::Requeue(self.ctx.requeue.on_conflict)
            }
            _ => ReconcileAction::Requeue(self.ctx.requeue.on_error),
        }
    }

    async fn report_write_failure(&self, greeter: &Greeter, error: &OperatorError) {
        match error {
            OperatorError::Conflict { .. } => {
                warn!(error = %error, "Greeter changed while reconciling, will refetch");
            }
            OperatorError::Cancelled { .. } => {
                debug!("Status update abandoned");
            }
            _ => {
                error!(error = %error, "Failed to update Greeter status");
                self.ctx
                    .events
                    .publish(
                        &greeter.object_ref(&()),
                        EventType::Warning,
                        REASON_UPDATE_FAILED,
                        ACTION_UPDATE_STATUS,
                        Some(error.to_string()),
                    )
                    .await;
            }
        }
    }
}

/// Run a store call unless `cancel` fires first.
///
/// The call is not started at all when the token is already cancelled.
async fn guarded<T, F, Fut>(
    key: &ObjectKey,
    cancel: &CancellationToken,
    op: F,
) -> OperatorResult<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = OperatorResult<T>>,
{
    if cancel.is_cancelled() {
        return Err(OperatorError::Cancelled { key: key.clone() });
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(OperatorError::Cancelled { key: key.clone() }),
        result = op() => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RequeuePolicy;
    use crate::controller::events::MockEventPublisher;
    use crate::controller::store::MockGreeterStore;
    use chrono::TimeZone;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use mockall::predicate::eq;
    use std::sync::Mutex;
    use std::time::Duration;

    // =========================================================================
    // Fixtures
    // =========================================================================

    fn key() -> ObjectKey {
        ObjectKey::new("default", "ada")
    }

    fn spec(name: &str, message: Option<&str>) -> GreeterSpec {
        GreeterSpec {
            name: name.to_string(),
            message: message.map(str::to_string),
        }
    }

    fn sample_greeter(message: Option<&str>) -> Greeter {
        Greeter {
            metadata: ObjectMeta {
                name: Some("ada".to_string()),
                namespace: Some("default".to_string()),
                resource_version: Some("7".to_string()),
                generation: Some(1),
                ..Default::default()
            },
            spec: spec("Ada", message),
            status: None,
        }
    }

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "injected".to_string(),
            reason: "InternalError".to_string(),
            code,
        })
    }

    fn quiet_events() -> MockEventPublisher {
        let mut events = MockEventPublisher::new();
        events.expect_publish().returning(|_, _, _, _, _| ());
        events
    }

    fn controller(store: MockGreeterStore, events: MockEventPublisher) -> GreeterController {
        let requeue = RequeuePolicy {
            on_error: Duration::from_secs(30),
            on_conflict: Duration::from_secs(1),
        };
        GreeterController::new(Arc::new(ControllerContext::from_parts(
            Arc::new(store),
            Arc::new(events),
            requeue,
        )))
    }

    // =========================================================================
    // Derivation
    // =========================================================================

    #[test]
    fn greeting_uses_template() {
        assert_eq!(
            greeting(&spec("Ada", Some("Hi"))),
            "Hi, Ada! Welcome to Kubernetes Operators!"
        );
    }

    #[test]
    fn empty_or_missing_message_falls_back_to_hello() {
        let expected = greeting(&spec("Ada", Some("Hello")));
        assert_eq!(greeting(&spec("Ada", Some(""))), expected);
        assert_eq!(greeting(&spec("Ada", None)), expected);
        assert_eq!(effective_prefix(&spec("Ada", None)), DEFAULT_GREETING);
    }

    #[test]
    fn desired_status_is_deterministic() {
        let mut greeter = sample_greeter(Some("Hi"));
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let t1 = Utc.timestamp_opt(1_700_000_600, 0).unwrap();

        let first = desired_status(&greeter, t0);
        greeter.status = Some(first.clone());
        let second = desired_status(&greeter, t1);

        assert_eq!(first, second);
        assert_eq!(first.name, "ada");
        assert_eq!(first.conditions.len(), 1);
        assert_eq!(first.conditions[0].observed_generation, Some(1));
    }

    #[test]
    fn desired_status_keeps_foreign_conditions() {
        let now = Utc.timestamp_opt(0, 0).unwrap();
        let mut greeter = sample_greeter(None);
        greeter.status = Some(GreeterStatus {
            conditions: vec![Condition::new(
                "Degraded",
                ConditionStatus::False,
                "Healthy",
                "",
                now,
            )],
            ..Default::default()
        });

        let status = desired_status(&greeter, now);
        let types: Vec<_> = status.conditions.iter().map(|c| c.type_.as_str()).collect();
        assert_eq!(types, vec!["Degraded", CONDITION_READY]);
    }

    #[test]
    fn desired_status_leaves_a_single_ready_condition() {
        let now = Utc.timestamp_opt(0, 0).unwrap();
        let mut greeter = sample_greeter(None);
        greeter.status = Some(GreeterStatus {
            conditions: vec![
                Condition::new(CONDITION_READY, ConditionStatus::False, "Failed", "", now),
                Condition::new(CONDITION_READY, ConditionStatus::Unknown, "Pending", "", now),
            ],
            ..Default::default()
        });

        let status = desired_status(&greeter, now);
        assert_eq!(status.conditions.len(), 1);
        assert_eq!(status.conditions[0].type_, CONDITION_READY);
        assert_eq!(status.conditions[0].status, ConditionStatus::True);
    }

    #[test]
    fn phase_follows_stored_status() {
        let mut greeter = sample_greeter(Some("Hi"));
        assert_eq!(GreeterPhase::of(&greeter), GreeterPhase::Unknown);

        greeter.status = Some(desired_status(&greeter, Utc::now()));
        assert_eq!(GreeterPhase::of(&greeter), GreeterPhase::Converged);

        greeter.spec.message = Some("Howdy".to_string());
        assert_eq!(GreeterPhase::of(&greeter), GreeterPhase::Reconciling);
    }

    // =========================================================================
    // Reconcile
    // =========================================================================

    #[tokio::test]
    async fn writes_status_and_leaves_spec_untouched() {
        let written: Arc<Mutex<Option<Greeter>>> = Arc::default();
        let sink = written.clone();

        let mut store = MockGreeterStore::new();
        store
            .expect_get()
            .with(eq(key()))
            .returning(|_| Ok(Some(sample_greeter(Some("Hi")))));
        store.expect_update_status().times(1).returning(move |g| {
            *sink.lock().unwrap() = Some(g.clone());
            Ok(g.clone())
        });

        let action = controller(store, quiet_events())
            .reconcile(&key(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(action, ReconcileAction::Done);
        let written = written.lock().unwrap().clone().unwrap();
        let status = written.status.unwrap();
        assert_eq!(status.name, "ada");
        assert_eq!(status.message, "Hi, Ada! Welcome to Kubernetes Operators!");
        assert_eq!(written.spec, spec("Ada", Some("Hi")));
        assert_eq!(written.metadata.resource_version.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn missing_greeter_is_a_no_op() {
        let mut store = MockGreeterStore::new();
        store.expect_get().returning(|_| Ok(None));
        store.expect_update_status().never();
        let mut events = MockEventPublisher::new();
        events.expect_publish().never();

        let action = controller(store, events)
            .reconcile(&key(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(action, ReconcileAction::Done);
    }

    #[tokio::test]
    async fn fetch_failure_is_retryable_and_writes_nothing() {
        let mut store = MockGreeterStore::new();
        store.expect_get().returning(|k| {
            Err(OperatorError::FetchFailed {
                key: k.clone(),
                source: api_error(500),
            })
        });
        store.expect_update_status().never();

        let controller = controller(store, quiet_events());
        let err = controller
            .reconcile(&key(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, OperatorError::FetchFailed { .. }));
        assert!(err.is_retryable());
        assert_eq!(
            controller.error_policy(&err),
            ReconcileAction::Requeue(Duration::from_secs(30))
        );
    }

    #[tokio::test]
    async fn conflict_requeues_quickly() {
        let mut store = MockGreeterStore::new();
        store
            .expect_get()
            .returning(|_| Ok(Some(sample_greeter(None))));
        store
            .expect_update_status()
            .returning(|_| Err(OperatorError::Conflict { key: key() }));
        let mut events = MockEventPublisher::new();
        events.expect_publish().never();

        let controller = controller(store, events);
        let err = controller
            .reconcile(&key(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, OperatorError::Conflict { .. }));
        assert_eq!(
            controller.error_policy(&err),
            ReconcileAction::Requeue(Duration::from_secs(1))
        );
    }

    #[tokio::test]
    async fn write_failure_publishes_warning_event() {
        let mut store = MockGreeterStore::new();
        store
            .expect_get()
            .returning(|_| Ok(Some(sample_greeter(None))));
        store.expect_update_status().returning(|g| {
            Err(OperatorError::WriteFailed {
                key: ObjectKey::from_resource(g).unwrap(),
                source: api_error(500),
            })
        });
        let mut events = MockEventPublisher::new();
        events
            .expect_publish()
            .withf(|_, type_, reason, _, _| {
                *type_ == EventType::Warning && reason == REASON_UPDATE_FAILED
            })
            .times(1)
            .returning(|_, _, _, _, _| ());

        let err = controller(store, events)
            .reconcile(&key(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, OperatorError::WriteFailed { .. }));
    }

    #[tokio::test]
    async fn converged_greeter_is_not_rewritten() {
        let mut greeter = sample_greeter(Some("Hi"));
        greeter.status = Some(desired_status(&greeter, Utc::now()));

        let mut store = MockGreeterStore::new();
        store
            .expect_get()
            .returning(move |_| Ok(Some(greeter.clone())));
        store.expect_update_status().never();
        let mut events = MockEventPublisher::new();
        events.expect_publish().never();

        let action = controller(store, events)
            .reconcile(&key(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(action, ReconcileAction::Done);
    }

    #[tokio::test]
    async fn cancelled_token_skips_store_calls() {
        let mut store = MockGreeterStore::new();
        store.expect_get().never();
        store.expect_update_status().never();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = controller(store, quiet_events())
            .reconcile(&key(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, OperatorError::Cancelled { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn guarded_abandons_pending_call_on_cancel() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result: OperatorResult<()> =
            guarded(&key(), &cancel, || std::future::pending()).await;

        assert!(matches!(result, Err(OperatorError::Cancelled { .. })));
    }
}
