//! Operator configuration.
//!
//! Every flag can also be set from a `GREETER_*` environment variable.

use crate::error::{OperatorError, OperatorResult};
use clap::Parser;
use std::time::Duration;

/// Default controller name, used as the event reporter and field manager.
pub const DEFAULT_CONTROLLER_NAME: &str = "greeter-controller";

/// Greeter operator - reconciles Greeter resources into greetings
#[derive(Parser, Debug, Clone)]
#[command(name = "greeter-operator", version, about, long_about = None)]
pub struct OperatorConfig {
    /// Print the CRD manifests and exit
    #[arg(long)]
    pub generate_crds: bool,

    /// Install the CRDs with server-side apply before starting
    #[arg(long, env = "GREETER_INSTALL_CRDS")]
    pub install_crds: bool,

    /// Only watch Greeters in this namespace (default: all namespaces)
    #[arg(long, env = "GREETER_WATCH_NAMESPACE")]
    pub namespace: Option<String>,

    /// Name reported on Kubernetes events
    #[arg(long, env = "GREETER_CONTROLLER_NAME", default_value = DEFAULT_CONTROLLER_NAME)]
    pub controller_name: String,

    /// Deadline for a single reconciliation attempt, in seconds
    #[arg(long, env = "GREETER_RECONCILE_TIMEOUT_SECS", default_value_t = 30)]
    pub reconcile_timeout_secs: u64,

    /// Delay before retrying a failed reconciliation, in seconds
    #[arg(long, env = "GREETER_ERROR_REQUEUE_SECS", default_value_t = 30)]
    pub error_requeue_secs: u64,

    /// Delay before retrying after a status write conflict, in seconds
    #[arg(long, env = "GREETER_CONFLICT_REQUEUE_SECS", default_value_t = 1)]
    pub conflict_requeue_secs: u64,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            generate_crds: false,
            install_crds: false,
            namespace: None,
            controller_name: DEFAULT_CONTROLLER_NAME.to_string(),
            reconcile_timeout_secs: 30,
            error_requeue_secs: 30,
            conflict_requeue_secs: 1,
        }
    }
}

impl OperatorConfig {
    /// Reject settings the controller cannot run with.
    pub fn validate(&self) -> OperatorResult<()> {
        if self.controller_name.trim().is_empty() {
            return Err(OperatorError::InvalidConfig(
                "controller name must not be empty".into(),
            ));
        }
        if self.reconcile_timeout_secs == 0 {
            return Err(OperatorError::InvalidConfig(
                "reconcile timeout must be at least 1 second".into(),
            ));
        }
        if self.error_requeue_secs == 0 || self.conflict_requeue_secs == 0 {
            return Err(OperatorError::InvalidConfig(
                "requeue delays must be at least 1 second".into(),
            ));
        }
        Ok(())
    }

    /// Deadline for one reconciliation attempt.
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    /// Retry delays derived from this configuration.
    pub fn requeue_policy(&self) -> RequeuePolicy {
        RequeuePolicy {
            on_error: Duration::from_secs(self.error_requeue_secs),
            on_conflict: Duration::from_secs(self.conflict_requeue_secs),
        }
    }
}

/// How long to wait before retrying a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequeuePolicy {
    /// Delay after fetch, write or cancellation failures.
    pub on_error: Duration,
    /// Delay after a stale-version conflict. Kept short: the retry refetches.
    pub on_conflict: Duration,
}

impl Default for RequeuePolicy {
    fn default() -> Self {
        OperatorConfig::default().requeue_policy()
    }
}
