//! Greeter Kubernetes Operator binary.
//!
//! This binary runs the Greeter operator, which writes a greeting into the
//! status of every Greeter custom resource in the cluster.

use clap::Parser;
use greeter_operator::config::OperatorConfig;
use greeter_operator::controller::{
    ControllerContext, Dispatcher, GreeterController, run_controller,
};
use greeter_operator::crd::registry::scheme;
use greeter_operator::crd::Greeter;
use greeter_operator::observability::{TracingConfig, init_tracing};
use kube::{Api, Client};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = OperatorConfig::parse();
    config.validate()?;

    let scheme = scheme()?;

    // CRD generation mode writes YAML to stdout, so it runs before logging is set up
    if config.generate_crds {
        print!("{}", scheme.to_yaml()?);
        return Ok(());
    }

    init_tracing(&TracingConfig::from_env())?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Greeter Kubernetes Operator");

    // Connect to Kubernetes
    let client = Client::try_default().await?;
    tracing::info!("Connected to Kubernetes cluster");

    if config.install_crds {
        scheme.install(&client, &config.controller_name).await?;
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(forward_shutdown_signal(shutdown.clone()));

    let greeters: Api<Greeter> = match &config.namespace {
        Some(namespace) => {
            tracing::info!(namespace = %namespace, "Watching Greeters in namespace");
            Api::namespaced(client.clone(), namespace)
        }
        None => {
            tracing::info!("Watching Greeters in all namespaces");
            Api::all(client.clone())
        }
    };

    let ctx = Arc::new(ControllerContext::new(client, &config));
    let dispatcher = Dispatcher::new(
        GreeterController::new(ctx),
        shutdown,
        config.reconcile_timeout(),
    );

    tracing::info!("Starting Greeter controller");
    run_controller(greeters, Arc::new(dispatcher)).await;
    tracing::info!("Greeter controller stopped");

    Ok(())
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM.
async fn forward_shutdown_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received, draining in-flight reconciliations");
    shutdown.cancel();
}
