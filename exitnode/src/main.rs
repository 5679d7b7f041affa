mod app;
mod bgjobs;
mod drivers;
mod metrics;
mod neonapi;
mod rdesc;
mod repos;
mod rules;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use shared::utilities::errors::AppError;

/// Default rule run when no CLI argument is given: fetch and run whatever
/// global rules are enabled in storage, jittered every 5-35 seconds.
const DEFAULT_RULE_JSON: &str = r#"{"act":"do_global_rules","args":{},"periodic":"random(5,35)"}"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let base = match app::App::from_env().await {
        Ok(base) => Arc::new(base),
        Err(err) => {
            error!(error = %err, "failed to init app");
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn(watch_signals(cancel.clone()));
    metrics::spawn_server(base.config.prometheus_bind.clone(), cancel.clone());

    let raw = std::env::args().nth(1);
    let raw = raw.as_deref().unwrap_or(DEFAULT_RULE_JSON);

    let executor = rules::executor::Executor::new(base.clone());
    let root_rule = match executor.parse_json(raw) {
        Ok(rule) => rule,
        Err(err) => {
            error!(error = %err, "failed to parse root rule descriptor");
            std::process::exit(1);
        }
    };

    let run_ctx = rules::executor::RunCtx::root(cancel.clone());
    if let Err(err) = executor.execute(run_ctx, root_rule).await {
        if err.is_contention() {
            // not expected for the root rule, but harmless
        } else {
            error!(error = %err, "root rule execution error");
        }
    }

    info!("waiting for background jobs to finish");
    base.registry.wait_all(cancel.clone()).await;
    Ok(())
}

async fn watch_signals(cancel: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut quit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
        _ = term.recv() => info!("received SIGTERM"),
        _ = quit.recv() => info!("received SIGQUIT"),
    }

    cancel.cancel();
}
