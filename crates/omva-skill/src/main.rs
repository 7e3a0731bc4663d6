//! Voice enrollment skill binary.
//!
//! Connects to the host's message bus, starts the plugin health monitor and
//! runs the dialogue loop until SIGTERM/SIGINT.

use omva_bus::WsBus;
use omva_dialog::HealthMonitor;
use omva_skill::{background::run_health_monitor, config, Skill, SkillError};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("OMVA_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() -> Result<(), SkillError> {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    let config = config::load_config(selected_config_path)?;

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    let bus = Arc::new(WsBus::connect(
        config.bus.url.clone(),
        config.bus.reconnect_delay(),
    ));
    tracing::info!(url = %config.bus.url, "connecting to message bus");

    let health = Arc::new(Mutex::new(HealthMonitor::new(
        config.health.to_health_config(),
    )));
    let health_task = tokio::spawn(run_health_monitor(bus.clone(), health.clone()));

    let mut skill = Skill::new(bus, config.enrollment.clone(), health);
    let result = skill.run(shutdown_signal()).await;

    health_task.abort();
    tracing::info!("voice enrollment skill shut down");
    result
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
