//! Runtime construction and background-task spawning shared by the CLI
//! commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinHandle;

use hearth_domain::config::{Config, ConfigSeverity};
use hearth_providers::RestBackend;
use hearth_sessions::{JsonFileStore, SessionStore};

use crate::runtime::{Collaborators, Environment, Notifier, Orchestrator, SoundCues};

/// The host-side collaborators a front end supplies.
pub struct Frontend {
    pub environment: Arc<dyn Environment>,
    pub notifier: Arc<dyn Notifier>,
    pub sounds: Arc<dyn SoundCues>,
}

/// Open the configured session store.
pub fn open_store(config: &Config) -> anyhow::Result<Arc<SessionStore>> {
    let durable = JsonFileStore::new(&config.store.state_path).with_context(|| {
        format!(
            "opening state directory {}",
            config.store.state_path.display()
        )
    })?;
    let store = SessionStore::open(Arc::new(durable), config.store.session_key.clone())
        .with_context(|| format!("loading session '{}'", config.store.session_key))?;
    Ok(Arc::new(store))
}

/// Validate config, open the store, connect the backend and return a wired
/// [`Orchestrator`].  Background tasks are not started.
pub fn build_orchestrator(config: &Config, frontend: Frontend) -> anyhow::Result<Arc<Orchestrator>> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!("config has errors, run `hearth config validate` for details");
    }

    // ── Session store ────────────────────────────────────────────────
    let store = open_store(config)?;
    tracing::info!(
        session_key = store.key(),
        messages = store.read().messages.len(),
        "session store ready"
    );

    // ── Backend ──────────────────────────────────────────────────────
    let backend = Arc::new(RestBackend::new(&config.backend).context("building backend client")?);
    if config.backend.api_key().is_none() {
        tracing::debug!(
            env = %config.backend.api_key_env,
            "no backend API key set, sending unauthenticated requests"
        );
    }
    tracing::info!(base_url = %config.backend.base_url, "backend client ready");

    let collab = Collaborators {
        text: backend.clone(),
        image: backend.clone(),
        proactive: backend,
        environment: frontend.environment,
        notifier: frontend.notifier,
        sounds: frontend.sounds,
    };

    Ok(Arc::new(Orchestrator::new(store, collab)))
}

/// Spawn the periodic session flush and, when enabled, the proactive
/// heartbeat.  Both stop when the orchestrator shuts down.
pub fn spawn_background_tasks(config: &Config, orchestrator: &Orchestrator) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    // ── Periodic session flush ───────────────────────────────────────
    if config.store.flush_interval_secs > 0 {
        let store = orchestrator.store().clone();
        let cancel = orchestrator.shutdown_token();
        let every = Duration::from_secs(config.store.flush_interval_secs);
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(e) = store.flush() {
                            tracing::warn!(error = %e, "session store flush failed");
                        }
                    }
                }
            }
        }));
    } else {
        tracing::warn!("periodic flush disabled, changes are saved on exit only");
    }

    // ── Proactive heartbeat ──────────────────────────────────────────
    if config.heartbeat.enabled {
        let every = Duration::from_secs(config.heartbeat.interval_secs);
        handles.push(orchestrator.start_heartbeat(every));
    }

    tracing::info!(tasks = handles.len(), "background tasks spawned");
    handles
}
