//! Proactive heartbeat: decides, on each tick, whether the companion should
//! reach out on its own.
//!
//! A tick reads the live session, checks the gate and the host environment,
//! and sends only when the user has been idle at least as long as the
//! notification tier allows.  Visibility is checked once before the backend
//! call and once after it; a user who returns mid-call never gets a
//! notification for a message they are already looking at.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use hearth_domain::trace::TraceEvent;
use hearth_domain::Message;
use hearth_providers::ProactiveGenerator;
use hearth_sessions::SessionStore;

use super::environment::{Environment, Notifier, Permission, SoundCues, Visibility};
use super::gate::{GateBusy, GateKind, GenerationGate};
use super::pipeline::append_message;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tick outcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Disabled, or the tier is `off`.
    NotificationsOff,
    GenerationInProgress,
    SendInProgress,
    /// The user is looking at the app.
    Visible,
    PermissionNotGranted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Skipped(SkipReason),
    NotDue { remaining: Duration },
    Sent { message_id: String },
    /// Generated, but the app became visible before it could be delivered.
    Discarded,
    Failed,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Heartbeat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ProactiveHeartbeat {
    store: Arc<SessionStore>,
    gate: Arc<GenerationGate>,
    proactive: Arc<dyn ProactiveGenerator>,
    environment: Arc<dyn Environment>,
    notifier: Arc<dyn Notifier>,
    sounds: Arc<dyn SoundCues>,
}

impl ProactiveHeartbeat {
    pub fn new(
        store: Arc<SessionStore>,
        gate: Arc<GenerationGate>,
        proactive: Arc<dyn ProactiveGenerator>,
        environment: Arc<dyn Environment>,
        notifier: Arc<dyn Notifier>,
        sounds: Arc<dyn SoundCues>,
    ) -> Self {
        Self {
            store,
            gate,
            proactive,
            environment,
            notifier,
            sounds,
        }
    }

    pub async fn tick(&self) -> TickOutcome {
        self.tick_at(Utc::now()).await
    }

    /// Run one heartbeat check as of `now`.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> TickOutcome {
        let session = self.store.read();

        let min_idle = match session.notifications.frequency.min_idle() {
            Some(d) if session.notifications.enabled => d,
            _ => return TickOutcome::Skipped(SkipReason::NotificationsOff),
        };
        if let Some(reason) = self.blocked() {
            return TickOutcome::Skipped(reason);
        }

        let idle = session.idle_for(now);
        if idle < min_idle {
            return TickOutcome::NotDue {
                remaining: min_idle - idle,
            };
        }
        drop(session);

        let _permit = match self.gate.try_acquire_proactive() {
            Ok(permit) => permit,
            Err(GateBusy(GateKind::Generation)) => {
                return TickOutcome::Skipped(SkipReason::GenerationInProgress)
            }
            Err(GateBusy(GateKind::ProactiveSend)) => {
                return TickOutcome::Skipped(SkipReason::SendInProgress)
            }
        };

        let session = self.store.read();
        let text = match self.proactive.generate_proactive(&session).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                tracing::warn!("proactive backend returned an empty message");
                TraceEvent::ProactiveFailed {
                    error: "empty message".into(),
                }
                .emit();
                return TickOutcome::Failed;
            }
            Err(e) => {
                tracing::warn!(error = %e, "proactive generation failed");
                TraceEvent::ProactiveFailed {
                    error: e.to_string(),
                }
                .emit();
                return TickOutcome::Failed;
            }
        };

        if self.environment.visibility() != Visibility::Hidden {
            tracing::debug!("app became visible during proactive generation, discarding");
            TraceEvent::ProactiveDiscarded {
                reason: "visible".into(),
            }
            .emit();
            return TickOutcome::Discarded;
        }

        let message = Message::assistant(text.clone());
        let message_id = message.id.clone();
        append_message(&self.store, self.sounds.as_ref(), message);

        let companion = self.store.read().companion.clone();
        if let Err(e) = self.notifier.show(
            &companion.name,
            &text,
            companion.reference_image.as_deref(),
        ) {
            tracing::warn!(error = %e, "failed to show proactive notification");
        }

        TraceEvent::ProactiveSent {
            idle_secs: idle.num_seconds(),
            chars: text.chars().count(),
        }
        .emit();

        TickOutcome::Sent { message_id }
    }

    fn blocked(&self) -> Option<SkipReason> {
        if self.gate.is_generating() {
            return Some(SkipReason::GenerationInProgress);
        }
        if self.gate.is_sending_proactive() {
            return Some(SkipReason::SendInProgress);
        }
        if self.environment.visibility() != Visibility::Hidden {
            return Some(SkipReason::Visible);
        }
        if self.environment.notification_permission() != Permission::Granted {
            return Some(SkipReason::PermissionNotGranted);
        }
        None
    }

    /// Tick every `every` until `cancel` fires.
    ///
    /// Each tick body runs in its own task, so a slow backend call never
    /// delays the timer; overlapping ticks are turned away by the gate.
    pub fn spawn(self: Arc<Self>, every: StdDuration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("proactive heartbeat stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        let heartbeat = self.clone();
                        tokio::spawn(async move {
                            match heartbeat.tick().await {
                                TickOutcome::Skipped(reason) => {
                                    tracing::trace!(?reason, "heartbeat skipped");
                                }
                                TickOutcome::NotDue { remaining } => {
                                    tracing::trace!(
                                        remaining_secs = remaining.num_seconds(),
                                        "heartbeat not due"
                                    );
                                }
                                outcome => tracing::debug!(?outcome, "heartbeat tick"),
                            }
                        });
                    }
                }
            }
        })
    }
}
