//! Companion runtime: the orchestrator that ties the session store, the
//! generation gate, the message pipeline, regeneration, and the proactive
//! heartbeat together.
//!
//! Front ends talk to [`Orchestrator`] only.  Everything it needs from the
//! outside world comes in through [`Collaborators`].

pub mod environment;
pub mod gate;
pub mod heartbeat;
pub mod pipeline;
pub mod regenerate;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use hearth_domain::error::Result;
use hearth_domain::{GeoLocation, Message, NotificationFrequency, Session};
use hearth_providers::{ImageGenerator, ProactiveGenerator, TextGenerator};
use hearth_sessions::SessionStore;

pub use environment::{Environment, Notifier, Permission, Silent, SoundCues, Visibility};
pub use gate::{GateBusy, GateKind, GatePermit, GenerationGate};
pub use heartbeat::{ProactiveHeartbeat, SkipReason, TickOutcome};
pub use pipeline::{photo_prompt, MessagePipeline, TurnOutcome, APOLOGY, PHOTO_ACK};
pub use regenerate::RegenerationController;

/// External collaborators the runtime calls out to.
#[derive(Clone)]
pub struct Collaborators {
    pub text: Arc<dyn TextGenerator>,
    pub image: Arc<dyn ImageGenerator>,
    pub proactive: Arc<dyn ProactiveGenerator>,
    pub environment: Arc<dyn Environment>,
    pub notifier: Arc<dyn Notifier>,
    pub sounds: Arc<dyn SoundCues>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Orchestrator {
    store: Arc<SessionStore>,
    gate: Arc<GenerationGate>,
    pipeline: Arc<MessagePipeline>,
    regeneration: RegenerationController,
    heartbeat: Arc<ProactiveHeartbeat>,
    environment: Arc<dyn Environment>,
    location: Arc<RwLock<Option<GeoLocation>>>,
    shutdown: CancellationToken,
}

impl Orchestrator {
    pub fn new(store: Arc<SessionStore>, collab: Collaborators) -> Self {
        let gate = Arc::new(GenerationGate::new());
        let location = Arc::new(RwLock::new(None));

        let pipeline = Arc::new(MessagePipeline::new(
            store.clone(),
            gate.clone(),
            collab.text,
            collab.image,
            collab.sounds.clone(),
            location.clone(),
        ));
        let regeneration =
            RegenerationController::new(store.clone(), gate.clone(), pipeline.clone());
        let heartbeat = Arc::new(ProactiveHeartbeat::new(
            store.clone(),
            gate.clone(),
            collab.proactive,
            collab.environment.clone(),
            collab.notifier,
            collab.sounds,
        ));

        Self {
            store,
            gate,
            pipeline,
            regeneration,
            heartbeat,
            environment: collab.environment,
            location,
            shutdown: CancellationToken::new(),
        }
    }

    pub async fn handle_user_turn(&self, message: Message) -> TurnOutcome {
        self.pipeline.handle_user_turn(message).await
    }

    pub async fn regenerate(&self, message_id: &str) -> Option<TurnOutcome> {
        self.regeneration.regenerate(message_id).await
    }

    pub fn read(&self) -> Arc<Session> {
        self.store.read()
    }

    pub fn update<R>(&self, transform: impl FnOnce(&mut Session) -> R) -> R {
        self.store.update(transform)
    }

    pub fn is_generating(&self) -> bool {
        self.gate.is_generating()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Session>> {
        self.store.subscribe()
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Last-known location passed to text generation.
    pub fn set_location(&self, location: Option<GeoLocation>) {
        *self.location.write() = location;
    }

    /// Update the notification settings.
    ///
    /// Enabling notifications prompts for permission if it was never asked.
    /// The setting is stored whatever the answer; the heartbeat stays quiet
    /// until permission is granted.
    pub async fn set_notifications(
        &self,
        enabled: bool,
        frequency: NotificationFrequency,
    ) -> Permission {
        let mut permission = self.environment.notification_permission();
        if enabled && permission == Permission::Default {
            permission = self.environment.request_notification_permission().await;
            tracing::debug!(?permission, "notification permission requested");
        }
        self.store.update(|s| {
            s.notifications.enabled = enabled;
            s.notifications.frequency = frequency;
        });
        permission
    }

    pub fn heartbeat(&self) -> &Arc<ProactiveHeartbeat> {
        &self.heartbeat
    }

    /// Start the proactive heartbeat loop; it stops on [`Orchestrator::shutdown`].
    pub fn start_heartbeat(&self, every: Duration) -> JoinHandle<()> {
        self.heartbeat
            .clone()
            .spawn(every, self.shutdown.child_token())
    }

    /// Token cancelled by [`Orchestrator::shutdown`], for background tasks.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop background timers and persist pending changes.
    ///
    /// In-flight generations are not aborted.
    pub fn shutdown(&self) -> Result<bool> {
        self.shutdown.cancel();
        self.store.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::Fakes;
    use hearth_providers::TextReply;
    use hearth_sessions::{DurableStore, MemoryStore};

    fn orchestrator(fakes: &Fakes) -> Orchestrator {
        Orchestrator::new(fakes.store.clone(), fakes.collaborators())
    }

    #[tokio::test]
    async fn location_reaches_text_generation() {
        let fakes = Fakes::new(Session::default());
        fakes.text.push(Ok(TextReply::text("sunny there")));
        let orch = orchestrator(&fakes);

        let here = GeoLocation {
            latitude: 48.85,
            longitude: 2.35,
        };
        orch.set_location(Some(here));
        orch.handle_user_turn(Message::user("weather?")).await;

        assert_eq!(fakes.text.seen_locations(), [Some(here)]);
    }

    #[tokio::test]
    async fn enabling_notifications_asks_once_when_undecided() {
        let fakes = Fakes::new(Session::default());
        fakes.env.set_permission(Permission::Default);
        fakes.env.answer_prompt_with(Permission::Denied);
        let orch = orchestrator(&fakes);

        let answer = orch
            .set_notifications(true, NotificationFrequency::Frequently)
            .await;
        assert_eq!(answer, Permission::Denied);
        assert_eq!(fakes.env.permission_requests(), 1);

        // Stored regardless of the answer.
        let session = orch.read();
        assert!(session.notifications.enabled);
        assert_eq!(
            session.notifications.frequency,
            NotificationFrequency::Frequently
        );

        orch.set_notifications(true, NotificationFrequency::Rarely)
            .await;
        assert_eq!(fakes.env.permission_requests(), 1);
    }

    #[tokio::test]
    async fn disabling_never_prompts() {
        let fakes = Fakes::new(Session::default());
        fakes.env.set_permission(Permission::Default);
        let orch = orchestrator(&fakes);

        orch.set_notifications(false, NotificationFrequency::Off)
            .await;
        assert_eq!(fakes.env.permission_requests(), 0);
    }

    #[tokio::test]
    async fn shutdown_cancels_and_flushes() {
        let mem = Arc::new(MemoryStore::new());
        let store = Arc::new(SessionStore::open(mem.clone(), "companion").unwrap());
        let fakes = Fakes::new(Session::default());
        let orch = Orchestrator::new(store, fakes.collaborators());

        let heartbeat = orch.start_heartbeat(Duration::from_millis(5));
        orch.update(|s| s.add_memory("prefers mornings").id.clone());

        assert!(orch.shutdown().unwrap());
        assert!(orch.shutdown_token().is_cancelled());
        heartbeat.await.unwrap();
        assert_eq!(mem.save_count(), 1);
        assert_eq!(mem.load("companion").unwrap().unwrap().memories.len(), 1);
    }
}
