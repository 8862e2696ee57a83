//! In-process fakes for the runtime's collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;

use hearth_domain::error::{Error, Result};
use hearth_domain::{GeoLocation, Message, Session};
use hearth_providers::{ImageGenerator, ProactiveGenerator, TextGenerator, TextReply};
use hearth_sessions::SessionStore;

use super::environment::{Environment, Notifier, Permission, SoundCues, Visibility};
use super::gate::GenerationGate;
use super::heartbeat::ProactiveHeartbeat;
use super::pipeline::MessagePipeline;
use super::Collaborators;

type Scripted<T> = Mutex<VecDeque<std::result::Result<T, &'static str>>>;

fn next<T>(queue: &Scripted<T>) -> Result<T> {
    match queue.lock().pop_front() {
        Some(Ok(v)) => Ok(v),
        Some(Err(msg)) => Err(Error::Provider {
            provider: "fake".into(),
            message: msg.into(),
        }),
        None => Err(Error::Other("nothing scripted".into())),
    }
}

// ── generators ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct ScriptedText {
    replies: Scripted<TextReply>,
    seen: Mutex<Vec<(String, usize)>>,
    locations: Mutex<Vec<Option<GeoLocation>>>,
}

impl ScriptedText {
    pub fn push(&self, reply: std::result::Result<TextReply, &'static str>) {
        self.replies.lock().push_back(reply);
    }

    /// History length of the session passed on each call.
    pub fn seen_history_lengths(&self) -> Vec<usize> {
        self.seen.lock().iter().map(|(_, n)| *n).collect()
    }

    /// Text of the message passed on each call.
    pub fn seen_messages(&self) -> Vec<String> {
        self.seen.lock().iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn seen_locations(&self) -> Vec<Option<GeoLocation>> {
        self.locations.lock().clone()
    }
}

#[async_trait::async_trait]
impl TextGenerator for ScriptedText {
    async fn generate_reply(
        &self,
        message: &Message,
        session: &Session,
        location: Option<GeoLocation>,
    ) -> Result<TextReply> {
        self.seen
            .lock()
            .push((message.text.clone(), session.messages.len()));
        self.locations.lock().push(location);
        next(&self.replies)
    }
}

#[derive(Default)]
pub struct ScriptedImage {
    urls: Scripted<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedImage {
    pub fn push(&self, url: std::result::Result<String, &'static str>) {
        self.urls.lock().push_back(url);
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait::async_trait]
impl ImageGenerator for ScriptedImage {
    async fn generate_image(&self, prompt: &str, _session: &Session) -> Result<String> {
        self.prompts.lock().push(prompt.to_owned());
        next(&self.urls)
    }
}

/// Proactive generator that can be paused mid-call and can flip the fake
/// environment's visibility while the call is in flight.
#[derive(Default)]
pub struct ScriptedProactive {
    texts: Scripted<String>,
    calls: AtomicUsize,
    hold: Mutex<Option<Arc<Notify>>>,
    flip_to: Mutex<Option<(Arc<FakeEnvironment>, Visibility)>>,
}

impl ScriptedProactive {
    pub fn push(&self, text: std::result::Result<String, &'static str>) {
        self.texts.lock().push_back(text);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every call wait until the returned `Notify` is signalled.
    pub fn pause(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.hold.lock() = Some(notify.clone());
        notify
    }

    pub fn flip_visibility_during_call(&self, env: Arc<FakeEnvironment>, to: Visibility) {
        *self.flip_to.lock() = Some((env, to));
    }
}

#[async_trait::async_trait]
impl ProactiveGenerator for ScriptedProactive {
    async fn generate_proactive(&self, _session: &Session) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let hold = self.hold.lock().clone();
        if let Some(notify) = hold {
            notify.notified().await;
        }
        if let Some((env, to)) = self.flip_to.lock().as_ref() {
            env.set_visibility(*to);
        }
        next(&self.texts)
    }
}

// ── environment ─────────────────────────────────────────────────────

pub struct FakeEnvironment {
    visibility: Mutex<Visibility>,
    permission: Mutex<Permission>,
    answer: Mutex<Permission>,
    requests: AtomicUsize,
}

impl FakeEnvironment {
    /// Hidden, with notification permission granted.
    pub fn hidden_and_granted() -> Self {
        Self {
            visibility: Mutex::new(Visibility::Hidden),
            permission: Mutex::new(Permission::Granted),
            answer: Mutex::new(Permission::Granted),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn set_visibility(&self, v: Visibility) {
        *self.visibility.lock() = v;
    }

    pub fn set_permission(&self, p: Permission) {
        *self.permission.lock() = p;
    }

    /// What a permission prompt will answer.
    pub fn answer_prompt_with(&self, p: Permission) {
        *self.answer.lock() = p;
    }

    pub fn permission_requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Environment for FakeEnvironment {
    fn visibility(&self) -> Visibility {
        *self.visibility.lock()
    }

    fn notification_permission(&self) -> Permission {
        *self.permission.lock()
    }

    async fn request_notification_permission(&self) -> Permission {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let answer = *self.answer.lock();
        *self.permission.lock() = answer;
        answer
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<(String, String)>>,
    fail: std::sync::atomic::AtomicBool,
}

impl RecordingNotifier {
    pub fn shown(&self) -> Vec<(String, String)> {
        self.shown.lock().clone()
    }

    pub fn fail_next(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

impl Notifier for RecordingNotifier {
    fn show(&self, title: &str, body: &str, _icon: Option<&str>) -> Result<()> {
        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(Error::Other("notification service unavailable".into()));
        }
        self.shown.lock().push((title.to_owned(), body.to_owned()));
        Ok(())
    }
}

#[derive(Default)]
pub struct CountingSounds {
    sent: AtomicUsize,
    received: AtomicUsize,
}

impl CountingSounds {
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }
}

impl SoundCues for CountingSounds {
    fn play_sent(&self) {
        self.sent.fetch_add(1, Ordering::SeqCst);
    }

    fn play_received(&self) {
        self.received.fetch_add(1, Ordering::SeqCst);
    }
}

// ── bundle ──────────────────────────────────────────────────────────

/// One of every fake, sharing a store and gate.
pub struct Fakes {
    pub store: Arc<SessionStore>,
    pub gate: Arc<GenerationGate>,
    pub text: Arc<ScriptedText>,
    pub image: Arc<ScriptedImage>,
    pub proactive: Arc<ScriptedProactive>,
    pub env: Arc<FakeEnvironment>,
    pub notifier: Arc<RecordingNotifier>,
    pub sounds: Arc<CountingSounds>,
    pub location: Arc<RwLock<Option<GeoLocation>>>,
}

impl Fakes {
    pub fn new(session: Session) -> Self {
        Self {
            store: Arc::new(SessionStore::ephemeral(session)),
            gate: Arc::new(GenerationGate::new()),
            text: Arc::new(ScriptedText::default()),
            image: Arc::new(ScriptedImage::default()),
            proactive: Arc::new(ScriptedProactive::default()),
            env: Arc::new(FakeEnvironment::hidden_and_granted()),
            notifier: Arc::new(RecordingNotifier::default()),
            sounds: Arc::new(CountingSounds::default()),
            location: Arc::new(RwLock::new(None)),
        }
    }

    pub fn pipeline(&self) -> MessagePipeline {
        MessagePipeline::new(
            self.store.clone(),
            self.gate.clone(),
            self.text.clone(),
            self.image.clone(),
            self.sounds.clone(),
            self.location.clone(),
        )
    }

    pub fn heartbeat(&self) -> ProactiveHeartbeat {
        ProactiveHeartbeat::new(
            self.store.clone(),
            self.gate.clone(),
            self.proactive.clone(),
            self.env.clone(),
            self.notifier.clone(),
            self.sounds.clone(),
        )
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            text: self.text.clone(),
            image: self.image.clone(),
            proactive: self.proactive.clone(),
            environment: self.env.clone(),
            notifier: self.notifier.clone(),
            sounds: self.sounds.clone(),
        }
    }
}
