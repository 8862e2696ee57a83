//! End-to-end flows through the public `Orchestrator` API with a JSON file
//! store on disk and scripted backends.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use parking_lot::Mutex;

use hearth_domain::error::{Error, Result};
use hearth_domain::{GeoLocation, Message, NotificationFrequency, Sender, Session};
use hearth_gateway::runtime::{
    Collaborators, Environment, Notifier, Orchestrator, Permission, Silent, TickOutcome,
    TurnOutcome, Visibility, APOLOGY,
};
use hearth_providers::{ImageGenerator, ProactiveGenerator, TextGenerator, TextReply};
use hearth_sessions::{JsonFileStore, SessionStore};

// ── fakes ────────────────────────────────────────────────────────────

#[derive(Default)]
struct Backend {
    replies: Mutex<VecDeque<Result<String>>>,
    proactive: Mutex<VecDeque<String>>,
}

impl Backend {
    fn reply(&self, text: &str) {
        self.replies.lock().push_back(Ok(text.to_owned()));
    }

    fn fail(&self) {
        self.replies.lock().push_back(Err(Error::Timeout("scripted".into())));
    }
}

#[async_trait::async_trait]
impl TextGenerator for Backend {
    async fn generate_reply(
        &self,
        _message: &Message,
        _session: &Session,
        _location: Option<GeoLocation>,
    ) -> Result<TextReply> {
        let next = self.replies.lock().pop_front();
        next.unwrap_or_else(|| Err(Error::Other("no reply scripted".into())))
            .map(TextReply::text)
    }
}

#[async_trait::async_trait]
impl ImageGenerator for Backend {
    async fn generate_image(&self, prompt: &str, _session: &Session) -> Result<String> {
        Ok(format!("https://img.test/{}.png", prompt.replace(' ', "-")))
    }
}

#[async_trait::async_trait]
impl ProactiveGenerator for Backend {
    async fn generate_proactive(&self, _session: &Session) -> Result<String> {
        let next = self.proactive.lock().pop_front();
        next.ok_or_else(|| Error::Other("no proactive text scripted".into()))
    }
}

struct Desktop {
    hidden: AtomicBool,
    shown: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl Environment for Desktop {
    fn visibility(&self) -> Visibility {
        if self.hidden.load(Ordering::SeqCst) {
            Visibility::Hidden
        } else {
            Visibility::Visible
        }
    }
    fn notification_permission(&self) -> Permission {
        Permission::Granted
    }
    async fn request_notification_permission(&self) -> Permission {
        Permission::Granted
    }
}

impl Notifier for Desktop {
    fn show(&self, title: &str, body: &str, _icon: Option<&str>) -> Result<()> {
        self.shown.lock().push(format!("{title}: {body}"));
        Ok(())
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    backend: Arc<Backend>,
    desktop: Arc<Desktop>,
    orchestrator: Orchestrator,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let durable = JsonFileStore::new(dir.path()).unwrap();
    let store = Arc::new(SessionStore::open(Arc::new(durable), "companion").unwrap());
    let backend = Arc::new(Backend::default());
    let desktop = Arc::new(Desktop {
        hidden: AtomicBool::new(false),
        shown: Mutex::new(Vec::new()),
    });
    let orchestrator = Orchestrator::new(
        store,
        Collaborators {
            text: backend.clone(),
            image: backend.clone(),
            proactive: backend.clone(),
            environment: desktop.clone(),
            notifier: desktop.clone(),
            sounds: Arc::new(Silent),
        },
    );
    Harness {
        _dir: dir,
        backend,
        desktop,
        orchestrator,
    }
}

fn texts(orch: &Orchestrator) -> Vec<String> {
    orch.read().messages.iter().map(|m| m.text.clone()).collect()
}

// ── flows ────────────────────────────────────────────────────────────

#[tokio::test]
async fn conversation_regenerate_and_persist() {
    let h = harness();
    let orch = &h.orchestrator;

    h.backend.reply("hi there");
    orch.handle_user_turn(Message::user("hello")).await;
    h.backend.reply("fine, you?");
    orch.handle_user_turn(Message::user("how are you")).await;
    assert_eq!(texts(orch), ["hello", "hi there", "how are you", "fine, you?"]);

    let last = orch.read().messages[3].id.clone();
    h.backend.reply("great, thanks for asking!");
    let outcome = orch.regenerate(&last).await;
    assert!(matches!(outcome, Some(TurnOutcome::Replied { .. })));
    assert_eq!(
        texts(orch),
        ["hello", "hi there", "how are you", "great, thanks for asking!"]
    );

    assert!(orch.shutdown().unwrap());
    let saved = JsonFileStore::new(h._dir.path()).unwrap();
    let reopened = SessionStore::open(Arc::new(saved), "companion").unwrap();
    assert_eq!(reopened.read().messages.len(), 4);
}

#[tokio::test]
async fn failure_then_photo_request() {
    let h = harness();
    let orch = &h.orchestrator;

    h.backend.fail();
    let outcome = orch.handle_user_turn(Message::user("hello?")).await;
    assert!(matches!(outcome, TurnOutcome::FellBack { .. }));
    assert_eq!(orch.read().messages[1].text, APOLOGY);
    assert!(!orch.is_generating());

    orch.handle_user_turn(Message::user("generate a photo: two cats"))
        .await;
    let session = orch.read();
    let image = session.messages[3].image.as_ref().unwrap();
    assert_eq!(image.url, "https://img.test/two-cats.png");
    assert_eq!(session.messages[3].sender, Sender::Assistant);
}

#[tokio::test]
async fn proactive_message_while_away() {
    let h = harness();
    let orch = &h.orchestrator;

    orch.set_notifications(true, NotificationFrequency::VeryFrequently)
        .await;
    let an_hour_ago = Utc::now() - Duration::hours(1);
    orch.update(|s| {
        s.companion.name = "Mira".into();
        s.push_message(Message::user("talk later").at(an_hour_ago));
    });

    // Visible: nothing happens.
    assert!(matches!(
        orch.heartbeat().tick().await,
        TickOutcome::Skipped(_)
    ));

    h.desktop.hidden.store(true, Ordering::SeqCst);
    h.backend
        .proactive
        .lock()
        .push_back("thinking of you".into());
    assert!(matches!(
        orch.heartbeat().tick().await,
        TickOutcome::Sent { .. }
    ));

    assert_eq!(texts(orch), ["talk later", "thinking of you"]);
    assert_eq!(*h.desktop.shown.lock(), ["Mira: thinking of you"]);
}
