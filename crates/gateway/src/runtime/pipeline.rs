//! Message pipeline: one user turn in, at most one assistant message out.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use hearth_domain::error::Result;
use hearth_domain::trace::{TraceEvent, TurnKind};
use hearth_domain::{GeoLocation, ImageAttachment, Message, Sender};
use hearth_providers::{ImageGenerator, TextGenerator};
use hearth_sessions::SessionStore;

use super::environment::SoundCues;
use super::gate::{GatePermit, GenerationGate};

/// Case-insensitive prefix that turns a message into a photo request.
pub const PHOTO_TRIGGER: &str = "generate a photo:";

/// Text of the assistant message carrying a requested photo.
pub const PHOTO_ACK: &str = "Here's the photo you asked for!";

/// Appended in place of a reply when generation fails.
pub const APOLOGY: &str =
    "Sorry, I couldn't put a reply together just now. Could you try again in a moment?";

/// How many recent messages form the context snippet of a companion image.
const IMAGE_CONTEXT_MESSAGES: usize = 2;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn outcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The backend answered; `message_id` is the appended assistant message.
    Replied { message_id: String },
    /// The backend failed and the apology message was appended instead.
    FellBack { message_id: String },
    /// A generation or proactive send held the gate; nothing ran and history
    /// is untouched.
    Busy,
}

/// The photo prompt carried by `message`, if it is a photo request.
///
/// Out-of-character messages are never photo requests.
pub fn photo_prompt(message: &Message) -> Option<&str> {
    if message.ooc {
        return None;
    }
    let head = message.text.get(..PHOTO_TRIGGER.len())?;
    if !head.eq_ignore_ascii_case(PHOTO_TRIGGER) {
        return None;
    }
    Some(message.text[PHOTO_TRIGGER.len()..].trim())
}

/// Append `message` and play the cue for its sender.
///
/// Skips the append when the newest message already has the same id, which
/// is the case when a regenerated prompt is replayed.
pub(crate) fn append_message(store: &SessionStore, sounds: &dyn SoundCues, message: Message) {
    let sender = message.sender;
    let appended = store.try_update(|s| {
        if s.messages.last().is_some_and(|last| last.id == message.id) {
            return None;
        }
        s.push_message(message);
        Some(s.ui.sound_effects)
    });

    if let Some(true) = appended {
        match sender {
            Sender::User => sounds.play_sent(),
            Sender::Assistant => sounds.play_received(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pipeline
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct MessagePipeline {
    store: Arc<SessionStore>,
    gate: Arc<GenerationGate>,
    text: Arc<dyn TextGenerator>,
    image: Arc<dyn ImageGenerator>,
    sounds: Arc<dyn SoundCues>,
    location: Arc<RwLock<Option<GeoLocation>>>,
}

impl MessagePipeline {
    pub fn new(
        store: Arc<SessionStore>,
        gate: Arc<GenerationGate>,
        text: Arc<dyn TextGenerator>,
        image: Arc<dyn ImageGenerator>,
        sounds: Arc<dyn SoundCues>,
        location: Arc<RwLock<Option<GeoLocation>>>,
    ) -> Self {
        Self {
            store,
            gate,
            text,
            image,
            sounds,
            location,
        }
    }

    /// Run one user turn.
    ///
    /// Appends `message`, asks the image or text backend for a reply, and
    /// appends exactly one assistant message: the reply, or [`APOLOGY`] if
    /// the backend failed.  Holds the generation flag for the whole turn and
    /// returns [`TurnOutcome::Busy`] while a proactive send is in flight.
    pub async fn handle_user_turn(&self, message: Message) -> TurnOutcome {
        match self.gate.try_acquire_generation() {
            Ok(permit) => self.run_turn(permit, message).await,
            Err(busy) => {
                tracing::warn!(message_id = %message.id, "{busy}, turn not started");
                TurnOutcome::Busy
            }
        }
    }

    /// The body of a turn, for a caller that already holds the generation
    /// flag.  The flag is released when the turn ends.
    pub(crate) async fn run_turn(&self, permit: GatePermit, message: Message) -> TurnOutcome {
        let _permit = permit;
        append_message(&self.store, self.sounds.as_ref(), message.clone());

        let started = Instant::now();
        let (kind, result) = match photo_prompt(&message) {
            Some(prompt) => (TurnKind::Image, self.photo_reply(prompt).await),
            None => (TurnKind::Text, self.text_reply(&message).await),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(reply) => {
                TraceEvent::TurnCompleted {
                    kind,
                    duration_ms,
                    has_image: reply.image.is_some(),
                    grounded: reply.grounding.is_some(),
                }
                .emit();
                let message_id = reply.id.clone();
                append_message(&self.store, self.sounds.as_ref(), reply);
                TurnOutcome::Replied { message_id }
            }
            Err(e) => {
                tracing::warn!(error = %e, ?kind, "generation failed, sending apology");
                TraceEvent::TurnFellBack {
                    kind,
                    duration_ms,
                    error: e.to_string(),
                }
                .emit();
                let apology = Message::assistant(APOLOGY);
                let message_id = apology.id.clone();
                append_message(&self.store, self.sounds.as_ref(), apology);
                TurnOutcome::FellBack { message_id }
            }
        }
    }

    async fn photo_reply(&self, prompt: &str) -> Result<Message> {
        let session = self.store.read();
        let url = self.image.generate_image(prompt, &session).await?;

        let mut reply = Message::assistant(PHOTO_ACK);
        reply.image = Some(ImageAttachment::new(url, prompt));
        Ok(reply)
    }

    async fn text_reply(&self, message: &Message) -> Result<Message> {
        let session = self.store.read();
        let context = session.recent_context(IMAGE_CONTEXT_MESSAGES);
        let location = *self.location.read();

        let generated = self
            .text
            .generate_reply(message, &session, location)
            .await?;

        let mut reply = Message::assistant(generated.text);
        reply.ooc = generated.ooc;
        reply.grounding = generated.grounding.filter(|g| !g.is_empty());
        reply.model_url = generated.model_url;
        reply.link = generated.link;
        if let (Some(url), Some(prompt)) = (generated.image_url, generated.image_prompt) {
            reply.image = Some(ImageAttachment {
                context: Some(context),
                ..ImageAttachment::new(url, prompt)
            });
        }
        Ok(reply)
    }
}
