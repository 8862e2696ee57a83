use hearth_domain::error::Result;
use hearth_domain::{GeoLocation, Grounding, Message, Session};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A conversational reply from the text backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextReply {
    pub text: String,
    #[serde(default)]
    pub grounding: Option<Grounding>,
    /// The reply is out-of-character commentary.
    #[serde(default)]
    pub ooc: bool,
    #[serde(default)]
    pub model_url: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    /// Set together with `image_prompt` when the companion decided to send
    /// a picture of its own.
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_prompt: Option<String>,
}

impl TextReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Collaborator traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Produces the companion's reply to a user message.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_reply(
        &self,
        message: &Message,
        session: &Session,
        location: Option<GeoLocation>,
    ) -> Result<TextReply>;
}

/// Renders an image for an explicit photo request.  Returns the image
/// source reference.
#[async_trait::async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, prompt: &str, session: &Session) -> Result<String>;
}

/// Writes an unsolicited message for the heartbeat.
#[async_trait::async_trait]
pub trait ProactiveGenerator: Send + Sync {
    async fn generate_proactive(&self, session: &Session) -> Result<String>;
}
