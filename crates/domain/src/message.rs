use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chat messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => f.write_str("user"),
            Sender::Assistant => f.write_str("assistant"),
        }
    }
}

/// A single entry in the chat history.
///
/// Once appended a message only changes through
/// [`Session::correct_message_text`](crate::Session::correct_message_text)
/// and [`Session::tag_image`](crate::Session::tag_image).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// UUIDv7 string, so ids sort by creation time.
    pub id: String,
    pub sender: Sender,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Out-of-character: meta commentary rather than in-persona dialogue.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ooc: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding: Option<Grounding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Reference to a 3D model the companion wants to show.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_url: Option<String>,
}

impl Message {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            sender,
            text: text.into(),
            created_at: Utc::now(),
            ooc: false,
            image: None,
            grounding: None,
            link: None,
            model_url: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, text)
    }

    /// Mark the message as out-of-character.
    pub fn out_of_character(mut self) -> Self {
        self.ooc = true;
        self
    }

    /// Override the creation timestamp.
    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn is_from(&self, sender: Sender) -> bool {
        self.sender == sender
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Attachments
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An image attached to an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAttachment {
    /// Source reference (URL or data URI) returned by the image backend.
    pub url: String,
    /// Prompt the image was generated from.
    pub prompt: String,
    pub created_at: DateTime<Utc>,
    /// Snippet of the conversation the image was generated in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl ImageAttachment {
    pub fn new(url: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            prompt: prompt.into(),
            created_at: Utc::now(),
            context: None,
            tags: BTreeSet::new(),
        }
    }
}

/// Search grounding returned alongside a text reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Grounding {
    #[serde(default)]
    pub sources: Vec<GroundingSource>,
    #[serde(default)]
    pub search_queries: Vec<String>,
}

impl Grounding {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.search_queries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

/// Last-known device location, forwarded to text generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = Message::user("one");
        let b = Message::user("two");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn optional_fields_are_omitted_from_json() {
        let json = serde_json::to_value(Message::assistant("hi")).unwrap();
        assert_eq!(json["sender"], "assistant");
        assert!(json.get("ooc").is_none());
        assert!(json.get("image").is_none());
    }

    #[test]
    fn legacy_message_without_optionals_parses() {
        let raw = r#"{
            "id": "m1",
            "sender": "user",
            "text": "hello",
            "created_at": "2024-06-15T10:00:00Z"
        }"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        assert!(!msg.ooc);
        assert!(msg.image.is_none());
        assert!(msg.is_from(Sender::User));
    }
}
