//! The session aggregate.
//!
//! One [`Session`] holds everything the companion knows: both profiles,
//! long-term memories, the chat history, journal entries, and the user's
//! settings. The methods here are the transforms the session store applies
//! inside `update`; none of them touch I/O.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{Message, Sender};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Aggregate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub companion: CompanionProfile,
    #[serde(default)]
    pub user: UserProfile,
    #[serde(default)]
    pub memories: Vec<MemoryNote>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub journal: Vec<JournalEntry>,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanionProfile {
    #[serde(default = "d_companion_name")]
    pub name: String,
    #[serde(default)]
    pub persona: String,
    #[serde(default)]
    pub appearance: String,
    /// e.g. "friend", "partner", "mentor".
    #[serde(default = "d_relationship")]
    pub relationship: String,
    #[serde(default)]
    pub reference_image: Option<String>,
    #[serde(default)]
    pub art_style: Option<String>,
}

impl Default for CompanionProfile {
    fn default() -> Self {
        Self {
            name: d_companion_name(),
            persona: String::new(),
            appearance: String::new(),
            relationship: d_relationship(),
            reference_image: None,
            art_style: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bio: String,
}

/// A long-term fact the companion remembers about the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryNote {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub mood: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default = "d_rate")]
    pub rate: f32,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            voice: None,
            rate: d_rate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "d_true")]
    pub sound_effects: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            sound_effects: true,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Notifications
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub frequency: NotificationFrequency,
}

/// How often the companion may reach out on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationFrequency {
    #[default]
    Off,
    Rarely,
    Occasionally,
    Frequently,
    VeryFrequently,
    /// A tier this build does not know, e.g. written by a newer version.
    #[serde(other)]
    Unrecognized,
}

impl NotificationFrequency {
    /// Minimum idle time before a proactive message may fire.
    /// `None` for [`NotificationFrequency::Off`].
    pub fn min_idle(self) -> Option<Duration> {
        match self {
            NotificationFrequency::Off => None,
            NotificationFrequency::Rarely => Some(Duration::hours(6)),
            NotificationFrequency::Occasionally => Some(Duration::hours(2)),
            NotificationFrequency::Frequently => Some(Duration::minutes(45)),
            NotificationFrequency::VeryFrequently => Some(Duration::minutes(10)),
            NotificationFrequency::Unrecognized => Some(Duration::hours(1)),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "off" => Some(NotificationFrequency::Off),
            "rarely" => Some(NotificationFrequency::Rarely),
            "occasionally" => Some(NotificationFrequency::Occasionally),
            "frequently" => Some(NotificationFrequency::Frequently),
            "very_frequently" => Some(NotificationFrequency::VeryFrequently),
            _ => None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transforms
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl Session {
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn position_of(&self, message_id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == message_id)
    }

    /// Keep only the messages strictly before `index`.  Returns how many
    /// were removed.
    pub fn truncate_before(&mut self, index: usize) -> usize {
        let before = self.messages.len();
        self.messages.truncate(index);
        before - self.messages.len()
    }

    /// Replace the text of an existing message.  Returns `false` when the
    /// id is unknown.
    pub fn correct_message_text(&mut self, message_id: &str, text: impl Into<String>) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message_id) {
            Some(msg) => {
                msg.text = text.into();
                true
            }
            None => false,
        }
    }

    /// Replace the tag set on a message's image.  Returns `false` when the
    /// message is unknown or carries no image.
    pub fn tag_image<I, S>(&mut self, message_id: &str, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let Some(image) = self
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .and_then(|m| m.image.as_mut())
        else {
            return false;
        };
        image.tags = tags
            .into_iter()
            .map(|t| {
                let t: String = t.into();
                t.trim().to_owned()
            })
            .filter(|t| !t.is_empty())
            .collect::<BTreeSet<_>>();
        true
    }

    pub fn clear_chat(&mut self) {
        self.messages.clear();
    }

    pub fn add_memory(&mut self, content: impl Into<String>) -> &MemoryNote {
        self.memories.push(MemoryNote {
            id: uuid::Uuid::now_v7().to_string(),
            created_at: Utc::now(),
            content: content.into(),
        });
        &self.memories[self.memories.len() - 1]
    }

    pub fn remove_memory(&mut self, memory_id: &str) -> bool {
        let before = self.memories.len();
        self.memories.retain(|m| m.id != memory_id);
        before != self.memories.len()
    }

    pub fn add_journal_entry(
        &mut self,
        title: impl Into<String>,
        content: impl Into<String>,
        mood: Option<String>,
    ) -> &JournalEntry {
        self.journal.push(JournalEntry {
            id: uuid::Uuid::now_v7().to_string(),
            created_at: Utc::now(),
            title: title.into(),
            content: content.into(),
            mood,
        });
        &self.journal[self.journal.len() - 1]
    }

    // ── queries ──────────────────────────────────────────────────────

    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.messages.last().map(|m| m.created_at)
    }

    /// Time since the last chat message.  An empty history counts as idle
    /// since the Unix epoch.
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        let since = self.last_message_at().unwrap_or(DateTime::UNIX_EPOCH);
        now - since
    }

    /// Text of the `n` most recent messages, oldest first, joined by newlines.
    pub fn recent_context(&self, n: usize) -> String {
        let start = self.messages.len().saturating_sub(n);
        self.messages[start..]
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn last_from(&self, sender: Sender) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.sender == sender)
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_companion_name() -> String {
    "Companion".into()
}
fn d_relationship() -> String {
    "friend".into()
}
fn d_rate() -> f32 {
    1.0
}
fn d_true() -> bool {
    true
}
