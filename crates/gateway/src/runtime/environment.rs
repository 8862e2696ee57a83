//! Host-environment seams: visibility, notification permission and
//! delivery, and sound cues.
//!
//! The runtime only observes these; the front end (terminal, desktop shell,
//! test fake) decides what they mean.

use hearth_domain::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Not asked yet.
    Default,
    Granted,
    Denied,
}

#[async_trait::async_trait]
pub trait Environment: Send + Sync {
    fn visibility(&self) -> Visibility;

    fn notification_permission(&self) -> Permission;

    /// Prompt for notification permission and return the resulting state.
    async fn request_notification_permission(&self) -> Permission;
}

/// Native notification delivery.
pub trait Notifier: Send + Sync {
    fn show(&self, title: &str, body: &str, icon: Option<&str>) -> Result<()>;
}

pub trait SoundCues: Send + Sync {
    fn play_sent(&self);
    fn play_received(&self);
}

/// Sound cues that do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl SoundCues for Silent {
    fn play_sent(&self) {}
    fn play_received(&self) {}
}
