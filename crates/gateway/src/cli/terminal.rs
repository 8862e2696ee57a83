//! Terminal implementations of the runtime's host seams.
//!
//! "Hidden" is whatever the user says it is: `/away` hides the chat and
//! `/back` shows it again.  Notifications go to stderr with a bell.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use hearth_domain::error::Result;

use crate::runtime::{Environment, Notifier, Permission, SoundCues, Visibility};

pub struct TerminalEnvironment {
    hidden: AtomicBool,
    permission: Mutex<Permission>,
}

impl Default for TerminalEnvironment {
    fn default() -> Self {
        Self {
            hidden: AtomicBool::new(false),
            permission: Mutex::new(Permission::Default),
        }
    }
}

impl TerminalEnvironment {
    pub fn set_visibility(&self, visibility: Visibility) {
        self.hidden
            .store(visibility == Visibility::Hidden, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Environment for TerminalEnvironment {
    fn visibility(&self) -> Visibility {
        if self.hidden.load(Ordering::SeqCst) {
            Visibility::Hidden
        } else {
            Visibility::Visible
        }
    }

    fn notification_permission(&self) -> Permission {
        *self.permission.lock()
    }

    // A terminal can always ring the bell.
    async fn request_notification_permission(&self) -> Permission {
        *self.permission.lock() = Permission::Granted;
        Permission::Granted
    }
}

pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn show(&self, title: &str, body: &str, _icon: Option<&str>) -> Result<()> {
        let mut err = std::io::stderr().lock();
        writeln!(err, "\x07\x1B[1m[{title}]\x1B[0m {body}")?;
        Ok(())
    }
}

pub struct TerminalSounds;

impl SoundCues for TerminalSounds {
    fn play_sent(&self) {}

    fn play_received(&self) {
        let mut err = std::io::stderr();
        let _ = err.write_all(b"\x07");
        let _ = err.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn away_and_back_toggle_visibility() {
        let env = TerminalEnvironment::default();
        assert_eq!(env.visibility(), Visibility::Visible);
        env.set_visibility(Visibility::Hidden);
        assert_eq!(env.visibility(), Visibility::Hidden);
        env.set_visibility(Visibility::Visible);
        assert_eq!(env.visibility(), Visibility::Visible);
    }

    #[tokio::test]
    async fn permission_is_granted_on_request() {
        let env = TerminalEnvironment::default();
        assert_eq!(env.notification_permission(), Permission::Default);
        assert_eq!(
            env.request_notification_permission().await,
            Permission::Granted
        );
        assert_eq!(env.notification_permission(), Permission::Granted);
    }
}
