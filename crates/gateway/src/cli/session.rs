use std::fmt::Write as _;

use hearth_domain::{Sender, Session};

/// Short human-readable summary of a session.
pub fn summary(session: &Session) -> String {
    let mut out = String::new();
    let count = |sender| session.messages.iter().filter(|m| m.sender == sender).count();

    let _ = writeln!(
        out,
        "Companion:     {} ({})",
        session.companion.name, session.companion.relationship
    );
    if !session.user.name.is_empty() {
        let _ = writeln!(out, "User:          {}", session.user.name);
    }
    let _ = writeln!(
        out,
        "Messages:      {} ({} from you, {} from {})",
        session.messages.len(),
        count(Sender::User),
        count(Sender::Assistant),
        session.companion.name
    );
    let _ = writeln!(out, "Memories:      {}", session.memories.len());
    let _ = writeln!(out, "Journal:       {}", session.journal.len());
    let notifications = if session.notifications.enabled {
        format!("{:?}", session.notifications.frequency).to_lowercase()
    } else {
        "disabled".into()
    };
    let _ = writeln!(out, "Notifications: {notifications}");
    match session.last_message_at() {
        Some(at) => {
            let _ = writeln!(out, "Last message:  {}", at.format("%Y-%m-%d %H:%M UTC"));
        }
        None => {
            let _ = writeln!(out, "Last message:  never");
        }
    }
    out
}

pub fn show(session: &Session) {
    print!("{}", summary(session));
}

pub fn export(session: &Session) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(session)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_domain::{Message, NotificationFrequency};

    #[test]
    fn summary_counts_messages_by_sender() {
        let mut session = Session::default();
        session.companion.name = "Mira".into();
        session.push_message(Message::user("hi"));
        session.push_message(Message::assistant("hello"));
        session.push_message(Message::user("how are you"));
        session.notifications.enabled = true;
        session.notifications.frequency = NotificationFrequency::Rarely;

        let text = summary(&session);
        assert!(text.contains("Messages:      3 (2 from you, 1 from Mira)"));
        assert!(text.contains("Notifications: rarely"));
    }

    #[test]
    fn empty_session_has_no_last_message() {
        let text = summary(&Session::default());
        assert!(text.contains("Last message:  never"));
        assert!(text.contains("Notifications: disabled"));
    }
}
