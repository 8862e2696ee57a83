//! Regenerate an assistant answer: cut history back to the prompt that
//! produced it, then replay that prompt through the pipeline.

use std::sync::Arc;

use hearth_domain::trace::TraceEvent;
use hearth_domain::Sender;
use hearth_sessions::SessionStore;

use super::gate::GenerationGate;
use super::pipeline::{MessagePipeline, TurnOutcome};

pub struct RegenerationController {
    store: Arc<SessionStore>,
    gate: Arc<GenerationGate>,
    pipeline: Arc<MessagePipeline>,
}

impl RegenerationController {
    pub fn new(
        store: Arc<SessionStore>,
        gate: Arc<GenerationGate>,
        pipeline: Arc<MessagePipeline>,
    ) -> Self {
        Self {
            store,
            gate,
            pipeline,
        }
    }

    /// Replace the assistant message `message_id` with a fresh answer.
    ///
    /// Returns `None` without touching history when the id is unknown, names
    /// the first message, or names a user message.  Returns
    /// `Some(TurnOutcome::Busy)` while another generation or a proactive send
    /// is running.
    pub async fn regenerate(&self, message_id: &str) -> Option<TurnOutcome> {
        // Held from before the truncation until the replayed turn ends.
        let permit = match self.gate.try_acquire_generation() {
            Ok(permit) => permit,
            Err(busy) => {
                tracing::debug!(message_id, "{busy}, regenerate ignored");
                return Some(TurnOutcome::Busy);
            }
        };

        let (prompt, removed, kept) = self.store.try_update(|s| {
            let index = s.position_of(message_id)?;
            if index == 0 || s.messages[index].sender != Sender::Assistant {
                return None;
            }
            let prompt = s.messages[index - 1].clone();
            let removed = s.truncate_before(index);
            Some((prompt, removed, s.messages.len()))
        })?;

        TraceEvent::HistoryTruncated {
            target_id: message_id.to_owned(),
            removed,
            kept,
        }
        .emit();

        Some(self.pipeline.run_turn(permit, prompt).await)
    }
}
