use serde::Serialize;

/// Structured trace events emitted across all Hearth crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionLoaded {
        session_key: String,
        messages: usize,
        restored: bool,
    },
    SessionFlushed {
        session_key: String,
        messages: usize,
    },
    TurnCompleted {
        kind: TurnKind,
        duration_ms: u64,
        has_image: bool,
        grounded: bool,
    },
    TurnFellBack {
        kind: TurnKind,
        duration_ms: u64,
        error: String,
    },
    HistoryTruncated {
        target_id: String,
        removed: usize,
        kept: usize,
    },
    ProactiveSent {
        idle_secs: i64,
        chars: usize,
    },
    ProactiveDiscarded {
        reason: String,
    },
    ProactiveFailed {
        error: String,
    },
    BackendCall {
        endpoint: String,
        status: u16,
        duration_ms: u64,
    },
}

/// Which branch of the message pipeline handled a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    Image,
    Text,
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "hearth_event");
    }
}
