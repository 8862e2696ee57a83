use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session persistence
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where and how often the session is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one JSON document per session key.
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,

    /// Key of the single session this instance owns.
    #[serde(default = "d_session_key")]
    pub session_key: String,

    /// Seconds between background flushes of a dirty session.
    /// `0` disables the periodic flush (the session is still saved on exit).
    #[serde(default = "d_30")]
    pub flush_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
            session_key: d_session_key(),
            flush_interval_secs: 30,
        }
    }
}

fn d_state_path() -> PathBuf {
    PathBuf::from("./data")
}
fn d_session_key() -> String {
    "companion".into()
}
fn d_30() -> u64 {
    30
}
