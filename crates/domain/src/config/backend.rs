use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Generative backend connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Upper bound accepted for [`BackendConfig::max_retries`].
pub const MAX_BACKEND_RETRIES: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,

    /// Environment variable holding the bearer key.  Unset means no
    /// `Authorization` header is sent.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "d_60000")]
    pub timeout_ms: u64,

    /// Extra attempts on 5xx responses and timeouts, at most
    /// [`MAX_BACKEND_RETRIES`].
    #[serde(default = "d_2")]
    pub max_retries: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            api_key_env: d_api_key_env(),
            timeout_ms: 60_000,
            max_retries: 2,
        }
    }
}

impl BackendConfig {
    /// Resolve the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

fn d_base_url() -> String {
    "http://127.0.0.1:8787".into()
}
fn d_api_key_env() -> String {
    "HEARTH_API_KEY".into()
}
fn d_60000() -> u64 {
    60_000
}
fn d_2() -> u32 {
    2
}
