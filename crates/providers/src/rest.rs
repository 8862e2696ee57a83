//! REST implementation of the generator traits.
//!
//! `RestBackend` wraps a `reqwest::Client` and maps each trait method onto a
//! JSON `POST` against the companion backend, with retry + exponential
//! back-off on transient (5xx / timeout / connection) failures.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use hearth_domain::config::BackendConfig;
use hearth_domain::error::{Error, Result};
use hearth_domain::trace::TraceEvent;
use hearth_domain::{GeoLocation, Message, Session};

use crate::traits::{ImageGenerator, ProactiveGenerator, TextGenerator, TextReply};
use crate::types::{ImageRequest, ImageResponse, ProactiveRequest, ProactiveResponse, ReplyRequest};

const PROVIDER: &str = "backend";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// HTTP client for the companion backend.
///
/// Created once at startup; the inner `reqwest::Client` keeps a
/// connection pool.
#[derive(Debug, Clone)]
pub struct RestBackend {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
}

impl RestBackend {
    pub fn new(cfg: &BackendConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            api_key: cfg.api_key(),
            max_retries: cfg.max_retries,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn decorate(&self, rb: RequestBuilder) -> RequestBuilder {
        let rb = rb
            .header("X-Client-Type", "hearth")
            .header("X-Trace-Id", Uuid::new_v4().to_string());
        match self.api_key {
            Some(ref key) => rb.bearer_auth(key),
            None => rb,
        }
    }

    /// Execute a request with retry + exponential back-off.
    ///
    /// * Retries on 5xx, timeouts, and connection errors.
    /// * Never retries 4xx.
    /// * Emits a `TraceEvent::BackendCall` after every attempt.
    async fn execute_with_retry(
        &self,
        endpoint: &str,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff(attempt)).await;
            }

            let start = Instant::now();
            let result = self.decorate(build_request()).send().await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    TraceEvent::BackendCall {
                        endpoint: endpoint.to_owned(),
                        status: status.as_u16(),
                        duration_ms,
                    }
                    .emit();

                    if status.is_server_error() {
                        let body = resp.text().await.unwrap_or_default();
                        last_err = Some(provider_error(format!(
                            "{endpoint} returned {status}: {body}"
                        )));
                        continue;
                    }

                    if status.is_client_error() {
                        let body = resp.text().await.unwrap_or_default();
                        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                            return Err(provider_error(format!(
                                "{endpoint} rejected credentials ({status})"
                            )));
                        }
                        return Err(provider_error(format!(
                            "{endpoint} returned {status}: {body}"
                        )));
                    }

                    return Ok(resp);
                }
                Err(e) => {
                    TraceEvent::BackendCall {
                        endpoint: endpoint.to_owned(),
                        status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                        duration_ms,
                    }
                    .emit();
                    tracing::debug!(endpoint, attempt, error = %e, "backend request failed");
                    last_err = Some(from_reqwest(e));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| provider_error(format!("{endpoint}: all retries exhausted"))))
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &(impl serde::Serialize + Sync),
    ) -> Result<T> {
        let url = self.url(path);
        let endpoint = format!("POST {path}");
        let resp = self
            .execute_with_retry(&endpoint, || self.http.post(&url).json(body))
            .await?;

        let raw = resp.text().await.map_err(from_reqwest)?;
        serde_json::from_str(&raw)
            .map_err(|e| provider_error(format!("failed to parse {path} response: {e}")))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl TextGenerator for RestBackend {
    async fn generate_reply(
        &self,
        message: &Message,
        session: &Session,
        location: Option<GeoLocation>,
    ) -> Result<TextReply> {
        let req = ReplyRequest {
            message,
            session,
            location,
        };
        self.post_json("/v1/reply", &req).await
    }
}

#[async_trait]
impl ImageGenerator for RestBackend {
    async fn generate_image(&self, prompt: &str, session: &Session) -> Result<String> {
        let req = ImageRequest { prompt, session };
        let resp: ImageResponse = self.post_json("/v1/image", &req).await?;
        Ok(resp.image_url)
    }
}

#[async_trait]
impl ProactiveGenerator for RestBackend {
    async fn generate_proactive(&self, session: &Session) -> Result<String> {
        let req = ProactiveRequest { session };
        let resp: ProactiveResponse = self.post_json("/v1/proactive", &req).await?;
        Ok(resp.text)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error conversion helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn provider_error(message: String) -> Error {
    Error::Provider {
        provider: PROVIDER.into(),
        message,
    }
}

/// Timeout errors become `Error::Timeout`; everything else `Error::Http`.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Longest wait between two attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Delay before retry number `attempt` (1-based): 250ms doubling per
/// attempt, capped at [`MAX_BACKOFF`].
fn backoff(attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(250u64.saturating_mul(factor)).min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let cfg = BackendConfig {
            base_url: "https://companion.example.com/".into(),
            ..BackendConfig::default()
        };
        let backend = RestBackend::new(&cfg).unwrap();
        assert_eq!(backend.url("/v1/reply"), "https://companion.example.com/v1/reply");
    }

    #[test]
    fn reply_parses_with_only_text() {
        let reply: TextReply = serde_json::from_str(r#"{"text": "hey there"}"#).unwrap();
        assert_eq!(reply, TextReply::text("hey there"));
    }

    #[test]
    fn reply_parses_companion_image() {
        let raw = r#"{
            "text": "here I am at the beach",
            "image_url": "https://img/beach.png",
            "image_prompt": "selfie at the beach",
            "ooc": false
        }"#;
        let reply: TextReply = serde_json::from_str(raw).unwrap();
        assert_eq!(reply.image_url.as_deref(), Some("https://img/beach.png"));
        assert_eq!(reply.image_prompt.as_deref(), Some("selfie at the beach"));
    }

    #[tokio::test]
    async fn unreachable_backend_is_an_error() {
        let cfg = BackendConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout_ms: 500,
            max_retries: 0,
            ..BackendConfig::default()
        };
        let backend = RestBackend::new(&cfg).unwrap();
        let result = backend.generate_proactive(&Session::default()).await;
        assert!(matches!(result, Err(Error::Http(_)) | Err(Error::Timeout(_))));
    }

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff(1), Duration::from_millis(250));
        assert_eq!(backoff(2), Duration::from_millis(500));
        assert_eq!(backoff(4), Duration::from_secs(2));
        assert_eq!(backoff(10), MAX_BACKOFF);
    }

    #[test]
    fn backoff_survives_huge_retry_counts() {
        for attempt in [63, 64, 65, 200, u32::MAX] {
            assert_eq!(backoff(attempt), MAX_BACKOFF);
        }
    }
}
