//! Wire types for the companion backend HTTP API.

use hearth_domain::{GeoLocation, Message, Session};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ReplyRequest<'a> {
    pub message: &'a Message,
    pub session: &'a Session,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoLocation>,
}

#[derive(Debug, Serialize)]
pub struct ImageRequest<'a> {
    pub prompt: &'a str,
    pub session: &'a Session,
}

#[derive(Debug, Deserialize)]
pub struct ImageResponse {
    pub image_url: String,
}

#[derive(Debug, Serialize)]
pub struct ProactiveRequest<'a> {
    pub session: &'a Session,
}

#[derive(Debug, Deserialize)]
pub struct ProactiveResponse {
    pub text: String,
}
