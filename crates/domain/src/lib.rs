//! Shared types for the Hearth companion runtime.
//!
//! The session aggregate and its pure transforms, the workspace-wide error
//! type, structured trace events, and the TOML configuration model.

pub mod config;
pub mod error;
pub mod message;
pub mod session;
pub mod trace;

pub use error::{Error, Result};
pub use message::{GeoLocation, Grounding, GroundingSource, ImageAttachment, Message, Sender};
pub use session::{NotificationConfig, NotificationFrequency, Session};
