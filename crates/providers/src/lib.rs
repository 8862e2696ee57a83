//! Generative backend collaborators for Hearth.
//!
//! The runtime only talks to the [`traits`] in this crate; [`rest`] is the
//! HTTP implementation used by the `hearth` binary.

pub mod rest;
pub mod traits;
pub mod types;

pub use rest::RestBackend;
pub use traits::{ImageGenerator, ProactiveGenerator, TextGenerator, TextReply};
