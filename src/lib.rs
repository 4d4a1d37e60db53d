//! scope-link - WebRTC session client for AI video pipelines
//!
//! This crate streams a locally produced video feed into a remote AI
//! video-generation pipeline and receives the processed result, while the
//! pipeline stays steerable in real time: text prompts, reference
//! conditioning strength and reference images travel over a low-latency
//! data channel without interrupting the media session.

pub mod config;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod session;
pub mod signaling;

pub use config::{ClientConfig, StyleAdapter};
pub use error::{AppError, Result};
pub use media::MediaStream;
pub use session::{
    ConnectionState, ControlMessage, InitialParametersOverlay, PromptItem, PromptUpdateOptions,
    SessionClient, SessionStatus,
};
