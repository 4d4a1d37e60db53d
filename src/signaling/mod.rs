//! Signaling REST API client
//!
//! Typed wrapper around the scope server's HTTP endpoints: model status,
//! pipeline load/status, ICE server discovery, SDP offer/answer exchange,
//! ICE candidate delivery, and asset upload. No retry or fallback logic
//! lives here; callers own that policy.

pub mod assets;
pub mod client;
#[cfg(test)]
pub mod mock;
pub mod types;

pub use assets::AssetStore;
pub use client::{SignalingApi, SignalingClient};
pub use types::{
    AssetInfo, IceCandidate, IceServer, IceServersResponse, LoraAdapter, ModelStatus,
    OfferRequest, OfferResponse, PipelineLoadParams, PipelineState, PipelineStatusResponse,
};
