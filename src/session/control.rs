//! Control channel for live parameter updates
//!
//! Messages are idempotent "set latest value" commands over the ordered
//! reliable data channel; in-order delivery relative to send order is all
//! the protocol needs, so there are no acks and no sequence numbers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;

use super::params::PromptItem;
use crate::error::{AppError, Result};

/// A control message sent over the data channel
///
/// Tagged union in code; every variant serializes onto the same flat JSON
/// envelope the pipeline reads, which keeps the wire format stable as
/// message kinds are added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlMessage {
    /// Replace the active prompt set, optionally adjusting the reference
    /// conditioning strength in the same frame
    PromptUpdate {
        prompts: Vec<PromptItem>,
        #[serde(skip_serializing_if = "Option::is_none")]
        vace_context_scale: Option<f64>,
    },
    /// Point the pipeline at previously uploaded reference images
    ReferenceAssets { vace_ref_images: Vec<String> },
    /// Set the reference conditioning strength
    ConditioningScale { vace_context_scale: f64 },
}

impl ControlMessage {
    /// Single full-weight prompt, the common case
    pub fn prompt(text: impl Into<String>) -> Self {
        ControlMessage::PromptUpdate {
            prompts: vec![PromptItem::new(text)],
            vace_context_scale: None,
        }
    }
}

/// Outbound side of the session data channel
#[derive(Clone)]
pub struct ControlChannel {
    channel: Arc<RTCDataChannel>,
}

impl ControlChannel {
    pub fn new(channel: Arc<RTCDataChannel>) -> Self {
        Self { channel }
    }

    /// Send one message as a JSON text frame
    ///
    /// Fails with `ChannelUnavailable` when the channel is not open; the
    /// message is dropped, never queued.
    pub async fn send(&self, message: &ControlMessage) -> Result<()> {
        let state = self.channel.ready_state();
        if state != RTCDataChannelState::Open {
            return Err(AppError::ChannelUnavailable(format!(
                "data channel not open (state: {:?})",
                state
            )));
        }

        let payload = serde_json::to_string(message)?;
        self.channel
            .send_text(payload.clone())
            .await
            .map_err(|e| AppError::ChannelUnavailable(format!("send failed: {}", e)))?;

        debug!(%payload, "sent control message");
        Ok(())
    }
}
