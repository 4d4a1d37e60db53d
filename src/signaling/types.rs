//! Signaling REST API wire types

use serde::{Deserialize, Serialize};

use crate::session::params::InitialParameters;

/// Model download status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStatus {
    /// Whether the model weights are present on the server
    pub downloaded: bool,
    /// Download progress, when a download is running
    pub progress: Option<f64>,
}

/// Pipeline load request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineLoadRequest {
    /// Pipeline identifier
    pub pipeline_id: String,
    /// Load parameters
    pub load_params: PipelineLoadParams,
}

/// Pipeline load parameters
///
/// Immutable once sent; a new configuration is a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineLoadParams {
    /// Render width in pixels
    pub width: u32,
    /// Render height in pixels
    pub height: u32,
    /// Generation seed
    pub seed: u64,
    /// Quantization mode, `null` for full precision
    pub quantization: Option<String>,
    /// Enable reference conditioning
    pub vace_enabled: bool,
    /// Reference conditioning strength
    pub vace_context_scale: f64,
    /// Adapter merge mode for the whole pipeline
    pub lora_merge_mode: String,
    /// Optional adapter overlays
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loras: Option<Vec<LoraAdapter>>,
}

impl Default for PipelineLoadParams {
    fn default() -> Self {
        Self {
            width: 640,
            height: 352,
            seed: 42,
            quantization: None,
            vace_enabled: true,
            vace_context_scale: 0.5,
            lora_merge_mode: "none".to_string(),
            loras: None,
        }
    }
}

/// Adapter (LoRA) descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoraAdapter {
    /// Server-side path to the adapter weights
    pub path: String,
    /// Adapter strength
    pub scale: f64,
    /// Merge mode for this adapter
    pub merge_mode: String,
}

/// Pipeline load response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadPipelineResponse {
    #[serde(default)]
    pub message: String,
}

/// Pipeline lifecycle state reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Loading,
    Loaded,
    Error,
    /// Forward compatibility with states this client does not know
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "idle"),
            PipelineState::Loading => write!(f, "loading"),
            PipelineState::Loaded => write!(f, "loaded"),
            PipelineState::Error => write!(f, "error"),
            PipelineState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Pipeline status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStatusResponse {
    /// Lifecycle state
    pub status: PipelineState,
    /// Pipeline identifier, when one is loaded or loading
    pub pipeline_id: Option<String>,
    /// Parameters of the active load
    pub load_params: Option<PipelineLoadParams>,
    /// Adapter names the server managed to load
    #[serde(default)]
    pub loaded_lora_adapters: Vec<String>,
    /// Error detail when `status` is `error`
    pub error: Option<String>,
}

/// ICE server descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServer {
    /// Server URLs
    pub urls: Vec<String>,
    /// Username for TURN authentication
    pub username: Option<String>,
    /// Credential for TURN authentication
    pub credential: Option<String>,
}

/// ICE server list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServersResponse {
    #[serde(rename = "iceServers")]
    pub ice_servers: Vec<IceServer>,
}

/// SDP offer request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferRequest {
    /// SDP content
    pub sdp: String,
    /// Always `"offer"`
    #[serde(rename = "type")]
    pub kind: String,
    /// Generation parameters for the session's first frames
    #[serde(rename = "initialParameters")]
    pub initial_parameters: InitialParameters,
}

/// SDP answer response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferResponse {
    /// SDP content
    pub sdp: String,
    /// Always `"answer"`
    #[serde(rename = "type")]
    pub kind: String,
    /// Server-assigned session identifier
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// ICE candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IceCandidate {
    /// SDP-encoded candidate string
    pub candidate: String,
    /// SDP mid (media ID)
    #[serde(rename = "sdpMid")]
    pub sdp_mid: Option<String>,
    /// SDP mline index
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,
}

/// Batched ICE candidate PATCH body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceCandidatesRequest {
    pub candidates: Vec<IceCandidate>,
}

/// Asset upload response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadAssetResponse {
    /// Server-side path of the stored asset
    pub path: String,
}

/// Asset listing entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetInfo {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub size_mb: f64,
    pub folder: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub created_at: f64,
}

/// Asset listing response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsResponse {
    #[serde(default)]
    pub assets: Vec<AssetInfo>,
}
