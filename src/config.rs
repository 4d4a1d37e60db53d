//! Client configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::signaling::types::{LoraAdapter, PipelineLoadParams};

/// Default scope server URL (local development server)
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Default pipeline identifier
const DEFAULT_PIPELINE_ID: &str = "longlive";

/// Merge mode requested when loading a style adapter
const ADAPTER_MERGE_MODE: &str = "permanent_merge";

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the scope server REST API
    pub base_url: String,
    /// Pipeline identifier to load
    pub pipeline_id: String,
    /// Pipeline status poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Maximum number of pipeline status polls before giving up
    pub max_poll_attempts: u32,
    /// Optional style adapter; when set, the pipeline is first loaded with it
    /// and falls back to the plain configuration if that fails
    pub style_adapter: Option<StyleAdapter>,
    /// Local reference images to upload for reference conditioning
    pub reference_images: Vec<PathBuf>,
    /// Base pipeline load parameters (the fallback configuration)
    pub load_params: PipelineLoadParams,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            pipeline_id: DEFAULT_PIPELINE_ID.to_string(),
            poll_interval_ms: 1000,
            max_poll_attempts: 60,
            style_adapter: None,
            reference_images: vec![],
            load_params: PipelineLoadParams::default(),
        }
    }
}

impl ClientConfig {
    /// Build a config from defaults plus environment overrides
    ///
    /// `SCOPE_URL` overrides the server base URL, `SCOPE_PIPELINE_ID` the
    /// pipeline, and `SCOPE_ADAPTER_PATH` enables the style adapter.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(url) = env_nonempty("SCOPE_URL") {
            config.base_url = url;
        }
        if let Some(id) = env_nonempty("SCOPE_PIPELINE_ID") {
            config.pipeline_id = id;
        }
        if let Some(path) = env_nonempty("SCOPE_ADAPTER_PATH") {
            config.style_adapter = Some(StyleAdapter::new(path));
        }

        config
    }

    /// Fallback load parameters (no style adapter)
    pub fn fallback_load_params(&self) -> PipelineLoadParams {
        self.load_params.clone()
    }

    /// Preferred load parameters, including the style adapter when configured
    ///
    /// Returns `None` when no adapter is configured; the caller then loads the
    /// fallback configuration directly and no degradation path exists.
    pub fn preferred_load_params(&self) -> Option<PipelineLoadParams> {
        let adapter = self.style_adapter.as_ref()?;

        let mut params = self.load_params.clone();
        params.lora_merge_mode = ADAPTER_MERGE_MODE.to_string();
        params.loras = Some(vec![LoraAdapter {
            path: adapter.path.clone(),
            scale: adapter.scale,
            merge_mode: ADAPTER_MERGE_MODE.to_string(),
        }]);
        Some(params)
    }
}

/// Optional style adapter (LoRA weight overlay) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleAdapter {
    /// Server-side path to the adapter weights
    pub path: String,
    /// Adapter strength
    pub scale: f64,
}

impl StyleAdapter {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            scale: 1.0,
        }
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferred_params_carry_the_adapter() {
        let mut config = ClientConfig::default();
        assert!(config.preferred_load_params().is_none());

        config.style_adapter = Some(StyleAdapter::new("/models/lora/cinematic.safetensors"));
        let preferred = config.preferred_load_params().unwrap();
        assert_eq!(preferred.lora_merge_mode, "permanent_merge");
        let loras = preferred.loras.unwrap();
        assert_eq!(loras.len(), 1);
        assert_eq!(loras[0].path, "/models/lora/cinematic.safetensors");
        assert_eq!(loras[0].scale, 1.0);

        // Fallback stays adapter-free
        let fallback = config.fallback_load_params();
        assert!(fallback.loras.is_none());
        assert_eq!(fallback.lora_merge_mode, "none");
    }
}
