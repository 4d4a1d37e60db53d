//! Canned [`SignalingApi`] implementation for tests

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::client::SignalingApi;
use super::types::{
    AssetInfo, IceCandidate, IceServersResponse, LoadPipelineResponse, ModelStatus, OfferResponse,
    PipelineLoadParams, PipelineState, PipelineStatusResponse, UploadAssetResponse,
};
use crate::error::{AppError, Result};

/// Scriptable signaling backend recording every call it receives
pub struct MockSignaling {
    /// Model status returned by `get_model_status`
    pub model_downloaded: bool,
    /// Per-call outcomes for `load_pipeline`; `true` makes the call fail.
    /// Exhausted entries mean success.
    pub load_failures: Mutex<VecDeque<bool>>,
    /// Per-poll statuses for `get_pipeline_status`; exhausted entries report
    /// `loaded`.
    pub statuses: Mutex<VecDeque<PipelineStatusResponse>>,
    /// Canned answer for `send_offer`; `None` makes the call fail
    pub offer_response: Mutex<Option<OfferResponse>>,
    /// Every call in arrival order, e.g. `load_pipeline[adapter]`
    pub calls: Mutex<Vec<String>>,
    /// Candidate batches received via `send_ice_candidates`
    pub candidate_batches: Mutex<Vec<Vec<IceCandidate>>>,
    assets: Mutex<Vec<AssetInfo>>,
}

impl Default for MockSignaling {
    fn default() -> Self {
        Self {
            model_downloaded: true,
            load_failures: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(VecDeque::new()),
            offer_response: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            candidate_batches: Mutex::new(Vec::new()),
            assets: Mutex::new(Vec::new()),
        }
    }
}

impl MockSignaling {
    pub fn with_model_downloaded(downloaded: bool) -> Self {
        Self {
            model_downloaded: downloaded,
            ..Self::default()
        }
    }

    /// Queue pipeline poll states, each consumed by one `get_pipeline_status`
    pub fn queue_statuses(&self, states: &[PipelineState]) {
        let mut queue = self.statuses.lock().unwrap();
        for state in states {
            queue.push_back(status_response(*state, None));
        }
    }

    /// Queue an `error` poll status carrying a message
    pub fn queue_error_status(&self, message: &str) {
        self.statuses
            .lock()
            .unwrap()
            .push_back(status_response(PipelineState::Error, Some(message)));
    }

    /// Script the next `load_pipeline` calls; `true` entries fail
    pub fn queue_load_failures(&self, failures: &[bool]) {
        let mut queue = self.load_failures.lock().unwrap();
        for failure in failures {
            queue.push_back(*failure);
        }
    }

    pub fn set_assets(&self, entries: Vec<(&str, &str)>) {
        let mut assets = self.assets.lock().unwrap();
        *assets = entries
            .into_iter()
            .map(|(name, path)| AssetInfo {
                name: name.to_string(),
                path: path.to_string(),
                size_mb: 0.1,
                folder: None,
                kind: "image".to_string(),
                created_at: 0.0,
            })
            .collect();
    }

    pub fn recorded_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

fn status_response(state: PipelineState, error: Option<&str>) -> PipelineStatusResponse {
    PipelineStatusResponse {
        status: state,
        pipeline_id: Some("longlive".to_string()),
        load_params: None,
        loaded_lora_adapters: vec![],
        error: error.map(|e| e.to_string()),
    }
}

#[async_trait]
impl SignalingApi for MockSignaling {
    async fn get_model_status(&self, _pipeline_id: &str) -> Result<ModelStatus> {
        self.record("get_model_status");
        Ok(ModelStatus {
            downloaded: self.model_downloaded,
            progress: None,
        })
    }

    async fn load_pipeline(
        &self,
        _pipeline_id: &str,
        params: &PipelineLoadParams,
    ) -> Result<LoadPipelineResponse> {
        let flavor = if params.loras.is_some() {
            "adapter"
        } else {
            "base"
        };
        self.record(format!("load_pipeline[{}]", flavor));

        let failed = self.load_failures.lock().unwrap().pop_front().unwrap_or(false);
        if failed {
            return Err(AppError::Signaling("load refused".to_string()));
        }
        Ok(LoadPipelineResponse {
            message: "loading".to_string(),
        })
    }

    async fn get_pipeline_status(&self) -> Result<PipelineStatusResponse> {
        self.record("get_pipeline_status");
        let next = self.statuses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| status_response(PipelineState::Loaded, None)))
    }

    async fn get_ice_servers(&self) -> Result<IceServersResponse> {
        self.record("get_ice_servers");
        Ok(IceServersResponse {
            ice_servers: vec![],
        })
    }

    async fn send_offer(
        &self,
        _offer: &super::types::OfferRequest,
    ) -> Result<OfferResponse> {
        self.record("send_offer");
        self.offer_response
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::Signaling("no canned answer".to_string()))
    }

    async fn send_ice_candidates(
        &self,
        _session_id: &str,
        candidates: &[IceCandidate],
    ) -> Result<()> {
        self.record(format!("send_ice_candidates[{}]", candidates.len()));
        self.candidate_batches
            .lock()
            .unwrap()
            .push(candidates.to_vec());
        Ok(())
    }

    async fn upload_asset(&self, filename: &str, _bytes: Vec<u8>) -> Result<UploadAssetResponse> {
        self.record(format!("upload_asset[{}]", filename));
        Ok(UploadAssetResponse {
            path: format!("/assets/{}", filename),
        })
    }

    async fn list_assets(&self) -> Result<Vec<AssetInfo>> {
        self.record("list_assets");
        Ok(self.assets.lock().unwrap().clone())
    }
}
