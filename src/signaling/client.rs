//! Typed client for the scope server REST API

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::types::{
    AssetInfo, AssetsResponse, IceCandidate, IceCandidatesRequest, IceServersResponse,
    LoadPipelineResponse, ModelStatus, OfferRequest, OfferResponse, PipelineLoadParams,
    PipelineLoadRequest, PipelineStatusResponse, UploadAssetResponse,
};
use crate::error::{AppError, Result};

/// REST operations against the scope server
///
/// One method per endpoint, typed request and response, no retries and no
/// interpretation of the results. Retry and fallback policy belongs to the
/// caller.
#[async_trait]
pub trait SignalingApi: Send + Sync {
    /// Query whether the model weights for a pipeline are downloaded
    async fn get_model_status(&self, pipeline_id: &str) -> Result<ModelStatus>;

    /// Ask the server to load a pipeline with the given parameters
    async fn load_pipeline(
        &self,
        pipeline_id: &str,
        params: &PipelineLoadParams,
    ) -> Result<LoadPipelineResponse>;

    /// Query the lifecycle state of the active pipeline load
    async fn get_pipeline_status(&self) -> Result<PipelineStatusResponse>;

    /// Fetch the ICE server list for peer connection setup
    async fn get_ice_servers(&self) -> Result<IceServersResponse>;

    /// Submit an SDP offer plus initial parameters, returning the answer
    async fn send_offer(&self, offer: &OfferRequest) -> Result<OfferResponse>;

    /// Send one batch of locally gathered ICE candidates
    async fn send_ice_candidates(
        &self,
        session_id: &str,
        candidates: &[IceCandidate],
    ) -> Result<()>;

    /// Upload raw asset bytes, returning the server-side path
    async fn upload_asset(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadAssetResponse>;

    /// List assets stored on the server
    async fn list_assets(&self) -> Result<Vec<AssetInfo>>;
}

/// HTTP implementation of [`SignalingApi`]
pub struct SignalingClient {
    client: reqwest::Client,
    base_url: String,
}

impl SignalingClient {
    /// Create a client for the given server base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Signaling(format!("Failed to fetch {}: {}", url, e)))?
            .error_for_status()
            .map_err(|e| AppError::Signaling(format!("Request failed {}: {}", url, e)))?;

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::Signaling(format!("Invalid response from {}: {}", url, e)))
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Signaling(format!("Failed to post {}: {}", url, e)))?
            .error_for_status()
            .map_err(|e| AppError::Signaling(format!("Request failed {}: {}", url, e)))?;

        response
            .json::<T>()
            .await
            .map_err(|e| AppError::Signaling(format!("Invalid response from {}: {}", url, e)))
    }
}

#[async_trait]
impl SignalingApi for SignalingClient {
    async fn get_model_status(&self, pipeline_id: &str) -> Result<ModelStatus> {
        let path = format!(
            "/api/v1/models/status?pipeline_id={}",
            urlencoding::encode(pipeline_id)
        );
        self.fetch_json(&path).await
    }

    async fn load_pipeline(
        &self,
        pipeline_id: &str,
        params: &PipelineLoadParams,
    ) -> Result<LoadPipelineResponse> {
        let request = PipelineLoadRequest {
            pipeline_id: pipeline_id.to_string(),
            load_params: params.clone(),
        };
        self.post_json("/api/v1/pipeline/load", &request).await
    }

    async fn get_pipeline_status(&self) -> Result<PipelineStatusResponse> {
        self.fetch_json("/api/v1/pipeline/status").await
    }

    async fn get_ice_servers(&self) -> Result<IceServersResponse> {
        self.fetch_json("/api/v1/webrtc/ice-servers").await
    }

    async fn send_offer(&self, offer: &OfferRequest) -> Result<OfferResponse> {
        self.post_json("/api/v1/webrtc/offer", offer).await
    }

    async fn send_ice_candidates(
        &self,
        session_id: &str,
        candidates: &[IceCandidate],
    ) -> Result<()> {
        let url = self.url(&format!("/api/v1/webrtc/offer/{}", session_id));
        let body = IceCandidatesRequest {
            candidates: candidates.to_vec(),
        };

        self.client
            .patch(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Signaling(format!("Failed to patch {}: {}", url, e)))?
            .error_for_status()
            .map_err(|e| AppError::Signaling(format!("Request failed {}: {}", url, e)))?;

        debug!(count = candidates.len(), "sent ICE candidate batch");
        Ok(())
    }

    async fn upload_asset(&self, filename: &str, bytes: Vec<u8>) -> Result<UploadAssetResponse> {
        let url = self.url(&format!(
            "/api/v1/assets?filename={}",
            urlencoding::encode(filename)
        ));
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::Signaling(format!("Failed to upload {}: {}", filename, e)))?
            .error_for_status()
            .map_err(|e| AppError::Signaling(format!("Upload failed for {}: {}", filename, e)))?;

        response
            .json::<UploadAssetResponse>()
            .await
            .map_err(|e| AppError::Signaling(format!("Invalid upload response: {}", e)))
    }

    async fn list_assets(&self) -> Result<Vec<AssetInfo>> {
        let response: AssetsResponse = self.fetch_json("/api/v1/assets").await?;
        Ok(response.assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = SignalingClient::new("http://scope.local:8000/");
        assert_eq!(
            client.url("/api/v1/pipeline/status"),
            "http://scope.local:8000/api/v1/pipeline/status"
        );
    }

    #[test]
    fn asset_filename_is_percent_encoded() {
        let client = SignalingClient::new("http://scope.local:8000");
        let url = client.url(&format!(
            "/api/v1/assets?filename={}",
            urlencoding::encode("ref image.png")
        ));
        assert_eq!(
            url,
            "http://scope.local:8000/api/v1/assets?filename=ref%20image.png"
        );
    }
}
