//! Pipeline readiness control
//!
//! Drives a remote pipeline load to a terminal loaded-or-failed decision:
//! verify the model is downloaded, issue the load (preferring the style
//! adapter configuration when one exists), then poll the status endpoint on
//! a bounded budget. A load that errors while the adapter configuration is
//! active degrades once to the plain configuration; a second error is fatal.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{AppError, Result};
use crate::signaling::client::SignalingApi;
use crate::signaling::types::{PipelineLoadParams, PipelineState};

/// Which load configuration ended up active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveConfig {
    /// The preferred configuration, including the style adapter
    Preferred,
    /// The plain configuration without the adapter
    Fallback,
}

impl std::fmt::Display for ActiveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActiveConfig::Preferred => write!(f, "with style adapter"),
            ActiveConfig::Fallback => write!(f, "without style adapter"),
        }
    }
}

/// Drives a pipeline load to `loaded` or a terminal error
pub struct ReadinessController<'a> {
    api: &'a dyn SignalingApi,
    pipeline_id: String,
    preferred: Option<PipelineLoadParams>,
    fallback: PipelineLoadParams,
    poll_interval: Duration,
    max_attempts: u32,
}

impl<'a> ReadinessController<'a> {
    pub fn new(api: &'a dyn SignalingApi, config: &ClientConfig) -> Self {
        Self {
            api,
            pipeline_id: config.pipeline_id.clone(),
            preferred: config.preferred_load_params(),
            fallback: config.fallback_load_params(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_attempts: config.max_poll_attempts,
        }
    }

    /// Fail fast when the model weights are not on the server
    pub async fn check_model(&self) -> Result<()> {
        let status = self.api.get_model_status(&self.pipeline_id).await?;
        debug!(
            downloaded = status.downloaded,
            progress = ?status.progress,
            "model status"
        );
        if !status.downloaded {
            return Err(AppError::ModelNotReady);
        }
        Ok(())
    }

    /// Issue the load, preferring the adapter configuration
    ///
    /// A preferred load whose request itself fails is retried immediately
    /// with the fallback configuration.
    pub async fn start_load(&self) -> Result<ActiveConfig> {
        match &self.preferred {
            Some(preferred) => match self.api.load_pipeline(&self.pipeline_id, preferred).await {
                Ok(_) => {
                    info!("pipeline load issued with style adapter");
                    Ok(ActiveConfig::Preferred)
                }
                Err(e) => {
                    warn!("adapter load request failed, retrying without: {}", e);
                    self.api
                        .load_pipeline(&self.pipeline_id, &self.fallback)
                        .await?;
                    Ok(ActiveConfig::Fallback)
                }
            },
            None => {
                self.api
                    .load_pipeline(&self.pipeline_id, &self.fallback)
                    .await?;
                Ok(ActiveConfig::Fallback)
            }
        }
    }

    /// Poll until the pipeline reports `loaded`, degrading at most once
    pub async fn wait_loaded(&self, mut active: ActiveConfig) -> Result<ActiveConfig> {
        let mut attempts = 0u32;

        while attempts < self.max_attempts {
            let status = self.api.get_pipeline_status().await?;
            debug!(status = %status.status, "pipeline status");

            match status.status {
                PipelineState::Loaded => {
                    info!("pipeline loaded {}", active);
                    return Ok(active);
                }
                PipelineState::Error => {
                    if active == ActiveConfig::Preferred {
                        warn!("pipeline error with style adapter, retrying without");
                        self.api
                            .load_pipeline(&self.pipeline_id, &self.fallback)
                            .await?;
                        active = ActiveConfig::Fallback;
                        attempts = 0;
                    } else {
                        return Err(AppError::PipelineLoad(
                            status.error.unwrap_or_else(|| "Pipeline error".to_string()),
                        ));
                    }
                }
                _ => {
                    tokio::time::sleep(self.poll_interval).await;
                    attempts += 1;
                }
            }
        }

        Err(AppError::PipelineTimeout)
    }

    /// Full readiness sequence: model check, load, poll to terminal state
    pub async fn ensure_ready(&self) -> Result<ActiveConfig> {
        self.check_model().await?;
        let active = self.start_load().await?;
        self.wait_loaded(active).await
    }
}
