//! Session facade
//!
//! Owns the externally observable [`SessionStatus`] and composes pipeline
//! readiness, negotiation, the control channel and track replacement behind
//! a small operation surface: `connect`, `disconnect`, the control updates,
//! and `replace_video_track`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, error, info, warn};
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_remote::TrackRemote;

use super::control::{ControlChannel, ControlMessage};
use super::handle::SessionHandle;
use super::params::{merge_parameters, InitialParametersOverlay, PromptItem};
use super::peer::{self, HandlerContext, RemoteTrackCallback};
use super::state::{transition, SessionStatus, StateEvent};
use crate::config::ClientConfig;
use crate::error::{AppError, Result};
use crate::media::MediaStream;
use crate::pipeline::ReadinessController;
use crate::signaling::assets::AssetStore;
use crate::signaling::client::{SignalingApi, SignalingClient};
use crate::signaling::types::OfferRequest;

/// Options for a prompt update
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptUpdateOptions {
    /// Prompt weight; full weight when unset
    pub weight: Option<u32>,
    /// Reference conditioning strength to apply with the prompt
    pub conditioning_scale: Option<f64>,
}

/// Client for one scope server
///
/// Drives the whole session lifecycle. At most one session is live at a
/// time; a second `connect` while one is in flight is rejected.
pub struct SessionClient {
    config: ClientConfig,
    api: Arc<dyn SignalingApi>,
    assets: AssetStore,
    status: Arc<watch::Sender<SessionStatus>>,
    status_rx: watch::Receiver<SessionStatus>,
    handle: Arc<RwLock<Option<SessionHandle>>>,
    /// Bumped on every connect and disconnect; handlers created for an older
    /// generation discard their updates
    generation: Arc<AtomicU64>,
    on_remote_track: Option<Arc<RemoteTrackCallback>>,
}

impl SessionClient {
    /// Create a client talking HTTP to the configured server
    pub fn new(config: ClientConfig) -> Self {
        let api = Arc::new(SignalingClient::new(config.base_url.clone()));
        Self::with_api(config, api)
    }

    /// Create a client over any signaling backend
    pub fn with_api(config: ClientConfig, api: Arc<dyn SignalingApi>) -> Self {
        let (status, status_rx) = watch::channel(SessionStatus::default());
        Self {
            assets: AssetStore::new(api.clone()),
            config,
            api,
            status: Arc::new(status),
            status_rx,
            handle: Arc::new(RwLock::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            on_remote_track: None,
        }
    }

    /// Install a sink for remote tracks the pipeline sends back
    pub fn with_remote_track_handler(
        mut self,
        handler: impl Fn(Arc<TrackRemote>) + Send + Sync + 'static,
    ) -> Self {
        self.on_remote_track = Some(Arc::new(handler));
        self
    }

    /// Current status snapshot
    pub fn status(&self) -> SessionStatus {
        self.status_rx.borrow().clone()
    }

    /// Subscribe to status changes
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status_rx.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status_rx.borrow().is_connected()
    }

    /// Server-assigned session id of the live session
    pub async fn session_id(&self) -> Option<String> {
        let guard = self.handle.read().await;
        guard
            .as_ref()
            .and_then(|h| h.session_id().map(|s| s.to_string()))
    }

    /// Reference asset store (upload and path resolution)
    pub fn assets(&self) -> &AssetStore {
        &self.assets
    }

    /// Upload the configured reference images
    pub async fn upload_reference_images(&self) -> Result<usize> {
        self.assets
            .upload_reference_images(&self.config.reference_images)
            .await
    }

    /// Establish a session: pipeline readiness, then WebRTC negotiation
    ///
    /// Returns once signaling is complete; the status turns `connected` when
    /// the transport itself reports connected. Any failure sets the `error`
    /// status with a human-readable message and tears the attempt down.
    pub async fn connect(
        &self,
        stream: &MediaStream,
        overlay: InitialParametersOverlay,
    ) -> Result<()> {
        let started = self.status.send_if_modified(|status| {
            match transition(status.state, StateEvent::ConnectStarted) {
                Some(next) => {
                    *status = SessionStatus {
                        state: next,
                        error: None,
                    };
                    true
                }
                None => false,
            }
        });
        if !started {
            return Err(AppError::Negotiation(
                "connect already in progress".to_string(),
            ));
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(generation, "connecting to {}", self.config.base_url);

        match self.run_connect(generation, stream, overlay).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.fail(generation, &e).await;
                Err(e)
            }
        }
    }

    async fn run_connect(
        &self,
        generation: u64,
        stream: &MediaStream,
        overlay: InitialParametersOverlay,
    ) -> Result<()> {
        let readiness = ReadinessController::new(self.api.as_ref(), &self.config);

        readiness.check_model().await?;
        self.advance(generation, StateEvent::ModelChecked)?;

        let active = readiness.start_load().await?;
        self.advance(generation, StateEvent::PipelineLoadIssued)?;

        let active = readiness.wait_loaded(active).await?;
        info!("pipeline ready {}", active);
        self.advance(generation, StateEvent::PipelineReady)?;

        let ice = self.api.get_ice_servers().await?;
        self.advance(generation, StateEvent::IceServersFetched)?;

        let pc = peer::create_peer_connection(ice.ice_servers).await?;
        let candidates = Arc::new(Mutex::new(Vec::new()));
        peer::wire_handlers(
            &pc,
            HandlerContext {
                status: self.status.clone(),
                generation,
                current_generation: self.generation.clone(),
                on_remote_track: self.on_remote_track.clone(),
                candidates: candidates.clone(),
            },
        );

        for track in stream.tracks() {
            pc.add_track(track.clone())
                .await
                .map_err(|e| AppError::Negotiation(format!("Failed to add track: {}", e)))?;
            debug!(kind = ?track.kind(), "added local track");
        }

        let dc = pc
            .create_data_channel("data", None)
            .await
            .map_err(|e| AppError::Negotiation(format!("Failed to create data channel: {}", e)))?;
        peer::wire_data_channel_logging(&dc);

        // From here a handle exists and disconnect() can find the connection
        {
            let mut guard = self.handle.write().await;
            if self.generation.load(Ordering::SeqCst) != generation {
                // Torn down while we were building; do not leak the peer
                let _ = pc.close().await;
                return Err(AppError::Negotiation("session superseded".to_string()));
            }
            *guard = Some(SessionHandle::new(
                generation,
                pc.clone(),
                ControlChannel::new(dc),
                candidates.clone(),
            ));
        }

        let offer = pc
            .create_offer(None)
            .await
            .map_err(|e| AppError::Negotiation(format!("Failed to create offer: {}", e)))?;
        pc.set_local_description(offer.clone())
            .await
            .map_err(|e| {
                AppError::Negotiation(format!("Failed to set local description: {}", e))
            })?;

        let request = OfferRequest {
            sdp: offer.sdp,
            kind: "offer".to_string(),
            initial_parameters: merge_parameters(&overlay),
        };
        let answer = self.api.send_offer(&request).await?;
        debug!(session_id = %answer.session_id, "received answer");

        let remote = RTCSessionDescription::answer(answer.sdp)
            .map_err(|e| AppError::Negotiation(format!("Invalid SDP answer: {}", e)))?;
        pc.set_remote_description(remote).await.map_err(|e| {
            AppError::Negotiation(format!("Failed to set remote description: {}", e))
        })?;

        {
            let mut guard = self.handle.write().await;
            if let Some(handle) = guard.as_mut() {
                if handle.generation() == generation {
                    handle.set_session_id(answer.session_id.clone());
                }
            }
        }

        // Event-driven wait for the end of gathering, then one batch PATCH;
        // candidates never go out individually.
        let mut gathered = pc.gathering_complete_promise().await;
        let _ = gathered.recv().await;

        let batch: Vec<_> = candidates.lock().await.drain(..).collect();
        info!(count = batch.len(), "ICE gathering complete");
        if batch.is_empty() {
            warn!("no ICE candidates gathered");
        } else if let Err(e) = self
            .api
            .send_ice_candidates(&answer.session_id, &batch)
            .await
        {
            // Candidates already carried in the offer may suffice
            warn!("failed to send ICE candidate batch: {}", e);
        }

        info!("signaling complete, waiting for transport");
        Ok(())
    }

    fn advance(&self, generation: u64, event: StateEvent) -> Result<()> {
        if self.generation.load(Ordering::SeqCst) != generation {
            return Err(AppError::Negotiation("session superseded".to_string()));
        }
        self.status
            .send_if_modified(|status| match transition(status.state, event) {
                Some(next) => {
                    status.state = next;
                    true
                }
                None => {
                    warn!(state = %status.state, ?event, "ignoring illegal state transition");
                    false
                }
            });
        Ok(())
    }

    async fn fail(&self, generation: u64, error: &AppError) {
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("discarding failure from superseded session: {}", error);
            return;
        }

        // Tear down whatever this attempt built; no dangling peer connection
        let stale = {
            let mut guard = self.handle.write().await;
            let owned_by_attempt = guard
                .as_ref()
                .map(|h| h.generation() == generation)
                .unwrap_or(false);
            if owned_by_attempt {
                guard.take()
            } else {
                None
            }
        };
        if let Some(handle) = stale {
            handle.close().await;
        }

        error!("connection failed: {}", error);
        self.status
            .send_if_modified(|status| match transition(status.state, StateEvent::Failed) {
                Some(next) => {
                    status.state = next;
                    status.error = Some(error.to_string());
                    true
                }
                None => false,
            });
    }

    /// Tear the session down unconditionally and return to `idle`
    pub async fn disconnect(&self) {
        // Invalidate in-flight handlers and awaited steps first
        self.generation.fetch_add(1, Ordering::SeqCst);

        let handle = self.handle.write().await.take();
        if let Some(handle) = handle {
            handle.close().await;
        }

        self.status.send_replace(SessionStatus::default());
        info!("session disconnected");
    }

    /// Send a raw control message over the data channel
    pub async fn send_control(&self, message: &ControlMessage) -> Result<()> {
        let guard = self.handle.read().await;
        match guard.as_ref() {
            Some(handle) => handle.control().send(message).await,
            None => {
                warn!("control message dropped: no active session");
                Err(AppError::ChannelUnavailable(
                    "no active session".to_string(),
                ))
            }
        }
    }

    /// Replace the active prompt without renegotiating
    pub async fn update_prompt(
        &self,
        text: impl Into<String>,
        options: PromptUpdateOptions,
    ) -> Result<()> {
        let message = ControlMessage::PromptUpdate {
            prompts: vec![PromptItem::weighted(text, options.weight.unwrap_or(100))],
            vace_context_scale: options.conditioning_scale,
        };
        self.send_control(&message).await
    }

    /// Set the reference conditioning strength
    pub async fn update_conditioning_scale(&self, scale: f64) -> Result<()> {
        self.send_control(&ControlMessage::ConditioningScale {
            vace_context_scale: scale,
        })
        .await
    }

    /// Point the pipeline at uploaded reference images by asset name
    ///
    /// Unresolved names are skipped with a warning; an empty name list
    /// clears the reference set.
    pub async fn send_reference_assets(&self, names: &[&str]) -> Result<()> {
        let paths = self.assets.resolve_all(names);
        if paths.is_empty() && !names.is_empty() {
            return Err(AppError::Media(
                "none of the requested reference assets are uploaded".to_string(),
            ));
        }
        self.send_control(&ControlMessage::ReferenceAssets {
            vace_ref_images: paths,
        })
        .await
    }

    /// Swap the outbound video track on the live session
    ///
    /// No renegotiation happens; returns `false` when there is no live
    /// session, the stream has no video track, or no video sender exists.
    pub async fn replace_video_track(&self, stream: &MediaStream) -> bool {
        let guard = self.handle.read().await;
        let Some(handle) = guard.as_ref() else {
            warn!("cannot replace video track: no active session");
            return false;
        };
        replace_on_peer(handle.peer(), stream).await
    }
}

/// Locate the outbound video sender and swap its track
pub(crate) async fn replace_on_peer(pc: &RTCPeerConnection, stream: &MediaStream) -> bool {
    let Some(new_track) = stream.first_video_track() else {
        warn!("no video track in replacement stream");
        return false;
    };

    for sender in pc.get_senders().await {
        let is_video = match sender.track().await {
            Some(track) => track.kind() == RTPCodecType::Video,
            None => false,
        };
        if !is_video {
            continue;
        }

        return match sender.replace_track(Some(new_track.clone())).await {
            Ok(()) => {
                info!("outbound video track replaced");
                true
            }
            Err(e) => {
                warn!("failed to replace video track: {}", e);
                false
            }
        };
    }

    warn!("no video sender found");
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media;
    use crate::session::state::ConnectionState;
    use crate::signaling::mock::MockSignaling;
    use crate::signaling::types::PipelineState;

    fn quick_config() -> ClientConfig {
        let mut config = ClientConfig::default();
        config.poll_interval_ms = 1;
        config
    }

    #[tokio::test]
    async fn missing_model_fails_without_loading() {
        let api = Arc::new(MockSignaling::with_model_downloaded(false));
        let client = SessionClient::with_api(quick_config(), api.clone());

        let err = client
            .connect(&MediaStream::new(), InitialParametersOverlay::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Model not downloaded"));

        let status = client.status();
        assert_eq!(status.state, ConnectionState::Error);
        assert!(status.error.unwrap().contains("Model not downloaded"));

        let calls = api.recorded_calls();
        assert!(calls.iter().all(|c| !c.starts_with("load_pipeline")));

        // No session handle was ever created
        assert!(client.session_id().await.is_none());
        assert!(matches!(
            client.update_prompt("ignored", PromptUpdateOptions::default()).await,
            Err(AppError::ChannelUnavailable(_))
        ));
        assert!(!client.replace_video_track(&MediaStream::new()).await);
    }

    #[tokio::test]
    async fn connect_is_rejected_while_one_is_in_flight() {
        let api = Arc::new(MockSignaling::default());
        // Keep the first connect inside the poll loop for a while
        api.queue_statuses(&[
            PipelineState::Loading,
            PipelineState::Loading,
            PipelineState::Loading,
        ]);

        let mut config = quick_config();
        config.poll_interval_ms = 100;
        let client = Arc::new(SessionClient::with_api(config, api.clone()));

        let first = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .connect(&MediaStream::new(), InitialParametersOverlay::default())
                    .await
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        let second = client
            .connect(&MediaStream::new(), InitialParametersOverlay::default())
            .await;
        assert!(matches!(second, Err(AppError::Negotiation(_))));

        // Tearing down mid-negotiation resets to idle; the abandoned
        // attempt's late failure must not resurface.
        client.disconnect().await;
        assert_eq!(client.status().state, ConnectionState::Idle);

        let result = first.await.unwrap();
        assert!(result.is_err());
        assert_eq!(client.status().state, ConnectionState::Idle);
        assert!(client.status().error.is_none());
    }

    #[tokio::test]
    async fn disconnect_from_error_state_resets_to_idle() {
        let api = Arc::new(MockSignaling::with_model_downloaded(false));
        let client = SessionClient::with_api(quick_config(), api);

        let _ = client
            .connect(&MediaStream::new(), InitialParametersOverlay::default())
            .await;
        assert_eq!(client.status().state, ConnectionState::Error);

        client.disconnect().await;
        let status = client.status();
        assert_eq!(status.state, ConnectionState::Idle);
        assert!(status.error.is_none());
    }

    #[tokio::test]
    async fn disconnect_without_session_is_a_clean_reset() {
        let api = Arc::new(MockSignaling::default());
        let client = SessionClient::with_api(quick_config(), api);

        client.disconnect().await;
        assert_eq!(client.status().state, ConnectionState::Idle);
        assert!(matches!(
            client.update_conditioning_scale(0.5).await,
            Err(AppError::ChannelUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn reference_assets_require_resolved_paths() {
        let api = Arc::new(MockSignaling::default());
        let client = SessionClient::with_api(quick_config(), api);

        let err = client.send_reference_assets(&["orb.png"]).await.unwrap_err();
        assert!(matches!(err, AppError::Media(_)));
    }

    #[tokio::test]
    async fn replace_on_peer_requires_a_video_track_and_sender() {
        let pc = peer::create_peer_connection(vec![]).await.unwrap();

        // Replacement stream with no video track
        assert!(!replace_on_peer(&pc, &MediaStream::new()).await);

        // Video in the stream but no sender on the connection
        let mut video_stream = MediaStream::new();
        video_stream.add_track(media::video_sample_track("video", "test"));
        assert!(!replace_on_peer(&pc, &video_stream).await);

        let _ = pc.close().await;
    }

    #[tokio::test]
    async fn replace_on_peer_swaps_the_video_sender() {
        let pc = peer::create_peer_connection(vec![]).await.unwrap();
        pc.add_track(media::video_sample_track("video-a", "test")
            as Arc<dyn webrtc::track::track_local::TrackLocal + Send + Sync>)
            .await
            .unwrap();

        let mut replacement = MediaStream::new();
        replacement.add_track(media::video_sample_track("video-b", "test"));
        assert!(replace_on_peer(&pc, &replacement).await);

        let _ = pc.close().await;
    }
}
