//! Peer connection construction and event wiring

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_remote::TrackRemote;

use super::state::{transition, SessionStatus, StateEvent};
use crate::error::{AppError, Result};
use crate::signaling::types::{IceCandidate, IceServer};

/// Callback invoked for each remote track the pipeline sends back
pub type RemoteTrackCallback = dyn Fn(Arc<TrackRemote>) + Send + Sync;

/// Everything the peer event handlers need
pub(crate) struct HandlerContext {
    /// Observable status channel
    pub status: Arc<watch::Sender<SessionStatus>>,
    /// Generation of the session these handlers belong to
    pub generation: u64,
    /// Current generation; mismatches mark a handler as stale
    pub current_generation: Arc<AtomicU64>,
    /// Remote track sink
    pub on_remote_track: Option<Arc<RemoteTrackCallback>>,
    /// Buffer for locally discovered ICE candidates
    pub candidates: Arc<Mutex<Vec<IceCandidate>>>,
}

/// Build a peer connection with default codecs and interceptors
pub(crate) async fn create_peer_connection(
    servers: Vec<IceServer>,
) -> Result<Arc<RTCPeerConnection>> {
    let mut media_engine = MediaEngine::default();
    media_engine
        .register_default_codecs()
        .map_err(|e| AppError::Negotiation(format!("Failed to register codecs: {}", e)))?;

    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine)
        .map_err(|e| AppError::Negotiation(format!("Failed to register interceptors: {}", e)))?;

    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build();

    let ice_servers = servers
        .into_iter()
        .map(|server| RTCIceServer {
            urls: server.urls,
            username: server.username.unwrap_or_default(),
            credential: server.credential.unwrap_or_default(),
            ..Default::default()
        })
        .collect();

    let config = RTCConfiguration {
        ice_servers,
        ..Default::default()
    };

    let pc = api
        .new_peer_connection(config)
        .await
        .map_err(|e| AppError::Negotiation(format!("Failed to create peer connection: {}", e)))?;

    Ok(Arc::new(pc))
}

/// Register connection-state, remote-track and ICE handlers
pub(crate) fn wire_handlers(pc: &Arc<RTCPeerConnection>, ctx: HandlerContext) {
    let HandlerContext {
        status,
        generation,
        current_generation,
        on_remote_track,
        candidates,
    } = ctx;

    // Transport state drives the observable `connected` transition; failed
    // and disconnected can self-recover and are only logged.
    {
        let status = status.clone();
        let current = current_generation.clone();
        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            let status = status.clone();
            let current = current.clone();
            Box::pin(async move {
                if current.load(Ordering::SeqCst) != generation {
                    debug!(state = %s, "ignoring transport state from stale session");
                    return;
                }
                match s {
                    RTCPeerConnectionState::Connected => {
                        info!("transport connected");
                        status.send_if_modified(|st| {
                            match transition(st.state, StateEvent::TransportConnected) {
                                Some(next) => {
                                    st.state = next;
                                    st.error = None;
                                    true
                                }
                                None => false,
                            }
                        });
                    }
                    RTCPeerConnectionState::Connecting => debug!("transport connecting"),
                    RTCPeerConnectionState::Failed => {
                        warn!("transport failed, waiting for recovery")
                    }
                    RTCPeerConnectionState::Disconnected => {
                        warn!("transport disconnected, may reconnect")
                    }
                    RTCPeerConnectionState::Closed => debug!("transport closed"),
                    _ => {}
                }
            })
        }));
    }

    pc.on_ice_connection_state_change(Box::new(move |s: RTCIceConnectionState| {
        match s {
            RTCIceConnectionState::Connected | RTCIceConnectionState::Completed => {
                info!(state = %s, "ICE connection established")
            }
            _ => debug!(state = %s, "ICE connection state"),
        }
        Box::pin(async {})
    }));

    {
        let on_remote_track = on_remote_track.clone();
        pc.on_track(Box::new(
            move |track: Arc<TrackRemote>, _receiver, _transceiver| {
                info!(
                    kind = ?track.kind(),
                    id = %track.id(),
                    "remote track received"
                );
                if let Some(callback) = &on_remote_track {
                    callback(track);
                }
                Box::pin(async {})
            },
        ));
    }

    // Candidates are buffered until gathering completes and sent as one
    // batch; none go out individually.
    pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
        let candidates = candidates.clone();
        Box::pin(async move {
            match candidate {
                Some(c) => match c.to_json() {
                    Ok(json) => {
                        debug!(candidate = %json.candidate, "ICE candidate gathered");
                        candidates.lock().await.push(IceCandidate {
                            candidate: json.candidate,
                            sdp_mid: json.sdp_mid,
                            sdp_mline_index: json.sdp_mline_index,
                        });
                    }
                    Err(e) => warn!("failed to serialize ICE candidate: {}", e),
                },
                None => debug!("ICE candidate gathering complete"),
            }
        })
    }));
}

/// Attach open/close/error logging to the control data channel
pub(crate) fn wire_data_channel_logging(dc: &Arc<RTCDataChannel>) {
    let label = dc.label().to_string();
    {
        let label = label.clone();
        dc.on_open(Box::new(move || {
            info!(channel = %label, "data channel opened");
            Box::pin(async {})
        }));
    }
    {
        let label = label.clone();
        dc.on_close(Box::new(move || {
            info!(channel = %label, "data channel closed");
            Box::pin(async {})
        }));
    }
    dc.on_error(Box::new(move |e| {
        warn!(channel = %label, "data channel error: {}", e);
        Box::pin(async {})
    }));
}
