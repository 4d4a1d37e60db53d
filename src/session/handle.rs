//! Live session ownership

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;
use webrtc::peer_connection::RTCPeerConnection;

use super::control::ControlChannel;
use crate::signaling::types::IceCandidate;

/// Everything one live session owns
///
/// Created once negotiation reaches the peer-connection step, destroyed on
/// disconnect or unrecoverable error, never reused across sessions.
pub struct SessionHandle {
    generation: u64,
    peer: Arc<RTCPeerConnection>,
    control: ControlChannel,
    session_id: Option<String>,
    pending_candidates: Arc<Mutex<Vec<IceCandidate>>>,
}

impl SessionHandle {
    pub(crate) fn new(
        generation: u64,
        peer: Arc<RTCPeerConnection>,
        control: ControlChannel,
        pending_candidates: Arc<Mutex<Vec<IceCandidate>>>,
    ) -> Self {
        Self {
            generation,
            peer,
            control,
            session_id: None,
            pending_candidates,
        }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn peer(&self) -> &Arc<RTCPeerConnection> {
        &self.peer
    }

    pub(crate) fn control(&self) -> &ControlChannel {
        &self.control
    }

    /// Server-assigned session identifier, once the answer arrived
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub(crate) fn set_session_id(&mut self, id: String) {
        self.session_id = Some(id);
    }

    /// Take every buffered candidate, leaving the buffer empty
    pub(crate) async fn drain_candidates(&self) -> Vec<IceCandidate> {
        let mut buffer = self.pending_candidates.lock().await;
        buffer.drain(..).collect()
    }

    /// Close the peer connection (and with it the data channel)
    pub(crate) async fn close(&self) {
        if let Err(e) = self.peer.close().await {
            warn!("failed to close peer connection: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::peer::create_peer_connection;

    fn candidate(host: &str) -> IceCandidate {
        IceCandidate {
            candidate: format!("candidate:1 1 udp 2130706431 {} 50000 typ host", host),
            sdp_mid: Some("0".to_string()),
            sdp_mline_index: Some(0),
        }
    }

    #[tokio::test]
    async fn drain_empties_the_candidate_buffer() {
        let pc = create_peer_connection(vec![]).await.unwrap();
        let dc = pc.create_data_channel("data", None).await.unwrap();
        let buffer = Arc::new(Mutex::new(vec![candidate("192.0.2.1"), candidate("192.0.2.2")]));

        let mut handle = SessionHandle::new(1, pc, ControlChannel::new(dc), buffer);
        assert!(handle.session_id().is_none());
        handle.set_session_id("sess-1".to_string());
        assert_eq!(handle.session_id(), Some("sess-1"));

        let drained = handle.drain_candidates().await;
        assert_eq!(drained.len(), 2);
        assert!(handle.drain_candidates().await.is_empty());

        handle.close().await;
    }
}
