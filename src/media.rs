//! Local media source abstraction
//!
//! The rendering layer is external; what crosses the boundary is a bundle
//! of sendable local tracks. The session attaches every track at connect
//! time and can later swap the video track without renegotiation.

use std::sync::Arc;

use webrtc::api::media_engine::MIME_TYPE_VP8;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

/// A bundle of local tracks supplied by the caller
#[derive(Default, Clone)]
pub struct MediaStream {
    tracks: Vec<Arc<dyn TrackLocal + Send + Sync>>,
}

impl MediaStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tracks(tracks: Vec<Arc<dyn TrackLocal + Send + Sync>>) -> Self {
        Self { tracks }
    }

    pub fn add_track(&mut self, track: Arc<dyn TrackLocal + Send + Sync>) {
        self.tracks.push(track);
    }

    pub fn tracks(&self) -> &[Arc<dyn TrackLocal + Send + Sync>] {
        &self.tracks
    }

    /// First video track, if the stream carries one
    pub fn first_video_track(&self) -> Option<Arc<dyn TrackLocal + Send + Sync>> {
        self.tracks
            .iter()
            .find(|track| track.kind() == RTPCodecType::Video)
            .cloned()
    }

    pub fn has_video(&self) -> bool {
        self.first_video_track().is_some()
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("tracks", &self.tracks.len())
            .finish()
    }
}

/// Create a VP8 sample track the caller can feed encoded frames into
pub fn video_sample_track(
    id: impl Into<String>,
    stream_id: impl Into<String>,
) -> Arc<TrackLocalStaticSample> {
    Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_VP8.to_owned(),
            ..Default::default()
        },
        id.into(),
        stream_id.into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_track_lookup_respects_kind() {
        let mut stream = MediaStream::new();
        assert!(!stream.has_video());

        let track = video_sample_track("video", "scope-link");
        stream.add_track(track);
        assert!(stream.has_video());
        assert_eq!(
            stream.first_video_track().unwrap().kind(),
            RTPCodecType::Video
        );
    }
}
