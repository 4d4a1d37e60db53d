//! Session connection state machine
//!
//! The externally observable session state. Transitions only move forward
//! through the connect sequence or jump to `Error`; `Idle` is reachable only
//! through an explicit reset (disconnect).

use serde::{Deserialize, Serialize};

/// Externally observable connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    Idle,
    CheckingModel,
    LoadingPipeline,
    WaitingPipeline,
    GettingStream,
    Connecting,
    Connected,
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Idle => write!(f, "idle"),
            ConnectionState::CheckingModel => write!(f, "checking-model"),
            ConnectionState::LoadingPipeline => write!(f, "loading-pipeline"),
            ConnectionState::WaitingPipeline => write!(f, "waiting-pipeline"),
            ConnectionState::GettingStream => write!(f, "getting-stream"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Error => write!(f, "error"),
        }
    }
}

impl ConnectionState {
    /// Whether a new connect attempt may start from this state
    pub fn accepts_connect(self) -> bool {
        matches!(self, ConnectionState::Idle | ConnectionState::Error)
    }

    /// Whether a live session handle exists in this state
    pub fn has_session(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }
}

/// Lifecycle events driving state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    /// A connect attempt started
    ConnectStarted,
    /// Model weights verified as downloaded
    ModelChecked,
    /// Pipeline load request issued
    PipelineLoadIssued,
    /// Pipeline reported loaded
    PipelineReady,
    /// ICE servers fetched, peer connection being built
    IceServersFetched,
    /// Transport layer reported connected
    TransportConnected,
    /// A step failed
    Failed,
    /// Session torn down
    Reset,
}

/// Pure transition function; `None` means the transition is illegal
pub fn transition(state: ConnectionState, event: StateEvent) -> Option<ConnectionState> {
    use ConnectionState::*;
    use StateEvent::*;

    match (state, event) {
        (_, Reset) => Some(Idle),
        (s, Failed) if s != Idle => Some(Error),
        (s, ConnectStarted) if s.accepts_connect() => Some(CheckingModel),
        (CheckingModel, ModelChecked) => Some(LoadingPipeline),
        (LoadingPipeline, PipelineLoadIssued) => Some(WaitingPipeline),
        (WaitingPipeline, PipelineReady) => Some(GettingStream),
        (GettingStream, IceServersFetched) => Some(Connecting),
        (Connecting, TransportConnected) => Some(Connected),
        _ => None,
    }
}

/// Observable session status: the state plus the latest error text
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub state: ConnectionState,
    pub error: Option<String>,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Idle,
            error: None,
        }
    }
}

impl SessionStatus {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}
