use thiserror::Error;

use crate::application::ports::ApiError;
use crate::domain::aggregates::TransitionError;
use crate::domain::value_objects::{ConnectionState, ParamError};

/// Errors surfaced by session and simulation use cases
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Missing or malformed session parameters; never retried
    #[error(transparent)]
    Parameter(#[from] ParamError),

    #[error("a session is already {0}")]
    AlreadyActive(ConnectionState),

    #[error("no active session")]
    NotActive,

    #[error("not connected (state: {0})")]
    NotConnected(ConnectionState),

    #[error("channel not ready")]
    ChannelNotReady,

    /// `start` exchange failed after all attempts, or the answer was unusable
    #[error("{0}")]
    Negotiation(String),

    #[error("peer connection setup failed: {0}")]
    PeerSetup(String),

    #[error("failed to send command: {0}")]
    Send(String),

    #[error("connection attempt cancelled")]
    Cancelled,

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("session could not be created: {0}")]
    Api(#[from] ApiError),

    #[error("unknown avatar {0}")]
    UnknownAvatar(String),

    #[error("no script line {index} in {phase}")]
    ScriptNotFound { phase: String, index: usize },
}
