use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::simulation::AvatarProfile;
use crate::domain::value_objects::{IceCandidate, SessionParams};

/// Request body for opening a new hosted streaming session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewSessionRequest {
    pub avatar_id: String,
    pub quality: String,
    pub voice_id: String,
    pub knowledge_base_id: Option<String>,
}

/// Stream settings applied to every new session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDefaults {
    pub quality: String,
    pub voice_id: String,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            quality: "high".to_string(),
            voice_id: "default".to_string(),
        }
    }
}

impl NewSessionRequest {
    pub fn for_avatar(profile: &AvatarProfile, defaults: &SessionDefaults) -> Self {
        Self {
            avatar_id: profile.avatar_id.clone(),
            quality: defaults.quality.clone(),
            voice_id: defaults.voice_id.clone(),
            knowledge_base_id: profile.knowledge_base_id.clone(),
        }
    }
}

/// Remote answer to our offer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartAnswer {
    pub sdp: String,
    /// Candidates delivered inline with the answer, possibly empty
    pub ice_candidates: Vec<IceCandidate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Non-success HTTP status; `message` comes from the response body
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Port for the hosted streaming-session API (implemented by infrastructure)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StreamingApiPort: Send + Sync {
    /// Open a hosted session and obtain its signaling parameters
    async fn create_session(&self, request: &NewSessionRequest) -> Result<SessionParams, ApiError>;

    /// Exchange our offer for the remote answer
    async fn start(&self, params: &SessionParams, offer_sdp: &str) -> Result<StartAnswer, ApiError>;

    /// Relay one locally gathered candidate
    async fn submit_ice(&self, params: &SessionParams, candidate: &IceCandidate) -> Result<(), ApiError>;

    /// Ask the service to stop streaming
    async fn stop(&self, params: &SessionParams) -> Result<(), ApiError>;
}
