// Wire shapes of the HeyGen streaming endpoints

use serde::{Deserialize, Serialize};

use crate::application::ports::{ApiError, NewSessionRequest};
use crate::domain::value_objects::IceCandidate;

#[derive(Debug, Serialize)]
pub struct NewSessionBody<'a> {
    pub avatar_id: &'a str,
    pub quality: &'a str,
    pub voice: VoiceBody<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knowledge_base_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct VoiceBody<'a> {
    pub voice_id: &'a str,
}

impl<'a> From<&'a NewSessionRequest> for NewSessionBody<'a> {
    fn from(request: &'a NewSessionRequest) -> Self {
        Self {
            avatar_id: &request.avatar_id,
            quality: &request.quality,
            voice: VoiceBody {
                voice_id: &request.voice_id,
            },
            knowledge_base_id: request.knowledge_base_id.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NewSessionData {
    pub session_id: String,
    pub access_token: String,
    /// Media server URL; the signaling endpoints stay on the API host
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: String,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: &str) -> Self {
        Self {
            kind: "offer".to_string(),
            sdp: sdp.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StartBody<'a> {
    pub session_id: &'a str,
    pub sdp: SessionDescription,
}

#[derive(Debug, Deserialize)]
pub struct StartData {
    pub sdp: SessionDescription,
    #[serde(default)]
    pub ice_candidates: Option<Vec<IceCandidate>>,
}

#[derive(Debug, Serialize)]
pub struct IceBody<'a> {
    pub session_id: &'a str,
    pub candidate: &'a IceCandidate,
}

#[derive(Debug, Serialize)]
pub struct StopBody<'a> {
    pub session_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Human-readable failure for a non-success response
pub fn error_message(status: u16, body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("request failed with status {}", status))
}

/// Extract the `data` member of a success response
pub fn decode_data<T: for<'de> Deserialize<'de>>(body: &[u8]) -> Result<T, ApiError> {
    let envelope: Envelope<T> =
        serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))?;
    envelope
        .data
        .ok_or_else(|| ApiError::Decode("response has no data".to_string()))
}
