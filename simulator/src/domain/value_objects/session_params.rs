use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Parameters of one remote streaming session, as issued by `streaming.new`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionParams {
    pub session_id: String,
    /// Short-lived bearer credential for the signaling endpoints
    pub access_token: String,
    /// Base URL of the signaling endpoints
    pub signaling_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("invalid signaling url: {0}")]
    InvalidUrl(String),
}

impl SessionParams {
    pub fn new(
        session_id: impl Into<String>,
        access_token: impl Into<String>,
        signaling_url: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            access_token: access_token.into(),
            signaling_url: signaling_url.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        if self.session_id.trim().is_empty() {
            return Err(ParamError::Missing("session id"));
        }
        if self.access_token.trim().is_empty() {
            return Err(ParamError::Missing("access token"));
        }
        if self.signaling_url.trim().is_empty() {
            return Err(ParamError::Missing("signaling url"));
        }
        let url = Url::parse(&self.signaling_url)
            .map_err(|e| ParamError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ParamError::InvalidUrl(format!(
                "unsupported scheme {}",
                url.scheme()
            )));
        }
        Ok(())
    }

    /// Absolute URL of a signaling endpoint such as `streaming.start`
    pub fn endpoint(&self, name: &str) -> String {
        format!("{}/v1/{}", self.signaling_url.trim_end_matches('/'), name)
    }
}
