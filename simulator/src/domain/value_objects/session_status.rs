use serde::Serialize;
use std::fmt;

/// Lifecycle of an avatar connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Disconnecting,
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
            ConnectionState::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the embedding page shows: state, status line and the connected flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub state: ConnectionState,
    pub text: String,
    pub connected: bool,
}

impl SessionStatus {
    fn new(state: ConnectionState, text: impl Into<String>) -> Self {
        Self {
            state,
            text: text.into(),
            connected: state == ConnectionState::Connected,
        }
    }

    pub fn idle() -> Self {
        Self::new(ConnectionState::Idle, "Disconnected")
    }

    pub fn connecting() -> Self {
        Self::new(ConnectionState::Connecting, "Connecting to HeyGen...")
    }

    pub fn connected() -> Self {
        Self::new(ConnectionState::Connected, "Connected to HeyGen")
    }

    pub fn speaking() -> Self {
        Self::new(ConnectionState::Connected, "Avatar speaking")
    }

    pub fn ready() -> Self {
        Self::new(ConnectionState::Connected, "Ready")
    }

    /// Error reported by the avatar itself; the session stays up
    pub fn avatar_error(message: &str) -> Self {
        Self::new(ConnectionState::Connected, format!("Avatar error: {}", message))
    }

    pub fn disconnecting() -> Self {
        Self::new(ConnectionState::Disconnecting, "Disconnecting...")
    }

    pub fn failed(reason: &str) -> Self {
        Self::new(ConnectionState::Failed, format!("Connection failed: {}", reason))
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connected_flag_follows_state() {
        assert!(SessionStatus::connected().connected);
        assert!(SessionStatus::speaking().connected);
        assert!(SessionStatus::avatar_error("boom").connected);
        assert!(!SessionStatus::connecting().connected);
        assert!(!SessionStatus::failed("boom").connected);
        assert!(!SessionStatus::idle().connected);
    }

    #[test]
    fn test_status_text() {
        assert_eq!(SessionStatus::connected().text, "Connected to HeyGen");
        assert_eq!(
            SessionStatus::failed("invalid session").text,
            "Connection failed: invalid session"
        );
        assert_eq!(SessionStatus::avatar_error("tts").text, "Avatar error: tts");
    }
}
