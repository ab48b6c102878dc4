use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::{ConnectionState, SessionParams};

/// Avatar session aggregate root
///
/// Created when a connect begins and dropped by the controller once the
/// session is torn down.
#[derive(Debug, Clone, Serialize)]
pub struct AvatarSession {
    pub id: AvatarSessionId,
    pub params: SessionParams,
    pub state: ConnectionState,
    /// Number of `start` requests issued so far
    pub start_attempts: u32,
    /// Set once the session has been connected; the remote stop call depends on it
    pub reached_connected: bool,
    pub failure: Option<String>,
    pub created_at: DateTime<Utc>,
    pub connected_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid session transition from {from} to {to}")]
pub struct TransitionError {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

impl AvatarSession {
    /// Begin a new session in the connecting state
    pub fn new(params: SessionParams) -> Self {
        Self {
            id: AvatarSessionId::generate(),
            params,
            state: ConnectionState::Connecting,
            start_attempts: 0,
            reached_connected: false,
            failure: None,
            created_at: Utc::now(),
            connected_at: None,
        }
    }

    pub fn record_start_attempt(&mut self) -> u32 {
        self.start_attempts += 1;
        self.start_attempts
    }

    pub fn mark_connected(&mut self) -> Result<(), TransitionError> {
        self.transition(ConnectionState::Connected)?;
        self.reached_connected = true;
        self.connected_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(ConnectionState::Failed)?;
        self.failure = Some(reason.into());
        Ok(())
    }

    pub fn begin_disconnecting(&mut self) -> Result<(), TransitionError> {
        self.transition(ConnectionState::Disconnecting)
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    fn transition(&mut self, to: ConnectionState) -> Result<(), TransitionError> {
        use ConnectionState::*;

        let allowed = matches!(
            (self.state, to),
            (Connecting, Connected)
                | (Connecting, Failed)
                | (Connected, Failed)
                | (Connecting, Disconnecting)
                | (Connected, Disconnecting)
                | (Failed, Disconnecting)
        );
        if !allowed {
            return Err(TransitionError {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}

/// Local identifier for a session, independent of the remote session id
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
pub struct AvatarSessionId(String);

impl AvatarSessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for AvatarSessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
