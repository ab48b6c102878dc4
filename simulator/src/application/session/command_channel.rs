use shared::{AvatarCommand, AvatarEvent, Emotion};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::application::ports::CommandChannelPort;
use crate::application::SessionError;

/// Outbound side of the command channel
#[derive(Clone)]
pub struct CommandChannel {
    port: Arc<dyn CommandChannelPort>,
}

impl CommandChannel {
    pub fn new(port: Arc<dyn CommandChannelPort>) -> Self {
        Self { port }
    }

    pub fn is_open(&self) -> bool {
        self.port.is_open()
    }

    /// Serialize and send a speak command.
    ///
    /// Fails with [`SessionError::ChannelNotReady`] before touching the
    /// transport when the channel is not open.
    pub async fn send(&self, text: &str, emotion: Emotion) -> Result<(), SessionError> {
        if !self.port.is_open() {
            return Err(SessionError::ChannelNotReady);
        }
        let payload = AvatarCommand::speak(text, emotion)
            .to_json()
            .map_err(|e| SessionError::Send(e.to_string()))?;
        self.port
            .send_text(payload)
            .await
            .map_err(|e| SessionError::Send(format!("{:#}", e)))
    }

    pub async fn close(&self) -> anyhow::Result<()> {
        self.port.close().await
    }
}

/// Decode an inbound frame into an event worth acting on.
///
/// Unknown event types and malformed frames are logged and yield `None`.
pub fn interpret(payload: &[u8]) -> Option<AvatarEvent> {
    match AvatarEvent::decode(payload) {
        Ok(AvatarEvent::Unknown { kind }) => {
            debug!(kind = %kind, "ignoring unrecognized avatar event");
            None
        }
        Ok(event) => Some(event),
        Err(e) => {
            warn!(
                error = %e,
                payload = %String::from_utf8_lossy(payload),
                "discarding malformed avatar event"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::session::testing::FakeChannel;

    #[tokio::test]
    async fn test_send_requires_open_channel() {
        let port = Arc::new(FakeChannel::default());
        let channel = CommandChannel::new(port.clone());

        let err = channel.send("Hello", Emotion::Friendly).await.unwrap_err();
        assert_eq!(err, SessionError::ChannelNotReady);
        assert!(port.sent().is_empty());

        port.set_open(true);
        channel.send("Hello", Emotion::Friendly).await.unwrap();
        let sent = port.sent();
        assert_eq!(sent.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(value["type"], "speak");
        assert_eq!(value["emotion"], "friendly");
    }

    #[test]
    fn test_interpret_filters_noise() {
        assert_eq!(
            interpret(br#"{"type":"avatar_start_talking"}"#),
            Some(AvatarEvent::AvatarStartTalking)
        );
        assert_eq!(interpret(br#"{"type":"avatar_idle"}"#), None);
        assert_eq!(interpret(b"\xff\xfe garbage"), None);
        assert_eq!(interpret(b""), None);
    }
}
