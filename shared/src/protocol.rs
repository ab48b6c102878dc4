use serde::{Deserialize, Serialize};
use std::fmt;

/// Speaking style requested for a line of avatar dialogue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    #[default]
    Neutral,
    Friendly,
    Professional,
    Encouraging,
    Concerned,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Friendly => "friendly",
            Emotion::Professional => "professional",
            Emotion::Encouraging => "encouraging",
            Emotion::Concerned => "concerned",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands pushed to the remote avatar over the command channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AvatarCommand {
    /// Have the avatar speak a line of text
    Speak { text: String, emotion: Emotion },
}

impl AvatarCommand {
    pub fn speak(text: impl Into<String>, emotion: Emotion) -> Self {
        AvatarCommand::Speak {
            text: text.into(),
            emotion,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// State events reported by the remote avatar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvatarEvent {
    AvatarStartTalking,
    AvatarStopTalking,
    Error { message: String },
    /// A well-formed event whose type this client does not handle
    Unknown { kind: String },
}

#[derive(Deserialize)]
struct EventEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    message: Option<String>,
}

impl AvatarEvent {
    /// Decode one inbound frame.
    ///
    /// Frames without a string `type` field are errors; unrecognized types
    /// decode to [`AvatarEvent::Unknown`].
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        let envelope: EventEnvelope = serde_json::from_slice(payload)?;
        Ok(match envelope.kind.as_str() {
            "avatar_start_talking" => AvatarEvent::AvatarStartTalking,
            "avatar_stop_talking" => AvatarEvent::AvatarStopTalking,
            "error" => AvatarEvent::Error {
                message: envelope
                    .message
                    .unwrap_or_else(|| "unknown avatar error".to_string()),
            },
            _ => AvatarEvent::Unknown {
                kind: envelope.kind,
            },
        })
    }
}

/// Messages posted by the embedding host to the simulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostMessage {
    /// Relay text to the avatar
    SendToAvatar {
        text: String,
        #[serde(default)]
        emotion: Emotion,
    },
    /// Tear down the current avatar session
    Disconnect,
    /// Play the scripted line at `index` for the current phase
    PlayScript { index: usize },
    /// Trainee reply, recorded and matched against script keywords
    Respond { text: String },
    /// Complete the current phase and move to the next avatar
    AdvancePhase,
    /// Restart the simulation from the pre-briefing
    Reset,
}

impl HostMessage {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}
