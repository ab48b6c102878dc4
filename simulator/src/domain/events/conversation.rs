use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::Emotion;

/// Who produced a line of dialogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Speaker {
    Avatar { avatar: String },
    Trainee,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    #[serde(flatten)]
    pub speaker: Speaker,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<Emotion>,
    /// False for avatar lines that never reached the command channel
    pub delivered: bool,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    fn new(speaker: Speaker, content: &str, emotion: Option<Emotion>) -> Self {
        Self {
            speaker,
            content: content.to_string(),
            emotion,
            delivered: true,
            timestamp: Utc::now(),
        }
    }
}

/// In-memory conversation history for one simulation run
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    entries: Vec<ConversationTurn>,
}

impl ConversationLog {
    pub fn record_avatar(&mut self, avatar: &str, content: &str, emotion: Emotion) {
        let speaker = Speaker::Avatar {
            avatar: avatar.to_string(),
        };
        self.entries
            .push(ConversationTurn::new(speaker, content, Some(emotion)));
    }

    /// Keep a scripted avatar line that could not be sent
    pub fn record_undelivered(&mut self, avatar: &str, content: &str, emotion: Emotion) {
        let speaker = Speaker::Avatar {
            avatar: avatar.to_string(),
        };
        let mut turn = ConversationTurn::new(speaker, content, Some(emotion));
        turn.delivered = false;
        self.entries.push(turn);
    }

    pub fn record_trainee(&mut self, content: &str) {
        self.entries
            .push(ConversationTurn::new(Speaker::Trainee, content, None));
    }

    pub fn entries(&self) -> &[ConversationTurn] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_keeps_order() {
        let mut log = ConversationLog::default();
        log.record_avatar("sam", "I'm not sure I need it.", Emotion::Concerned);
        log.record_trainee("Can I ask what worries you?");

        assert_eq!(log.len(), 2);
        assert_eq!(
            log.entries()[0].speaker,
            Speaker::Avatar {
                avatar: "sam".to_string()
            }
        );
        assert_eq!(log.entries()[1].speaker, Speaker::Trainee);
        assert!(log.entries()[0].timestamp <= log.entries()[1].timestamp);

        let json = serde_json::to_value(&log.entries()[0]).unwrap();
        assert_eq!(json["role"], "avatar");
        assert_eq!(json["avatar"], "sam");
        assert_eq!(json["emotion"], "concerned");
        assert_eq!(json["delivered"], true);

        log.record_undelivered("noa", "Welcome back!", Emotion::Friendly);
        assert!(!log.entries()[2].delivered);

        log.clear();
        assert!(log.is_empty());
    }
}
