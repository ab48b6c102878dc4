use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A hosted avatar and the knowledge base it answers from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarProfile {
    pub key: String,
    pub name: String,
    pub avatar_id: String,
    pub knowledge_base_id: Option<String>,
    pub role: String,
}

/// Identifier overrides for one roster entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AvatarOverride {
    pub avatar_id: Option<String>,
    pub knowledge_base_id: Option<String>,
}

/// Avatars available to the simulation, keyed by short name
#[derive(Debug, Clone)]
pub struct AvatarRoster {
    profiles: HashMap<String, AvatarProfile>,
}

impl AvatarRoster {
    pub fn get(&self, key: &str) -> Option<&AvatarProfile> {
        self.profiles.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn with_overrides(mut self, overrides: &HashMap<String, AvatarOverride>) -> Self {
        for (key, patch) in overrides {
            let Some(profile) = self.profiles.get_mut(key) else {
                tracing::warn!(avatar = %key, "ignoring override for unknown avatar");
                continue;
            };
            if let Some(avatar_id) = &patch.avatar_id {
                profile.avatar_id = avatar_id.clone();
            }
            if let Some(kb) = &patch.knowledge_base_id {
                profile.knowledge_base_id = Some(kb.clone()).filter(|id| !id.is_empty());
            }
        }
        self
    }
}

impl Default for AvatarRoster {
    fn default() -> Self {
        let profiles = [
            AvatarProfile {
                key: "noa".to_string(),
                name: "Noa Sandoval".to_string(),
                avatar_id: "June_HR_public".to_string(),
                knowledge_base_id: Some("96b0ed06f07640459bcac16439103895".to_string()),
                role: "Virtual Simulation Instructor".to_string(),
            },
            AvatarProfile {
                key: "sam".to_string(),
                name: "Sam Richards".to_string(),
                avatar_id: "Shawn_Therapist_public".to_string(),
                knowledge_base_id: Some("15a0063f43ed4d1c92f5a269dc0b8f9b".to_string()),
                role: "Simulation Character".to_string(),
            },
        ];
        Self {
            profiles: profiles.into_iter().map(|p| (p.key.clone(), p)).collect(),
        }
    }
}
