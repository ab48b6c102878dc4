use serde::{Deserialize, Serialize};
use shared::Emotion;
use std::collections::HashMap;

use super::SimulationPhase;

/// One scripted line with the trainee phrases that trigger it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptEntry {
    pub text: String,
    #[serde(default)]
    pub emotion: Emotion,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl ScriptEntry {
    fn new(text: &str, emotion: Emotion, keywords: &[&str]) -> Self {
        Self {
            text: text.to_string(),
            emotion,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// True when any keyword appears in `normalized` as whole words
    fn triggered_by(&self, normalized: &str) -> bool {
        self.keywords.iter().any(|keyword| {
            let keyword = normalize(keyword);
            !keyword.is_empty() && normalized.contains(&format!(" {} ", keyword))
        })
    }
}

/// Lower-cases and collapses input into ` word word ` form for whole-word search
fn normalize(input: &str) -> String {
    let words: Vec<String> = input
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    if words.is_empty() {
        return String::new();
    }
    format!(" {} ", words.join(" "))
}

/// Static dialogue for every phase, in playback order
#[derive(Debug, Clone)]
pub struct ScriptStore {
    phases: HashMap<SimulationPhase, Vec<ScriptEntry>>,
}

impl ScriptStore {
    pub fn new(phases: HashMap<SimulationPhase, Vec<ScriptEntry>>) -> Self {
        Self { phases }
    }

    pub fn entries(&self, phase: SimulationPhase) -> &[ScriptEntry] {
        self.phases.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn entry(&self, phase: SimulationPhase, index: usize) -> Option<&ScriptEntry> {
        self.entries(phase).get(index)
    }

    /// The line an avatar opens its phase with
    pub fn opening(&self, phase: SimulationPhase) -> Option<&ScriptEntry> {
        self.entry(phase, 0)
    }

    /// First entry of `phase` whose keywords occur in the trainee's input
    pub fn match_keywords(&self, phase: SimulationPhase, input: &str) -> Option<&ScriptEntry> {
        let normalized = normalize(input);
        if normalized.is_empty() {
            return None;
        }
        self.entries(phase)
            .iter()
            .find(|entry| entry.triggered_by(&normalized))
    }
}

impl Default for ScriptStore {
    fn default() -> Self {
        let mut phases = HashMap::new();
        phases.insert(
            SimulationPhase::PreBriefing,
            vec![
                ScriptEntry::new(
                    "Hello! I'm Noa Sandoval, your virtual simulation instructor. Welcome to the Flu Vaccination Program simulation.",
                    Emotion::Friendly,
                    &["hello", "hi", "introduction", "who are you"],
                ),
                ScriptEntry::new(
                    "In this simulation, you'll be interacting with Sam Richards, a patient who has concerns about getting the flu vaccine. Your goal is to address their concerns professionally and provide accurate information.",
                    Emotion::Professional,
                    &["objective", "objectives", "goal", "what do i do"],
                ),
                ScriptEntry::new(
                    "Remember to listen actively, show empathy, and use evidence-based information. Are you ready to begin the simulation?",
                    Emotion::Encouraging,
                    &["ready", "begin", "start"],
                ),
            ],
        );
        phases.insert(
            SimulationPhase::MainSimulation,
            vec![ScriptEntry::new(
                "Hi there. I'm Sam Richards. I received a letter about getting a flu shot, but I'm not sure if I really need it. I've heard some concerning things about vaccines.",
                Emotion::Concerned,
                &["hello", "hi", "good morning", "good afternoon"],
            )],
        );
        phases.insert(
            SimulationPhase::Debriefing,
            vec![
                ScriptEntry::new(
                    "Welcome back! I'm Noa again. Let's debrief your simulation experience with Sam Richards.",
                    Emotion::Friendly,
                    &["welcome", "back", "hello"],
                ),
                ScriptEntry::new(
                    "You did a great job addressing Sam's concerns about the flu vaccine. Let's review what went well and areas for improvement.",
                    Emotion::Encouraging,
                    &["performance", "review", "how did i do"],
                ),
                ScriptEntry::new(
                    "Key takeaways: Always validate patient concerns, provide evidence-based information, and maintain a professional yet empathetic approach. Do you have any questions about the simulation?",
                    Emotion::Professional,
                    &["takeaways", "summary", "key points"],
                ),
            ],
        );
        Self::new(phases)
    }
}
