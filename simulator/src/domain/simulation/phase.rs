use serde::{Deserialize, Serialize};
use std::fmt;

/// The three stages of a training run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationPhase {
    PreBriefing,
    MainSimulation,
    Debriefing,
}

impl SimulationPhase {
    pub const ALL: [SimulationPhase; 3] = [
        SimulationPhase::PreBriefing,
        SimulationPhase::MainSimulation,
        SimulationPhase::Debriefing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationPhase::PreBriefing => "pre_briefing",
            SimulationPhase::MainSimulation => "main_simulation",
            SimulationPhase::Debriefing => "debriefing",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SimulationPhase::PreBriefing => "Pre-Briefing (Noa)",
            SimulationPhase::MainSimulation => "Main Simulation (Sam)",
            SimulationPhase::Debriefing => "Debriefing (Noa)",
        }
    }

    /// Roster key of the avatar that leads this phase
    pub fn avatar_key(&self) -> &'static str {
        match self {
            SimulationPhase::PreBriefing | SimulationPhase::Debriefing => "noa",
            SimulationPhase::MainSimulation => "sam",
        }
    }

    pub fn next(&self) -> Option<SimulationPhase> {
        match self {
            SimulationPhase::PreBriefing => Some(SimulationPhase::MainSimulation),
            SimulationPhase::MainSimulation => Some(SimulationPhase::Debriefing),
            SimulationPhase::Debriefing => None,
        }
    }

    fn index(&self) -> usize {
        match self {
            SimulationPhase::PreBriefing => 0,
            SimulationPhase::MainSimulation => 1,
            SimulationPhase::Debriefing => 2,
        }
    }
}

impl fmt::Display for SimulationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Where a run currently stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationProgress {
    phase: SimulationPhase,
    completed: [bool; 3],
}

/// Outcome of completing the current phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Moved on to the given phase
    Entered(SimulationPhase),
    /// The debriefing was completed; nothing follows
    Finished,
    /// The run had already finished
    AlreadyFinished,
}

impl SimulationProgress {
    pub fn new() -> Self {
        Self {
            phase: SimulationPhase::PreBriefing,
            completed: [false; 3],
        }
    }

    pub fn phase(&self) -> SimulationPhase {
        self.phase
    }

    #[cfg(test)]
    pub fn is_completed(&self, phase: SimulationPhase) -> bool {
        self.completed[phase.index()]
    }

    pub fn is_finished(&self) -> bool {
        self.completed.iter().all(|done| *done)
    }

    pub fn complete_current(&mut self) -> Advance {
        if self.is_finished() {
            return Advance::AlreadyFinished;
        }
        self.completed[self.phase.index()] = true;
        match self.phase.next() {
            Some(next) => {
                self.phase = next;
                Advance::Entered(next)
            }
            None => Advance::Finished,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for SimulationProgress {
    fn default() -> Self {
        Self::new()
    }
}
