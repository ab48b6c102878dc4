// Training scenario: phases, avatars and their scripted dialogue

pub mod avatar_profile;
pub mod phase;
pub mod scripts;

pub use avatar_profile::{AvatarOverride, AvatarProfile, AvatarRoster};
pub use phase::{Advance, SimulationPhase, SimulationProgress};
pub use scripts::{ScriptEntry, ScriptStore};
