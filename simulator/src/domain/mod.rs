// Domain layer - session lifecycle and simulation model
// No dependencies on other layers

pub mod aggregates;
pub mod events;
pub mod simulation;
pub mod value_objects;

pub use aggregates::*;
pub use events::*;
pub use simulation::*;
pub use value_objects::*;
