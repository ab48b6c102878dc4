// Application layer - use cases driving the avatar session
// Orchestrates domain logic, depends on domain layer only

pub mod errors;
pub mod ports;
pub mod session;
pub mod simulation;

pub use errors::SessionError;
