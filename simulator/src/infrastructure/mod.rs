// Infrastructure layer - HeyGen HTTP, webrtc-rs, configuration and the host interface
// Implements the ports defined in the application layer

pub mod config;
pub mod driven; // Output adapters (streaming API, peer connections)
pub mod driving; // Input adapters (CLI, host messages)
