pub mod ice_candidate;
pub mod media;
pub mod session_params;
pub mod session_status;

pub use ice_candidate::IceCandidate;
pub use media::{MediaBinding, MediaKind, RemoteTrack};
pub use session_params::{ParamError, SessionParams};
pub use session_status::{ConnectionState, SessionStatus};
