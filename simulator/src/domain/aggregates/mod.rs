pub mod avatar_session;

pub use avatar_session::{AvatarSession, AvatarSessionId, TransitionError};
