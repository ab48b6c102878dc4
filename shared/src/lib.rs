//! Wire types shared between the simulator and the pages that embed it.

pub mod protocol;

pub use protocol::{AvatarCommand, AvatarEvent, Emotion, HostMessage};
