pub mod command_channel;
pub mod controller;
pub mod driver;
pub mod signaling;

#[cfg(test)]
pub(crate) mod testing;

pub use command_channel::CommandChannel;
pub use controller::SessionController;
pub use driver::SessionDriver;
pub use signaling::{RetryPolicy, SignalingClient};
