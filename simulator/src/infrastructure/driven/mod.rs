pub mod heygen;
pub mod webrtc;

pub use heygen::HeygenStreamingApi;
pub use webrtc::RtcPeerConnector;
