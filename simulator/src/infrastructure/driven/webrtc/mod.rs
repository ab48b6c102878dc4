// webrtc-rs implementation of the peer connection ports

mod channel;
mod local_audio;
mod microphone;
mod peer;

pub use peer::RtcPeerConnector;
