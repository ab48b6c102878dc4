// Application ports - Driven ports (output ports implemented by infrastructure)

pub mod peer_ports;
pub mod streaming_api;

pub use peer_ports::{
    CaptureHandle, CommandChannelPort, PeerConnector, PeerEvent, PeerEventKind, PeerEventSink,
    PeerLink, PeerState,
};
pub use streaming_api::{
    ApiError, NewSessionRequest, SessionDefaults, StartAnswer, StreamingApiPort,
};

#[cfg(test)]
pub use streaming_api::MockStreamingApiPort;
