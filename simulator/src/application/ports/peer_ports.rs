use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::domain::value_objects::{IceCandidate, RemoteTrack};

/// Coarse peer-connection state as reported by the WebRTC stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PeerEventKind {
    LocalCandidate(IceCandidate),
    RemoteTrack(RemoteTrack),
    ChannelOpen,
    ChannelClosed,
    ChannelMessage(Bytes),
    ConnectionState(PeerState),
}

/// Callback output of a peer connection, tagged with the session generation
#[derive(Debug, Clone, PartialEq)]
pub struct PeerEvent {
    pub generation: u64,
    pub kind: PeerEventKind,
}

/// Where peer callbacks post their events
#[derive(Debug, Clone)]
pub struct PeerEventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<PeerEvent>,
}

impl PeerEventSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<PeerEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn emit(&self, kind: PeerEventKind) {
        let event = PeerEvent {
            generation: self.generation,
            kind,
        };
        if self.tx.send(event).is_err() {
            tracing::debug!(generation = self.generation, "peer event dropped, controller gone");
        }
    }
}

/// The ordered data channel carrying avatar commands
#[async_trait]
pub trait CommandChannelPort: Send + Sync {
    fn is_open(&self) -> bool;
    async fn send_text(&self, payload: String) -> anyhow::Result<()>;
    async fn close(&self) -> anyhow::Result<()>;
}

/// A local media source attached to the connection
#[async_trait]
pub trait CaptureHandle: Send + Sync {
    async fn stop(&mut self) -> anyhow::Result<()>;
}

/// One negotiated (or negotiating) peer connection
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// Add the local audio track; must happen before the offer is created
    async fn attach_local_audio(&self) -> anyhow::Result<Box<dyn CaptureHandle>>;

    /// Create the offer, set it as local description and return its SDP
    async fn create_offer(&self) -> anyhow::Result<String>;

    async fn apply_answer(&self, sdp: &str) -> anyhow::Result<()>;

    async fn add_remote_candidate(&self, candidate: &IceCandidate) -> anyhow::Result<()>;

    fn command_channel(&self) -> Arc<dyn CommandChannelPort>;

    async fn close(&self) -> anyhow::Result<()>;
}

/// Port for opening peer connections (implemented by infrastructure)
#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Open a connection with its command channel already created
    async fn open(&self, sink: PeerEventSink) -> anyhow::Result<Box<dyn PeerLink>>;
}
