use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverInit};
use webrtc::track::track_remote::TrackRemote;

use super::channel::RtcCommandChannel;
use super::local_audio::LocalAudio;
use crate::application::ports::{
    CaptureHandle, CommandChannelPort, PeerConnector, PeerEventKind, PeerEventSink, PeerLink,
    PeerState,
};
use crate::domain::value_objects::{IceCandidate, MediaKind, RemoteTrack};

const COMMAND_CHANNEL_LABEL: &str = "commands";

/// Opens webrtc-rs peer connections towards the avatar service
pub struct RtcPeerConnector {
    ice_servers: Vec<String>,
}

impl RtcPeerConnector {
    pub fn new(ice_servers: Vec<String>) -> Self {
        Self { ice_servers }
    }

    async fn new_peer_connection(&self) -> Result<Arc<RTCPeerConnection>> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let mut config = RTCConfiguration::default();
        if !self.ice_servers.is_empty() {
            config.ice_servers = vec![RTCIceServer {
                urls: self.ice_servers.clone(),
                ..Default::default()
            }];
        }

        Ok(Arc::new(api.new_peer_connection(config).await?))
    }
}

#[async_trait]
impl PeerConnector for RtcPeerConnector {
    async fn open(&self, sink: PeerEventSink) -> Result<Box<dyn PeerLink>> {
        let peer = self
            .new_peer_connection()
            .await
            .context("failed to create peer connection")?;

        // The avatar's video only flows one way
        peer.add_transceiver_from_kind(
            RTPCodecType::Video,
            Some(RTCRtpTransceiverInit {
                direction: RTCRtpTransceiverDirection::Recvonly,
                send_encodings: vec![],
            }),
        )
        .await?;

        let data_channel = peer
            .create_data_channel(
                COMMAND_CHANNEL_LABEL,
                Some(RTCDataChannelInit {
                    ordered: Some(true),
                    ..Default::default()
                }),
            )
            .await
            .context("failed to create command channel")?;
        let channel = Arc::new(RtcCommandChannel::bind(data_channel, &sink));

        register_callbacks(&peer, &sink);
        info!(generation = sink.generation(), "opened peer connection");

        Ok(Box::new(RtcPeerLink {
            peer,
            channel,
            local_audio: AtomicBool::new(false),
        }))
    }
}

fn register_callbacks(peer: &Arc<RTCPeerConnection>, sink: &PeerEventSink) {
    let on_candidate = sink.clone();
    peer.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
        let sink = on_candidate.clone();
        Box::pin(async move {
            // None marks the end of gathering
            let Some(candidate) = candidate else {
                debug!("ICE gathering complete");
                return;
            };
            match candidate.to_json() {
                Ok(init) => sink.emit(PeerEventKind::LocalCandidate(from_init(init))),
                Err(e) => warn!(error = %e, "failed to serialize local ICE candidate"),
            }
        })
    }));

    let on_track = sink.clone();
    peer.on_track(Box::new(
        move |track: Arc<TrackRemote>, _receiver: Arc<RTCRtpReceiver>, _transceiver: Arc<RTCRtpTransceiver>| {
            let kind = match track.kind() {
                RTPCodecType::Audio => Some(MediaKind::Audio),
                RTPCodecType::Video => Some(MediaKind::Video),
                _ => None,
            };
            if let Some(kind) = kind {
                on_track.emit(PeerEventKind::RemoteTrack(RemoteTrack {
                    id: track.id(),
                    kind,
                }));
            }
            Box::pin(async {})
        },
    ));

    let on_state = sink.clone();
    peer.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
        debug!(state = %state, "peer connection state changed");
        on_state.emit(PeerEventKind::ConnectionState(peer_state(state)));
        Box::pin(async {})
    }));
}

pub struct RtcPeerLink {
    peer: Arc<RTCPeerConnection>,
    channel: Arc<RtcCommandChannel>,
    local_audio: AtomicBool,
}

#[async_trait]
impl PeerLink for RtcPeerLink {
    async fn attach_local_audio(&self) -> Result<Box<dyn CaptureHandle>> {
        let audio = LocalAudio::attach(&self.peer)
            .await
            .context("failed to attach local audio")?;
        self.local_audio.store(true, Ordering::SeqCst);
        Ok(Box::new(audio))
    }

    async fn create_offer(&self) -> Result<String> {
        if !self.local_audio.load(Ordering::SeqCst) {
            // Still receive the avatar's voice without a local track
            self.peer
                .add_transceiver_from_kind(
                    RTPCodecType::Audio,
                    Some(RTCRtpTransceiverInit {
                        direction: RTCRtpTransceiverDirection::Recvonly,
                        send_encodings: vec![],
                    }),
                )
                .await?;
        }

        let offer = self.peer.create_offer(None).await?;
        let sdp = offer.sdp.clone();
        self.peer.set_local_description(offer).await?;
        Ok(sdp)
    }

    async fn apply_answer(&self, sdp: &str) -> Result<()> {
        let answer = RTCSessionDescription::answer(sdp.to_owned())?;
        self.peer.set_remote_description(answer).await?;
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: &IceCandidate) -> Result<()> {
        self.peer.add_ice_candidate(to_init(candidate)).await?;
        Ok(())
    }

    fn command_channel(&self) -> Arc<dyn CommandChannelPort> {
        self.channel.clone()
    }

    async fn close(&self) -> Result<()> {
        self.peer.close().await?;
        Ok(())
    }
}

fn to_init(candidate: &IceCandidate) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: candidate.candidate.clone(),
        sdp_mid: candidate.sdp_mid.clone(),
        sdp_mline_index: candidate.sdp_mline_index,
        username_fragment: candidate.username_fragment.clone(),
    }
}

fn from_init(init: RTCIceCandidateInit) -> IceCandidate {
    IceCandidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_mline_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}

fn peer_state(state: RTCPeerConnectionState) -> PeerState {
    match state {
        RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => PeerState::New,
        RTCPeerConnectionState::Connecting => PeerState::Connecting,
        RTCPeerConnectionState::Connected => PeerState::Connected,
        RTCPeerConnectionState::Disconnected => PeerState::Disconnected,
        RTCPeerConnectionState::Failed => PeerState::Failed,
        RTCPeerConnectionState::Closed => PeerState::Closed,
    }
}
