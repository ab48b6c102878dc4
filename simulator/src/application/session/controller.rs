use shared::{AvatarEvent, Emotion};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::command_channel::{self, CommandChannel};
use super::signaling::{guarded, RetryPolicy, SignalingClient};
use crate::application::ports::{
    CaptureHandle, PeerConnector, PeerEvent, PeerEventKind, PeerEventSink, PeerLink, PeerState,
    StreamingApiPort,
};
use crate::application::SessionError;
use crate::domain::aggregates::AvatarSession;
use crate::domain::value_objects::{
    ConnectionState, MediaBinding, MediaKind, SessionParams, SessionStatus,
};

/// Resources held by the one live session
struct ActiveSession {
    session: AvatarSession,
    signaling: SignalingClient,
    link: Option<Box<dyn PeerLink>>,
    channel: Option<CommandChannel>,
    capture: Option<Box<dyn CaptureHandle>>,
    media: MediaBinding,
}

impl ActiveSession {
    /// Release every local resource; each step runs regardless of the others
    async fn release_local(&mut self) {
        self.signaling.halt();

        if let Some(channel) = self.channel.take() {
            if let Err(e) = channel.close().await {
                warn!(session_id = %self.session.id, error = %e, "failed to close command channel");
            }
        }
        if let Some(link) = self.link.take() {
            if let Err(e) = link.close().await {
                warn!(session_id = %self.session.id, error = %e, "failed to close peer connection");
            }
        }
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.stop().await {
                warn!(session_id = %self.session.id, error = %e, "failed to stop local audio");
            }
        }
        self.media.release();
    }
}

/// Owns the lifecycle of one avatar connection at a time
pub struct SessionController {
    api: Arc<dyn StreamingApiPort>,
    connector: Arc<dyn PeerConnector>,
    events: mpsc::UnboundedSender<PeerEvent>,
    policy: RetryPolicy,
    status: watch::Sender<SessionStatus>,
    cancel: CancellationToken,
    generation: u64,
    active: Option<ActiveSession>,
}

impl SessionController {
    pub fn new(
        api: Arc<dyn StreamingApiPort>,
        connector: Arc<dyn PeerConnector>,
        events: mpsc::UnboundedSender<PeerEvent>,
        policy: RetryPolicy,
    ) -> Self {
        let (status, _) = watch::channel(SessionStatus::idle());
        Self {
            api,
            connector,
            events,
            policy,
            status,
            cancel: CancellationToken::new(),
            generation: 0,
            active: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.active
            .as_ref()
            .map(|a| a.session.state)
            .unwrap_or(ConnectionState::Idle)
    }

    pub fn is_connected(&self) -> bool {
        self.active
            .as_ref()
            .map(|a| a.session.is_connected())
            .unwrap_or(false)
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Token that aborts an in-flight connect; replaced after each disconnect
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[cfg(test)]
    pub fn session(&self) -> Option<&AvatarSession> {
        self.active.as_ref().map(|a| &a.session)
    }

    #[cfg(test)]
    pub fn remote_media(&self) -> Option<&MediaBinding> {
        self.active.as_ref().map(|a| &a.media)
    }

    pub fn channel_ready(&self) -> bool {
        self.active
            .as_ref()
            .and_then(|a| a.channel.as_ref())
            .map(CommandChannel::is_open)
            .unwrap_or(false)
    }

    #[cfg(test)]
    pub fn buffered_candidates(&self) -> usize {
        self.active
            .as_ref()
            .map(|a| a.signaling.buffered())
            .unwrap_or(0)
    }

    /// Establish a new session. Only valid while idle.
    pub async fn connect(&mut self, params: SessionParams) -> Result<(), SessionError> {
        let state = self.state();
        if state != ConnectionState::Idle {
            warn!(state = %state, "connect rejected, a session is already active");
            return Err(SessionError::AlreadyActive(state));
        }

        self.generation += 1;
        let session = AvatarSession::new(params);
        info!(
            session_id = %session.id,
            remote_session = %session.params.session_id,
            generation = self.generation,
            "connecting avatar session"
        );
        self.active = Some(ActiveSession {
            session,
            signaling: SignalingClient::new(Arc::clone(&self.api), self.policy),
            link: None,
            channel: None,
            capture: None,
            media: MediaBinding::default(),
        });
        self.publish(SessionStatus::connecting());

        match self.establish().await {
            Ok(()) => {
                self.publish(SessionStatus::connected());
                Ok(())
            }
            Err(SessionError::Cancelled) => {
                info!("connect cancelled, awaiting teardown");
                Err(SessionError::Cancelled)
            }
            Err(e) => {
                self.fail(&e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn establish(&mut self) -> Result<(), SessionError> {
        let cancel = self.cancel.clone();
        let sink = PeerEventSink::new(self.generation, self.events.clone());
        let connector = Arc::clone(&self.connector);
        let active = self.active.as_mut().ok_or(SessionError::NotActive)?;

        active.session.params.validate()?;

        let link = guarded(&cancel, connector.open(sink))
            .await?
            .map_err(|e| SessionError::PeerSetup(format!("{:#}", e)))?;
        let link: &dyn PeerLink = &**active.link.insert(link);
        active.channel = Some(CommandChannel::new(link.command_channel()));

        match link.attach_local_audio().await {
            Ok(capture) => active.capture = Some(capture),
            Err(e) => warn!(error = %e, "local audio unavailable, continuing without it"),
        }

        let offer = guarded(&cancel, link.create_offer())
            .await?
            .map_err(|e| SessionError::PeerSetup(format!("{:#}", e)))?;

        active
            .signaling
            .negotiate(&mut active.session, link, &offer, &cancel)
            .await?;

        active.session.mark_connected()?;
        active.signaling.start_relaying(&active.session.params);
        info!(
            session_id = %active.session.id,
            attempts = active.session.start_attempts,
            "avatar session connected"
        );
        Ok(())
    }

    async fn fail(&mut self, reason: &str) {
        if let Some(active) = self.active.as_mut() {
            if let Err(e) = active.session.mark_failed(reason) {
                debug!(error = %e, "session already left the live states");
            }
            active.release_local().await;
        }
        error!(reason, "avatar session failed");
        self.publish(SessionStatus::failed(reason));
    }

    /// Relay a line of text to the avatar. Only valid while connected.
    pub async fn send(&self, text: &str, emotion: Emotion) -> Result<(), SessionError> {
        let state = self.state();
        if state != ConnectionState::Connected {
            return Err(SessionError::NotConnected(state));
        }
        let channel = self
            .active
            .as_ref()
            .and_then(|a| a.channel.as_ref())
            .ok_or(SessionError::ChannelNotReady)?;
        channel.send(text, emotion).await?;
        debug!(emotion = %emotion, chars = text.len(), "speak command sent");
        Ok(())
    }

    /// Tear the session down and return to idle.
    ///
    /// Every release step is attempted; failures are logged, never returned.
    pub async fn disconnect(&mut self) -> Result<(), SessionError> {
        let Some(mut active) = self.active.take() else {
            return Err(SessionError::NotActive);
        };

        self.cancel.cancel();
        info!(session_id = %active.session.id, state = %active.session.state, "disconnecting avatar session");
        if let Err(e) = active.session.begin_disconnecting() {
            debug!(error = %e, "disconnect from unexpected state");
        }
        self.publish(SessionStatus::disconnecting());

        active.release_local().await;
        if active.session.reached_connected {
            if let Err(e) = self.api.stop(&active.session.params).await {
                warn!(
                    remote_session = %active.session.params.session_id,
                    error = %e,
                    "failed to notify remote stop"
                );
            }
        }

        self.cancel = CancellationToken::new();
        self.publish(SessionStatus::idle());
        info!(session_id = %active.session.id, "avatar session closed");
        Ok(())
    }

    /// Apply one peer callback to the session
    pub async fn handle_event(&mut self, event: PeerEvent) {
        if event.generation != self.generation {
            debug!(generation = event.generation, current = self.generation, "ignoring stale peer event");
            return;
        }
        let Some(active) = self.active.as_mut() else {
            debug!("ignoring peer event without a session");
            return;
        };
        let state = active.session.state;

        let mut next_status = None;
        let mut failure = None;
        match event.kind {
            PeerEventKind::LocalCandidate(candidate) => {
                active
                    .signaling
                    .on_local_candidate(&active.session.params, candidate);
            }
            PeerEventKind::RemoteTrack(track) => {
                let (id, kind) = (track.id.clone(), track.kind);
                active.media.attach(track);
                info!(
                    track = %id,
                    kind = ?kind,
                    tracks = active.media.tracks().len(),
                    video = active.media.has(MediaKind::Video),
                    "remote track attached"
                );
            }
            PeerEventKind::ChannelOpen => info!("command channel open"),
            PeerEventKind::ChannelClosed => {
                if state == ConnectionState::Connected {
                    warn!("command channel closed by remote");
                }
            }
            PeerEventKind::ChannelMessage(payload) => {
                if state != ConnectionState::Connected {
                    debug!(state = %state, "ignoring channel message outside connected state");
                } else {
                    next_status = match command_channel::interpret(&payload) {
                        Some(AvatarEvent::AvatarStartTalking) => Some(SessionStatus::speaking()),
                        Some(AvatarEvent::AvatarStopTalking) => Some(SessionStatus::ready()),
                        Some(AvatarEvent::Error { message }) => {
                            warn!(message = %message, "avatar reported an error");
                            Some(SessionStatus::avatar_error(&message))
                        }
                        Some(AvatarEvent::Unknown { .. }) | None => None,
                    };
                }
            }
            PeerEventKind::ConnectionState(PeerState::Failed) => {
                if state == ConnectionState::Connected {
                    failure = Some("peer connection failed");
                } else {
                    debug!(state = %state, "peer failure outside connected state");
                }
            }
            PeerEventKind::ConnectionState(peer_state) => {
                debug!(peer_state = ?peer_state, "peer connection state changed");
            }
        }

        if let Some(reason) = failure {
            self.fail(reason).await;
        } else if let Some(status) = next_status {
            self.publish(status);
        }
    }

    fn publish(&self, status: SessionStatus) {
        debug!(state = %status.state, text = %status.text, "session status");
        self.status.send_replace(status);
    }
}
