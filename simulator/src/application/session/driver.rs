use shared::{Emotion, HostMessage};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::controller::SessionController;
use super::signaling::RetryPolicy;
use crate::application::ports::{PeerConnector, PeerEvent, StreamingApiPort};
use crate::application::SessionError;
use crate::domain::value_objects::{ConnectionState, SessionParams, SessionStatus};

/// Single task that feeds peer events and host messages to the controller
pub struct SessionDriver {
    controller: SessionController,
    events: mpsc::UnboundedReceiver<PeerEvent>,
    host: mpsc::Receiver<HostMessage>,
    host_open: bool,
    /// Host messages that arrived while a connect was in flight
    deferred: VecDeque<HostMessage>,
}

impl SessionDriver {
    pub fn new(
        api: Arc<dyn StreamingApiPort>,
        connector: Arc<dyn PeerConnector>,
        policy: RetryPolicy,
        host: mpsc::Receiver<HostMessage>,
    ) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        Self {
            controller: SessionController::new(api, connector, tx, policy),
            events,
            host,
            host_open: true,
            deferred: VecDeque::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.controller.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.controller.subscribe()
    }

    /// Connect while still listening to the host.
    ///
    /// A host `DISCONNECT` aborts the attempt and tears the session down,
    /// then is handed back by [`SessionDriver::next_message`] like any other
    /// message that arrived meanwhile.
    pub async fn connect(&mut self, params: SessionParams) -> Result<(), SessionError> {
        let cancel = self.controller.cancellation();
        let mut abort = false;

        let result = {
            let connect = self.controller.connect(params);
            tokio::pin!(connect);
            loop {
                tokio::select! {
                    result = &mut connect => break result,
                    message = self.host.recv(), if self.host_open && !abort => match message {
                        Some(HostMessage::Disconnect) => {
                            info!("host requested disconnect during connect");
                            abort = true;
                            cancel.cancel();
                        }
                        Some(other) => self.deferred.push_back(other),
                        None => self.host_open = false,
                    },
                }
            }
        };

        if abort {
            self.controller.disconnect().await?;
            // Callers still have to see the host asked to stop
            self.deferred.push_back(HostMessage::Disconnect);
            return Err(SessionError::Cancelled);
        }
        result
    }

    /// Next host message, handling peer events while waiting.
    ///
    /// Returns `None` once the host side has gone away.
    pub async fn next_message(&mut self) -> Option<HostMessage> {
        if let Some(message) = self.deferred.pop_front() {
            return Some(message);
        }
        if !self.host_open {
            return None;
        }
        loop {
            tokio::select! {
                Some(event) = self.events.recv() => self.controller.handle_event(event).await,
                message = self.host.recv() => match message {
                    Some(message) => return Some(message),
                    None => {
                        debug!("host channel closed");
                        self.host_open = false;
                        return None;
                    }
                },
            }
        }
    }

    /// Handle peer events until the command channel opens or `timeout` passes
    pub async fn wait_for_channel(&mut self, timeout: Duration) -> bool {
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        while !self.controller.channel_ready() {
            if !self.controller.is_connected() {
                return false;
            }
            tokio::select! {
                _ = &mut deadline => {
                    warn!(timeout_ms = timeout.as_millis() as u64, "command channel did not open in time");
                    return false;
                }
                Some(event) = self.events.recv() => self.controller.handle_event(event).await,
            }
        }
        true
    }

    pub async fn send(&self, text: &str, emotion: Emotion) -> Result<(), SessionError> {
        self.controller.send(text, emotion).await
    }

    pub async fn disconnect(&mut self) -> Result<(), SessionError> {
        self.controller.disconnect().await
    }

    /// Relay host messages to the avatar until the host disconnects or goes away
    pub async fn run_until_disconnect(&mut self) -> Result<(), SessionError> {
        while let Some(message) = self.next_message().await {
            match message {
                HostMessage::SendToAvatar { text, emotion } => {
                    if let Err(e) = self.controller.send(&text, emotion).await {
                        warn!(error = %e, "could not relay text to avatar");
                    }
                }
                HostMessage::Disconnect => break,
                other => debug!(message = ?other, "ignoring simulation message in single-session mode"),
            }
        }

        if self.controller.state() != ConnectionState::Idle {
            self.controller.disconnect().await?;
        }
        Ok(())
    }
}
