use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::ports::{PeerLink, StartAnswer, StreamingApiPort};
use crate::application::SessionError;
use crate::domain::aggregates::AvatarSession;
use crate::domain::value_objects::{IceCandidate, SessionParams};

/// How often and how patiently the `start` exchange is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of `start` requests, the first one included
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayMode {
    /// Negotiating; local candidates are held back
    Buffering,
    Relaying,
    /// Session failed or is being torn down
    Halted,
}

/// Session-start handshake and ICE relay against the streaming API
pub struct SignalingClient {
    api: Arc<dyn StreamingApiPort>,
    policy: RetryPolicy,
    mode: RelayMode,
    pending: Vec<IceCandidate>,
}

impl SignalingClient {
    pub fn new(api: Arc<dyn StreamingApiPort>, policy: RetryPolicy) -> Self {
        Self {
            api,
            policy,
            mode: RelayMode::Buffering,
            pending: Vec::new(),
        }
    }

    /// Exchange `offer_sdp` for an answer and apply it to `link`
    pub async fn negotiate(
        &mut self,
        session: &mut AvatarSession,
        link: &dyn PeerLink,
        offer_sdp: &str,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let answer = self.start_with_retry(session, offer_sdp, cancel).await?;

        guarded(cancel, link.apply_answer(&answer.sdp))
            .await?
            .map_err(|e| SessionError::Negotiation(format!("invalid answer: {:#}", e)))?;
        debug!(
            session_id = %session.params.session_id,
            count = answer.ice_candidates.len(),
            "applied remote answer"
        );

        for candidate in &answer.ice_candidates {
            if let Err(e) = link.add_remote_candidate(candidate).await {
                warn!(candidate = %candidate.candidate, error = %e, "skipping remote ICE candidate");
            }
        }
        Ok(())
    }

    // The same offer is resent on every attempt.
    async fn start_with_retry(
        &self,
        session: &mut AvatarSession,
        offer_sdp: &str,
        cancel: &CancellationToken,
    ) -> Result<StartAnswer, SessionError> {
        loop {
            let attempt = session.record_start_attempt();
            info!(
                session_id = %session.params.session_id,
                attempt,
                max_attempts = self.policy.max_attempts,
                "sending start request"
            );

            let failure = match guarded(cancel, self.api.start(&session.params, offer_sdp)).await? {
                Ok(answer) => return Ok(answer),
                Err(e) => e,
            };

            if attempt >= self.policy.max_attempts {
                error!(attempt, error = %failure, "start request failed, giving up");
                return Err(SessionError::Negotiation(failure.to_string()));
            }
            warn!(
                attempt,
                error = %failure,
                delay_ms = self.policy.delay.as_millis() as u64,
                "start request failed, retrying"
            );
            guarded(cancel, tokio::time::sleep(self.policy.delay)).await?;
        }
    }

    /// Route a locally gathered candidate according to the session's progress
    pub fn on_local_candidate(&mut self, params: &SessionParams, candidate: IceCandidate) {
        match self.mode {
            RelayMode::Buffering => {
                debug!(candidate = %candidate.candidate, "buffering local ICE candidate");
                self.pending.push(candidate);
            }
            RelayMode::Relaying => self.relay(params, candidate),
            RelayMode::Halted => {
                debug!(candidate = %candidate.candidate, "dropping local ICE candidate, session inactive");
            }
        }
    }

    /// Switch to live relaying and flush everything gathered so far
    pub fn start_relaying(&mut self, params: &SessionParams) {
        self.mode = RelayMode::Relaying;
        let pending = std::mem::take(&mut self.pending);
        if !pending.is_empty() {
            info!(count = pending.len(), "flushing buffered ICE candidates");
        }
        for candidate in pending {
            self.relay(params, candidate);
        }
    }

    pub fn halt(&mut self) {
        self.mode = RelayMode::Halted;
        self.pending.clear();
    }

    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    // Fire-and-forget; relays may land out of order.
    fn relay(&self, params: &SessionParams, candidate: IceCandidate) {
        let api = Arc::clone(&self.api);
        let params = params.clone();
        tokio::spawn(async move {
            match api.submit_ice(&params, &candidate).await {
                Ok(()) => debug!(candidate = %candidate.candidate, "relayed local ICE candidate"),
                Err(e) => warn!(candidate = %candidate.candidate, error = %e, "failed to relay ICE candidate"),
            }
        });
    }
}

/// Run `fut` unless `cancel` fires first
pub(crate) async fn guarded<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, SessionError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SessionError::Cancelled),
        output = fut => Ok(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{ApiError, MockStreamingApiPort, PeerConnector};
    use crate::application::session::testing::{params, settle, FakeConnector, FakeStreamingApi};
    use crate::application::ports::PeerEventSink;
    use tokio::sync::mpsc;

    fn rejected(message: &str) -> ApiError {
        ApiError::Rejected {
            status: 400,
            message: message.to_string(),
        }
    }

    async fn open_link(connector: &FakeConnector) -> Box<dyn PeerLink> {
        let (tx, _rx) = mpsc::unbounded_channel();
        connector.open(PeerEventSink::new(1, tx)).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_three_failures() {
        let mut api = MockStreamingApiPort::new();
        api.expect_start()
            .times(3)
            .returning(|_, _| Err(rejected("invalid session")));

        let connector = FakeConnector::default();
        let link = open_link(&connector).await;
        let mut session = AvatarSession::new(params());
        let mut client = SignalingClient::new(Arc::new(api), RetryPolicy::default());

        let started = tokio::time::Instant::now();
        let err = client
            .negotiate(&mut session, link.as_ref(), "v=0 offer", &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err, SessionError::Negotiation("invalid session".to_string()));
        assert_eq!(session.start_attempts, 3);
        // two fixed delays between three attempts
        assert!(started.elapsed() >= Duration::from_secs(4));
        assert!(connector.peers.answers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let mut api = MockStreamingApiPort::new();
        let mut calls = 0;
        api.expect_start().times(3).returning(move |_, offer| {
            calls += 1;
            assert_eq!(offer, "v=0 offer");
            if calls < 3 {
                Err(ApiError::Transport("connection reset".to_string()))
            } else {
                Ok(StartAnswer {
                    sdp: "v=0 answer".to_string(),
                    ice_candidates: vec![IceCandidate::new("candidate:1")],
                })
            }
        });

        let connector = FakeConnector::default();
        let link = open_link(&connector).await;
        let mut session = AvatarSession::new(params());
        let mut client = SignalingClient::new(Arc::new(api), RetryPolicy::default());

        client
            .negotiate(&mut session, link.as_ref(), "v=0 offer", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(session.start_attempts, 3);
        assert_eq!(connector.peers.answers(), vec!["v=0 answer".to_string()]);
        assert_eq!(connector.peers.remote_candidates().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_retry_timer() {
        let mut api = MockStreamingApiPort::new();
        api.expect_start()
            .times(1)
            .returning(|_, _| Err(rejected("busy")));

        let connector = FakeConnector::default();
        let link = open_link(&connector).await;
        let mut session = AvatarSession::new(params());
        let mut client = SignalingClient::new(Arc::new(api), RetryPolicy::default());

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let err = client
            .negotiate(&mut session, link.as_ref(), "v=0 offer", &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::Cancelled);
        assert_eq!(session.start_attempts, 1);
    }

    #[tokio::test]
    async fn test_bad_remote_candidate_is_skipped() {
        let api = Arc::new(FakeStreamingApi::default());
        api.set_answer(StartAnswer {
            sdp: "v=0 answer".to_string(),
            ice_candidates: vec![
                IceCandidate::new("bad"),
                IceCandidate::new("candidate:2"),
            ],
        });
        let connector = FakeConnector::default();
        connector.peers.reject_candidate("bad");
        let link = open_link(&connector).await;
        let mut session = AvatarSession::new(params());
        let mut client = SignalingClient::new(api, RetryPolicy::default());

        client
            .negotiate(&mut session, link.as_ref(), "v=0 offer", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            connector.peers.remote_candidates(),
            vec![IceCandidate::new("candidate:2")]
        );
    }

    #[tokio::test]
    async fn test_early_candidates_are_buffered_then_flushed() {
        let api = Arc::new(FakeStreamingApi::default());
        let mut client = SignalingClient::new(api.clone(), RetryPolicy::default());
        let params = params();

        client.on_local_candidate(&params, IceCandidate::new("candidate:a"));
        client.on_local_candidate(&params, IceCandidate::new("candidate:b"));
        settle().await;
        assert_eq!(client.buffered(), 2);
        assert!(api.submitted().is_empty());

        client.start_relaying(&params);
        client.on_local_candidate(&params, IceCandidate::new("candidate:c"));
        settle().await;

        let mut relayed: Vec<_> = api.submitted().into_iter().map(|c| c.candidate).collect();
        relayed.sort();
        assert_eq!(relayed, vec!["candidate:a", "candidate:b", "candidate:c"]);
        assert_eq!(client.buffered(), 0);
    }

    #[tokio::test]
    async fn test_halted_client_drops_candidates() {
        let api = Arc::new(FakeStreamingApi::default());
        let mut client = SignalingClient::new(api.clone(), RetryPolicy::default());
        let params = params();

        client.on_local_candidate(&params, IceCandidate::new("candidate:a"));
        client.halt();
        client.on_local_candidate(&params, IceCandidate::new("candidate:b"));
        settle().await;

        assert_eq!(client.buffered(), 0);
        assert!(api.submitted().is_empty());
    }
}
