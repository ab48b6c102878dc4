//! In-memory fakes for the session ports

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use crate::application::ports::{
    ApiError, CaptureHandle, CommandChannelPort, NewSessionRequest, PeerConnector, PeerEventKind,
    PeerEventSink, PeerLink, StartAnswer, StreamingApiPort,
};
use crate::domain::value_objects::{IceCandidate, SessionParams, SessionStatus};

pub fn params() -> SessionParams {
    SessionParams::new("sess-1", "token-1", "https://api.heygen.com")
}

/// Let spawned relay tasks run to completion
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[derive(Default)]
pub struct FakeChannel {
    open: AtomicBool,
    closed: AtomicBool,
    sent: Mutex<Vec<String>>,
}

impl FakeChannel {
    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandChannelPort for FakeChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send_text(&self, payload: String) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(payload);
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.open.store(false, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Shared record of everything the fake peers were asked to do
#[derive(Default)]
pub struct PeerRecord {
    opened: AtomicUsize,
    closed: AtomicUsize,
    audio_attached: AtomicUsize,
    audio_stopped: AtomicUsize,
    fail_audio: AtomicBool,
    open_channels: AtomicBool,
    answers: Mutex<Vec<String>>,
    remote_candidates: Mutex<Vec<IceCandidate>>,
    rejected: Mutex<Vec<String>>,
    gathered: Mutex<Vec<IceCandidate>>,
    channels: Mutex<Vec<Arc<FakeChannel>>>,
    status: Mutex<Option<watch::Receiver<SessionStatus>>>,
    status_on_close: Mutex<Vec<String>>,
}

impl PeerRecord {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn audio_attached(&self) -> usize {
        self.audio_attached.load(Ordering::SeqCst)
    }

    pub fn audio_stopped(&self) -> usize {
        self.audio_stopped.load(Ordering::SeqCst)
    }

    pub fn fail_audio(&self) {
        self.fail_audio.store(true, Ordering::SeqCst);
    }

    /// Hand out command channels that are already open
    pub fn open_channels(&self) {
        self.open_channels.store(true, Ordering::SeqCst);
    }

    pub fn answers(&self) -> Vec<String> {
        self.answers.lock().unwrap().clone()
    }

    pub fn remote_candidates(&self) -> Vec<IceCandidate> {
        self.remote_candidates.lock().unwrap().clone()
    }

    /// Make `add_remote_candidate` fail for this candidate string
    pub fn reject_candidate(&self, candidate: &str) {
        self.rejected.lock().unwrap().push(candidate.to_string());
    }

    /// Emit these local candidates whenever an offer is created
    pub fn gather_on_offer(&self, candidates: Vec<IceCandidate>) {
        *self.gathered.lock().unwrap() = candidates;
    }

    /// Record the published status text each time a peer is closed
    pub fn watch_status(&self, status: watch::Receiver<SessionStatus>) {
        *self.status.lock().unwrap() = Some(status);
    }

    pub fn status_on_close(&self) -> Vec<String> {
        self.status_on_close.lock().unwrap().clone()
    }

    /// Command channel of the most recently opened peer
    pub fn channel(&self) -> Arc<FakeChannel> {
        self.channels
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no peer opened yet")
    }
}

#[derive(Clone, Default)]
pub struct FakeConnector {
    pub peers: Arc<PeerRecord>,
}

#[async_trait]
impl PeerConnector for FakeConnector {
    async fn open(&self, sink: PeerEventSink) -> anyhow::Result<Box<dyn PeerLink>> {
        self.peers.opened.fetch_add(1, Ordering::SeqCst);
        let channel = Arc::new(FakeChannel::default());
        channel.set_open(self.peers.open_channels.load(Ordering::SeqCst));
        self.peers.channels.lock().unwrap().push(channel.clone());
        Ok(Box::new(FakePeer {
            peers: Arc::clone(&self.peers),
            channel,
            sink,
        }))
    }
}

struct FakePeer {
    peers: Arc<PeerRecord>,
    channel: Arc<FakeChannel>,
    sink: PeerEventSink,
}

#[async_trait]
impl PeerLink for FakePeer {
    async fn attach_local_audio(&self) -> anyhow::Result<Box<dyn CaptureHandle>> {
        if self.peers.fail_audio.load(Ordering::SeqCst) {
            anyhow::bail!("no capture device");
        }
        self.peers.audio_attached.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeCapture {
            peers: Arc::clone(&self.peers),
        }))
    }

    async fn create_offer(&self) -> anyhow::Result<String> {
        let gathered = self.peers.gathered.lock().unwrap().clone();
        for candidate in gathered {
            self.sink.emit(PeerEventKind::LocalCandidate(candidate));
        }
        Ok("v=0 offer".to_string())
    }

    async fn apply_answer(&self, sdp: &str) -> anyhow::Result<()> {
        self.peers.answers.lock().unwrap().push(sdp.to_string());
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: &IceCandidate) -> anyhow::Result<()> {
        if self.peers.rejected.lock().unwrap().contains(&candidate.candidate) {
            anyhow::bail!("malformed candidate");
        }
        self.peers
            .remote_candidates
            .lock()
            .unwrap()
            .push(candidate.clone());
        Ok(())
    }

    fn command_channel(&self) -> Arc<dyn CommandChannelPort> {
        self.channel.clone()
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.peers.closed.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.peers.status.lock().unwrap().as_ref() {
            let text = status.borrow().text.clone();
            self.peers.status_on_close.lock().unwrap().push(text);
        }
        Ok(())
    }
}

struct FakeCapture {
    peers: Arc<PeerRecord>,
}

#[async_trait]
impl CaptureHandle for FakeCapture {
    async fn stop(&mut self) -> anyhow::Result<()> {
        self.peers.audio_stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Scriptable stand-in for the hosted streaming API
#[derive(Default)]
pub struct FakeStreamingApi {
    answer: Mutex<Option<StartAnswer>>,
    start_failures: Mutex<VecDeque<ApiError>>,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    fail_stop: AtomicBool,
    created: Mutex<Vec<NewSessionRequest>>,
    submitted: Mutex<Vec<IceCandidate>>,
}

impl FakeStreamingApi {
    pub fn set_answer(&self, answer: StartAnswer) {
        *self.answer.lock().unwrap() = Some(answer);
    }

    /// Fail the next `times` start requests with `error`
    pub fn fail_start(&self, times: usize, error: ApiError) {
        let mut failures = self.start_failures.lock().unwrap();
        for _ in 0..times {
            failures.push_back(error.clone());
        }
    }

    pub fn fail_stop(&self) {
        self.fail_stop.store(true, Ordering::SeqCst);
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> Vec<NewSessionRequest> {
        self.created.lock().unwrap().clone()
    }

    pub fn submitted(&self) -> Vec<IceCandidate> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamingApiPort for FakeStreamingApi {
    async fn create_session(&self, request: &NewSessionRequest) -> Result<SessionParams, ApiError> {
        let mut created = self.created.lock().unwrap();
        created.push(request.clone());
        Ok(SessionParams::new(
            format!("sess-{}", created.len()),
            "token",
            "https://api.heygen.com",
        ))
    }

    async fn start(&self, _params: &SessionParams, _offer_sdp: &str) -> Result<StartAnswer, ApiError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.start_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(self.answer.lock().unwrap().clone().unwrap_or(StartAnswer {
            sdp: "v=0 answer".to_string(),
            ice_candidates: Vec::new(),
        }))
    }

    async fn submit_ice(&self, _params: &SessionParams, candidate: &IceCandidate) -> Result<(), ApiError> {
        self.submitted.lock().unwrap().push(candidate.clone());
        Ok(())
    }

    async fn stop(&self, _params: &SessionParams) -> Result<(), ApiError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(ApiError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}
