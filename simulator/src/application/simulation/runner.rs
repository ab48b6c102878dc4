use shared::{Emotion, HostMessage};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::application::ports::{NewSessionRequest, SessionDefaults, StreamingApiPort};
use crate::application::session::SessionDriver;
use crate::application::SessionError;
use crate::domain::events::ConversationLog;
use crate::domain::simulation::{
    Advance, AvatarRoster, ScriptEntry, ScriptStore, SimulationPhase, SimulationProgress,
};
use crate::domain::value_objects::ConnectionState;

const DEFAULT_CHANNEL_TIMEOUT: Duration = Duration::from_secs(10);

/// Walks a trainee through the three phases, one avatar session at a time
pub struct SimulationRunner {
    api: Arc<dyn StreamingApiPort>,
    driver: SessionDriver,
    roster: AvatarRoster,
    scripts: ScriptStore,
    defaults: SessionDefaults,
    progress: SimulationProgress,
    history: ConversationLog,
    channel_timeout: Duration,
}

impl SimulationRunner {
    pub fn new(
        api: Arc<dyn StreamingApiPort>,
        driver: SessionDriver,
        roster: AvatarRoster,
        scripts: ScriptStore,
        defaults: SessionDefaults,
    ) -> Self {
        Self {
            api,
            driver,
            roster,
            scripts,
            defaults,
            progress: SimulationProgress::new(),
            history: ConversationLog::default(),
            channel_timeout: DEFAULT_CHANNEL_TIMEOUT,
        }
    }

    /// How long to wait for the command channel before skipping the opening line
    pub fn with_channel_timeout(mut self, timeout: Duration) -> Self {
        self.channel_timeout = timeout;
        self
    }

    pub fn phase(&self) -> SimulationPhase {
        self.progress.phase()
    }

    #[cfg(test)]
    pub fn progress(&self) -> &SimulationProgress {
        &self.progress
    }

    #[cfg(test)]
    pub fn history(&self) -> &ConversationLog {
        &self.history
    }

    #[cfg(test)]
    pub fn driver(&self) -> &SessionDriver {
        &self.driver
    }

    /// Connect the first phase's avatar
    pub async fn start(&mut self) -> Result<(), SessionError> {
        self.enter_phase(self.progress.phase()).await
    }

    /// Start, then serve host messages until `DISCONNECT` or the host goes away
    pub async fn run(&mut self) -> Result<(), SessionError> {
        if let Err(e) = self.start().await {
            error!(error = %e, phase = %self.phase(), "could not start simulation");
        }

        while let Some(message) = self.driver.next_message().await {
            match self.handle(message).await {
                Ok(ControlFlow::Break(())) => break,
                Ok(ControlFlow::Continue(())) => {}
                Err(e) => warn!(error = %e, phase = %self.phase(), "host message failed"),
            }
        }

        self.teardown().await;
        let undelivered = self
            .history
            .entries()
            .iter()
            .filter(|turn| !turn.delivered)
            .count();
        info!(turns = self.history.len(), undelivered, "simulation ended");
        Ok(())
    }

    /// Apply one host message
    pub async fn handle(&mut self, message: HostMessage) -> Result<ControlFlow<()>, SessionError> {
        match message {
            HostMessage::SendToAvatar { text, emotion } => self.speak_text(&text, emotion).await?,
            HostMessage::PlayScript { index } => self.play_script(index).await?,
            HostMessage::Respond { text } => {
                self.respond(&text).await?;
            }
            HostMessage::AdvancePhase => self.advance_phase().await?,
            HostMessage::Reset => self.reset().await?,
            HostMessage::Disconnect => return Ok(ControlFlow::Break(())),
        }
        Ok(ControlFlow::Continue(()))
    }

    pub async fn play_script(&mut self, index: usize) -> Result<(), SessionError> {
        let phase = self.phase();
        let entry = self
            .scripts
            .entry(phase, index)
            .cloned()
            .ok_or_else(|| SessionError::ScriptNotFound {
                phase: phase.as_str().to_string(),
                index,
            })?;
        self.speak(&entry).await
    }

    /// Record the trainee's reply and answer it when a scripted line matches.
    ///
    /// Returns whether a scripted reply was played.
    pub async fn respond(&mut self, text: &str) -> Result<bool, SessionError> {
        self.history.record_trainee(text);
        let reply = self.scripts.match_keywords(self.phase(), text).cloned();
        match reply {
            Some(entry) => {
                self.speak(&entry).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Complete the current phase and hand over to the next avatar
    pub async fn advance_phase(&mut self) -> Result<(), SessionError> {
        match self.progress.complete_current() {
            Advance::Entered(next) => {
                info!(phase = %next, "advancing simulation");
                self.enter_phase(next).await
            }
            Advance::Finished => {
                info!("simulation complete");
                self.teardown().await;
                Ok(())
            }
            Advance::AlreadyFinished => {
                warn!("simulation already complete");
                Ok(())
            }
        }
    }

    /// Back to the pre-briefing with an empty history
    pub async fn reset(&mut self) -> Result<(), SessionError> {
        info!("resetting simulation");
        self.teardown().await;
        self.progress.reset();
        if !self.history.is_empty() {
            info!(turns = self.history.len(), "clearing conversation history");
            self.history.clear();
        }
        self.enter_phase(self.progress.phase()).await
    }

    async fn enter_phase(&mut self, phase: SimulationPhase) -> Result<(), SessionError> {
        self.teardown().await;

        let key = phase.avatar_key();
        let profile = self
            .roster
            .get(key)
            .ok_or_else(|| SessionError::UnknownAvatar(key.to_string()))?;
        info!(phase = %phase, avatar = %profile.name, avatar_id = %profile.avatar_id, "starting phase");

        let request = NewSessionRequest::for_avatar(profile, &self.defaults);
        let params = self.api.create_session(&request).await?;
        self.driver.connect(params).await?;

        let opening = self.scripts.opening(phase).cloned();
        if !self.driver.wait_for_channel(self.channel_timeout).await {
            warn!(phase = %phase, "command channel unavailable, opening line skipped");
            if let Some(entry) = opening {
                self.history
                    .record_undelivered(phase.avatar_key(), &entry.text, entry.emotion);
            }
            return Ok(());
        }
        match opening {
            Some(entry) => self.speak(&entry).await,
            None => Ok(()),
        }
    }

    async fn speak(&mut self, entry: &ScriptEntry) -> Result<(), SessionError> {
        self.speak_text(&entry.text, entry.emotion).await
    }

    async fn speak_text(&mut self, text: &str, emotion: Emotion) -> Result<(), SessionError> {
        self.driver.send(text, emotion).await?;
        let avatar = self.phase().avatar_key();
        self.history.record_avatar(avatar, text, emotion);
        Ok(())
    }

    async fn teardown(&mut self) {
        if self.driver.state() == ConnectionState::Idle {
            return;
        }
        if let Err(e) = self.driver.disconnect().await {
            warn!(error = %e, "disconnect failed");
        }
    }
}
