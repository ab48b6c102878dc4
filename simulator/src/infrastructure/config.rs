use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::application::ports::SessionDefaults;
use crate::application::session::RetryPolicy;
use crate::domain::simulation::{AvatarOverride, AvatarRoster};

const DEFAULT_FILE: &str = "simulator";
const ENV_PREFIX: &str = "AVATAR_SIM";
const LEGACY_API_KEY_VAR: &str = "HEYGEN_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("no HeyGen API key configured (set heygen.api_key, AVATAR_SIM__HEYGEN__API_KEY or HEYGEN_API_KEY)")]
    MissingApiKey,

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeygenSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub quality: String,
    pub voice_id: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebRtcSettings {
    pub ice_servers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationSettings {
    /// How long a phase waits for the command channel before its opening line
    pub channel_timeout_ms: u64,
}

/// Simulator configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub heygen: HeygenSettings,
    pub retry: RetrySettings,
    pub webrtc: WebRtcSettings,
    pub simulation: SimulationSettings,
    #[serde(default)]
    pub avatars: HashMap<String, AvatarOverride>,
}

impl Settings {
    /// Load defaults, then `simulator.toml` (or `path`), then `AVATAR_SIM__*` variables.
    ///
    /// A `.env` file in the working directory is read first.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_FILE).required(false),
        };
        let builder = defaults()?.add_source(file).add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("webrtc.ice_servers")
                .try_parsing(true),
        );

        Self::build(builder, std::env::var(LEGACY_API_KEY_VAR).ok())
    }

    fn build(
        builder: ConfigBuilder<DefaultState>,
        legacy_api_key: Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut settings: Settings = builder.build()?.try_deserialize()?;

        let configured = settings
            .heygen
            .api_key
            .take()
            .filter(|key| !key.trim().is_empty());
        settings.heygen.api_key = configured.or(legacy_api_key.filter(|key| !key.trim().is_empty()));

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "retry.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        url::Url::parse(&self.heygen.base_url).map_err(|e| ConfigError::Invalid {
            key: "heygen.base_url",
            reason: e.to_string(),
        })?;
        Ok(())
    }

    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.heygen.api_key.as_deref().ok_or(ConfigError::MissingApiKey)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            delay: Duration::from_millis(self.retry.delay_ms),
        }
    }

    pub fn session_defaults(&self) -> SessionDefaults {
        SessionDefaults {
            quality: self.heygen.quality.clone(),
            voice_id: self.heygen.voice_id.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.heygen.request_timeout_secs)
    }

    pub fn channel_timeout(&self) -> Duration {
        Duration::from_millis(self.simulation.channel_timeout_ms)
    }

    pub fn roster(&self) -> AvatarRoster {
        AvatarRoster::default().with_overrides(&self.avatars)
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    let session = SessionDefaults::default();
    let retry = RetryPolicy::default();

    config::Config::builder()
        .set_default("heygen.base_url", "https://api.heygen.com")?
        .set_default("heygen.quality", session.quality)?
        .set_default("heygen.voice_id", session.voice_id)?
        .set_default("heygen.request_timeout_secs", 30)?
        .set_default("retry.max_attempts", i64::from(retry.max_attempts))?
        .set_default("retry.delay_ms", retry.delay.as_millis() as i64)?
        .set_default("webrtc.ice_servers", vec!["stun:stun.l.google.com:19302"])?
        .set_default("simulation.channel_timeout_ms", 10_000)
}
