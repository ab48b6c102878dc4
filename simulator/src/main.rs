mod application;
mod domain;
mod infrastructure;

use anyhow::{Context, Result};
use clap::Parser;
use shared::HostMessage;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use application::ports::{NewSessionRequest, PeerConnector, StreamingApiPort};
use application::session::SessionDriver;
use application::simulation::SimulationRunner;
use domain::simulation::ScriptStore;
use infrastructure::config::Settings;
use infrastructure::driven::{HeygenStreamingApi, RtcPeerConnector};
use infrastructure::driving::cli::{Cli, Command};
use infrastructure::driving::host;

const HOST_QUEUE: usize = 32;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries status lines for the host; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("avatar_sim=info,webrtc=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("failed to load configuration")?;

    let api: Arc<dyn StreamingApiPort> = Arc::new(
        HeygenStreamingApi::new(
            settings.api_key()?,
            &settings.heygen.base_url,
            settings.request_timeout(),
        )
        .context("failed to build HTTP client")?,
    );
    let connector: Arc<dyn PeerConnector> =
        Arc::new(RtcPeerConnector::new(settings.webrtc.ice_servers.clone()));

    let (host_tx, host_rx) = mpsc::channel(HOST_QUEUE);
    spawn_host_input(host_tx);

    let driver = SessionDriver::new(Arc::clone(&api), connector, settings.retry_policy(), host_rx);
    let reporter = tokio::spawn(host::report_status(driver.subscribe(), tokio::io::stdout()));

    match cli.command {
        Command::Session { avatar } => run_session(&settings, api, driver, &avatar).await?,
        Command::Simulate => {
            let mut runner = SimulationRunner::new(
                api,
                driver,
                settings.roster(),
                ScriptStore::default(),
                settings.session_defaults(),
            )
            .with_channel_timeout(settings.channel_timeout());
            runner.run().await?;
        }
    }

    // The driver is gone by now, which ends the reporter
    if let Err(e) = reporter.await {
        warn!(error = %e, "status reporter ended abnormally");
    }
    info!("avatar simulator stopped");
    Ok(())
}

async fn run_session(
    settings: &Settings,
    api: Arc<dyn StreamingApiPort>,
    mut driver: SessionDriver,
    avatar: &str,
) -> Result<()> {
    let roster = settings.roster();
    let profile = roster
        .get(avatar)
        .with_context(|| format!("unknown avatar {avatar}"))?;

    let request = NewSessionRequest::for_avatar(profile, &settings.session_defaults());
    let params = api
        .create_session(&request)
        .await
        .context("failed to create streaming session")?;
    info!(avatar = %profile.name, session_id = %params.session_id, "session created");

    if let Err(e) = driver.connect(params).await {
        error!(error = %e, "avatar session did not connect");
    }
    driver.run_until_disconnect().await?;
    Ok(())
}

/// Feed stdin lines to the host channel and turn Ctrl-C into a disconnect
fn spawn_host_input(tx: mpsc::Sender<HostMessage>) {
    // Weak so that end of input still closes the host channel
    let interrupt = tx.downgrade();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, disconnecting");
            if let Some(tx) = interrupt.upgrade() {
                let _ = tx.send(HostMessage::Disconnect).await;
            }
        }
    });

    tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        if let Err(e) = host::pump_host_messages(stdin, tx).await {
            error!(error = %e, "failed to read host messages");
        }
    });
}
