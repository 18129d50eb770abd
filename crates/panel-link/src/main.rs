//! Panel link monitor entry point
//!
//! Connects every configured channel, logs connection status and state
//! updates, and shuts the channels down on Ctrl-C.
//!
//! Run with:
//! ```bash
//! cargo run -p panel-link
//! ```
//!
//! Configuration is loaded from environment variables.

use anyhow::Context;
use panel_common::{try_init_tracing_with_config, ClientConfig, TracingConfig};
use panel_link::protocol::ClientRole;
use panel_link::{
    AudioClient, ChannelKind, ChannelOptions, ChatBotClient, ConnectionStatus, FileSnapshotStore,
    ObsClient, OverlayClient, SnapshotStore, Slot, Subscription, SupervisorHandle, Transport,
    WsTransport,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = try_init_tracing_with_config(&TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run(config).await {
        error!(error = %e, "Panel link failed");
        std::process::exit(1);
    }
}

async fn run(config: ClientConfig) -> anyhow::Result<()> {
    info!(
        env = ?config.app.env,
        host = %config.endpoint.host,
        port = config.endpoint.port,
        obs = config.obs.url.is_some(),
        "Configuration loaded"
    );

    let transport: Arc<dyn Transport> = Arc::new(WsTransport::new());
    let store: Arc<dyn SnapshotStore> =
        Arc::new(FileSnapshotStore::new(config.storage.snapshot_dir.clone()));
    let options = |kind: ChannelKind| {
        ChannelOptions::for_channel(&config, kind)
            .with_context(|| format!("no endpoint for the {kind} channel"))
    };

    let audio = AudioClient::spawn(
        options(ChannelKind::Audio)?,
        transport.clone(),
        config.audio.page_path.clone(),
    );

    let role: ClientRole = config.overlay.role.parse()?;
    let overlay = OverlayClient::spawn(options(ChannelKind::Overlay)?, transport.clone(), role, store);
    match overlay.restore_settings().await {
        Ok(Some(_)) => info!("Restored overlay settings from snapshot"),
        Ok(None) => debug!("No overlay settings snapshot"),
        Err(e) => warn!(error = %e, code = e.error_code(), "Failed to restore overlay settings"),
    }

    let chat_bot = ChatBotClient::spawn(
        options(ChannelKind::ChatBot)?,
        transport.clone(),
        Slot::new(None),
    );

    let obs = ChannelOptions::for_channel(&config, ChannelKind::Obs).map(|obs_options| {
        ObsClient::spawn(obs_options, transport.clone(), ObsClient::identify_from(&config.obs))
    });

    let mut links: Vec<SupervisorHandle> = vec![
        audio.link().clone(),
        overlay.link().clone(),
        chat_bot.link().clone(),
    ];
    if let Some(obs) = &obs {
        links.push(obs.link().clone());
    }

    let mut subscriptions: Vec<Subscription> = links
        .iter()
        .map(|link| link.subscribe_status(log_status))
        .collect();
    subscriptions.push(audio.decks().subscribe(|decks| {
        debug!(
            channel = %ChannelKind::Audio,
            deck_1_queue = decks.one.queue.len(),
            deck_2_queue = decks.two.queue.len(),
            "Decks updated"
        );
    }));
    subscriptions.push(overlay.settings().subscribe(|settings| {
        debug!(channel = %ChannelKind::Overlay, settings = ?settings, "Overlay settings updated");
    }));
    subscriptions.push(chat_bot.roster().subscribe(|roster| {
        debug!(
            channel = %ChannelKind::ChatBot,
            chatters = roster.chatter_list.len(),
            current = ?roster.current_chatter,
            "Roster updated"
        );
    }));
    if let Some(obs) = &obs {
        subscriptions.push(obs.state().subscribe(|state| {
            if let Some(event) = &state.last_event {
                debug!(channel = %ChannelKind::Obs, event_type = %event.event_type, "RPC event");
            }
        }));
    }

    for link in &links {
        link.start();
    }
    info!(channels = links.len(), "Panel link started");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    info!("Shutting down...");
    for link in &links {
        link.shutdown();
    }
    drop(subscriptions);

    // Let the supervisors send their close frames
    tokio::time::sleep(Duration::from_millis(200)).await;
    info!("Panel link stopped");
    Ok(())
}

fn log_status(status: &ConnectionStatus) {
    info!(
        channel = %status.channel,
        url = %status.url,
        state = %status.state,
        attempts = status.attempts,
        retry_in_ms = status.retry_in_ms(),
        error = status.last_error.as_ref().map(tracing::field::display),
        "Channel status"
    );
}
