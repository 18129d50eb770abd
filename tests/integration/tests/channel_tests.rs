//! Channel Integration Tests
//!
//! Drive the real clients over `tokio-tungstenite` against an in-process
//! axum WebSocket server. No external services are needed.
//!
//! Run with: cargo test -p integration-tests --test channel_tests

use std::sync::Arc;
use std::time::Duration;

use integration_tests::*;
use panel_link::channels::{AudioCommand, BotCommand, ChatterSettings};
use panel_link::protocol::{ClientRole, DeckId, IdentifyPayload};
use panel_link::{
    AudioClient, ChannelOptions, ChatBotClient, ConnectionState, FileSnapshotStore, LinkError,
    ObsClient, OverlayClient, Slot, Transport, WsTransport,
};
use serde_json::json;

const TIMEOUT: Duration = Duration::from_secs(5);

fn transport() -> Arc<dyn Transport> {
    Arc::new(WsTransport::new())
}

// ============================================================================
// Audio
// ============================================================================

#[tokio::test]
async fn test_audio_handshake_commands_and_state() {
    let server = TestServer::start().await.expect("Failed to start server");
    let client = AudioClient::spawn(
        fast_options(server.channel_url("audio")),
        transport(),
        "/audio_channels",
    );

    client.start();
    assert!(wait_for(TIMEOUT, || client.status().state == ConnectionState::Connected).await);
    assert!(wait_for(TIMEOUT, || server.received("audio").len() == 2).await);
    assert_eq!(
        server.received("audio"),
        vec![
            json!({"event": "connect", "data": "/audio_channels"}),
            json!({"event": "info_request"}),
        ]
    );

    client.send_command(&AudioCommand::play(DeckId::One));
    client.send_command(&AudioCommand::Volume {
        deck: DeckId::Two,
        value: 0.25,
    });
    assert!(wait_for(TIMEOUT, || server.received("audio").len() == 4).await);
    let received = server.received("audio");
    assert_eq!(
        received[2],
        json!({"event": "audio_control", "data": "play", "channel": "channel-1"})
    );
    assert_eq!(received[3]["type"], "volume");

    server
        .push("audio", &deck_status("channel-1", "Opening Theme", &["B-side"]))
        .unwrap();
    server
        .push("audio", &audio_control_ack("autoplay", "channel-1"))
        .unwrap();
    assert!(wait_for(TIMEOUT, || client.decks().get().one.autoplay_engaged).await);

    let decks = client.decks().get();
    assert_eq!(
        decks.one.now_playing.as_ref().map(|n| n.title.as_str()),
        Some("Opening Theme")
    );
    assert_eq!(decks.one.queue.len(), 1);
    assert!(!decks.two.autoplay_engaged);
    assert_eq!(decks.two.now_playing, None);

    client.close();
    assert!(wait_for(TIMEOUT, || client.status().state == ConnectionState::Disconnected).await);
}

// ============================================================================
// Overlay
// ============================================================================

#[tokio::test]
async fn test_overlay_settings_round_trip_through_snapshot() {
    let server = TestServer::start().await.expect("Failed to start server");
    let dir = temp_snapshot_dir();
    let store = Arc::new(FileSnapshotStore::new(dir.clone()));

    let client = OverlayClient::spawn(
        fast_options(server.channel_url("overlay")),
        transport(),
        ClientRole::ControlPanel,
        store.clone(),
    );
    client.start();
    assert!(wait_for(TIMEOUT, || client.status().state == ConnectionState::Connected).await);

    let settings = sample_settings();
    client.send_settings(settings.clone()).await.unwrap();
    assert!(wait_for(TIMEOUT, || server.received("overlay").len() == 2).await);

    let received = server.received("overlay");
    assert_eq!(received[0], json!({"event": "connect", "client": "control_panel"}));
    assert_eq!(received[1]["client"], "control_panel");
    assert_eq!(received[1]["data"]["baseHue"], json!(42.0));
    assert!(dir.join("controlPanelSettings.json").exists());

    // A fresh client rebuilds identical settings before any frame arrives
    let fresh = OverlayClient::spawn(
        fast_options(server.channel_url("overlay")),
        transport(),
        ClientRole::Overlay,
        store,
    );
    assert_eq!(fresh.restore_settings().await.unwrap(), Some(settings.clone()));
    assert_eq!(fresh.settings().get(), Some(settings));

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_overlay_receives_pushed_settings() {
    let server = TestServer::start().await.expect("Failed to start server");
    let dir = temp_snapshot_dir();
    let client = OverlayClient::spawn(
        fast_options(server.channel_url("overlay")),
        transport(),
        ClientRole::Overlay,
        Arc::new(FileSnapshotStore::new(dir)),
    );
    client.start();
    assert!(wait_for(TIMEOUT, || client.status().state == ConnectionState::Connected).await);

    server
        .push("overlay", &json!({"event": "unrelated"}))
        .unwrap();
    server
        .push("overlay", &json!({"particleCount": 80, "blackParticles": true}))
        .unwrap();
    assert!(wait_for(TIMEOUT, || client.settings().get().is_some()).await);

    let settings = client.settings().get().unwrap();
    assert_eq!(settings.particle_count, 80.0);
    assert!(settings.black_particles);
    assert_eq!(client.status().state, ConnectionState::Connected);
}

// ============================================================================
// Chat bot
// ============================================================================

#[tokio::test]
async fn test_chat_bot_roster_and_settings() {
    let server = TestServer::start().await.expect("Failed to start server");
    let selected = Slot::new(None);
    let client = ChatBotClient::spawn(
        fast_options(server.channel_url("twitch_bot")),
        transport(),
        selected.clone(),
    );
    client.start();
    assert!(wait_for(TIMEOUT, || client.status().state == ConnectionState::Connected).await);

    server
        .push("twitch_bot", &roster_update(&["ana", "bo"], "bo"))
        .unwrap();
    assert!(wait_for(TIMEOUT, || client.roster().get().chatter_list.len() == 2).await);
    assert!(client.chatter_settings("bo").unwrap().is_muted);
    assert!(!client.chatter_settings("ana").unwrap().is_muted);

    selected.set(Some("ana".to_string()));
    client.update_settings(ChatterSettings {
        message_replace: Some("beep".to_string()),
        ..ChatterSettings::default()
    });
    client.send_command(&BotCommand::GetSettings);
    assert!(wait_for(TIMEOUT, || server.received("twitch_bot").len() == 3).await);

    let received = server.received("twitch_bot");
    assert_eq!(received[0], json!({"event": "CONNECT", "client_type": "WEB_CLIENT"}));
    assert_eq!(received[1]["event"], "UPDATE_SETTINGS");
    assert_eq!(received[1]["client_type"], "WEB_CLIENT");
    assert_eq!(received[1]["data"]["name"], "ana");
    assert_eq!(received[1]["data"]["message_replace"], "beep");
    assert_eq!(received[2]["event"], "GET_SETTINGS");
    assert_eq!(
        client.chatter_settings("ana").unwrap().message_replace.as_deref(),
        Some("beep")
    );

    server
        .push(
            "twitch_bot",
            &json!({"event": "USER_SETTINGS", "data": {"username": "ana", "tts_length": "40"}}),
        )
        .unwrap();
    assert!(wait_for(TIMEOUT, || client.user_settings().get().is_some()).await);
    assert_eq!(client.user_settings().get().unwrap().tts_length, Some(40.0));
}

// ============================================================================
// RPC socket
// ============================================================================

#[tokio::test]
async fn test_obs_identify_request_and_event() {
    let server = TestServer::start().await.expect("Failed to start server");
    let client = ObsClient::spawn(
        fast_options(server.channel_url(RPC_CHANNEL)),
        transport(),
        IdentifyPayload::new(1),
    );
    client.start();
    assert!(wait_for(TIMEOUT, || client.status().state == ConnectionState::Identified).await);

    let request_id = client.send_request("GetVersion", None);
    assert!(wait_for(TIMEOUT, || server.received(RPC_CHANNEL).len() == 2).await);
    let received = server.received(RPC_CHANNEL);
    assert_eq!(received[0], json!({"op": 1, "d": {"rpcVersion": 1}}));
    assert_eq!(received[1]["op"], 6);
    assert_eq!(received[1]["d"]["requestId"], request_id.as_str());

    server
        .push(RPC_CHANNEL, &rpc_response("GetVersion", &request_id))
        .unwrap();
    server
        .push(RPC_CHANNEL, &rpc_event("CurrentProgramSceneChanged", json!({"sceneName": "Live"})))
        .unwrap();
    assert!(wait_for(TIMEOUT, || client.state().get().last_event.is_some()).await);

    let state = client.state().get();
    assert_eq!(state.last_response.unwrap().request_id, request_id);
    assert_eq!(state.last_event.unwrap().event_type, "CurrentProgramSceneChanged");
}

#[tokio::test]
async fn test_obs_rejected_identify_surfaces_in_status() {
    let server = TestServer::start().await.expect("Failed to start server");
    server.reject_identify(Some(4009));

    let client = ObsClient::spawn(
        ChannelOptions::new(server.channel_url(RPC_CHANNEL)).with_retry(fast_retry(0)),
        transport(),
        IdentifyPayload::new(1).with_authentication(Some("wrong".to_string())),
    );
    client.start();
    assert!(wait_for(TIMEOUT, || client.status().state == ConnectionState::GivingUp).await);
    assert_eq!(
        client.status().last_error,
        Some(LinkError::RetryExhausted { attempts: 0 })
    );

    server.reject_identify(None);
    client.start();
    assert!(wait_for(TIMEOUT, || client.status().state == ConnectionState::Identified).await);
}

#[tokio::test]
async fn test_obs_rejection_recorded_while_retrying() {
    let server = TestServer::start().await.expect("Failed to start server");
    server.reject_identify(Some(4010));

    let client = ObsClient::spawn(
        ChannelOptions::new(server.channel_url(RPC_CHANNEL)).with_retry(slow_retry()),
        transport(),
        IdentifyPayload::new(9),
    );
    client.start();
    assert!(wait_for(TIMEOUT, || client.status().last_error.is_some()).await);

    assert!(matches!(
        client.status().last_error,
        Some(LinkError::HandshakeRejected { code: 4010, .. })
    ));
    client.close();
}

// ============================================================================
// Reconnection
// ============================================================================

#[tokio::test]
async fn test_reconnects_after_server_drop() {
    let server = TestServer::start().await.expect("Failed to start server");
    let client = ChatBotClient::spawn(
        fast_options(server.channel_url("twitch_bot")),
        transport(),
        Slot::new(None),
    );
    client.start();
    assert!(wait_for(TIMEOUT, || server.accepted("twitch_bot") == 1).await);
    assert!(wait_for(TIMEOUT, || client.status().state == ConnectionState::Connected).await);

    server.drop_connections("twitch_bot");
    assert!(wait_for(TIMEOUT, || server.accepted("twitch_bot") == 2).await);
    assert!(wait_for(TIMEOUT, || client.status().state == ConnectionState::Connected).await);
    assert_eq!(client.status().attempts, 0);

    // The handshake is sent again on the new connection
    assert!(wait_for(TIMEOUT, || server.received("twitch_bot").len() == 2).await);
    let received = server.received("twitch_bot");
    assert_eq!(received[0], received[1]);
}

#[tokio::test]
async fn test_gives_up_then_restarts_on_start() {
    let addr = unused_addr().await.unwrap();
    let url = format!("ws://{addr}/websockets/audio");
    let client = AudioClient::spawn(
        ChannelOptions::new(url).with_retry(fast_retry(2)),
        transport(),
        "/audio_channels",
    );

    let give_ups = Slot::new(0u32);
    let _subscription = {
        let give_ups = give_ups.clone();
        client.link().subscribe_status(move |status| {
            if status.state == ConnectionState::GivingUp {
                give_ups.update(|n| *n += 1);
            }
        })
    };

    // Dropped without panicking while disconnected
    client.send_command(&AudioCommand::InfoRequest);

    client.start();
    assert!(wait_for(TIMEOUT, || give_ups.get() == 1).await);
    assert_eq!(
        client.status().last_error,
        Some(LinkError::RetryExhausted { attempts: 2 })
    );

    // No further automatic attempts once given up
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(client.status().state, ConnectionState::GivingUp);

    client.start();
    assert!(wait_for(TIMEOUT, || give_ups.get() == 2).await);
}
