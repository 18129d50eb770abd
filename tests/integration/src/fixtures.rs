//! Test fixtures and frame builders
//!
//! Server-side frames as the panel backend and the RPC socket send them.

use panel_link::channels::ControlPanelSettings;
use panel_link::ChannelOptions;
use panel_link::RetryPolicy;
use serde_json::{json, Value};
use std::time::Duration;

/// Backoff short enough for real-time tests
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay: Duration::from_millis(20),
    }
}

/// First delay long enough that no retry fires during a test
pub fn slow_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 5,
        initial_delay: Duration::from_secs(60),
    }
}

pub fn fast_options(url: impl Into<String>) -> ChannelOptions {
    ChannelOptions::new(url).with_retry(fast_retry(5))
}

/// Status push for one deck
pub fn deck_status(deck: &str, title: &str, queue: &[&str]) -> Value {
    let queue: Vec<Value> = queue.iter().map(|t| json!({ "title": t })).collect();
    let mut decks = serde_json::Map::new();
    decks.insert(
        deck.to_string(),
        json!({
            "current_audio": { "title": title, "artist": "Test Artist", "position": 0 },
            "queue": queue,
            "is_playing": true,
        }),
    );
    json!({ "data": decks })
}

pub fn audio_control_ack(command: &str, deck: &str) -> Value {
    json!({ "event": "audio_control", "data": { "command": command, "channel": deck } })
}

/// Roster broadcast of the chat-bot channel
pub fn roster_update(chatters: &[&str], muted: &str) -> Value {
    let data: serde_json::Map<String, Value> = chatters
        .iter()
        .map(|name| {
            let settings = json!({
                "name": name,
                "is_muted": if *name == muted { "true" } else { "false" },
                "message_replace": null,
                "tts_length": 25,
                "kill_tts": false,
            });
            ((*name).to_string(), settings)
        })
        .collect();

    json!({
        "event": "UPDATE",
        "data": {
            "chatter_list": chatters,
            "current_chatter": chatters.first(),
            "chatters_data": data,
        }
    })
}

pub fn rpc_event(event_type: &str, data: Value) -> Value {
    json!({ "op": 5, "d": { "eventType": event_type, "eventIntent": 1, "eventData": data } })
}

pub fn rpc_response(request_type: &str, request_id: &str) -> Value {
    json!({
        "op": 7,
        "d": {
            "requestType": request_type,
            "requestId": request_id,
            "requestStatus": { "result": true, "code": 100 },
            "responseData": { "ok": true },
        }
    })
}

/// Settings that differ from the defaults in every numeric field family
pub fn sample_settings() -> ControlPanelSettings {
    ControlPanelSettings {
        particle_count: 120.0,
        particle_speed: 1.5,
        base_hue: 42.0,
        black_stars: true,
        trail_color: 3.0,
        ..ControlPanelSettings::default()
    }
}
