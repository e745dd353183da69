//! Record Store change-feed client.
//!
//! Connects to the backend's notification websocket, subscribes to insert
//! events on every watched table, and forwards notifications to the
//! refresh controller. Connection loss is recovered by resubscribing with
//! capped exponential backoff; it is surfaced only through the
//! connectivity state, never as an error.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};
use tungstenite::Message;

use crate::config::RealtimeSettings;

use super::{RefreshShared, WatchedTable};

/// Subscription lifecycle of the feed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedState {
    Disconnected,
    Subscribing,
    Subscribed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A change notification with the affected row's post-image.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub event: ChangeKind,
    #[serde(default)]
    pub record: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct SubscribeFrame<'a> {
    action: &'static str,
    table: &'a str,
    events: [&'static str; 1],
}

impl<'a> SubscribeFrame<'a> {
    fn insert(table: &'a str) -> Self {
        Self {
            action: "subscribe",
            table,
            events: ["insert"],
        }
    }
}

/// Drive the feed until `stop` flips. Every exit path leaves the state at
/// `Disconnected`.
pub(crate) async fn run_feed(
    settings: RealtimeSettings,
    shared: Arc<RefreshShared>,
    mut stop: watch::Receiver<bool>,
) {
    let base = settings.reconnect_base_ms.max(1);
    let max = settings.reconnect_max_ms.max(base);
    let mut delay_ms = base;

    loop {
        if *stop.borrow() {
            break;
        }
        shared.set_state(FeedState::Subscribing);

        let connected = tokio::select! {
            res = connect_async(settings.feed_url.as_str()) => res,
            _ = stop.changed() => break,
        };

        match connected {
            Ok((ws, _)) => {
                let (mut sink, mut stream) = ws.split();

                let mut subscribed = true;
                for table in WatchedTable::ALL {
                    let frame = SubscribeFrame::insert(table.as_str());
                    let text = serde_json::to_string(&frame)
                        .expect("subscribe frame serializes");
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        warn!(error = %e, "change feed dropped while subscribing");
                        subscribed = false;
                        break;
                    }
                }

                if subscribed {
                    info!(url = %settings.feed_url, "change feed subscribed");
                    shared.set_state(FeedState::Subscribed);
                    delay_ms = base;

                    loop {
                        tokio::select! {
                            _ = stop.changed() => {
                                let _ = sink.send(Message::Close(None)).await;
                                shared.set_state(FeedState::Disconnected);
                                return;
                            }
                            msg = stream.next() => match msg {
                                Some(Ok(Message::Text(text))) => {
                                    match serde_json::from_str::<ChangeEvent>(&text) {
                                        Ok(event) => shared.apply_event(&event),
                                        Err(e) => {
                                            debug!(error = %e, "unparseable feed message")
                                        }
                                    }
                                }
                                Some(Ok(Message::Ping(payload))) => {
                                    let _ = sink.send(Message::Pong(payload)).await;
                                }
                                Some(Ok(Message::Close(_))) | None => break,
                                Some(Ok(_)) => {}
                                Some(Err(e)) => {
                                    warn!(error = %e, "change feed read failed");
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            Err(e) => {
                warn!(url = %settings.feed_url, error = %e, "change feed connect failed");
            }
        }

        shared.set_state(FeedState::Disconnected);

        let jittered = rand::thread_rng().gen_range(delay_ms / 2..=delay_ms);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(jittered)) => {}
            _ = stop.changed() => break,
        }
        delay_ms = (delay_ms * 2).min(max);
    }

    shared.set_state(FeedState::Disconnected);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_frame_wire_shape() {
        let frame = SubscribeFrame::insert("patients");
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "action": "subscribe",
                "table": "patients",
                "events": ["insert"],
            })
        );
    }

    #[test]
    fn change_event_parses_post_image() {
        let text = r#"{"table":"visits","event":"insert","record":{"id":"v1"}}"#;
        let event: ChangeEvent = serde_json::from_str(text).unwrap();
        assert_eq!(event.table, "visits");
        assert_eq!(event.event, ChangeKind::Insert);
        assert_eq!(event.record["id"], "v1");
    }

    #[test]
    fn change_event_tolerates_missing_record() {
        let event: ChangeEvent =
            serde_json::from_str(r#"{"table":"patients","event":"delete"}"#).unwrap();
        assert_eq!(event.event, ChangeKind::Delete);
        assert!(event.record.is_null());
    }

    #[test]
    fn feed_state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&FeedState::Subscribed).unwrap(),
            "\"subscribed\""
        );
    }
}
