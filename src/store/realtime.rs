//! Websocket row-event channel.
//!
//! Opens a channel against the store's realtime endpoint, joins the topic for
//! one table + filter, and forwards decoded insert/update events into an mpsc
//! channel. The join is confirmed before `open_channel` returns; from then on
//! a spawned reader task owns the socket and a heartbeat keeps it alive.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::StoreError;

use super::{Filter, Row, RowEvent, Subscription};

/// How long to wait for the store to acknowledge a topic join.
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Heartbeat interval; the store drops channels silent for more than a minute.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Buffer size for the event channel. Live conversations produce events far
/// slower than the consumer drains them; 64 gives headroom for bursts.
const EVENT_BUFFER_SIZE: usize = 64;

#[derive(Debug, Serialize)]
struct OutboundFrame {
    topic: String,
    event: String,
    payload: Value,
    #[serde(rename = "ref")]
    reference: String,
}

impl OutboundFrame {
    fn text(topic: &str, event: &str, reference: u64) -> Option<Message> {
        let frame = Self {
            topic: topic.to_string(),
            event: event.to_string(),
            payload: json!({}),
            reference: reference.to_string(),
        };
        serde_json::to_string(&frame).ok().map(Message::Text)
    }
}

#[derive(Debug, Deserialize)]
struct InboundFrame {
    #[serde(default)]
    event: String,
    #[serde(default)]
    payload: Value,
}

/// Open a confirmed row-event channel for `table` restricted by `filter`.
///
/// Only equality filters can scope a realtime topic; anything else is a
/// caller bug surfaced as a subscription error.
pub(crate) async fn open_channel(
    config: &StoreConfig,
    table: &str,
    filter: &Filter,
) -> Result<Subscription, StoreError> {
    let Filter::Eq(column, value) = filter else {
        return Err(StoreError::Subscription(
            "realtime topics require an equality filter".to_string(),
        ));
    };

    let url = config.realtime_url();
    let (socket, _) = connect_async(&url)
        .await
        .map_err(|e| StoreError::Subscription(format!("connect failed: {}", e)))?;
    let (mut sink, mut stream) = socket.split();

    let topic = format!("realtime:public:{}:{}=eq.{}", table, column, value);
    let join = OutboundFrame::text(&topic, "phx_join", 1)
        .ok_or_else(|| StoreError::Subscription("encode join frame".to_string()))?;
    sink.send(join)
        .await
        .map_err(|e| StoreError::Subscription(format!("send join: {}", e)))?;

    // The channel is not live until the store replies to the join
    tokio::time::timeout(JOIN_TIMEOUT, await_join_reply(&mut stream))
        .await
        .map_err(|_| StoreError::Subscription("join timed out".to_string()))??;

    debug!(topic = %topic, "Realtime channel joined");

    let (tx, rx) = mpsc::channel(EVENT_BUFFER_SIZE);
    let task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut heartbeat_ref: u64 = 2;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    let Some(frame) = OutboundFrame::text("phoenix", "heartbeat", heartbeat_ref) else {
                        continue;
                    };
                    heartbeat_ref += 1;
                    if sink.send(frame).await.is_err() {
                        warn!(topic = %topic, "Realtime heartbeat failed, closing channel");
                        break;
                    }
                }
                message = stream.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(event) = decode_row_event(&text) {
                                if tx.send(event).await.is_err() {
                                    // Consumer dropped the subscription
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!(topic = %topic, "Realtime channel closed by store");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(topic = %topic, error = %e, "Realtime channel error");
                            break;
                        }
                    }
                }
            }
        }
    });

    Ok(Subscription::new(rx, task))
}

async fn await_join_reply<S>(stream: &mut S) -> Result<(), StoreError>
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(message) = stream.next().await {
        let message = message.map_err(|e| StoreError::Subscription(format!("join reply: {}", e)))?;
        let Message::Text(text) = message else { continue };
        let Ok(frame) = serde_json::from_str::<InboundFrame>(&text) else { continue };
        if frame.event == "phx_reply" {
            let status = frame.payload.get("status").and_then(Value::as_str);
            return if status == Some("ok") {
                Ok(())
            } else {
                Err(StoreError::Subscription(format!(
                    "join rejected: {}",
                    frame.payload
                )))
            };
        }
    }
    Err(StoreError::Subscription("socket closed before join reply".to_string()))
}

/// Decode an incoming frame into a row event, if it is one.
fn decode_row_event(text: &str) -> Option<RowEvent> {
    let frame: InboundFrame = serde_json::from_str(text).ok()?;
    let record = frame.payload.get("record")?.as_object()?.clone();
    row_event_for(&frame.event, record)
}

fn row_event_for(event: &str, record: Row) -> Option<RowEvent> {
    match event {
        "INSERT" => Some(RowEvent::Inserted(record)),
        "UPDATE" => Some(RowEvent::Updated(record)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_insert_frame() {
        let text = r#"{
            "topic": "realtime:public:messages:conversation_id=eq.c1",
            "event": "INSERT",
            "payload": {"record": {"id": "m1", "content": "hi"}},
            "ref": null
        }"#;

        match decode_row_event(text) {
            Some(RowEvent::Inserted(row)) => {
                assert_eq!(row.get("id").and_then(Value::as_str), Some("m1"));
            }
            other => panic!("unexpected decode result: {:?}", other),
        }
    }

    #[test]
    fn test_decode_update_frame() {
        let text = r#"{"event": "UPDATE", "payload": {"record": {"id": "m1"}}}"#;
        assert!(matches!(decode_row_event(text), Some(RowEvent::Updated(_))));
    }

    #[test]
    fn test_non_row_frames_are_ignored() {
        for text in [
            r#"{"event": "phx_reply", "payload": {"status": "ok"}}"#,
            r#"{"event": "DELETE", "payload": {"record": {"id": "m1"}}}"#,
            r#"{"event": "INSERT", "payload": {}}"#,
            "not json",
        ] {
            assert!(decode_row_event(text).is_none(), "should ignore: {}", text);
        }
    }

    #[test]
    fn test_outbound_frame_shape() {
        let Some(Message::Text(text)) = OutboundFrame::text("realtime:public:messages", "phx_join", 1)
        else {
            panic!("frame should encode");
        };
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["topic"], "realtime:public:messages");
        assert_eq!(value["event"], "phx_join");
        assert_eq!(value["ref"], "1");
    }
}
