//! Realtime channel wire format.
//!
//! The realtime socket speaks Phoenix channel frames encoded as JSON objects
//! (`vsn=1.0.0`): `{"topic", "event", "payload", "ref"}`. Only the frames this
//! client needs are modeled; everything else decodes to [`Inbound::Other`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::mission::Mission;

/// Topic used for socket-level heartbeats.
const HEARTBEAT_TOPIC: &str = "phoenix";

/// A raw Phoenix frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Channel topic, e.g. `realtime:realtime-missions`.
    pub topic: String,
    /// Event name, e.g. `phx_join` or `postgres_changes`.
    pub event: String,
    /// Event payload.
    #[serde(default)]
    pub payload: Value,
    /// Message reference, echoed back in replies.
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

/// Kind of row-level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    /// A row was inserted.
    Insert,
    /// A row was updated.
    Update,
    /// A row was deleted.
    Delete,
}

/// A decoded `postgres_changes` notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// What happened to the row.
    pub kind: ChangeKind,
    /// Table the change happened in.
    pub table: String,
    /// The new row (empty for deletes).
    pub record: Value,
}

impl ChangeEvent {
    /// The inserted mission, if this is an insert.
    ///
    /// # Errors
    ///
    /// Returns an error if an insert carries a record that is not a mission.
    pub fn into_insert(self) -> Result<Option<Mission>> {
        if self.kind != ChangeKind::Insert {
            return Ok(None);
        }
        serde_json::from_value(self.record)
            .map(Some)
            .map_err(|e| Error::protocol(format!("insert record is not a mission: {e}")))
    }
}

/// An inbound frame, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Reply to a join (or any other pushed message).
    Reply {
        /// Reference of the message being answered.
        reference: Option<String>,
        /// Whether the server accepted it.
        ok: bool,
        /// Server-provided response body.
        response: Value,
    },
    /// A row-level change on a subscribed table.
    Change(ChangeEvent),
    /// The server reports a channel error.
    ChannelError(Value),
    /// The server closed the channel.
    ChannelClosed,
    /// Anything this client does not act on (presence, system, ...).
    Other(String),
}

/// Builds outbound frames with increasing references.
#[derive(Debug)]
pub struct FrameEncoder {
    topic: String,
    next_ref: u64,
}

impl FrameEncoder {
    /// Create an encoder for the given channel name.
    #[must_use]
    pub fn new(channel: &str) -> Self {
        Self {
            topic: format!("realtime:{channel}"),
            next_ref: 1,
        }
    }

    /// The channel topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn next_reference(&mut self) -> String {
        let reference = self.next_ref.to_string();
        self.next_ref += 1;
        reference
    }

    /// Join the channel, listening for every change on one table.
    pub fn join(&mut self, schema: &str, table: &str, access_token: &str) -> Frame {
        let reference = self.next_reference();
        Frame {
            topic: self.topic.clone(),
            event: "phx_join".to_string(),
            payload: json!({
                "config": {
                    "broadcast": { "ack": false, "self": false },
                    "presence": { "key": "" },
                    "postgres_changes": [
                        { "event": "*", "schema": schema, "table": table }
                    ]
                },
                "access_token": access_token
            }),
            reference: Some(reference),
        }
    }

    /// Socket keep-alive.
    pub fn heartbeat(&mut self) -> Frame {
        Frame {
            topic: HEARTBEAT_TOPIC.to_string(),
            event: "heartbeat".to_string(),
            payload: json!({}),
            reference: Some(self.next_reference()),
        }
    }

    /// Leave the channel.
    pub fn leave(&mut self) -> Frame {
        Frame {
            topic: self.topic.clone(),
            event: "phx_leave".to_string(),
            payload: json!({}),
            reference: Some(self.next_reference()),
        }
    }
}

impl Frame {
    /// Serialize to the JSON text sent on the socket.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Decode and classify one text frame.
///
/// # Errors
///
/// Returns an error if the text is not a Phoenix frame or a change payload
/// is malformed.
pub fn decode(text: &str) -> Result<Inbound> {
    let frame: Frame = serde_json::from_str(text)
        .map_err(|e| Error::protocol(format!("malformed frame: {e}")))?;

    match frame.event.as_str() {
        "phx_reply" => {
            let ok = frame.payload.get("status").and_then(Value::as_str) == Some("ok");
            let response = frame
                .payload
                .get("response")
                .cloned()
                .unwrap_or(Value::Null);
            Ok(Inbound::Reply {
                reference: frame.reference,
                ok,
                response,
            })
        }
        "postgres_changes" => decode_change(frame.payload).map(Inbound::Change),
        "phx_error" => Ok(Inbound::ChannelError(frame.payload)),
        "phx_close" => Ok(Inbound::ChannelClosed),
        other => Ok(Inbound::Other(other.to_string())),
    }
}

fn decode_change(payload: Value) -> Result<ChangeEvent> {
    #[derive(Deserialize)]
    struct ChangePayload {
        data: ChangeData,
    }

    #[derive(Deserialize)]
    struct ChangeData {
        #[serde(rename = "type")]
        kind: ChangeKind,
        #[serde(default)]
        table: String,
        #[serde(default)]
        record: Value,
    }

    let ChangePayload { data } = serde_json::from_value(payload)
        .map_err(|e| Error::protocol(format!("malformed change payload: {e}")))?;

    Ok(ChangeEvent {
        kind: data.kind,
        table: data.table,
        record: data.record,
    })
}
