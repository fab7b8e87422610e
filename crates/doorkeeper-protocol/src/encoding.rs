//! Reply encoders.
//!
//! Two wire formats are supported, selected once at startup:
//!
//! | Format | Example |
//! |--------|---------|
//! | plain  | `State: RUNNING; Status: accepted; Reason: opening A; A: OPENING; B: CLOSED` |
//! | json   | `{"state":"RUNNING","status":"accepted","success":true,"reason":"opening A","doors":{"A":"OPENING","B":"CLOSED"}}` |
//!
//! Both are single lines without the terminator; framing is left to
//! [`LineCodec`](crate::LineCodec). Both can be decoded again, which is
//! what [`DoorClient`] uses to follow a motion.
//!
//! [`DoorClient`]: https://docs.rs/doorkeeper-network

use crate::error::{ProtocolError, Result};
use crate::reply::{DoorSnapshot, Reply, StatusCode};
use doorkeeper_core::constants::PLAIN_FIELD_SEPARATOR;
use doorkeeper_core::{ControllerState, DoorId, DoorState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Turns a [`Reply`] into one line of text and back.
pub trait ReplyEncoder {
    /// Encode a reply without line terminator.
    fn encode(&self, reply: &Reply) -> String;

    /// Decode a line produced by [`encode`](ReplyEncoder::encode).
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedReply`] or [`ProtocolError::Json`]
    /// if the line is not a reply in this format.
    fn decode(&self, line: &str) -> Result<Reply>;
}

/// `Key: value; Key: value` text format.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainText;

impl PlainText {
    const STATE: &'static str = "State";
    const STATUS: &'static str = "Status";
    const REASON: &'static str = "Reason";
}

impl ReplyEncoder for PlainText {
    fn encode(&self, reply: &Reply) -> String {
        // The separator may not appear inside a field.
        let reason = reply.reason.replace(PLAIN_FIELD_SEPARATOR, ", ");

        let mut fields = Vec::with_capacity(3 + reply.doors.len());
        fields.push(format!("{}: {}", Self::STATE, reply.controller));
        fields.push(format!("{}: {}", Self::STATUS, reply.status));
        fields.push(format!("{}: {}", Self::REASON, reason));
        fields.extend(reply.doors.iter().map(|d| format!("{}: {}", d.id, d.state)));
        fields.join(PLAIN_FIELD_SEPARATOR)
    }

    fn decode(&self, line: &str) -> Result<Reply> {
        let mut fields = line.trim_end().split(PLAIN_FIELD_SEPARATOR).map(|field| {
            field
                .split_once(": ")
                .or_else(|| field.strip_suffix(':').map(|key| (key, "")))
                .ok_or_else(|| ProtocolError::malformed(format!("field without value: {field:?}")))
        });

        let controller = expect_field(&mut fields, Self::STATE)?
            .parse::<ControllerState>()
            .map_err(|e| ProtocolError::malformed(e.to_string()))?;
        let status = expect_field(&mut fields, Self::STATUS)?
            .parse::<StatusCode>()
            .map_err(ProtocolError::malformed)?;
        let reason = expect_field(&mut fields, Self::REASON)?.to_string();

        let doors = fields
            .map(|field| {
                let (id, state) = field?;
                let id = DoorId::new(id).map_err(|e| ProtocolError::malformed(e.to_string()))?;
                let state = state
                    .parse::<DoorState>()
                    .map_err(|e| ProtocolError::malformed(e.to_string()))?;
                Ok(DoorSnapshot::new(id, state))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Reply::new(status, reason, controller, doors))
    }
}

fn expect_field<'a>(
    fields: &mut impl Iterator<Item = Result<(&'a str, &'a str)>>,
    key: &str,
) -> Result<&'a str> {
    match fields.next() {
        Some(Ok((k, v))) if k == key => Ok(v),
        Some(Ok((k, _))) => Err(ProtocolError::malformed(format!("expected {key}, found {k}"))),
        Some(Err(e)) => Err(e),
        None => Err(ProtocolError::malformed(format!("missing {key}"))),
    }
}

/// Structured key/value document rendered with `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

#[derive(Serialize, Deserialize)]
struct JsonReply {
    state: ControllerState,
    status: StatusCode,
    success: bool,
    reason: String,
    #[serde(default)]
    doors: BTreeMap<DoorId, DoorState>,
}

impl ReplyEncoder for Json {
    fn encode(&self, reply: &Reply) -> String {
        let wire = JsonReply {
            state: reply.controller,
            status: reply.status,
            success: reply.status.is_success(),
            reason: reply.reason.clone(),
            doors: reply
                .doors
                .iter()
                .map(|d| (d.id.clone(), d.state))
                .collect(),
        };
        // Plain data with string keys only; serialization cannot fail.
        serde_json::to_string(&wire).unwrap_or_default()
    }

    fn decode(&self, line: &str) -> Result<Reply> {
        let wire: JsonReply = serde_json::from_str(line)?;
        let doors = wire
            .doors
            .into_iter()
            .map(|(id, state)| DoorSnapshot::new(id, state))
            .collect();
        Ok(Reply::new(wire.status, wire.reason, wire.state, doors))
    }
}

/// Reply format selected in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyFormat {
    #[default]
    Plain,
    Json,
}

impl ReplyEncoder for ReplyFormat {
    fn encode(&self, reply: &Reply) -> String {
        match self {
            ReplyFormat::Plain => PlainText.encode(reply),
            ReplyFormat::Json => Json.encode(reply),
        }
    }

    fn decode(&self, line: &str) -> Result<Reply> {
        match self {
            ReplyFormat::Plain => PlainText.decode(line),
            ReplyFormat::Json => Json.decode(line),
        }
    }
}
