//! Packet records
//!
//! Decoded packets arrive as loosely shaped JSON objects: older firmware and
//! tools use `from`/`to`/`hop_limit`, newer ones `fromId`/`toId`/`hopLimit`,
//! and any field may be missing. [`PacketRecord`] resolves those aliases once
//! and exposes typed, read-only accessors with fixed defaults.

use serde_json::{Map, Value};

/// Default `priority` when a packet carries none.
pub const DEFAULT_PRIORITY: &str = "UNSET";

/// Read-only, alias-resolved view of one packet
#[derive(Debug, Clone)]
pub struct PacketRecord<'a> {
    raw: &'a Value,
    from: Option<&'a Value>,
    to: Option<&'a Value>,
    next_hop: Option<&'a Value>,
    hop_limit: i64,
    hop_start: i64,
    priority: String,
    want_ack: bool,
    decoded: Option<&'a Map<String, Value>>,
    encrypted: Option<&'a Value>,
}

impl<'a> PacketRecord<'a> {
    pub fn new(raw: &'a Value) -> Self {
        let hop_limit = first_present(raw, &["hopLimit", "hop_limit"])
            .and_then(as_integer)
            .unwrap_or(0);

        let hop_start = first_present(raw, &["hopStart", "hop_start"])
            .and_then(as_integer)
            .unwrap_or(0);

        let priority = match raw.get("priority") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => DEFAULT_PRIORITY.to_string(),
        };

        let want_ack = first_present(raw, &["wantAck", "want_ack"]).is_some_and(is_truthy);

        Self {
            raw,
            from: first_truthy(raw, &["fromId", "from"]),
            to: first_truthy(raw, &["toId", "to"]),
            next_hop: first_truthy(raw, &["nextHop", "next_hop"]),
            hop_limit,
            hop_start,
            priority,
            want_ack,
            decoded: raw
                .get("decoded")
                .and_then(Value::as_object)
                .filter(|m| !m.is_empty()),
            encrypted: raw.get("encrypted").filter(|v| is_truthy(v)),
        }
    }

    pub fn raw(&self) -> &'a Value {
        self.raw
    }

    /// Sender identifier, `fromId` preferred over `from`
    pub fn from_id(&self) -> Option<&'a Value> {
        self.from
    }

    /// Destination identifier, `toId` preferred over `to`
    pub fn to_id(&self) -> Option<&'a Value> {
        self.to
    }

    pub fn next_hop(&self) -> Option<&'a Value> {
        self.next_hop
    }

    /// Remaining hop budget, 0 when absent
    pub fn hop_limit(&self) -> i64 {
        self.hop_limit
    }

    /// Hop budget the packet started with, 0 when unknown
    pub fn hop_start(&self) -> i64 {
        self.hop_start
    }

    pub fn priority(&self) -> &str {
        &self.priority
    }

    pub fn want_ack(&self) -> bool {
        self.want_ack
    }

    /// The decoded payload, only when present and non-empty
    pub fn decoded(&self) -> Option<&'a Map<String, Value>> {
        self.decoded
    }

    pub fn portnum(&self) -> Option<&'a str> {
        self.decoded?.get("portnum")?.as_str()
    }

    pub fn has_decoded(&self) -> bool {
        self.decoded.is_some()
    }

    pub fn has_encrypted(&self) -> bool {
        self.encrypted.is_some()
    }

    /// Length of the encrypted payload (bytes, or characters for text payloads)
    pub fn encrypted_len(&self) -> usize {
        match self.encrypted {
            Some(Value::String(s)) => s.chars().count(),
            Some(Value::Array(bytes)) => bytes.len(),
            _ => 0,
        }
    }

    /// Receive time in unix seconds, 0 when absent
    pub fn rx_time(&self) -> i64 {
        self.raw.get("rxTime").and_then(as_integer).unwrap_or(0)
    }

    pub fn channel(&self) -> Option<&'a Value> {
        self.raw.get("channel")
    }

    pub fn rx_rssi(&self) -> Option<&'a Value> {
        self.raw.get("rxRssi")
    }

    pub fn rx_snr(&self) -> Option<&'a Value> {
        self.raw.get("rxSnr")
    }
}

impl<'a> From<&'a Value> for PacketRecord<'a> {
    fn from(raw: &'a Value) -> Self {
        PacketRecord::new(raw)
    }
}

/// Loose truthiness: null, false, zero and empty strings/collections are false
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn first_truthy<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| raw.get(key))
        .find(|v| is_truthy(v))
}

fn first_present<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| raw.get(key))
        .find(|v| !v.is_null())
}

fn as_integer(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.trunc() as i64))
}
