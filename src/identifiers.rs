//! Node identifier canonicalization
//!
//! Mesh nodes show up under several spellings: raw integers from the radio,
//! `!a2ebdc20` user ids, bare hex, upper-case hex, short hex without the
//! leading zeros, and the `^all` broadcast alias. Everything is funnelled
//! through [`to_node_num`] so comparisons and cache lookups work on a single
//! canonical number, and [`to_user_id`] renders it back.
//!
//! # Examples
//!
//! ```text
//! 0x1a2ebdc20      -> 0xa2ebdc20   (integers are masked to 32 bits)
//! "!A2EBDC20"      -> 0xa2ebdc20
//! "dc20"           -> 0x0000dc20
//! "^all"           -> 0xffffffff
//! 0xa2ebdc20       -> "!a2ebdc20"
//! ```

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Mask applied to every integer identifier.
pub const NODE_NUM_MASK: u64 = 0xFFFF_FFFF;

/// All-ones broadcast node number.
pub const BROADCAST_NUM: u32 = 0xFFFF_FFFF;

/// Errors that can occur when canonicalizing a node identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("Unsupported identifier type: expected integer or string, got {0}")]
    UnsupportedIdentifierType(&'static str),

    #[error("Invalid identifier format: '{0}' is not a hexadecimal node id")]
    InvalidIdentifierFormat(String),

    #[error("Identifier out of range: '{0}' does not fit in 64 bits")]
    IdentifierTooWide(String),
}

/// A node identifier as it arrives from the outside world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeId<'a> {
    Int(u64),
    Text(&'a str),
}

impl From<u32> for NodeId<'_> {
    fn from(value: u32) -> Self {
        NodeId::Int(u64::from(value))
    }
}

impl From<u64> for NodeId<'_> {
    fn from(value: u64) -> Self {
        NodeId::Int(value)
    }
}

impl From<i64> for NodeId<'_> {
    // Two's complement reinterpretation, so masking keeps the low 32 bits.
    fn from(value: i64) -> Self {
        NodeId::Int(value as u64)
    }
}

impl<'a> From<&'a str> for NodeId<'a> {
    fn from(value: &'a str) -> Self {
        NodeId::Text(value)
    }
}

impl<'a> From<&'a String> for NodeId<'a> {
    fn from(value: &'a String) -> Self {
        NodeId::Text(value.as_str())
    }
}

impl<'a> TryFrom<&'a Value> for NodeId<'a> {
    type Error = IdentifierError;

    fn try_from(value: &'a Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) => Ok(NodeId::Text(s)),
            Value::Number(n) => {
                if let Some(v) = n.as_u64() {
                    Ok(NodeId::Int(v))
                } else if let Some(v) = n.as_i64() {
                    Ok(NodeId::from(v))
                } else {
                    Err(IdentifierError::UnsupportedIdentifierType("float"))
                }
            }
            Value::Null => Err(IdentifierError::UnsupportedIdentifierType("null")),
            Value::Bool(_) => Err(IdentifierError::UnsupportedIdentifierType("bool")),
            Value::Array(_) => Err(IdentifierError::UnsupportedIdentifierType("array")),
            Value::Object(_) => Err(IdentifierError::UnsupportedIdentifierType("object")),
        }
    }
}

/// Canonical node number.
///
/// Integer inputs are always masked to 32 bits. Hex strings are trusted as
/// parsed: a string longer than eight hex digits keeps its full value (up to
/// 64 bits) instead of being truncated, so `"1a2ebdc20"` and `0x1a2ebdc20`
/// canonicalize differently. Wider strings are rejected with
/// [`IdentifierError::IdentifierTooWide`]. Use [`NodeNum::masked`] where a
/// strict 32-bit value is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeNum(u64);

impl NodeNum {
    pub const BROADCAST: NodeNum = NodeNum(BROADCAST_NUM as u64);

    /// Raw canonical value, possibly wider than 32 bits for overlong hex strings
    pub fn value(self) -> u64 {
        self.0
    }

    /// The 32-bit node number
    pub fn masked(self) -> u32 {
        (self.0 & NODE_NUM_MASK) as u32
    }

    pub fn user_id(self) -> String {
        to_user_id(self.0)
    }

    pub fn is_broadcast(self) -> bool {
        self.masked() == BROADCAST_NUM
    }
}

impl From<u32> for NodeNum {
    fn from(value: u32) -> Self {
        NodeNum(u64::from(value))
    }
}

impl fmt::Display for NodeNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_id())
    }
}

/// Convert any accepted identifier representation to its canonical number
pub fn to_node_num<'a>(id: impl Into<NodeId<'a>>) -> Result<NodeNum, IdentifierError> {
    match id.into() {
        NodeId::Int(v) => Ok(NodeNum(v & NODE_NUM_MASK)),
        NodeId::Text(s) => parse_node_text(s),
    }
}

/// Canonicalize an identifier held in a JSON value (integer or string)
pub fn value_to_node_num(value: &Value) -> Result<NodeNum, IdentifierError> {
    to_node_num(NodeId::try_from(value)?)
}

/// Render a node number as `!` + eight lower-case hex digits
pub fn to_user_id(node_num: u64) -> String {
    format!("!{:08x}", node_num & NODE_NUM_MASK)
}

fn parse_node_text(raw: &str) -> Result<NodeNum, IdentifierError> {
    let cleaned = raw.trim();
    let cleaned = cleaned.strip_prefix('!').unwrap_or(cleaned);

    if cleaned.eq_ignore_ascii_case("^all") || cleaned.eq_ignore_ascii_case("0000^all") {
        return Ok(NodeNum::BROADCAST);
    }

    if !cleaned.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(IdentifierError::InvalidIdentifierFormat(raw.to_string()));
    }

    let padded = format!("{:0>8}", cleaned.to_ascii_lowercase());
    u64::from_str_radix(&padded, 16)
        .map(NodeNum)
        .map_err(|_| IdentifierError::IdentifierTooWide(raw.to_string()))
}

/// Resolved display identity of a node
///
/// Built once by the node book on first lookup and never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLabel {
    node_num: u32,
    user_id: String,
    long_name: Option<String>,
    short_name: Option<String>,
}

impl NodeLabel {
    pub fn new(node_num: u32, long_name: Option<String>, short_name: Option<String>) -> Self {
        Self {
            node_num,
            user_id: to_user_id(u64::from(node_num)),
            long_name,
            short_name,
        }
    }

    pub fn node_num(&self) -> u32 {
        self.node_num
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn long_name(&self) -> Option<&str> {
        self.long_name.as_deref()
    }

    pub fn short_name(&self) -> Option<&str> {
        self.short_name.as_deref()
    }

    /// Short name, then long name, then the user id
    pub fn best(&self) -> &str {
        non_blank(self.short_name())
            .or_else(|| non_blank(self.long_name()))
            .unwrap_or(&self.user_id)
    }
}

fn non_blank(name: Option<&str>) -> Option<&str> {
    name.map(str::trim).filter(|trimmed| !trimmed.is_empty())
}
