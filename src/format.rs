//! One-line rendering of captured packets
//!
//! ```text
//! [2023-10-19 16:00:00] Ch:5 -85dBm/12.5dB Hops:4/7 from:Alice (!a1b2c3d4) to:Bob (!e5f6a7b8) pos:12.3457,98.7654 150m
//! ```

mod payload;

pub use payload::PayloadFormatter;

use crate::cli::LabelMode;
use crate::identifiers::{NodeId, value_to_node_num};
use crate::nodebook::NodeBook;
use crate::packet::PacketRecord;
use chrono::DateTime;
use colored::Colorize;
use serde_json::Value;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    pub label_mode: LabelMode,
    pub no_resolve: bool,
    pub verbose: bool,
    pub color: bool,
}

/// Render a node identifier for display.
///
/// Identifiers that cannot be canonicalized are shown as given.
pub fn format_node_label(
    book: &NodeBook,
    node: &Value,
    mode: LabelMode,
    no_resolve: bool,
) -> String {
    if no_resolve {
        return match value_to_node_num(node) {
            Ok(num) => num.user_id(),
            Err(_) => verbatim(node),
        };
    }

    let Ok(label) = NodeId::try_from(node).and_then(|id| book.get(id)) else {
        return verbatim(node);
    };

    match mode {
        LabelMode::HexOnly => label.user_id().to_string(),
        LabelMode::NamedOnly => label.best().to_string(),
        LabelMode::NamedWithHex => {
            let best = label.best();
            if best == label.user_id() {
                best.to_string()
            } else {
                format!("{best} ({})", label.user_id())
            }
        }
    }
}

/// Format one packet as a single display line
pub fn format_packet(raw: &Value, book: &NodeBook, options: &FormatOptions) -> String {
    let packet = PacketRecord::new(raw);
    let label = |node: Option<&Value>| match node {
        Some(node) => format_node_label(book, node, options.label_mode, options.no_resolve),
        None => "unknown".to_string(),
    };

    let timestamp = DateTime::from_timestamp(packet.rx_time(), 0)
        .map(|t| t.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| packet.rx_time().to_string());
    let channel = raw_number(packet.channel());
    let signal = format!(
        "{}dBm/{}dB",
        raw_number(packet.rx_rssi()),
        raw_number(packet.rx_snr())
    );
    let hops = hop_info(&packet);
    let next_hop = packet
        .next_hop()
        .filter(|nh| value_to_node_num(nh).is_ok_and(|num| num.masked() != 0))
        .map(|nh| format!(" NH:{}", label(Some(nh))))
        .unwrap_or_default();
    let from = label(packet.from_id());
    let to = label(packet.to_id());

    let payload = PayloadFormatter::new()
        .verbose(options.verbose)
        .format(raw);
    let payload = if payload.is_empty() {
        format!("encrypted:len={}", packet.encrypted_len())
    } else {
        payload
    };

    if options.color {
        format!(
            "[{}] Ch:{} {} {}{} from:{} to:{} {}",
            timestamp.dimmed(),
            channel,
            signal.yellow(),
            hops,
            next_hop,
            from.cyan(),
            to.cyan(),
            payload.green()
        )
    } else {
        format!("[{timestamp}] Ch:{channel} {signal} {hops}{next_hop} from:{from} to:{to} {payload}")
    }
}

/// `Hops:{taken}/{start}` when the start budget is known, `Hop:{limit}` otherwise
fn hop_info(packet: &PacketRecord<'_>) -> String {
    let (limit, start) = (packet.hop_limit(), packet.hop_start());
    match start.checked_sub(limit) {
        Some(taken) if start > 0 && taken >= 0 => format!("Hops:{taken}/{start}"),
        _ => format!("Hop:{limit}"),
    }
}

fn raw_number(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => "0".to_string(),
    }
}

fn verbatim(node: &Value) -> String {
    match node {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
