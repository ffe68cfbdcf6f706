use meshcap::cli::LabelMode;
use meshcap::directory::JsonDirectory;
use meshcap::format::{FormatOptions, PayloadFormatter, format_node_label, format_packet};
use meshcap::nodebook::NodeBook;
use serde_json::{Value, json};
use std::sync::Arc;

fn book() -> NodeBook {
    let mut directory = JsonDirectory::default();
    directory.insert(
        "!a1b2c3d4",
        json!({"user": {"longName": "Alice Node"}}),
    );
    directory.insert(
        "!e5f6a7b8",
        json!({"userInfo": {"long_name": "Bob Node"}}),
    );
    NodeBook::new(Some(Arc::new(directory)), 32)
}

fn position_packet() -> Value {
    json!({
        "rxTime": 1_697_731_200,
        "channel": 5,
        "rxRssi": -85,
        "rxSnr": 12.5,
        "hopLimit": 3,
        "hopStart": 7,
        "fromId": "!a1b2c3d4",
        "toId": "!e5f6a7b8",
        "decoded": {
            "portnum": "POSITION_APP",
            "position": {"latitude": 12.345678, "longitude": 98.765432, "altitude": 150}
        }
    })
}

#[test]
fn test_position_line() {
    let line = format_packet(&position_packet(), &book(), &FormatOptions::default());
    assert_eq!(
        line,
        "[2023-10-19 16:00:00] Ch:5 -85dBm/12.5dB Hops:4/7 from:Alice Node (!a1b2c3d4) to:Bob Node (!e5f6a7b8) pos:12.3457,98.7654 150m"
    );
}

#[test]
fn test_label_modes_in_lines() {
    let book = book();
    let packet = position_packet();

    let hex = FormatOptions {
        label_mode: LabelMode::HexOnly,
        ..FormatOptions::default()
    };
    assert!(format_packet(&packet, &book, &hex).contains("from:!a1b2c3d4 to:!e5f6a7b8 "));

    let named = FormatOptions {
        label_mode: LabelMode::NamedOnly,
        ..FormatOptions::default()
    };
    assert!(format_packet(&packet, &book, &named).contains("from:Alice Node to:Bob Node "));

    let unresolved = FormatOptions {
        no_resolve: true,
        ..FormatOptions::default()
    };
    assert!(format_packet(&packet, &book, &unresolved).contains("from:!a1b2c3d4 to:!e5f6a7b8 "));
}

#[test]
fn test_lines_reuse_cached_labels() {
    let book = book();
    let packet = position_packet();
    for _ in 0..3 {
        format_packet(&packet, &book, &FormatOptions::default());
    }
    let stats = book.cache_stats();
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 4);
}

#[test]
fn test_snake_case_fields_and_hop_fallback() {
    let packet = json!({
        "from": 0xe5f6_a7b8u32,
        "to": "^all",
        "hop_limit": 2,
        "next_hop": "!a1b2c3d4",
        "decoded": {"portnum": "TEXT_MESSAGE_APP", "text": "hello"}
    });
    let line = format_packet(&packet, &book(), &FormatOptions::default());
    assert!(line.ends_with(
        "Hop:2 NH:Alice Node (!a1b2c3d4) from:Bob Node (!e5f6a7b8) to:!ffffffff text:hello"
    ), "{line}");
}

#[test]
fn test_zero_next_hop_is_hidden() {
    let packet = json!({"fromId": "!00000001", "nextHop": "!00000000", "encrypted": "xyz"});
    let line = format_packet(&packet, &NodeBook::with_defaults(), &FormatOptions::default());
    assert!(!line.contains("NH:"));
    assert!(line.ends_with("from:!00000001 to:unknown encrypted:len=3"), "{line}");
}

#[test]
fn test_verbose_payloads() {
    let packet = json!({"decoded": {"portnum": "ADMIN_APP", "admin": {"reboot": 5}}});
    let quiet = format_packet(&packet, &NodeBook::with_defaults(), &FormatOptions::default());
    assert!(quiet.ends_with(" [ADMIN_APP]"));

    let verbose = PayloadFormatter::new().verbose(true).format(&packet);
    assert_eq!(verbose, r#"ADMIN_APP:{"admin":{"reboot":5},"portnum":"ADMIN_APP"}"#);
}

#[test]
fn test_unknown_identifier_shown_verbatim() {
    let book = NodeBook::with_defaults();
    assert_eq!(
        format_node_label(&book, &json!("gateway-1"), LabelMode::NamedWithHex, false),
        "gateway-1"
    );
    let packet = json!({"fromId": "gateway-1", "decoded": {"portnum": "TEXT_MESSAGE_APP", "text": "x"}});
    assert!(format_packet(&packet, &book, &FormatOptions::default()).contains("from:gateway-1 "));
}

#[test]
fn test_plain_output_has_no_escape_codes() {
    let line = format_packet(&position_packet(), &book(), &FormatOptions::default());
    assert!(!line.contains('\u{1b}'));
}

#[test]
fn test_extreme_hop_values_render() {
    let packet = json!({"fromId": "!00000001", "hopLimit": -1e300, "hopStart": 1, "encrypted": "x"});
    let line = format_packet(&packet, &NodeBook::with_defaults(), &FormatOptions::default());
    assert!(line.contains(&format!("Hop:{} ", i64::MIN)), "{line}");
}
