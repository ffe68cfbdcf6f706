use crate::filter::ports::{NODEINFO_APP, POSITION_APP, TELEMETRY_APP, TEXT_MESSAGE_APP};
use serde_json::{Map, Value};

/// Renders the decoded payload of a packet as a short `kind:details` string
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadFormatter {
    verbose: bool,
}

impl PayloadFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show the decoded JSON for ports without a dedicated rendering
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Format the payload, or return an empty string when nothing is decoded
    pub fn format(&self, packet: &Value) -> String {
        let Some(decoded) = packet.get("decoded").and_then(Value::as_object) else {
            return String::new();
        };
        let Some(portnum) = decoded
            .get("portnum")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
        else {
            return String::new();
        };

        match portnum {
            TEXT_MESSAGE_APP => format!("text:{}", str_field(decoded, &["text"]).unwrap_or("")),
            POSITION_APP => format_position(decoded),
            NODEINFO_APP => format_user(decoded),
            TELEMETRY_APP => format_telemetry(decoded),
            other if self.verbose => {
                format!("{other}:{}", Value::Object(decoded.clone()))
            }
            other => format!("[{other}]"),
        }
    }
}

fn format_position(decoded: &Map<String, Value>) -> String {
    let position = decoded.get("position");
    let number = |key: &str| {
        position
            .and_then(|p| p.get(key))
            .and_then(as_f64)
            .unwrap_or(0.0)
    };

    let (lat, lon) = (number("latitude"), number("longitude"));
    let alt = number("altitude").trunc() as i64;
    format!("pos:{lat:.4},{lon:.4} {alt}m")
}

fn format_user(decoded: &Map<String, Value>) -> String {
    let user = decoded.get("user").and_then(Value::as_object);
    let field = |keys: &[&str]| user.and_then(|u| str_field(u, keys)).unwrap_or("");

    let long_name = field(&["longName", "long_name"]);
    let short_name = field(&["shortName", "short_name"]);
    let hw_model = field(&["hwModel", "hw_model"]);

    let name_part = match (long_name.is_empty(), short_name.is_empty()) {
        (false, false) => format!("{long_name}/{short_name}"),
        (false, true) => long_name.to_string(),
        (true, false) => short_name.to_string(),
        (true, true) => String::new(),
    };
    let hw_part = if hw_model.is_empty() {
        String::new()
    } else {
        format!(" {hw_model}")
    };

    format!("user:{name_part}{hw_part}")
}

fn format_telemetry(decoded: &Map<String, Value>) -> String {
    let telemetry = decoded.get("telemetry").and_then(Value::as_object);
    let section = |keys: &[&str]| {
        keys.iter()
            .find_map(|key| telemetry.and_then(|t| t.get(*key)).and_then(Value::as_object))
    };
    let device = section(&["device_metrics", "deviceMetrics"]);
    let environment = section(&["environment_metrics", "environmentMetrics"]);

    let battery = device
        .and_then(|d| d.get("battery_level").or_else(|| d.get("batteryLevel")))
        .and_then(as_f64)
        .map(|pct| format!("{}%", pct.trunc() as i64));
    let voltage = device
        .and_then(|d| d.get("voltage"))
        .and_then(as_f64)
        .map(|v| format!("{v:.2}V"));
    let temperature = environment
        .and_then(|e| e.get("temperature"))
        .and_then(as_f64);

    let mut parts = Vec::new();
    match (battery, voltage) {
        (Some(b), Some(v)) => parts.push(format!("bat={b}/{v}")),
        (Some(only), None) | (None, Some(only)) => parts.push(format!("bat={only}")),
        (None, None) => {}
    }
    if let Some(t) = temperature {
        parts.push(format!("temp={t:.1}°C"));
    }

    format!("tele:{}", parts.join(" "))
}

fn str_field<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| map.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

/// Numbers, or numeric strings, as f64
fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
