use std::collections::HashMap;
use std::sync::LazyLock;

pub const TEXT_MESSAGE_APP: &str = "TEXT_MESSAGE_APP";
pub const POSITION_APP: &str = "POSITION_APP";
pub const NODEINFO_APP: &str = "NODEINFO_APP";
pub const ROUTING_APP: &str = "ROUTING_APP";
pub const ADMIN_APP: &str = "ADMIN_APP";
pub const TELEMETRY_APP: &str = "TELEMETRY_APP";

const BUILTIN_ALIASES: [(&str, &str); 6] = [
    ("text", TEXT_MESSAGE_APP),
    ("position", POSITION_APP),
    ("nodeinfo", NODEINFO_APP),
    ("routing", ROUTING_APP),
    ("admin", ADMIN_APP),
    ("telemetry", TELEMETRY_APP),
];

/// Short port names accepted by the `port` primitive
///
/// Aliases are matched case-insensitively; anything that is not an alias is
/// compared verbatim against the packet's `portnum`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortTable {
    aliases: HashMap<String, String>,
}

impl PortTable {
    /// The built-in aliases only
    pub fn builtin() -> Self {
        Self {
            aliases: BUILTIN_ALIASES
                .iter()
                .map(|(alias, port)| (alias.to_string(), port.to_string()))
                .collect(),
        }
    }

    /// Add or override aliases on top of the current table
    pub fn with_aliases<I, K, V>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (alias, port) in aliases {
            self.aliases
                .insert(alias.as_ref().to_lowercase(), port.into());
        }
        self
    }

    /// Port name a filter value stands for
    pub fn resolve<'a>(&'a self, value: &'a str) -> &'a str {
        self.aliases
            .get(&value.to_lowercase())
            .map(String::as_str)
            .unwrap_or(value)
    }

    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Default for PortTable {
    fn default() -> Self {
        builtin_ports().clone()
    }
}

/// Shared instance of the built-in table
pub fn builtin_ports() -> &'static PortTable {
    static BUILTIN: LazyLock<PortTable> = LazyLock::new(PortTable::builtin);
    &BUILTIN
}
