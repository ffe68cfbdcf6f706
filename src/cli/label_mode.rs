use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How node identities are rendered in packet lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabelMode {
    /// `Alice (!a2ebdc20)`, or just the user id when no name is known
    #[default]
    #[value(alias = "auto")]
    #[serde(alias = "auto")]
    NamedWithHex,
    /// `Alice`, or the user id when no name is known
    NamedOnly,
    /// Always `!a2ebdc20`
    HexOnly,
}
