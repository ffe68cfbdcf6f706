mod label_mode;

use clap::{Parser, ValueEnum};
pub use label_mode::LabelMode;
use std::path::PathBuf;

/// Filter and display captured mesh radio packets
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Capture file to replay (`-` or omitted reads standard input)
    #[arg(short = 'r', long = "read-file", value_name = "PATH")]
    pub read_file: Option<PathBuf>,

    /// Write matching packets to a capture file
    #[arg(short = 'w', long = "write-file", value_name = "PATH")]
    pub write_file: Option<PathBuf>,

    /// Stop after this many matching packets
    #[arg(short = 'c', long)]
    pub count: Option<usize>,

    /// Show user ids instead of resolving node names
    #[arg(short = 'n', long)]
    pub no_resolve: bool,

    /// Increase log verbosity (-v, -vv, -vvv); also shows undecoded payload details
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// How node identities are displayed
    #[arg(long, value_enum)]
    pub label_mode: Option<LabelMode>,

    /// JSON node directory keyed by user id
    #[arg(long, value_name = "PATH")]
    pub nodes: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, value_name = "PATH", env = "MESHCAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// When to colorize output
    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    /// Print node cache statistics on exit
    #[arg(long)]
    pub stats: bool,

    /// Filter expression, e.g. `port text and not src node !a2ebdc20`
    #[arg(value_name = "FILTER")]
    pub filter: Vec<String>,
}

impl Cli {
    /// The capture path to read, `None` for standard input
    pub fn input_path(&self) -> Option<&std::path::Path> {
        self.read_file
            .as_deref()
            .filter(|path| path.as_os_str() != "-")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

pub fn cli_parse() -> Cli {
    Cli::parse()
}
