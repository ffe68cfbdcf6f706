//! Filter expression compilation and evaluation
//!
//! Filters are written as plain command-line words and combined with
//! boolean operators. The token list is compiled once into a postfix
//! program, which is then run against every captured packet.
//!
//! # Syntax
//!
//! ```text
//! expr and expr        Both must match (binds tighter than `or`)
//! expr or expr         Either may match
//! not expr             Negation (binds tightest)
//! ( expr )             Grouping
//! ```
//!
//! # Primitives
//!
//! - `node <id>` / `src node <id>` / `dst node <id>` - Match a node id in any format
//! - `user <name>` / `src user <name>` / `dst user <name>` - Match a long or short name
//! - `port <name>` - Match the application port (`text`, `position`, `nodeinfo`, ...)
//! - `hop_limit <|>|= <n>` - Compare the remaining hop budget
//! - `priority <name>` - Match the packet priority (case-insensitive)
//! - `want_ack` - Packets requesting an acknowledgement
//! - `is encrypted` / `encrypted` / `is plaintext` / `plaintext` - Encryption state
//!
//! # Examples
//!
//! ```text
//! src node !a2ebdc20                      # Everything sent by one node
//! port text and not src node !a2ebdc20    # Text from everyone else
//! ( port text or port position ) and user Alice
//! hop_limit < 2 or encrypted
//! ```

pub mod error;
pub mod evaluator;
pub mod parser;
pub mod ports;

pub use error::{FilterError, FilterErrorKind};
pub use evaluator::{FilterEvaluator, evaluate, evaluate_with_ports};
pub use parser::{
    Comparison, EncryptionStatus, FilterExpression, Instruction, Operator, Primitive, Side,
    compile,
};
pub use ports::{PortTable, builtin_ports};
