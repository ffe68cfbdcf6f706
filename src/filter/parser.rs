use super::error::FilterError;
use std::fmt;
use std::str::FromStr;

/// Which end of a packet a node or user primitive looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Src,
    Dst,
    Both,
}

impl Side {
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Side::Src => "src",
            Side::Dst => "dst",
            Side::Both => "both",
        }
    }
}

/// Comparison used by `hop_limit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Less,
    Greater,
    Equal,
}

impl FromStr for Comparison {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" => Ok(Comparison::Less),
            ">" => Ok(Comparison::Greater),
            "=" => Ok(Comparison::Equal),
            _ => Err(FilterError::InvalidComparison(s.to_string())),
        }
    }
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Less => "<",
            Comparison::Greater => ">",
            Comparison::Equal => "=",
        }
    }

    pub fn holds(&self, lhs: i64, rhs: i64) -> bool {
        match self {
            Comparison::Less => lhs < rhs,
            Comparison::Greater => lhs > rhs,
            Comparison::Equal => lhs == rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionStatus {
    Encrypted,
    Plaintext,
}

impl EncryptionStatus {
    pub fn canonical_name(&self) -> &'static str {
        match self {
            EncryptionStatus::Encrypted => "encrypted",
            EncryptionStatus::Plaintext => "plaintext",
        }
    }
}

/// A single filterable condition
///
/// Every primitive also reads as a `(kind, qualifier, value)` triple, e.g.
/// `src node A` is `(node, src, A)` and `hop_limit < 5` is `(hop_limit, <, 5)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Primitive {
    Node { side: Side, value: String },
    User { side: Side, value: String },
    Port(String),
    /// The operand is kept verbatim; it is parsed as an integer at evaluation.
    HopLimit { op: Comparison, value: String },
    Priority(String),
    WantAck,
    Encryption(EncryptionStatus),
}

impl Primitive {
    pub fn kind(&self) -> &'static str {
        match self {
            Primitive::Node { .. } => "node",
            Primitive::User { .. } => "user",
            Primitive::Port(_) => "port",
            Primitive::HopLimit { .. } => "hop_limit",
            Primitive::Priority(_) => "priority",
            Primitive::WantAck => "want_ack",
            Primitive::Encryption(_) => "encryption",
        }
    }

    pub fn qualifier(&self) -> &'static str {
        match self {
            Primitive::Node { side, .. } | Primitive::User { side, .. } => side.canonical_name(),
            Primitive::Port(_) => "portnum",
            Primitive::HopLimit { op, .. } => op.symbol(),
            Primitive::Priority(_) => "priority",
            Primitive::WantAck => "wantAck",
            Primitive::Encryption(_) => "status",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Primitive::Node { value, .. }
            | Primitive::User { value, .. }
            | Primitive::Port(value)
            | Primitive::HopLimit { value, .. }
            | Primitive::Priority(value) => value,
            Primitive::WantAck => "true",
            Primitive::Encryption(status) => status.canonical_name(),
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.kind(), self.qualifier(), self.value())
    }
}

/// Boolean operators, in increasing precedence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Or,
    And,
    Not,
}

impl Operator {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "or" => Some(Operator::Or),
            "and" => Some(Operator::And),
            "not" => Some(Operator::Not),
            _ => None,
        }
    }

    pub fn precedence(&self) -> u8 {
        match self {
            Operator::Or => 1,
            Operator::And => 2,
            Operator::Not => 3,
        }
    }

    pub fn is_right_associative(&self) -> bool {
        matches!(self, Operator::Not)
    }

    pub fn arity(&self) -> usize {
        match self {
            Operator::Not => 1,
            Operator::And | Operator::Or => 2,
        }
    }

    pub fn canonical_name(&self) -> &'static str {
        match self {
            Operator::Or => "or",
            Operator::And => "and",
            Operator::Not => "not",
        }
    }
}

/// One step of a compiled (postfix) filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Primitive(Primitive),
    Operator(Operator),
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Primitive(p) => p.fmt(f),
            Instruction::Operator(op) => f.write_str(op.canonical_name()),
        }
    }
}

/// A compiled filter expression
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterExpression {
    source: Vec<String>,
    instructions: Vec<Instruction>,
}

impl FilterExpression {
    /// Compile whitespace-split tokens
    pub fn compile<S: AsRef<str>>(tokens: &[S]) -> Result<Self, FilterError> {
        Ok(Self {
            source: tokens.iter().map(|t| t.as_ref().to_string()).collect(),
            instructions: compile(tokens)?,
        })
    }

    /// Compile a single string, splitting it on whitespace
    pub fn parse(s: &str) -> Result<Self, FilterError> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        Self::compile(&tokens)
    }

    /// An empty expression matches every packet
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source.join(" "))
    }
}

/// Compile an infix token sequence into postfix instructions
///
/// Uses the shunting-yard algorithm with `or` < `and` < `not`; `not` is right
/// associative, the others left associative. An empty sequence compiles to an
/// empty program.
pub fn compile<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<Instruction>, FilterError> {
    FilterParser::new(tokens).run()
}

enum Pending {
    Operator(Operator),
    OpenParen,
}

struct FilterParser<'t, S> {
    tokens: &'t [S],
    position: usize,
    output: Vec<Instruction>,
    pending: Vec<Pending>,
}

impl<'t, S: AsRef<str>> FilterParser<'t, S> {
    fn new(tokens: &'t [S]) -> Self {
        Self {
            tokens,
            position: 0,
            output: Vec::new(),
            pending: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Instruction>, FilterError> {
        while let Some(token) = self.peek(0) {
            if let Some(op) = Operator::from_token(token) {
                self.push_operator(op);
                self.position += 1;
            } else if token == "(" {
                self.pending.push(Pending::OpenParen);
                self.position += 1;
            } else if token == ")" {
                self.close_paren()?;
                self.position += 1;
            } else {
                let primitive = self.primitive()?;
                self.output.push(Instruction::Primitive(primitive));
            }
        }

        while let Some(pending) = self.pending.pop() {
            match pending {
                Pending::Operator(op) => self.output.push(Instruction::Operator(op)),
                Pending::OpenParen => return Err(FilterError::MismatchedParentheses),
            }
        }

        Ok(self.output)
    }

    fn peek(&self, offset: usize) -> Option<&'t str> {
        self.tokens.get(self.position + offset).map(AsRef::as_ref)
    }

    fn push_operator(&mut self, op: Operator) {
        while let Some(Pending::Operator(top)) = self.pending.last() {
            let yields = top.precedence() > op.precedence()
                || (top.precedence() == op.precedence() && !op.is_right_associative());
            if !yields {
                break;
            }
            self.output.push(Instruction::Operator(*top));
            self.pending.pop();
        }
        self.pending.push(Pending::Operator(op));
    }

    fn close_paren(&mut self) -> Result<(), FilterError> {
        loop {
            match self.pending.pop() {
                Some(Pending::Operator(op)) => self.output.push(Instruction::Operator(op)),
                Some(Pending::OpenParen) => return Ok(()),
                None => return Err(FilterError::MismatchedParentheses),
            }
        }
    }

    /// Parse the primitive starting at the current token and step past it
    fn primitive(&mut self) -> Result<Primitive, FilterError> {
        let token = self.peek(0).unwrap_or_default();

        let (primitive, consumed) = match token {
            "node" => (
                Primitive::Node {
                    side: Side::Both,
                    value: self.operand(1, "node")?,
                },
                2,
            ),
            "user" => (
                Primitive::User {
                    side: Side::Both,
                    value: self.operand(1, "user")?,
                },
                2,
            ),
            "src" | "dst" => {
                let side = if token == "src" { Side::Src } else { Side::Dst };
                match self.peek(1) {
                    Some("node") => (
                        Primitive::Node {
                            side,
                            value: self.operand(2, &format!("{token} node"))?,
                        },
                        3,
                    ),
                    Some("user") => (
                        Primitive::User {
                            side,
                            value: self.operand(2, &format!("{token} user"))?,
                        },
                        3,
                    ),
                    _ => return Err(FilterError::ExpectedNodeOrUser(token.to_string())),
                }
            }
            "port" => (Primitive::Port(self.operand(1, "port")?), 2),
            "hop_limit" => {
                if self.peek(2).is_none() {
                    return Err(FilterError::MissingValue("hop_limit <op>".to_string()));
                }
                let op: Comparison = self.peek(1).unwrap_or_default().parse()?;
                (
                    Primitive::HopLimit {
                        op,
                        value: self.operand(2, "hop_limit")?,
                    },
                    3,
                )
            }
            "priority" => (Primitive::Priority(self.operand(1, "priority")?), 2),
            "want_ack" => (Primitive::WantAck, 1),
            "encrypted" => (Primitive::Encryption(EncryptionStatus::Encrypted), 1),
            "plaintext" => (Primitive::Encryption(EncryptionStatus::Plaintext), 1),
            "is" => match self.peek(1) {
                Some("encrypted") => (Primitive::Encryption(EncryptionStatus::Encrypted), 2),
                Some("plaintext") => (Primitive::Encryption(EncryptionStatus::Plaintext), 2),
                other => {
                    return Err(FilterError::InvalidEncryptionStatus(
                        other.unwrap_or_default().to_string(),
                    ));
                }
            },
            _ => return Err(FilterError::UnrecognizedToken(token.to_string())),
        };

        self.position += consumed;
        Ok(primitive)
    }

    fn operand(&self, offset: usize, construct: &str) -> Result<String, FilterError> {
        self.peek(offset)
            .map(str::to_string)
            .ok_or_else(|| FilterError::MissingValue(construct.to_string()))
    }
}
