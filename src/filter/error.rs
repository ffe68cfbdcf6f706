use thiserror::Error;

/// Broad category of a filter failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterErrorKind {
    /// The token sequence could not be compiled
    Syntax,
    /// A primitive's literal operand could not be interpreted
    InvalidValue,
    /// An instruction sequence violated the stack machine's arity rules
    InvalidExpression,
}

/// Errors that can occur when compiling or evaluating filter expressions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("'{0}' requires a value")]
    MissingValue(String),

    #[error("'{0}' must be followed by 'node' or 'user'")]
    ExpectedNodeOrUser(String),

    #[error("'is' must be followed by 'encrypted' or 'plaintext', got '{0}'")]
    InvalidEncryptionStatus(String),

    #[error("Invalid hop_limit operator: '{0}'. Valid operators are: <, >, =")]
    InvalidComparison(String),

    #[error("Unrecognized token: '{0}'")]
    UnrecognizedToken(String),

    #[error("Mismatched parentheses")]
    MismatchedParentheses,

    #[error("Invalid {primitive} value: '{value}'")]
    InvalidValue { primitive: &'static str, value: String },

    #[error("'{operator}' operator requires {required} operand(s)")]
    MissingOperand {
        operator: &'static str,
        required: usize,
    },

    #[error("Invalid expression: evaluation should leave exactly one result, found {0}")]
    UnbalancedStack(usize),
}

impl FilterError {
    pub fn kind(&self) -> FilterErrorKind {
        match self {
            FilterError::MissingValue(_)
            | FilterError::ExpectedNodeOrUser(_)
            | FilterError::InvalidEncryptionStatus(_)
            | FilterError::InvalidComparison(_)
            | FilterError::UnrecognizedToken(_)
            | FilterError::MismatchedParentheses => FilterErrorKind::Syntax,
            FilterError::InvalidValue { .. } => FilterErrorKind::InvalidValue,
            FilterError::MissingOperand { .. } | FilterError::UnbalancedStack(_) => {
                FilterErrorKind::InvalidExpression
            }
        }
    }
}
