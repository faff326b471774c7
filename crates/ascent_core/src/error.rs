use thiserror::Error;

/// Failures of the trajectory driver. Raised before any integration work.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },
}

impl IntegrationError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }
}

/// Failures while parsing or compiling an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),

    #[error("unexpected token at position {position}")]
    UnexpectedToken { position: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("expected ')'")]
    UnbalancedParen,

    #[error("trailing input after expression at position {position}")]
    TrailingInput { position: usize },

    #[error("unknown variable or parameter: {0}")]
    UnknownSymbol(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("expression nests deeper than {limit} levels")]
    TooDeep { limit: usize },

    #[error("constant '{0}' collides with a state or time variable")]
    ReservedName(String),
}
