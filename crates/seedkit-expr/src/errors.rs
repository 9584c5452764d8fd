use thiserror::Error;

/// Errors raised while lexing, parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("unterminated string starting at offset {0}")]
    UnterminatedString(usize),
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
    #[error("unexpected {found}, expected {expected}")]
    UnexpectedToken { found: String, expected: String },
    #[error("expression nesting exceeds {0} levels")]
    TooDeep(usize),
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("function '{name}' expects {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: String,
        found: usize,
    },
    #[error("type error: {0}")]
    Type(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("result is not a finite number")]
    NonFinite,
}

/// Errors raised by a dependency loader.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("unknown locator '{0}'")]
    UnknownLocator(String),
    #[error("failed to load '{locator}': {message}")]
    Failed { locator: String, message: String },
}
