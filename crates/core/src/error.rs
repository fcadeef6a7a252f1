use thiserror::Error;

pub type ClueResult<T> = Result<T, ClueError>;

#[derive(Error, Debug)]
pub enum ClueError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{kind} '{name}' not recognised (expected one of: {expected})")]
    UnknownName {
        kind: &'static str,
        name: String,
        expected: String,
    },

    #[error("Model error: {0}")]
    Model(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ClueError {
    pub fn unknown(kind: &'static str, name: impl Into<String>, expected: &[&str]) -> Self {
        Self::UnknownName {
            kind,
            name: name.into(),
            expected: expected.join(", "),
        }
    }
}

impl From<config::ConfigError> for ClueError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
