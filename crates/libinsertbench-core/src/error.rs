use thiserror::Error;

/// Main error type for insertbench operations
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Statement failed: {0}")]
    Statement(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BenchError {
    /// Short machine-readable code, prefixed to the fatal diagnostic
    pub fn error_code(&self) -> &'static str {
        match self {
            BenchError::InvalidArgs(_) => "invalid_args",
            BenchError::Connection(_) => "connection_error",
            BenchError::Statement(_) => "statement_error",
            BenchError::Io(_) => "io_error",
            BenchError::Json(_) => "internal_error",
            BenchError::TomlParse(_) => "invalid_args",
            BenchError::Internal(_) => "internal_error",
        }
    }

    /// Every fatal error terminates the process with status 1
    pub fn exit_code(&self) -> i32 {
        1
    }

    /// Whether usage text should accompany the diagnostic
    pub fn wants_usage(&self) -> bool {
        matches!(self, BenchError::InvalidArgs(_) | BenchError::TomlParse(_))
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;
