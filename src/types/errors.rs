//! Error types for celcache.

use thiserror::Error;

/// Default result type for celcache.
pub type CelResult<T> = Result<T, CelError>;

/// Errors produced by the evaluation pipeline and its surroundings.
#[derive(Error, Debug)]
pub enum CelError {
    #[error("JSON parsing error: {0}")]
    JsonParse(String),

    #[error("CEL compilation error: {message}")]
    Compile {
        message: String,
        /// Variables referenced by the expression but absent from the context.
        undeclared: Vec<String>,
    },

    #[error("CEL evaluation error: {0}")]
    Eval(String),

    #[error("CEL environment creation error: {0}")]
    EnvironmentBuild(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl CelError {
    /// Creates a generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }

    /// Creates a configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a compilation error without undeclared-variable details.
    pub fn compile<S: Into<String>>(msg: S) -> Self {
        Self::Compile {
            message: msg.into(),
            undeclared: Vec::new(),
        }
    }

    /// Stable tag for the error category, used by the host protocol.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JsonParse(_) => "json_parse",
            Self::Compile { .. } => "compile",
            Self::Eval(_) => "eval",
            Self::EnvironmentBuild(_) => "environment_build",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::TomlParse(_) | Self::TomlSerialize(_) => "toml",
            Self::Json(_) => "json",
            Self::Other(_) => "other",
        }
    }

    /// Whether the error comes from evaluating a caller's input rather than
    /// from the process environment.
    pub fn is_evaluation_error(&self) -> bool {
        matches!(
            self,
            Self::JsonParse(_) | Self::Compile { .. } | Self::Eval(_) | Self::EnvironmentBuild(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_category_phrase() {
        assert!(CelError::JsonParse("eof".into())
            .to_string()
            .starts_with("JSON parsing error"));
        assert!(CelError::compile("bad token")
            .to_string()
            .starts_with("CEL compilation error"));
        assert!(CelError::Eval("division by zero".into())
            .to_string()
            .starts_with("CEL evaluation error"));
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(CelError::JsonParse(String::new()).kind(), "json_parse");
        assert_eq!(CelError::compile("x").kind(), "compile");
        assert_eq!(CelError::Eval(String::new()).kind(), "eval");
        assert_eq!(
            CelError::EnvironmentBuild(String::new()).kind(),
            "environment_build"
        );
        assert!(CelError::compile("x").is_evaluation_error());
        assert!(!CelError::config("x").is_evaluation_error());
    }
}
