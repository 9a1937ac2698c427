use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::BuiltKind;

/// Runtime failure of a well-formed expression against one instance.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    #[error("Unknown function: [ {0} ]")]
    UnknownFunction(String),
    #[error("Unknown {kind}: [ {name} ]")]
    UnknownBuiltBlock { kind: BuiltKind, name: String },
    #[error("Missing entry: [ {0} ]")]
    MissingEntry(String),
    #[error("Missing operand for [ {0} ]")]
    MissingOperand(String),
    #[error("Missing argument [ {param} ] for [ {function} ]")]
    MissingArgument { function: String, param: String },
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    #[error("Invalid argument to [ {function} ]: {message}")]
    InvalidArgument { function: String, message: String },
}

impl ValueError {
    pub fn invalid<F: Into<String>, M: Into<String>>(function: F, message: M) -> Self {
        ValueError::InvalidArgument {
            function: function.into(),
            message: message.into(),
        }
    }

    pub fn type_mismatch<S: Into<String>>(message: S) -> Self {
        ValueError::TypeMismatch(message.into())
    }
}

impl Serialize for ValueError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Parse error: {message} (cmd: {cmd})")]
    Parse { cmd: String, message: String },
    #[error("Value error: {0}")]
    Value(#[from] ValueError),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        EngineError::Configuration(message.into())
    }

    pub fn parse<C: Into<String>, M: Into<String>>(cmd: C, message: M) -> Self {
        EngineError::Parse {
            cmd: cmd.into(),
            message: message.into(),
        }
    }
}

/// Uniform envelope returned at the outer boundary. Exactly one of the two
/// fields is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub output: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(output: T) -> Self {
        Self {
            output: Some(output),
            message: None,
        }
    }

    pub fn error(error: &EngineError) -> Self {
        Self {
            output: None,
            message: Some(error.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.output.is_some()
    }
}

impl<T> From<EngineResult<T>> for ApiResponse<T> {
    fn from(result: EngineResult<T>) -> Self {
        match result {
            Ok(output) => ApiResponse::ok(output),
            Err(e) => {
                tracing::warn!("request failed: {}", e);
                ApiResponse::error(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_from_error() {
        let result: EngineResult<u32> = Err(EngineError::configuration("no cmd"));
        let response = ApiResponse::from(result);
        assert!(!response.is_ok());
        assert_eq!(
            response.message.as_deref(),
            Some("Configuration error: no cmd")
        );
    }

    #[test]
    fn test_value_error_converts() {
        let err: EngineError = ValueError::UnknownFunction("foo".to_string()).into();
        assert!(matches!(err, EngineError::Value(ValueError::UnknownFunction(_))));
        assert_eq!(err.to_string(), "Value error: Unknown function: [ foo ]");
    }
}
