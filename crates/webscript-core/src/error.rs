use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WebscriptError>;

#[derive(Error, Debug)]
pub enum WebscriptError {
    #[error("malformed request path: '{0}'")]
    MalformedPath(String),

    #[error("code unit '{0}' was not found on the search path")]
    UnitNotFound(String),

    #[error("function '{function}' was not found in unit '{unit}'")]
    FunctionNotFound { unit: String, function: String },

    #[error("missing required argument '{0}'")]
    MissingArgument(String),

    #[error("argument '{name}' cannot be coerced to {expected}: {value}")]
    ArgumentCoercion {
        name: String,
        expected: &'static str,
        value: String,
    },

    #[error("function '{function}' raised: {message}")]
    Invocation {
        function: String,
        message: String,
        trace: Option<String>,
    },

    #[error("response formatting failed: {0}")]
    Formatting(String),

    #[error("unit '{unit}' failed to load: {message}")]
    UnitLoad { unit: String, message: String },

    #[error("script engine error: {0}")]
    Engine(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WebscriptError {
    /// Stable tag identifying the failure kind in wire payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedPath(_) => "MalformedPathError",
            Self::UnitNotFound(_) => "UnitNotFoundError",
            Self::FunctionNotFound { .. } => "FunctionNotFoundError",
            Self::MissingArgument(_) => "MissingArgumentError",
            Self::ArgumentCoercion { .. } => "ArgumentCoercionError",
            Self::Invocation { .. } => "InvocationError",
            Self::Formatting(_) => "FormattingError",
            Self::UnitLoad { .. } => "UnitLoadError",
            Self::Engine(_) => "EngineError",
            Self::Transport(_) => "TransportError",
            Self::Io(_) => "IoError",
            Self::Json(_) => "JsonError",
        }
    }

    pub fn trace(&self) -> Option<&str> {
        match self {
            Self::Invocation { trace, .. } => trace.as_deref(),
            _ => None,
        }
    }
}

/// Wire shape of a failed call, rendered through the formatter manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl ErrorPayload {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            trace: None,
        }
    }

    pub fn from_error(err: &WebscriptError) -> Self {
        Self {
            error: err.kind().to_string(),
            message: err.to_string(),
            trace: err.trace().map(str::to_owned),
        }
    }
}
