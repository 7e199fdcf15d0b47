//! Strongly typed error system for tgql.
//!
//! Every failure in the execution pipeline is an [`Error`] carrying a typed
//! [`ErrorCode`]. Codes group into [`ErrorCategory`] values so callers can tell
//! startup faults apart from per-call failures.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Typed error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // Configuration errors
    TypeNotFound,
    DuplicateType,
    ParserNotFound,
    DocumentNotFound,
    InvalidTypeRef,
    StageNotFound,

    // Invocation errors
    NotInitialized,
    AlreadyInitialized,
    ResultTypeMismatch,

    // Argument errors
    ArgumentError,

    // Transport errors
    NetworkError,
    Timeout,
    ConnectionRefused,
    HttpError,
    HttpsNotSupported,
    InvalidUrl,
    InvalidHeader,
    InvalidResponse,

    Cancelled,

    // Serialization errors
    SerializeError,

    // Application and data errors
    ExecutionError,
    MissingField,
    NullValue,
    DeserializeError,
    NoData,

    UnsupportedDirection,
}

/// Coarse grouping of [`ErrorCode`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Unresolved names or malformed declarations found while wiring registries.
    Configuration,
    /// A serializer or parser used outside its lifecycle.
    Invocation,
    /// A caller passed an argument its contract forbids.
    Argument,
    /// The transport could not deliver the request or read a response.
    Transport,
    /// The call was cancelled by the caller.
    Cancelled,
    /// A client value does not match the type it is serialized as.
    Serialization,
    /// The server reported errors, or the response data broke the result contract.
    Application,
    /// A conversion was requested in a direction the type does not support.
    UnsupportedDirection,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TypeNotFound => "TYPE_NOT_FOUND",
            Self::DuplicateType => "DUPLICATE_TYPE",
            Self::ParserNotFound => "PARSER_NOT_FOUND",
            Self::DocumentNotFound => "DOCUMENT_NOT_FOUND",
            Self::InvalidTypeRef => "INVALID_TYPE_REF",
            Self::StageNotFound => "STAGE_NOT_FOUND",
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::ResultTypeMismatch => "RESULT_TYPE_MISMATCH",
            Self::ArgumentError => "ARGUMENT_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::ConnectionRefused => "CONNECTION_REFUSED",
            Self::HttpError => "HTTP_ERROR",
            Self::HttpsNotSupported => "HTTPS_NOT_SUPPORTED",
            Self::InvalidUrl => "INVALID_URL",
            Self::InvalidHeader => "INVALID_HEADER",
            Self::InvalidResponse => "INVALID_RESPONSE",
            Self::Cancelled => "CANCELLED",
            Self::SerializeError => "SERIALIZE_ERROR",
            Self::ExecutionError => "EXECUTION_ERROR",
            Self::MissingField => "MISSING_FIELD",
            Self::NullValue => "NULL_VALUE",
            Self::DeserializeError => "DESERIALIZE_ERROR",
            Self::NoData => "NO_DATA",
            Self::UnsupportedDirection => "UNSUPPORTED_DIRECTION",
        }
    }

    /// Returns the category this code belongs to.
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::TypeNotFound
            | Self::DuplicateType
            | Self::ParserNotFound
            | Self::DocumentNotFound
            | Self::InvalidTypeRef
            | Self::StageNotFound => ErrorCategory::Configuration,
            Self::NotInitialized | Self::AlreadyInitialized | Self::ResultTypeMismatch => {
                ErrorCategory::Invocation
            }
            Self::ArgumentError => ErrorCategory::Argument,
            Self::NetworkError
            | Self::Timeout
            | Self::ConnectionRefused
            | Self::HttpError
            | Self::HttpsNotSupported
            | Self::InvalidUrl
            | Self::InvalidHeader
            | Self::InvalidResponse => ErrorCategory::Transport,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::SerializeError => ErrorCategory::Serialization,
            Self::ExecutionError
            | Self::MissingField
            | Self::NullValue
            | Self::DeserializeError
            | Self::NoData => ErrorCategory::Application,
            Self::UnsupportedDirection => ErrorCategory::UnsupportedDirection,
        }
    }

    /// Returns true if this is a retryable error.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::Timeout | Self::ConnectionRefused
        )
    }

    /// Returns true for faults that should stop the process rather than the call.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Configuration | ErrorCategory::Invocation
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Strongly typed tgql error.
#[derive(Error, Debug, Clone)]
#[error("[{code}] {message}")]
pub struct Error {
    /// Typed error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// The error that caused this one.
    #[source]
    pub source: Option<Box<Error>>,
    /// Response path of the offending field, for data errors.
    pub path: Vec<PathSegment>,
    /// Extension data for debugging.
    pub extensions: Option<HashMap<String, serde_json::Value>>,
}

/// One step of a response path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl Error {
    /// Creates a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            path: Vec::new(),
            extensions: None,
        }
    }

    /// Adds a source error.
    #[must_use]
    pub fn with_source(mut self, source: Error) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Sets the response path.
    #[must_use]
    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = path;
        self
    }

    /// Adds extension data.
    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let extensions = self.extensions.get_or_insert_with(HashMap::new);
        if let Ok(v) = serde_json::to_value(value) {
            extensions.insert(key.into(), v);
        }
        self
    }

    // Convenience constructors

    /// A named type could not be resolved.
    pub fn type_not_found(name: impl fmt::Display) -> Self {
        Self::new(ErrorCode::TypeNotFound, format!("Unknown type `{name}`"))
    }

    /// A serializer or parser was used before its initialization pass.
    pub fn not_initialized(name: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::NotInitialized,
            format!("`{name}` used before initialization"),
        )
    }

    /// A caller-supplied argument violates its contract.
    pub fn argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ArgumentError, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, message)
    }

    /// Creates a timeout error.
    pub fn timeout() -> Self {
        Self::new(ErrorCode::Timeout, "Request timed out")
    }

    /// The caller cancelled the call.
    pub fn cancelled() -> Self {
        Self::new(ErrorCode::Cancelled, "Operation cancelled")
    }

    /// Creates a serialization error.
    pub fn serialize(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializeError, message)
    }

    /// Creates a deserialization error.
    pub fn deserialize(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DeserializeError, message)
    }

    /// Attempted to read an input-only type from a response.
    pub fn unsupported_direction(name: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::UnsupportedDirection,
            format!("`{name}` is an input type and cannot be deserialized"),
        )
    }

    /// Returns the category of this error.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Returns true for configuration and invocation faults.
    pub fn is_fatal(&self) -> bool {
        self.code.is_fatal()
    }

    /// Returns true if the error came from the transport.
    pub fn is_transport(&self) -> bool {
        self.category() == ErrorCategory::Transport
    }

    /// Renders the path as `a.b.0.c`.
    pub fn path_string(&self) -> String {
        self.path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Error", 4)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("message", &self.message)?;
        if !self.path.is_empty() {
            state.serialize_field("path", &self.path)?;
        }
        if let Some(ref ext) = self.extensions {
            state.serialize_field("extensions", ext)?;
        }
        state.end()
    }
}

/// Type alias for tgql results.
pub type Result<T> = std::result::Result<T, Error>;

/// Result extension for mapping foreign errors with context.
pub trait ResultExt<T> {
    /// Maps the error to an [`Error`] with the given code.
    fn map_tgql_err(self, code: ErrorCode) -> Result<T>;

    /// Maps the error to an [`Error`] with the given code and message.
    fn map_tgql_err_with(self, code: ErrorCode, message: impl Into<String>) -> Result<T>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn map_tgql_err(self, code: ErrorCode) -> Result<T> {
        self.map_err(|e| Error::new(code, e.to_string()))
    }

    fn map_tgql_err_with(self, code: ErrorCode, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::new(code, message).with_extension("original_error", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_categories() {
        assert_eq!(ErrorCode::TypeNotFound.category(), ErrorCategory::Configuration);
        assert_eq!(ErrorCode::NotInitialized.category(), ErrorCategory::Invocation);
        assert_eq!(ErrorCode::ArgumentError.category(), ErrorCategory::Argument);
        assert_eq!(ErrorCode::HttpError.category(), ErrorCategory::Transport);
        assert_eq!(ErrorCode::MissingField.category(), ErrorCategory::Application);
        assert_eq!(
            ErrorCode::UnsupportedDirection.category(),
            ErrorCategory::UnsupportedDirection
        );
    }

    #[test]
    fn test_error_code_properties() {
        assert!(ErrorCode::Timeout.is_retryable());
        assert!(!ErrorCode::HttpError.is_retryable());
        assert!(!ErrorCode::ArgumentError.is_retryable());

        assert!(ErrorCode::DuplicateType.is_fatal());
        assert!(ErrorCode::AlreadyInitialized.is_fatal());
        assert!(!ErrorCode::NetworkError.is_fatal());
        assert!(!ErrorCode::MissingField.is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = Error::argument("`review` must not be null");
        assert_eq!(err.to_string(), "[ARGUMENT_ERROR] `review` must not be null");
    }

    #[test]
    fn test_error_path() {
        let err = Error::new(ErrorCode::MissingField, "missing").with_path(vec![
            PathSegment::Field("hero".into()),
            PathSegment::Index(2),
            PathSegment::Field("name".into()),
        ]);
        assert_eq!(err.path_string(), "hero.2.name");
    }

    #[test]
    fn test_error_serialization() {
        let err = Error::network("Connection failed").with_extension("attempt", 2);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "NETWORK_ERROR");
        assert_eq!(json["message"], "Connection failed");
        assert_eq!(json["extensions"]["attempt"], 2);
        assert!(json.get("path").is_none());
    }

    #[test]
    fn test_result_ext() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        ));

        let err = result.map_tgql_err(ErrorCode::NetworkError).unwrap_err();
        assert_eq!(err.code, ErrorCode::NetworkError);
        assert!(err.is_retryable());
    }
}
