//! Runtime error codes and JSON error bodies

use serde::Serialize;
use thiserror::Error;

/// Failure classes reported by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Handler resolution (Init)
    MalformedReference,
    ImportFailure,
    AttributeMissing,
    NotCallable,

    // Invocation
    ResolutionFailed,
    HandlerFailure,
    InvalidResultShape,

    // Transport
    MalformedRequestBody,
    PayloadTooLarge,
    UnsupportedPath,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedReference => "MalformedReference",
            Self::ImportFailure => "ImportFailure",
            Self::AttributeMissing => "AttributeMissing",
            Self::NotCallable => "NotCallable",
            Self::ResolutionFailed => "ResolutionFailed",
            Self::HandlerFailure => "HandlerFailure",
            Self::InvalidResultShape => "InvalidResultShape",
            Self::MalformedRequestBody => "MalformedRequestBody",
            Self::PayloadTooLarge => "PayloadTooLarge",
            Self::UnsupportedPath => "UnsupportedPath",
            Self::InternalError => "InternalError",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::MalformedReference
            | Self::ImportFailure
            | Self::AttributeMissing
            | Self::NotCallable
            | Self::MalformedRequestBody => 400,
            Self::UnsupportedPath => 404,
            Self::PayloadTooLarge => 413,
            Self::ResolutionFailed
            | Self::HandlerFailure
            | Self::InvalidResultShape
            | Self::InternalError => 500,
        }
    }

    /// Message placed in the `message` field of the error body
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::MalformedReference => "Handler must be in 'module.function' format",
            Self::ImportFailure | Self::AttributeMissing => "Unable to import handler",
            Self::NotCallable => "Handler attribute is not callable",
            Self::ResolutionFailed => "Handler resolution failed",
            Self::HandlerFailure => "Handler raised an exception",
            Self::InvalidResultShape => "Handler returned a non-dict response",
            Self::MalformedRequestBody => "Invalid JSON payload",
            Self::PayloadTooLarge => "Request body too large",
            Self::UnsupportedPath => "Unsupported path",
            Self::InternalError => "Internal error",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error translated into an HTTP response at the transport boundary
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct RuntimeError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
    pub request_id: String,
}

impl RuntimeError {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// Format as the JSON error body: `{"message": ..., "details": ...}`
    pub fn to_json(&self) -> String {
        #[derive(Serialize)]
        struct JsonError<'a> {
            message: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<&'a str>,
        }

        let error = JsonError {
            message: &self.message,
            details: self.details.as_deref(),
        };

        serde_json::to_string(&error).unwrap_or_else(|_| {
            serde_json::json!({ "message": self.code.default_message() }).to_string()
        })
    }
}
