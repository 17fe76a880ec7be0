//! Error taxonomy for the Google session and draft layer
//!
//! Remote failures are decoded once, at the HTTP boundary, into a
//! [`RemoteFailure`] and then mapped onto [`Error`] by [`RemoteFailure::classify`].

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// The two client libraries that must be loaded before a session can start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Library {
    /// Google API discovery directory (REST service catalogue)
    ApiClient,
    /// OpenID configuration of the identity provider
    Identity,
}

impl fmt::Display for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Library::ApiClient => f.write_str("API client"),
            Library::Identity => f.write_str("identity"),
        }
    }
}

/// Errors surfaced by the loader, title resolver and draft composer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Failed to load {library} library: {message}")]
    LibraryLoad { library: Library, message: String },

    #[error("Authorization error: {message}")]
    Auth { message: String },

    #[error("API not enabled: {message}")]
    ApiDisabled { message: String },

    #[error("Permission denied: {message}")]
    Permission { message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Unexpected response: {message}")]
    Format { message: String },
}

/// Classified failure of session initialization or sign-in
///
/// None of these are retried automatically; `detail` is meant for display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Missing configuration: {detail}")]
    MissingConfiguration { detail: String },

    #[error("Library unavailable: {detail}")]
    LibraryUnavailable { detail: String },

    #[error("Token denied: {detail}")]
    TokenDenied { detail: String },

    #[error("Sign-in failed: {detail}")]
    Unknown { detail: String },
}

impl SessionError {
    /// Human-readable detail carried by every variant
    pub fn detail(&self) -> &str {
        match self {
            SessionError::MissingConfiguration { detail }
            | SessionError::LibraryUnavailable { detail }
            | SessionError::TokenDenied { detail }
            | SessionError::Unknown { detail } => detail,
        }
    }
}

/// A failed remote call as seen at the HTTP boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFailure {
    /// HTTP status; absent when no response was received
    pub status: Option<u16>,
    /// Provider reason code (`accessNotConfigured`, `PERMISSION_DENIED`, `invalid_grant`, ...)
    pub reason: Option<String>,
    /// Provider or transport message
    pub message: String,
}

impl RemoteFailure {
    /// Reason used when a 2xx body could not be decoded
    pub const MALFORMED: &'static str = "malformedResponse";

    /// Reason used when a service was never configured on the client
    pub const NOT_CONFIGURED: &'static str = "accessNotConfigured";

    /// Failure before any response arrived
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            reason: None,
            message: message.into(),
        }
    }

    /// Successful status whose body did not have the expected shape
    pub fn malformed(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            reason: Some(Self::MALFORMED.to_string()),
            message: message.into(),
        }
    }

    /// Decode a Google error body
    ///
    /// Handles both the REST shape `{"error": {"code", "message", "status", "errors": [{"reason"}]}}`
    /// and the OAuth shape `{"error": "...", "error_description": "..."}`.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
        let (reason, message) = match parsed.get("error") {
            Some(Value::Object(error)) => {
                let reason = error
                    .get("errors")
                    .and_then(|v| v.as_array())
                    .and_then(|errors| errors.iter().find_map(|e| e.get("reason")?.as_str()))
                    .or_else(|| {
                        error
                            .get("details")
                            .and_then(|v| v.as_array())
                            .and_then(|details| details.iter().find_map(|d| d.get("reason")?.as_str()))
                    })
                    .or_else(|| error.get("status").and_then(|v| v.as_str()))
                    .map(str::to_string);
                let message = error
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                (reason, message)
            }
            Some(Value::String(code)) => {
                let message = parsed
                    .get("error_description")
                    .and_then(|v| v.as_str())
                    .map(|desc| format!("{}: {}", code, desc));
                (Some(code.clone()), message)
            }
            _ => (None, None),
        };

        Self {
            status: Some(status),
            reason,
            message: message.unwrap_or_else(|| format!("HTTP {} error", status)),
        }
    }

    /// Whether the failure means the API is not enabled for the project
    ///
    /// Message text only counts on 400 and 403 answers, where Google reports
    /// disabled services.
    pub fn indicates_api_disabled(&self) -> bool {
        let reason_disabled = self.reason.as_deref().is_some_and(|r| {
            r == Self::NOT_CONFIGURED || r == "SERVICE_DISABLED" || r == "serviceDisabled"
        });
        let message_disabled = matches!(self.status, Some(400 | 403))
            && (self.message.contains("has not been used") || self.message.contains("disabled"));
        reason_disabled || message_disabled
    }

    /// Map the failure onto the error taxonomy
    pub fn classify(&self) -> Error {
        let message = self.message.clone();
        match self.status {
            None => Error::Network { message },
            Some(_) if self.reason.as_deref() == Some(Self::MALFORMED) => Error::Format { message },
            Some(401) => Error::Auth { message },
            Some(_) if self.indicates_api_disabled() => Error::ApiDisabled { message },
            Some(403) => Error::Permission { message },
            Some(_) => Error::Network { message },
        }
    }
}

impl fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => f.write_str(&self.message),
        }
    }
}
