//! Error types for the snap wallet plugin.

use serde::Serialize;

/// Top-level error type for the plugin.
///
/// Nothing here is retried internally. Every variant surfaces to the session
/// framework as a failed `login`/`sign`, and [`Error::code`] gives callers a
/// stable identifier to branch on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Metamask not found")]
    ProviderNotFound,

    #[error("UI not found: {operation} requires user interaction")]
    UiUnavailable { operation: String },

    #[error("Snap invocation failed for {method}: {reason}")]
    SnapInvocationFailed { method: String, reason: String },

    #[error("Snap {snap_id} is not installed, complete setup at {setup_url}")]
    SnapNotInstalled { snap_id: String, setup_url: String },

    #[error("{0}")]
    AccountCreationFailed(String),

    #[error("No result returned")]
    NoSignatureReturned,

    #[error("No permission level supplied and account lookup is disabled")]
    PermissionRequired,

    #[error("Login context carries no chain")]
    NoChainAvailable,

    #[error("Prompt returned an unknown option: {0}")]
    InvalidSelection(String),

    #[error("Operation canceled")]
    Canceled,

    #[error("Invalid public key: {0}")]
    InvalidKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Account lookup error: {0}")]
    AccountLookup(#[from] LookupError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failures talking to the account index service.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Request to {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },

    #[error("Lookup service returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Invalid response from lookup service: {0}")]
    InvalidResponse(String),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Environment variable {key} is not valid unicode")]
    NotUnicode { key: String },
}

/// Serializable view of an error for CLI and log output.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String,
}

impl Error {
    pub(crate) fn snap_failed(method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SnapInvocationFailed {
            method: method.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn ui_unavailable(operation: impl Into<String>) -> Self {
        Self::UiUnavailable {
            operation: operation.into(),
        }
    }

    /// Stable identifier for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProviderNotFound => "provider.not_found",
            Self::UiUnavailable { .. } => "ui.unavailable",
            Self::SnapInvocationFailed { .. } => "snap.invocation_failed",
            Self::SnapNotInstalled { .. } => "snap.not_installed",
            Self::AccountCreationFailed(_) => "account.creation_failed",
            Self::NoSignatureReturned => "sign.no_signature",
            Self::PermissionRequired => "login.permission_required",
            Self::NoChainAvailable => "login.no_chain",
            Self::InvalidSelection(_) => "ui.invalid_selection",
            Self::Canceled => "operation.canceled",
            Self::InvalidKey(_) => "key.invalid",
            Self::InvalidSignature(_) => "signature.invalid",
            Self::AccountLookup(_) => "account.lookup_failed",
            Self::Config(_) => "config.invalid",
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    pub fn to_payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Result type alias for the plugin.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_not_found_keeps_host_facing_message() {
        let err = Error::ProviderNotFound;
        assert_eq!(err.to_string(), "Metamask not found");
        assert_eq!(err.code(), "provider.not_found");
    }

    #[test]
    fn lookup_errors_convert_into_top_level() {
        let err = Error::from(LookupError::HttpStatus {
            status: 502,
            body: "bad gateway".to_string(),
        });
        assert_eq!(err.code(), "account.lookup_failed");
        assert!(err.to_string().contains("HTTP 502"));
    }

    #[test]
    fn serializes_error_payload() {
        let payload = Error::NoSignatureReturned.to_payload();
        let value = serde_json::to_value(&payload).expect("valid json");
        assert_eq!(value["code"], "sign.no_signature");
        assert_eq!(value["message"], "No result returned");
    }

    #[test]
    fn only_cancel_reports_canceled() {
        assert!(Error::Canceled.is_canceled());
        assert!(!Error::PermissionRequired.is_canceled());
    }
}
