//! The uniform error envelope for every public CoFHE operation.
//!
//! Lower layers (store, network, sealing, signer) keep their own `thiserror`
//! enums. At each pipeline boundary those are wrapped into a [`CofheError`]
//! that carries a stable [`ErrorCode`], so calling code can match on the code
//! without caring which layer failed.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Boxed error used as the wrapped cause.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Stable, machine-readable failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Permit options or a serialized permit failed validation.
    InvalidPermitData,
    /// No permit stored under the requested key.
    PermitNotFound,
    /// The permit's expiration is in the past.
    PermitExpired,
    /// The external signer refused or failed to sign.
    SignatureRejected,
    /// A plaintext value does not fit its declared FHE type.
    InvalidEncryptableValue,
    /// An unknown utype id was supplied.
    InvalidUtype,
    /// Sealing key material is malformed.
    InvalidSealingKey,
    /// A sealed value could not be opened with the permit's key.
    UnsealFailed,
    /// The decryption backend failed or denied access.
    SealOutputFailed,
    /// The decryption backend answered without a sealed payload.
    SealOutputReturnedNull,
    /// The input verifier rejected the batch.
    ZkVerifyFailed,
    /// The key/value store failed.
    StorageError,
    /// Client configuration is incomplete or inconsistent.
    InvalidConfig,
    /// The caller cancelled the operation.
    Cancelled,
    /// Broken internal invariant.
    InternalError,
}

impl ErrorCode {
    /// The wire name of this code.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidPermitData => "INVALID_PERMIT_DATA",
            ErrorCode::PermitNotFound => "PERMIT_NOT_FOUND",
            ErrorCode::PermitExpired => "PERMIT_EXPIRED",
            ErrorCode::SignatureRejected => "SIGNATURE_REJECTED",
            ErrorCode::InvalidEncryptableValue => "INVALID_ENCRYPTABLE_VALUE",
            ErrorCode::InvalidUtype => "INVALID_UTYPE",
            ErrorCode::InvalidSealingKey => "INVALID_SEALING_KEY",
            ErrorCode::UnsealFailed => "UNSEAL_FAILED",
            ErrorCode::SealOutputFailed => "SEAL_OUTPUT_FAILED",
            ErrorCode::SealOutputReturnedNull => "SEAL_OUTPUT_RETURNED_NULL",
            ErrorCode::ZkVerifyFailed => "ZK_VERIFY_FAILED",
            ErrorCode::StorageError => "STORAGE_ERROR",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured failure.
///
/// Context values are diagnostic request parameters. Secret key material
/// must never be attached.
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct CofheError {
    /// Stable failure code.
    pub code: ErrorCode,
    /// Human readable description.
    pub message: String,
    /// Optional remediation hint.
    pub hint: Option<String>,
    /// The lower-level error this one wraps.
    #[source]
    pub cause: Option<BoxError>,
    /// Structured diagnostic context.
    pub context: BTreeMap<String, Value>,
}

/// Result type for every public CoFHE operation.
pub type CofheResult<T> = std::result::Result<T, CofheError>;

impl CofheError {
    /// Create an error with a code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hint: None,
            cause: None,
            context: BTreeMap::new(),
        }
    }

    /// Shorthand for [`ErrorCode::InternalError`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Shorthand for [`ErrorCode::InvalidPermitData`].
    pub fn invalid_permit(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidPermitData, message)
    }

    /// Shorthand for [`ErrorCode::Cancelled`].
    pub fn cancelled(operation: &str) -> Self {
        Self::new(ErrorCode::Cancelled, format!("{operation} was cancelled"))
            .with_context("operation", operation)
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach the underlying cause.
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: Into<BoxError>,
    {
        self.cause = Some(cause.into());
        self
    }

    /// Attach one context entry.
    ///
    /// Values that fail to serialize are recorded as their error text.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let value =
            serde_json::to_value(value).unwrap_or_else(|e| Value::String(e.to_string()));
        self.context.insert(key.into(), value);
        self
    }

    /// The failure code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Look up a context entry.
    pub fn context_value(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }

    /// A serializable snapshot of this error.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code,
            message: self.message.clone(),
            hint: self.hint.clone(),
            cause: self.cause.as_ref().map(|c| c.to_string()),
            context: self.context.clone(),
        }
    }
}

/// JSON-friendly view of a [`CofheError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub context: BTreeMap<String, Value>,
}

/// Re-wrap lower-level errors with a domain code at a step boundary.
pub trait ResultExt<T> {
    /// Map the error into a [`CofheError`] with `code`, keeping it as the cause.
    fn with_code(self, code: ErrorCode, message: impl Into<String>) -> CofheResult<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_code(self, code: ErrorCode, message: impl Into<String>) -> CofheResult<T> {
        self.map_err(|e| CofheError::new(code, message).with_cause(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_display_includes_code() {
        let err = CofheError::new(ErrorCode::PermitNotFound, "no active permit");
        assert_eq!(err.to_string(), "PERMIT_NOT_FOUND: no active permit");
    }

    #[test]
    fn test_with_code_keeps_cause() {
        let io: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));

        let err = io
            .with_code(ErrorCode::StorageError, "failed to persist permit")
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::StorageError);
        assert_eq!(err.source().unwrap().to_string(), "disk gone");
    }

    #[test]
    fn test_report_serialization() {
        let err = CofheError::new(ErrorCode::SealOutputFailed, "ACL Access Denied")
            .with_hint("check the permit's validator")
            .with_context("reason", "acl_denied")
            .with_context("utype", 4u8);

        let json = serde_json::to_value(err.report()).unwrap();
        assert_eq!(json["code"], "SEAL_OUTPUT_FAILED");
        assert_eq!(json["context"]["reason"], "acl_denied");
        assert_eq!(json["context"]["utype"], 4);
        assert!(json.get("cause").is_none());
    }

    #[test]
    fn test_cancelled_records_operation() {
        let err = CofheError::cancelled("unseal");
        assert_eq!(err.code(), ErrorCode::Cancelled);
        assert_eq!(err.context_value("operation").unwrap(), "unseal");
    }
}
