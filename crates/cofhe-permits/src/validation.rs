//! Permit validation.
//!
//! Pure apart from ECDSA recovery. Checks run in a fixed order and the first
//! failing check is reported:
//!
//! 1. Structural completeness (domain, sealing key, addresses)
//! 2. Sharing permits are not usable until imported
//! 3. Signatures present
//! 4. Expiration
//! 5. Signatures recover to the issuer and recipient

use std::fmt;

use alloy::primitives::Address;
use cofhe_core::{CofheError, CofheResult, ErrorCode};

use crate::permit::{Permit, PermitType};

/// Why a permit is not usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationIssue {
    Expired,
    MissingIssuerSignature,
    MissingRecipientSignature,
    InvalidIssuerSignature,
    InvalidRecipientSignature,
    /// A sharing permit must be imported by its recipient before use.
    NotImported,
    /// A required field is missing.
    Incomplete(&'static str),
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::Expired => f.write_str("permit has expired"),
            ValidationIssue::MissingIssuerSignature => f.write_str("missing issuer signature"),
            ValidationIssue::MissingRecipientSignature => {
                f.write_str("missing recipient signature")
            }
            ValidationIssue::InvalidIssuerSignature => f.write_str("invalid issuer signature"),
            ValidationIssue::InvalidRecipientSignature => {
                f.write_str("invalid recipient signature")
            }
            ValidationIssue::NotImported => f.write_str("sharing permit has not been imported"),
            ValidationIssue::Incomplete(field) => write!(f, "permit is missing {field}"),
        }
    }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub issue: Option<ValidationIssue>,
}

impl ValidationResult {
    pub const fn ok() -> Self {
        Self {
            valid: true,
            issue: None,
        }
    }

    pub const fn failed(issue: ValidationIssue) -> Self {
        Self {
            valid: false,
            issue: Some(issue),
        }
    }

    /// `Expired` maps to `PermitExpired`, everything else to `InvalidPermitData`.
    pub fn into_result(self) -> CofheResult<()> {
        match self.issue {
            None => Ok(()),
            Some(issue) => Err(issue.into()),
        }
    }
}

impl From<ValidationIssue> for CofheError {
    fn from(issue: ValidationIssue) -> Self {
        match issue {
            ValidationIssue::Expired => {
                CofheError::new(ErrorCode::PermitExpired, "permit has expired")
                    .with_hint("create or import a new permit")
            }
            issue => CofheError::invalid_permit(issue.to_string())
                .with_context("issue", format!("{issue:?}")),
        }
    }
}

/// Validate `permit` for use at `now` (unix seconds).
pub fn validate(permit: &Permit, now: u64) -> ValidationResult {
    match check(permit, now) {
        Ok(()) => ValidationResult::ok(),
        Err(issue) => ValidationResult::failed(issue),
    }
}

fn check(permit: &Permit, now: u64) -> Result<(), ValidationIssue> {
    if permit.signed_domain.is_none() {
        return Err(ValidationIssue::Incomplete("signedDomain"));
    }
    if permit.issuer == Address::ZERO {
        return Err(ValidationIssue::Incomplete("issuer"));
    }
    if permit.permit_type == PermitType::Sharing {
        return Err(ValidationIssue::NotImported);
    }
    if permit.sealing_pair.is_none() {
        return Err(ValidationIssue::Incomplete("sealingPair"));
    }
    if permit.issuer_signature.is_none() {
        return Err(ValidationIssue::MissingIssuerSignature);
    }
    if permit.permit_type == PermitType::Import && permit.recipient_signature.is_none() {
        return Err(ValidationIssue::MissingRecipientSignature);
    }
    if permit.is_expired(now) {
        return Err(ValidationIssue::Expired);
    }

    verify_issuer_signature(permit)?;
    if permit.permit_type == PermitType::Import {
        verify_recipient_signature(permit)?;
    }
    Ok(())
}

/// Check the issuer signature against the recorded domain.
pub fn verify_issuer_signature(permit: &Permit) -> Result<(), ValidationIssue> {
    let domain = permit
        .signed_domain
        .clone()
        .ok_or(ValidationIssue::Incomplete("signedDomain"))?;
    let signature = permit
        .issuer_signature
        .as_ref()
        .ok_or(ValidationIssue::MissingIssuerSignature)?;
    let typed = permit
        .issuer_typed_data(domain)
        .map_err(|_| ValidationIssue::Incomplete("sealingPair"))?;

    if typed.verify(signature, permit.issuer) {
        Ok(())
    } else {
        Err(ValidationIssue::InvalidIssuerSignature)
    }
}

/// Check the recipient signature of an imported permit.
pub fn verify_recipient_signature(permit: &Permit) -> Result<(), ValidationIssue> {
    let domain = permit
        .signed_domain
        .clone()
        .ok_or(ValidationIssue::Incomplete("signedDomain"))?;
    let signature = permit
        .recipient_signature
        .as_ref()
        .ok_or(ValidationIssue::MissingRecipientSignature)?;
    let typed = permit
        .recipient_typed_data(domain)
        .map_err(|_| ValidationIssue::Incomplete("sealingPair"))?;

    if typed.verify(signature, permit.recipient) {
        Ok(())
    } else {
        Err(ValidationIssue::InvalidRecipientSignature)
    }
}
