//! The permit data model.
//!
//! A permit authorizes its holder to read decrypted values that an ACL
//! validator allows. Three kinds exist:
//!
//! - **self**: issued and used by the same account
//! - **sharing**: issued for another account, handed over as JSON
//! - **import**: a sharing permit accepted and countersigned by its recipient
//!
//! Lifecycle state is never stored; see [`Permit::state`].

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use alloy::primitives::{Address, Bytes, U256};
use cofhe_core::{CofheError, CofheResult, Permission};
use serde::{Deserialize, Serialize};

use crate::canonical::{permit_hash, CanonicalPermit, PermitHash};
use crate::eip712::{
    PermissionedV2IssuerSelf, PermissionedV2IssuerShared, PermissionedV2Recipient, PermitMessage,
    PermitTypedData, SignedDomain,
};
use crate::sealing::SealingKeyPair;

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Permit kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermitType {
    #[serde(rename = "self")]
    SelfIssued,
    Sharing,
    Import,
}

impl PermitType {
    pub const fn as_str(self) -> &'static str {
        match self {
            PermitType::SelfIssued => "self",
            PermitType::Sharing => "sharing",
            PermitType::Import => "import",
        }
    }
}

impl fmt::Display for PermitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermitState {
    /// No issuer signature yet.
    Draft,
    /// Signed by the issuer but not usable by the holder.
    IssuerSigned,
    /// Usable for decryption.
    Active,
    /// Expiration has passed.
    Expired,
}

/// A permit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permit {
    #[serde(rename = "type")]
    pub permit_type: PermitType,
    #[serde(default)]
    pub name: String,
    pub issuer: Address,
    pub recipient: Address,
    /// Unix seconds.
    pub expiration: u64,
    pub validator_id: U256,
    pub validator_contract: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sealing_pair: Option<SealingKeyPair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_signature: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_signature: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_domain: Option<SignedDomain>,
    pub hash: PermitHash,
}

/// Builder input shared by all permit kinds.
#[derive(Debug, Clone)]
pub struct PermitFields {
    pub name: String,
    pub issuer: Address,
    pub recipient: Address,
    pub expiration: u64,
    pub validator_id: U256,
    pub validator_contract: Address,
}

impl Permit {
    /// An unsigned permit of `permit_type`.
    pub fn new(
        permit_type: PermitType,
        fields: PermitFields,
        sealing_pair: Option<SealingKeyPair>,
    ) -> Self {
        let mut permit = Self {
            permit_type,
            name: fields.name,
            issuer: fields.issuer,
            recipient: fields.recipient,
            expiration: fields.expiration,
            validator_id: fields.validator_id,
            validator_contract: fields.validator_contract,
            sealing_pair,
            issuer_signature: None,
            recipient_signature: None,
            signed_domain: None,
            hash: PermitHash::from_bytes([0u8; 32]),
        };
        permit.rehash();
        permit
    }

    /// The fields the hash covers.
    pub fn canonical(&self) -> CanonicalPermit<'static> {
        CanonicalPermit {
            permit_type: self.permit_type.as_str(),
            issuer: self.issuer,
            expiration: self.expiration,
            recipient: self.recipient,
            validator_id: self.validator_id,
            validator_contract: self.validator_contract,
        }
    }

    pub fn compute_hash(&self) -> PermitHash {
        permit_hash(&self.canonical())
    }

    /// Recompute `hash` after changing a canonical field.
    pub fn rehash(&mut self) {
        self.hash = self.compute_hash();
    }

    /// The account this permit is stored under and used by.
    pub fn holder(&self) -> Address {
        match self.permit_type {
            PermitType::SelfIssued | PermitType::Sharing => self.issuer,
            PermitType::Import => self.recipient,
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.expiration <= now
    }

    /// Lifecycle state at `now`.
    pub fn state(&self, now: u64) -> PermitState {
        if self.is_expired(now) {
            return PermitState::Expired;
        }
        if self.issuer_signature.is_none() {
            return PermitState::Draft;
        }
        match self.permit_type {
            PermitType::SelfIssued => PermitState::Active,
            PermitType::Sharing => PermitState::IssuerSigned,
            PermitType::Import if self.recipient_signature.is_some() => PermitState::Active,
            PermitType::Import => PermitState::IssuerSigned,
        }
    }

    /// Typed data the issuer signs.
    ///
    /// Self permits bind the sealing key. Sharing and imported permits carry
    /// the issuer's signature over the shared form, which has none.
    pub fn issuer_typed_data(&self, domain: SignedDomain) -> CofheResult<PermitTypedData> {
        let message = match self.permit_type {
            PermitType::SelfIssued => {
                let sealing = self.sealing_pair.as_ref().ok_or_else(|| {
                    CofheError::invalid_permit("self permit has no sealing key")
                })?;
                PermitMessage::IssuerSelf(PermissionedV2IssuerSelf {
                    issuer: self.issuer,
                    expiration: self.expiration,
                    recipient: self.recipient,
                    validatorId: self.validator_id,
                    validatorContract: self.validator_contract,
                    sealingKey: sealing.to_bytes32(),
                })
            }
            PermitType::Sharing | PermitType::Import => {
                PermitMessage::IssuerShared(PermissionedV2IssuerShared {
                    issuer: self.issuer,
                    expiration: self.expiration,
                    recipient: self.recipient,
                    validatorId: self.validator_id,
                    validatorContract: self.validator_contract,
                })
            }
        };
        Ok(PermitTypedData { domain, message })
    }

    /// Typed data the recipient of an imported permit signs.
    pub fn recipient_typed_data(&self, domain: SignedDomain) -> CofheResult<PermitTypedData> {
        let sealing = self
            .sealing_pair
            .as_ref()
            .ok_or_else(|| CofheError::invalid_permit("imported permit has no sealing key"))?;
        let issuer_signature = self
            .issuer_signature
            .clone()
            .ok_or_else(|| CofheError::invalid_permit("permit has no issuer signature"))?;
        Ok(PermitTypedData {
            domain,
            message: PermitMessage::Recipient(PermissionedV2Recipient {
                sealingKey: sealing.to_bytes32(),
                issuerSignature: issuer_signature,
            }),
        })
    }

    /// The wire form presented to a decryption backend.
    pub fn permission(&self) -> CofheResult<Permission> {
        let sealing = self
            .sealing_pair
            .as_ref()
            .ok_or_else(|| CofheError::invalid_permit("permit has no sealing key"))?;
        let issuer_signature = self
            .issuer_signature
            .clone()
            .ok_or_else(|| CofheError::invalid_permit("permit has no issuer signature"))?;

        Ok(Permission {
            issuer: self.issuer,
            expiration: self.expiration,
            recipient: self.recipient,
            validator_id: self.validator_id,
            validator_contract: self.validator_contract,
            sealing_key: sealing.to_bytes32(),
            issuer_signature,
            recipient_signature: self.recipient_signature.clone().unwrap_or_default(),
        })
    }

    /// The form handed to a sharing permit's recipient: no sealing pair and
    /// no recipient signature.
    pub fn to_shared(&self) -> Self {
        Self {
            sealing_pair: None,
            recipient_signature: None,
            ..self.clone()
        }
    }
}
