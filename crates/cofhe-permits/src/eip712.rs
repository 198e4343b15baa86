//! EIP-712 typed data for permit signatures.
//!
//! Issuers sign `PermissionedV2IssuerSelf` or `PermissionedV2IssuerShared`.
//! Recipients of a shared permit sign `PermissionedV2Recipient`, binding
//! their own sealing key to the issuer's signature.

use alloy::primitives::{Address, Bytes, Signature, B256, U256};
use alloy::sol;
use alloy::sol_types::{Eip712Domain, SolStruct};
use serde::{Deserialize, Serialize};

sol! {
    #![sol(all_derives)]

    struct PermissionedV2IssuerSelf {
        address issuer;
        uint64 expiration;
        address recipient;
        uint256 validatorId;
        address validatorContract;
        bytes32 sealingKey;
    }

    struct PermissionedV2IssuerShared {
        address issuer;
        uint64 expiration;
        address recipient;
        uint256 validatorId;
        address validatorContract;
    }

    struct PermissionedV2Recipient {
        bytes32 sealingKey;
        bytes issuerSignature;
    }
}

/// Domain name of the ACL contract.
pub const ACL_DOMAIN_NAME: &str = "ACL";
/// Domain version of the ACL contract.
pub const ACL_DOMAIN_VERSION: &str = "1";

/// The EIP-712 domain a signature was produced under.
///
/// Stored with the permit and never recomputed, so a permit signed against
/// one ACL deployment keeps verifying after the client is reconfigured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedDomain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl SignedDomain {
    /// The ACL domain for `chain_id`.
    pub fn acl(chain_id: u64, acl: Address) -> Self {
        Self {
            name: ACL_DOMAIN_NAME.to_string(),
            version: ACL_DOMAIN_VERSION.to_string(),
            chain_id,
            verifying_contract: acl,
        }
    }

    pub fn to_eip712(&self) -> Eip712Domain {
        Eip712Domain::new(
            Some(self.name.clone().into()),
            Some(self.version.clone().into()),
            Some(U256::from(self.chain_id)),
            Some(self.verifying_contract),
            None,
        )
    }
}

/// One of the three permit messages.
#[derive(Debug, Clone)]
pub enum PermitMessage {
    IssuerSelf(PermissionedV2IssuerSelf),
    IssuerShared(PermissionedV2IssuerShared),
    Recipient(PermissionedV2Recipient),
}

impl PermitMessage {
    /// The EIP-712 primary type name.
    pub fn primary_type(&self) -> &'static str {
        match self {
            PermitMessage::IssuerSelf(_) => "PermissionedV2IssuerSelf",
            PermitMessage::IssuerShared(_) => "PermissionedV2IssuerShared",
            PermitMessage::Recipient(_) => "PermissionedV2Recipient",
        }
    }
}

/// A message plus the domain it is signed under.
#[derive(Debug, Clone)]
pub struct PermitTypedData {
    pub domain: SignedDomain,
    pub message: PermitMessage,
}

impl PermitTypedData {
    /// The EIP-712 digest a signer signs.
    pub fn signing_hash(&self) -> B256 {
        let domain = self.domain.to_eip712();
        match &self.message {
            PermitMessage::IssuerSelf(m) => m.eip712_signing_hash(&domain),
            PermitMessage::IssuerShared(m) => m.eip712_signing_hash(&domain),
            PermitMessage::Recipient(m) => m.eip712_signing_hash(&domain),
        }
    }

    /// Recover the signer of `signature` over this typed data.
    ///
    /// Returns `None` if the signature bytes are malformed.
    pub fn recover_signer(&self, signature: &[u8]) -> Option<Address> {
        let signature = Signature::try_from(signature).ok()?;
        signature
            .recover_address_from_prehash(&self.signing_hash())
            .ok()
    }

    /// Whether `signature` was produced by `expected`.
    pub fn verify(&self, signature: &Bytes, expected: Address) -> bool {
        self.recover_signer(signature) == Some(expected)
    }
}
