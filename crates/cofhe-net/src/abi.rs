//! Solidity bindings for the contracts the client reads.

use alloy::primitives::{Bytes, U256};
use alloy::sol;
use alloy::sol_types::{SolCall, SolValue};

use crate::error::{NetError, Result};

sol! {
    /// ABI form of a permit presented to the query decrypter.
    struct Permission {
        address issuer;
        uint64 expiration;
        address recipient;
        uint256 validatorId;
        address validatorContract;
        bytes32 sealingKey;
        bytes issuerSignature;
        bytes recipientSignature;
    }

    /// Read-only decryption entry point of the mock query decrypter.
    interface IMockQueryDecrypter {
        function querySealOutput(uint256 ctHash, uint256 utype, Permission memory permission)
            external
            view
            returns (bool allowed, string memory error, uint256 result);
    }
}

impl From<&cofhe_core::Permission> for Permission {
    fn from(p: &cofhe_core::Permission) -> Self {
        Self {
            issuer: p.issuer,
            expiration: p.expiration,
            recipient: p.recipient,
            validatorId: p.validator_id,
            validatorContract: p.validator_contract,
            sealingKey: p.sealing_key,
            issuerSignature: p.issuer_signature.clone(),
            recipientSignature: p.recipient_signature.clone(),
        }
    }
}

impl From<Permission> for cofhe_core::Permission {
    fn from(p: Permission) -> Self {
        Self {
            issuer: p.issuer,
            expiration: p.expiration,
            recipient: p.recipient,
            validator_id: p.validatorId,
            validator_contract: p.validatorContract,
            sealing_key: p.sealingKey,
            issuer_signature: p.issuerSignature,
            recipient_signature: p.recipientSignature,
        }
    }
}

/// Decoded answer of `querySealOutput`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealOutputQuery {
    /// Whether the ACL allowed the permit to read the handle.
    pub allowed: bool,
    /// Non-empty when the contract itself failed.
    pub error: String,
    /// The sealed plaintext.
    pub result: U256,
}

/// Calldata for `querySealOutput`.
pub fn encode_query_seal_output(
    ct_hash: U256,
    utype: u8,
    permission: &cofhe_core::Permission,
) -> Bytes {
    IMockQueryDecrypter::querySealOutputCall {
        ctHash: ct_hash,
        utype: U256::from(utype),
        permission: permission.into(),
    }
    .abi_encode()
    .into()
}

/// Decode calldata produced by [`encode_query_seal_output`].
pub fn decode_query_seal_output(
    calldata: &[u8],
) -> Result<(U256, U256, cofhe_core::Permission)> {
    let call = IMockQueryDecrypter::querySealOutputCall::abi_decode(calldata)
        .map_err(|e| NetError::Decode(format!("querySealOutput calldata: {e}")))?;
    Ok((call.ctHash, call.utype, call.permission.into()))
}

/// ABI-encode the return tuple of `querySealOutput`.
pub fn encode_seal_output_returns(query: &SealOutputQuery) -> Bytes {
    (query.allowed, query.error.clone(), query.result)
        .abi_encode_params()
        .into()
}

/// Decode the return data of `querySealOutput`.
pub fn decode_seal_output_returns(data: &[u8]) -> Result<SealOutputQuery> {
    let (allowed, error, result) = <(bool, String, U256)>::abi_decode_params(data)
        .map_err(|e| NetError::Decode(format!("querySealOutput returns: {e}")))?;
    Ok(SealOutputQuery {
        allowed,
        error,
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, Address, B256};

    fn permission() -> cofhe_core::Permission {
        cofhe_core::Permission {
            issuer: address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266"),
            expiration: 1_900_000_000,
            recipient: Address::ZERO,
            validator_id: U256::ZERO,
            validator_contract: Address::ZERO,
            sealing_key: B256::repeat_byte(0x11),
            issuer_signature: Bytes::from(vec![0xaa; 65]),
            recipient_signature: Bytes::new(),
        }
    }

    #[test]
    fn test_query_calldata_decodes() {
        let calldata = encode_query_seal_output(U256::from(42), 4, &permission());
        assert_eq!(
            &calldata[..4],
            IMockQueryDecrypter::querySealOutputCall::SELECTOR.as_slice()
        );

        let (ct_hash, utype, decoded) = decode_query_seal_output(&calldata).unwrap();
        assert_eq!(ct_hash, U256::from(42));
        assert_eq!(utype, U256::from(4));
        assert_eq!(decoded, permission());
    }

    #[test]
    fn test_returns_decode() {
        let query = SealOutputQuery {
            allowed: false,
            error: String::new(),
            result: U256::from(7),
        };
        let data = encode_seal_output_returns(&query);
        assert_eq!(decode_seal_output_returns(&data).unwrap(), query);
    }

    #[test]
    fn test_garbage_returns_rejected() {
        assert!(matches!(
            decode_seal_output_returns(&[0x01, 0x02]),
            Err(NetError::Decode(_))
        ));
    }
}
