/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Cryptographic primitives.
//!
//! The definitions and re-exports in this module provide three categories of cryptographic primitives:
//! 1. **Cryptographic Hashes**: provided by the [`sha2`] crate. Every [`CryptoHash`] in Istanbul-rs is a
//!    SHA256 hash.
//! 2. **Digital Signatures**: recoverable ECDSA over secp256k1, provided by the [`k256`] crate.
//! 3. **Address derivation**: the last 20 bytes of the Keccak256 hash of an uncompressed public key,
//!    provided by the [`sha3`] crate.

use k256::elliptic_curve::sec1::ToEncodedPoint;
use thiserror::Error;

use super::data_types::{Address, CryptoHash, SignatureBytes};

// re-exports below.
pub use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
pub use sha2::Digest;
pub use sha2::Sha256 as CryptoHasher;

use sha3::Keccak256;

/// Hash arbitrary `bytes` with the [`CryptoHasher`].
pub fn hash_bytes(bytes: &[u8]) -> CryptoHash {
    let mut hasher = CryptoHasher::new();
    hasher.update(bytes);
    CryptoHash::new(hasher.finalize().into())
}

/// Derive the [`Address`] that corresponds to `verifying_key`.
pub fn address_of(verifying_key: &VerifyingKey) -> Address {
    let encoded = verifying_key.to_encoded_point(false);
    // Skip the 0x04 SEC1 tag.
    let digest = Keccak256::digest(&encoded.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[12..]);
    Address::new(bytes)
}

/// Sign a 32-byte `digest` with `signing_key`, producing a recoverable signature.
pub fn sign_digest(
    signing_key: &SigningKey,
    digest: &CryptoHash,
) -> Result<SignatureBytes, SignatureError> {
    let (signature, recovery_id) = signing_key
        .sign_prehash_recoverable(&digest.bytes())
        .map_err(|_| SignatureError::SigningFailed)?;

    let mut bytes = [0u8; 65];
    bytes[..64].copy_from_slice(&signature.to_bytes());
    bytes[64] = recovery_id.to_byte();
    Ok(SignatureBytes::new(bytes))
}

/// Recover the address that produced `signature` over `digest`.
pub fn recover_digest(digest: &CryptoHash, signature: &[u8]) -> Result<Address, SignatureError> {
    if signature.len() != SignatureBytes::LENGTH {
        return Err(SignatureError::InvalidLength {
            len: signature.len(),
        });
    }

    let recovery_id =
        RecoveryId::from_byte(signature[64]).ok_or(SignatureError::InvalidRecoveryId)?;
    let signature =
        Signature::from_slice(&signature[..64]).map_err(|_| SignatureError::Malformed)?;
    let verifying_key =
        VerifyingKey::recover_from_prehash(&digest.bytes(), &signature, recovery_id)
            .map_err(|_| SignatureError::RecoveryFailed)?;

    Ok(address_of(&verifying_key))
}

/// Recover the address that signed `data`. `data` is hashed with the [`CryptoHasher`] first, mirroring
/// how [`Sign`](crate::backend::Istanbul::sign) produces signatures.
pub fn get_signature_address(data: &[u8], signature: &[u8]) -> Result<Address, SignatureError> {
    recover_digest(&hash_bytes(data), signature)
}

/// The ways signing or recovering an address from a signature can fail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature must be 65 bytes long, got {len}")]
    InvalidLength { len: usize },

    #[error("signature recovery id is out of range")]
    InvalidRecoveryId,

    #[error("signature is not a valid secp256k1 signature")]
    Malformed,

    #[error("failed to recover a public key from the signature")]
    RecoveryFailed,

    #[error("failed to produce a signature")]
    SigningFailed,
}
