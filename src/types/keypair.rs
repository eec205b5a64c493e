/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the [Keypair] type as an object used to sign digests and access the signer's address.

use std::sync::Arc;

use super::{
    crypto_primitives::{address_of, sign_digest, SignatureError, SigningKey},
    data_types::{Address, CryptoHash, SignatureBytes},
};

/// Function that produces a signature over a 32-byte digest on behalf of an account.
///
/// This is what [`authorize`](crate::backend::Istanbul::authorize) installs as the node's signing
/// identity. Implementations typically look up the account's key in a keystore; a [`Keypair`] can
/// produce one directly with [`signer_fn`](Keypair::signer_fn).
pub type SignerFn =
    Arc<dyn Fn(&Address, &CryptoHash) -> Result<SignatureBytes, SignatureError> + Send + Sync>;

/// A wrapper around [SigningKey](k256::ecdsa::SigningKey) which implements a [convenience method](Keypair::sign)
/// for creating recoverable signatures.
#[derive(Clone)]
pub struct Keypair(pub(crate) SigningKey);

impl Keypair {
    pub fn new(signing_key: SigningKey) -> Keypair {
        Keypair(signing_key)
    }

    /// Sign a 32-byte `digest`.
    pub fn sign(&self, digest: &CryptoHash) -> Result<SignatureBytes, SignatureError> {
        sign_digest(&self.0, digest)
    }

    pub fn address(&self) -> Address {
        address_of(self.0.verifying_key())
    }

    /// Get a [`SignerFn`] that signs with this keypair. The returned function refuses to sign on behalf of
    /// any address other than this keypair's.
    pub fn signer_fn(&self) -> SignerFn {
        let keypair = self.clone();
        let address = self.address();
        Arc::new(move |account: &Address, digest: &CryptoHash| {
            if *account != address {
                return Err(SignatureError::SigningFailed);
            }
            keypair.sign(digest)
        })
    }
}
