/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The Istanbul section of a header's extra-data.
//!
//! ## Layout
//!
//! ```text
//! | vanity (32 bytes) | borsh(IstanbulExtra) |
//! ```
//!
//! The vanity is free-form and ignored by consensus. The [`IstanbulExtra`] that follows it carries:
//! 1. The validator-set diff that takes effect at this block (only non-empty at the last block of an
//!    epoch), as two strictly ascending address lists.
//! 2. The proposer seal, a signature by the block's proposer over the header's
//!    [`sig_hash`](super::block::Header::sig_hash).
//! 3. The committed seals, signatures by the validators that committed the block, attached after
//!    agreement is reached.

use borsh::{BorshDeserialize, BorshSerialize};
use thiserror::Error;

use super::{
    block::Header,
    data_types::{Address, SignatureBytes},
};

/// Number of leading bytes of extra-data reserved for vanity.
pub const ISTANBUL_EXTRA_VANITY: usize = 32;

#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct IstanbulExtra {
    pub added_validators: Vec<Address>,
    pub removed_validators: Vec<Address>,
    pub seal: Vec<u8>,
    pub committed_seals: Vec<Vec<u8>>,
}

impl IstanbulExtra {
    /// Create an `IstanbulExtra` carrying a validator-set diff and no seals.
    pub fn new(added_validators: Vec<Address>, removed_validators: Vec<Address>) -> Self {
        Self {
            added_validators,
            removed_validators,
            seal: Vec::new(),
            committed_seals: Vec::new(),
        }
    }

    /// Encode into extra-data bytes, prefixed by `vanity` (zero-padded or truncated to
    /// [`ISTANBUL_EXTRA_VANITY`] bytes).
    pub fn encode(&self, vanity: &[u8]) -> Vec<u8> {
        let mut extra = vec![0u8; ISTANBUL_EXTRA_VANITY];
        let len = vanity.len().min(ISTANBUL_EXTRA_VANITY);
        extra[..len].copy_from_slice(&vanity[..len]);
        extra.extend(
            self.try_to_vec()
                .expect("serializing IstanbulExtra into a Vec cannot fail"),
        );
        extra
    }

    /// Check that the validator-set diff is well formed: both lists strictly ascending, and no address both
    /// added and removed.
    pub fn has_well_formed_diff(&self) -> bool {
        let strictly_ascending = |list: &[Address]| list.windows(2).all(|w| w[0] < w[1]);
        strictly_ascending(&self.added_validators)
            && strictly_ascending(&self.removed_validators)
            && !self
                .added_validators
                .iter()
                .any(|added| self.removed_validators.binary_search(added).is_ok())
    }
}

/// Decode the [`IstanbulExtra`] from `header`'s extra-data.
pub fn extract_istanbul_extra(header: &Header) -> Result<IstanbulExtra, ExtraDataError> {
    if header.extra.len() < ISTANBUL_EXTRA_VANITY {
        return Err(ExtraDataError::TooShort {
            len: header.extra.len(),
        });
    }

    IstanbulExtra::try_from_slice(&header.extra[ISTANBUL_EXTRA_VANITY..])
        .map_err(|err| ExtraDataError::Malformed { source: err })
}

/// Replace the extra-data of `header` with `extra`, keeping its vanity.
pub(crate) fn replace_istanbul_extra(header: &mut Header, extra: &IstanbulExtra) {
    let vanity_len = header.extra.len().min(ISTANBUL_EXTRA_VANITY);
    let vanity = header.extra[..vanity_len].to_vec();
    header.extra = extra.encode(&vanity);
}

/// Write the proposer `seal` into `header`'s extra-data.
pub fn write_seal(header: &mut Header, seal: &SignatureBytes) -> Result<(), ExtraDataError> {
    let mut extra = extract_istanbul_extra(header)?;
    extra.seal = seal.to_vec();
    replace_istanbul_extra(header, &extra);
    Ok(())
}

/// Append `committed_seals` to the committed seals in `header`'s extra-data.
///
/// Fails if `committed_seals` is empty or if any seal is not [`SignatureBytes::LENGTH`] long.
pub fn write_committed_seals(
    header: &mut Header,
    committed_seals: &[Vec<u8>],
) -> Result<(), ExtraDataError> {
    if committed_seals.is_empty() {
        return Err(ExtraDataError::InvalidCommittedSeals);
    }
    if committed_seals
        .iter()
        .any(|seal| seal.len() != SignatureBytes::LENGTH)
    {
        return Err(ExtraDataError::InvalidCommittedSeals);
    }

    let mut extra = extract_istanbul_extra(header)?;
    extra.committed_seals.extend(committed_seals.iter().cloned());
    replace_istanbul_extra(header, &extra);
    Ok(())
}

/// The ways reading or writing Istanbul extra-data can fail.
#[derive(Debug, Error)]
pub enum ExtraDataError {
    #[error("extra-data is {len} bytes long, shorter than the vanity")]
    TooShort { len: usize },

    #[error("extra-data cannot be decoded")]
    Malformed {
        #[source]
        source: std::io::Error,
    },

    #[error("committed seals are empty or have the wrong length")]
    InvalidCommittedSeals,
}
