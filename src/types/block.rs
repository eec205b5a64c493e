/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the 'block' and 'header' types and their associated methods.
//!
//! ## Hashes
//!
//! A header has two hashes:
//! 1. [`Header::hash`]: the identity of the block. It covers every header field, but leaves the committed
//!    seals out of the extra-data, so attaching committed seals after agreement does not change which block
//!    it is.
//! 2. [`Header::sig_hash`]: the digest the proposer signs. It additionally leaves the proposer seal out.

use borsh::{BorshDeserialize, BorshSerialize};

use super::{
    crypto_primitives::hash_bytes,
    data_types::{Address, BlockNumber, CryptoHash},
    extra::{extract_istanbul_extra, replace_istanbul_extra},
};

/// A candidate for agreement. The backend only knows how to work with proposals that are [`Block`]s; any
/// other implementor is rejected with [`InvalidProposal`](crate::backend::BackendError::InvalidProposal).
pub trait Proposal: Send + Sync {
    fn number(&self) -> BlockNumber;

    fn hash(&self) -> CryptoHash;

    /// Get this proposal as a [`Block`], if it is one.
    fn as_block(&self) -> Option<&Block> {
        None
    }
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Header {
    pub parent_hash: CryptoHash,
    pub coinbase: Address,
    pub root: CryptoHash,
    pub tx_hash: CryptoHash,
    pub receipt_hash: CryptoHash,
    pub uncle_hash: CryptoHash,
    pub number: BlockNumber,
    pub gas_used: u64,
    /// Seconds since the Unix Epoch.
    pub time: u64,
    pub extra: Vec<u8>,
}

impl Header {
    /// Get the hash that identifies the block this header belongs to.
    pub fn hash(&self) -> CryptoHash {
        hash_borsh(&self.istanbul_filtered(true))
    }

    /// Get the digest that the proposer of this header signs to produce the proposer seal.
    pub fn sig_hash(&self) -> CryptoHash {
        hash_borsh(&self.istanbul_filtered(false))
    }

    // A copy of this header with the committed seals, and optionally the proposer seal, cleared. Headers
    // whose extra-data does not decode are returned unchanged.
    fn istanbul_filtered(&self, keep_seal: bool) -> Header {
        let mut header = self.clone();
        if let Ok(mut extra) = extract_istanbul_extra(self) {
            if !keep_seal {
                extra.seal = Vec::new();
            }
            extra.committed_seals = Vec::new();
            replace_istanbul_extra(&mut header, &extra);
        }
        header
    }
}

/// An opaque, already-encoded transaction.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Transaction(Vec<u8>);

impl Transaction {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn hash(&self) -> CryptoHash {
        hash_bytes(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
    pub uncles: Vec<Header>,
}

impl Block {
    pub fn new(header: Header, transactions: Vec<Transaction>, uncles: Vec<Header>) -> Block {
        Block {
            header,
            transactions,
            uncles,
        }
    }

    pub fn hash(&self) -> CryptoHash {
        self.header.hash()
    }

    pub fn number(&self) -> BlockNumber {
        self.header.number
    }

    pub fn parent_hash(&self) -> CryptoHash {
        self.header.parent_hash
    }

    /// Create a copy of this block with its header replaced by `header`, keeping the body.
    pub fn with_seal(&self, header: Header) -> Block {
        Block {
            header,
            transactions: self.transactions.clone(),
            uncles: self.uncles.clone(),
        }
    }
}

impl Proposal for Block {
    fn number(&self) -> BlockNumber {
        self.header.number
    }

    fn hash(&self) -> CryptoHash {
        self.header.hash()
    }

    fn as_block(&self) -> Option<&Block> {
        Some(self)
    }
}

/// Compute the transaction root of a block body: the hash of the ordered list of transaction hashes.
pub fn derive_tx_root(transactions: &[Transaction]) -> CryptoHash {
    let tx_hashes: Vec<CryptoHash> = transactions.iter().map(Transaction::hash).collect();
    hash_borsh(&tx_hashes)
}

/// Compute the uncle hash of a block body.
pub fn calc_uncle_hash(uncles: &[Header]) -> CryptoHash {
    hash_borsh(&uncles.to_vec())
}

/// The uncle hash of a block without uncles, which every Istanbul block must carry.
pub fn nil_uncle_hash() -> CryptoHash {
    calc_uncle_hash(&[])
}

fn hash_borsh<T: BorshSerialize>(value: &T) -> CryptoHash {
    hash_bytes(
        &value
            .try_to_vec()
            .expect("serializing into a Vec cannot fail"),
    )
}
