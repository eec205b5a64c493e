/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Derivation and caching of the validator set effective at any block.
//!
//! ## Snapshots
//!
//! A [`Snapshot`] records the validator set effective starting at a given block. The validator set only
//! ever changes at the last block of an epoch, whose header carries the diff that takes effect there, so the
//! snapshot of any block can be derived from the snapshot of one of its ancestors by replaying the diffs of
//! the epoch-boundary headers in between. The snapshot of the Genesis Block is built from the `added`
//! list of its extra-data.
//!
//! ## Caching
//!
//! [`SnapshotStore`] keeps recently derived snapshots in a [`BoundedCache`] keyed by block hash. Any
//! snapshot may be evicted; derivation is deterministic, so a recomputed snapshot is always equal to the one
//! that was evicted. Two threads that miss on the same block concurrently both derive it and cache equal
//! values.

use std::sync::Arc;

use thiserror::Error;

use crate::{
    cache::BoundedCache,
    chain::ChainReader,
    types::{
        block::Header,
        data_types::{BlockNumber, CryptoHash, EpochLength},
        extra::{extract_istanbul_extra, ExtraDataError},
        validator_set::{ProposerPolicy, ValidatorSet},
    },
};

/// The validator set effective starting at the block `(number, hash)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub number: BlockNumber,
    pub hash: CryptoHash,
    pub val_set: ValidatorSet,
}

impl Snapshot {
    /// Get the snapshot of the block of `header`, given that `self` is the snapshot of a block before it.
    /// The diff in `header` is only applied if it is the last block of an epoch.
    fn apply(&self, header: &Header, epoch: EpochLength) -> Result<Snapshot, SnapshotError> {
        let mut val_set = self.val_set.clone();
        if epoch.is_last_block_of_epoch(header.number) {
            let extra = extract_istanbul_extra(header).map_err(|source| {
                SnapshotError::InvalidExtraData {
                    number: header.number,
                    source,
                }
            })?;
            val_set.apply_diff(&extra.added_validators, &extra.removed_validators);
        }

        Ok(Snapshot {
            number: header.number,
            hash: header.hash(),
            val_set,
        })
    }
}

/// Derives [`Snapshot`]s and caches them.
pub struct SnapshotStore {
    epoch: EpochLength,
    policy: ProposerPolicy,
    recents: BoundedCache<CryptoHash, Arc<Snapshot>>,
}

impl SnapshotStore {
    pub fn new(epoch: EpochLength, policy: ProposerPolicy, capacity: usize) -> SnapshotStore {
        Self {
            epoch,
            policy,
            recents: BoundedCache::new(capacity),
        }
    }

    /// Get the snapshot of the block `(number, hash)`, deriving it from `chain` if it is not cached.
    ///
    /// Besides the returned snapshot, the snapshot of every epoch-boundary block visited on the way is
    /// cached too.
    pub fn snapshot<C: ChainReader + ?Sized>(
        &self,
        chain: &C,
        number: BlockNumber,
        hash: CryptoHash,
    ) -> Result<Arc<Snapshot>, SnapshotError> {
        // Walk back until a cached snapshot or the Genesis Block, remembering the epoch-boundary headers
        // whose diffs have to be replayed.
        let mut boundary_headers = Vec::new();
        let (mut cursor_number, mut cursor_hash) = (number, hash);
        let base = loop {
            if let Some(snapshot) = self.recents.get(&cursor_hash) {
                break snapshot;
            }

            if cursor_number.is_genesis() {
                let genesis = self.genesis_snapshot(chain, cursor_hash)?;
                self.recents.add(genesis.hash, genesis.clone());
                break genesis;
            }

            let header = chain
                .header(&cursor_hash, cursor_number)
                .ok_or(SnapshotError::UnknownAncestor {
                    number: cursor_number,
                    hash: cursor_hash,
                })?;
            cursor_number = cursor_number.parent();
            cursor_hash = header.parent_hash;
            if self.epoch.is_last_block_of_epoch(header.number) {
                boundary_headers.push(header);
            }
        };

        let mut snapshot = base;
        for header in boundary_headers.iter().rev() {
            snapshot = Arc::new(snapshot.apply(header, self.epoch)?);
            self.recents.add(snapshot.hash, snapshot.clone());
        }

        if snapshot.hash != hash {
            snapshot = Arc::new(Snapshot {
                number,
                hash,
                val_set: snapshot.val_set.clone(),
            });
            self.recents.add(hash, snapshot.clone());
        }

        log::trace!("Derived validator set snapshot, number: {}, hash: {}", number, hash);
        Ok(snapshot)
    }

    /// Get the validator set effective at the block `(number, hash)`, or an empty validator set if it cannot
    /// be derived.
    ///
    /// Callers that cannot tell a legitimately empty validator set from a failed derivation should use
    /// [`snapshot`](Self::snapshot) instead.
    pub fn validator_set_at<C: ChainReader + ?Sized>(
        &self,
        chain: &C,
        number: BlockNumber,
        hash: CryptoHash,
    ) -> ValidatorSet {
        match self.snapshot(chain, number, hash) {
            Ok(snapshot) => snapshot.val_set.clone(),
            Err(err) => {
                log::warn!(
                    "Failed to derive validator set, number: {}, hash: {}, err: {}",
                    number,
                    hash,
                    err
                );
                ValidatorSet::empty(self.policy)
            }
        }
    }

    /// Get the snapshot cached for `hash`, without deriving it.
    pub fn cached(&self, hash: &CryptoHash) -> Option<Arc<Snapshot>> {
        self.recents.get(hash)
    }

    pub fn cached_count(&self) -> usize {
        self.recents.len()
    }

    fn genesis_snapshot<C: ChainReader + ?Sized>(
        &self,
        chain: &C,
        hash: CryptoHash,
    ) -> Result<Arc<Snapshot>, SnapshotError> {
        let genesis = chain
            .header(&hash, BlockNumber::new(0))
            .ok_or(SnapshotError::UnknownAncestor {
                number: BlockNumber::new(0),
                hash,
            })?;
        let extra =
            extract_istanbul_extra(&genesis).map_err(|source| SnapshotError::InvalidExtraData {
                number: genesis.number,
                source,
            })?;

        Ok(Arc::new(Snapshot {
            number: genesis.number,
            hash,
            val_set: ValidatorSet::new(&extra.added_validators, self.policy),
        }))
    }
}

/// The ways deriving a [`Snapshot`] can fail.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("header {hash} at number {number} is not in the chain")]
    UnknownAncestor {
        number: BlockNumber,
        hash: CryptoHash,
    },

    #[error("extra-data of header at number {number} is invalid")]
    InvalidExtraData {
        number: BlockNumber,
        #[source]
        source: ExtraDataError,
    },
}
