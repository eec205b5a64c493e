/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Errors returned by the backend.

use std::time::Duration;

use thiserror::Error;

use crate::{
    chain::ExecutionError,
    snapshot::SnapshotError,
    types::{
        crypto_primitives::SignatureError,
        data_types::{Address, BlockNumber},
        extra::ExtraDataError,
    },
};

/// The ways a call into the backend can fail.
///
/// Every variant except [`FutureBlock`](Self::FutureBlock) means "reject this proposal (or message)". A
/// `FutureBlock` proposal is not rejected: it should be verified again after
/// [`retry_delay`](Self::retry_delay).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("proposal is not a block")]
    InvalidProposal,

    #[error("proposal is on the bad block blacklist")]
    BlacklistedHash,

    #[error("transaction root does not match the transactions")]
    MismatchTxHashes,

    #[error("uncle hash is not the hash of an empty uncle list")]
    InvalidUncleHash,

    #[error("coinbase is not the address of the proposer")]
    InvalidCoinbase,

    #[error("signature was not produced by the expected address")]
    InvalidSignature,

    #[error("no signing function is set")]
    InvalidSigningFn,

    #[error("validator set diff does not match the registered validators")]
    InvalidValidatorSetDiff,

    #[error("block is {delay:?} in the future")]
    FutureBlock { delay: Duration },

    #[error("parent of block {number} is not in the chain")]
    UnknownAncestor { number: BlockNumber },

    #[error("block is less than a block period after its parent")]
    InvalidTimestamp,

    #[error("invalid extra-data format")]
    InvalidExtraDataFormat {
        #[source]
        source: ExtraDataError,
    },

    #[error("proposer {signer} is not in the validator set of the parent block")]
    UnauthorizedSigner { signer: Address },

    #[error("committed seals are missing")]
    EmptyCommittedSeals,

    #[error("committed seals are invalid or too few")]
    InvalidCommittedSeals,

    #[error("announce message cannot be decoded")]
    InvalidAnnounce,

    #[error("announcer {address} is not in the current validator set")]
    UnauthorizedAnnounce { address: Address },

    #[error("engine is stopped")]
    EngineStopped,

    #[error("commit channel receiver was dropped")]
    CommitReceiverDropped,

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// An error returned by the state transition pipeline or the validator registry, unchanged.
    #[error(transparent)]
    Execution(ExecutionError),
}

impl BackendError {
    /// Get how long to wait before verifying a [`FutureBlock`](Self::FutureBlock) proposal again. `None` for
    /// every other error.
    pub fn retry_delay(&self) -> Option<Duration> {
        match self {
            BackendError::FutureBlock { delay } => Some(*delay),
            _ => None,
        }
    }

    pub fn is_future_block(&self) -> bool {
        matches!(self, BackendError::FutureBlock { .. })
    }
}

impl From<ExtraDataError> for BackendError {
    fn from(err: ExtraDataError) -> Self {
        match err {
            ExtraDataError::InvalidCommittedSeals => BackendError::InvalidCommittedSeals,
            source => BackendError::InvalidExtraDataFormat { source },
        }
    }
}

/// The ways starting or stopping the consensus core engine can fail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine is already started")]
    AlreadyStarted,

    #[error("engine is not started")]
    NotStarted,

    #[error("announce thread is already running")]
    AlreadyAnnouncing,

    #[error("announce thread is not running")]
    NotAnnouncing,
}
