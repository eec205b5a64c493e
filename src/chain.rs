/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Traits through which the backend reads the chain and runs the state transition pipeline.
//!
//! Istanbul-rs does not store blocks or execute transactions itself. Instead, the library user provides:
//! 1. A [`ChainReader`], giving read access to stored headers and the current head.
//! 2. A [`StateProcessor`], which loads post-execution states, executes blocks against them, and
//!    validates the results against what headers declare.
//! 3. A [`ValidatorRegistry`], which reads the validator set that on-chain registration implies at a given
//!    header and state. The backend compares it against the validator-set diff embedded in the last block
//!    of every epoch.
//!
//! All three are called concurrently from whatever threads call into the backend, and so must be
//! `Send + Sync`.

use std::error::Error;

use crate::types::{
    block::{Block, Header},
    data_types::{Address, BlockNumber, CryptoHash},
};

/// Opaque error returned by the state transition pipeline and the validator registry. The backend never
/// inspects it; it is handed back to callers unchanged inside
/// [`BackendError::Execution`](crate::backend::BackendError::Execution).
pub type ExecutionError = Box<dyn Error + Send + Sync>;

/// Read access to stored headers.
pub trait ChainReader: Send + Sync + 'static {
    /// Get the header with the given hash, if it is stored.
    fn header_by_hash(&self, hash: &CryptoHash) -> Option<Header>;

    /// Get the canonical header at `number`, if it is stored.
    fn header_by_number(&self, number: BlockNumber) -> Option<Header>;

    /// Get the current head of the canonical chain.
    fn current_block(&self) -> Block;

    /// Check whether `hash` is on the local bad-block blacklist.
    fn has_bad_block(&self, hash: &CryptoHash) -> bool;

    /// Get the header with the given hash, only if it has the given `number`.
    fn header(&self, hash: &CryptoHash, number: BlockNumber) -> Option<Header> {
        self.header_by_hash(hash)
            .filter(|header| header.number == number)
    }
}

/// What executing a block produced.
pub struct ProcessOutput<R, L> {
    pub receipts: Vec<R>,
    pub logs: Vec<L>,
    pub gas_used: u64,
}

/// The state transition pipeline.
pub trait StateProcessor: Send + Sync + 'static {
    /// A post-execution state. Cloning a state must produce an independent copy: executing a block against
    /// the copy must not affect the original.
    type State: Clone + Send;
    type Receipt: Send;
    type Log: Send;

    /// Load the state after executing the block with hash `block_hash`.
    fn state_at(&self, block_hash: &CryptoHash) -> Result<Self::State, ExecutionError>;

    /// Execute the transactions of `block` against `state`, mutating it.
    fn process_block(
        &self,
        block: &Block,
        state: &mut Self::State,
    ) -> Result<ProcessOutput<Self::Receipt, Self::Log>, ExecutionError>;

    /// Check `state` and `receipts`, obtained by executing `block`, against the values its header declares.
    fn validate_state(
        &self,
        block: &Block,
        state: &Self::State,
        receipts: &[Self::Receipt],
        gas_used: u64,
    ) -> Result<(), ExecutionError>;
}

/// Source of the validator set implied by on-chain registration.
pub trait ValidatorRegistry<S>: Send + Sync + 'static {
    /// Get the addresses of the validators registered as of `header`, given the state obtained by
    /// executing the block of `header`. The addresses may be returned in any order.
    fn validators_at(&self, header: &Header, state: &S) -> Result<Vec<Address>, ExecutionError>;
}
