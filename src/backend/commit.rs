/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The propose/commit synchronization between the backend and the sealing loop.
//!
//! ## Protocol
//!
//! 1. The sealing loop builds a block, has it signed with [`Istanbul::sign_proposal`], and records it with
//!    [`Istanbul::set_proposed_block_hash`] before handing it to the core engine.
//! 2. When the core engine reaches agreement on a block, it calls [`Istanbul::commit`] with the committed
//!    seals it collected.
//! 3. If the committed block is the one this node proposed, it is delivered to the sealing loop through the
//!    [commit channel](super::CommitReceiver). Otherwise it is handed to the chain-insertion pipeline, whose
//!    eventual chain-head notification aborts whatever the sealing loop was doing.
//!
//! Since the hash of a block does not cover its committed seals, the block delivered in step 3 has the same
//! hash as the block recorded in step 1.

use std::time::SystemTime;

use crate::{
    chain::{ChainReader, StateProcessor, ValidatorRegistry},
    events::{CommitBlockEvent, Event, ImportBlockEvent},
    networking::network::Broadcaster,
    types::{
        block::{Block, Proposal},
        data_types::{Address, BlockNumber, CryptoHash},
        extra::{write_committed_seals, write_seal},
    },
};

use super::{BackendError, Istanbul};

/// Tag under which committed blocks are handed to the chain-insertion pipeline.
pub const FETCHER_ID: &str = "istanbul";

impl<C, P, R, B> Istanbul<C, P, R, B>
where
    C: ChainReader,
    P: StateProcessor,
    R: ValidatorRegistry<P::State>,
    B: Broadcaster,
{
    /// Attach `committed_seals` to `proposal`, and deliver the resulting block to the sealing loop if this
    /// node proposed it, or to the chain-insertion pipeline otherwise.
    ///
    /// Delivering to the sealing loop blocks until the commit channel has room.
    pub fn commit(
        &self,
        proposal: &dyn Proposal,
        committed_seals: &[Vec<u8>],
    ) -> Result<(), BackendError> {
        let block = proposal.as_block().ok_or_else(|| {
            log::error!("Invalid proposal, {}", proposal.hash());
            BackendError::InvalidProposal
        })?;

        let mut header = block.header.clone();
        write_committed_seals(&mut header, committed_seals)?;
        let block = block.with_seal(header);
        let hash = block.hash();

        log::info!(
            "Committed, address: {}, hash: {}, number: {}",
            self.address(),
            hash,
            block.number()
        );

        let proposed_block_hash = *self.lock_proposed_block_hash();
        if proposed_block_hash == Some(hash) {
            Event::publish(
                &self.event_publisher,
                Event::CommitBlock(CommitBlockEvent {
                    timestamp: SystemTime::now(),
                    block: hash,
                    number: block.number(),
                    committed_seals: committed_seals.len(),
                }),
            );
            self.commit_sender
                .send(block)
                .map_err(|_| BackendError::CommitReceiverDropped)?;
            return Ok(());
        }

        Event::publish(
            &self.event_publisher,
            Event::ImportBlock(ImportBlockEvent {
                timestamp: SystemTime::now(),
                block: hash,
                number: block.number(),
            }),
        );
        self.broadcaster.enqueue(FETCHER_ID, block);
        Ok(())
    }

    /// Record `hash` as the block this node most recently proposed.
    pub fn set_proposed_block_hash(&self, hash: CryptoHash) {
        *self.lock_proposed_block_hash() = Some(hash);
    }

    pub fn proposed_block_hash(&self) -> Option<CryptoHash> {
        *self.lock_proposed_block_hash()
    }

    /// Get a copy of `block` with this node as its coinbase and with this node's proposer seal.
    pub fn sign_proposal(&self, block: &Block) -> Result<Block, BackendError> {
        let mut header = block.header.clone();
        header.coinbase = self.address();
        let seal = self.sign(&header.sig_hash().bytes())?;
        write_seal(&mut header, &seal)?;
        Ok(block.with_seal(header))
    }

    /// Check whether the chain has the block `(hash, number)`.
    pub fn has_proposal(&self, hash: &CryptoHash, number: BlockNumber) -> bool {
        self.chain.header(hash, number).is_some()
    }

    /// Get the current head of the chain, and the address of its proposer (the zero address for the Genesis
    /// Block). `None` if the proposer cannot be recovered.
    pub fn last_proposal(&self) -> Option<(Block, Address)> {
        let block = self.chain.current_block();
        if block.number().is_genesis() {
            return Some((block, Address::zero()));
        }

        match self.author(&block.header) {
            Ok(proposer) => Some((block, proposer)),
            Err(err) => {
                log::error!("Failed to get the proposer of the last block: {}", err);
                None
            }
        }
    }

    /// Get the proposer of the block at `number`, or the zero address if there is no such block or its
    /// proposer cannot be recovered.
    pub fn get_proposer(&self, number: BlockNumber) -> Address {
        self.chain
            .header_by_number(number)
            .and_then(|header| self.author(&header).ok())
            .unwrap_or_default()
    }
}
