/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Verification of proposals and headers.
//!
//! ## Proposals
//!
//! [`Istanbul::verify`] decides whether the core engine should accept a proposal. It checks, in order:
//! 1. That the proposal is a block that is not blacklisted.
//! 2. That the body matches the header: the transaction root is recomputed, and the block has no uncles.
//! 3. That the coinbase is the address that signed the proposal message.
//! 4. The header rules of [`Istanbul::verify_header`], except that committed seals may be missing (they are
//!    only attached after agreement).
//! 5. That executing the block against its parent's state yields what the header declares.
//! 6. At the last block of an epoch, that the embedded validator-set diff matches the registered validators.
//!
//! A proposal whose timestamp is in the future fails with [`BackendError::FutureBlock`], which carries how
//! long to wait before verifying it again.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::{
    chain::{ChainReader, StateProcessor, ValidatorRegistry},
    events::{Event, RejectProposalEvent},
    networking::network::Broadcaster,
    types::{
        block::{calc_uncle_hash, derive_tx_root, nil_uncle_hash, Block, Header, Proposal},
        crypto_primitives::get_signature_address,
        data_types::{Address, CryptoHash},
        extra::{extract_istanbul_extra, IstanbulExtra},
        validator_set::{compare_validator_slices, validator_set_diff, ValidatorSet},
    },
};

use super::{BackendError, Istanbul};

/// Code of the commit message of the consensus core engine. Committed seals sign the block hash followed by
/// this code.
pub const COMMIT_MSG_CODE: u8 = 2;

/// Get the bytes a validator signs to produce its committed seal over the block with `hash`.
pub fn prepare_committed_seal(hash: &CryptoHash) -> Vec<u8> {
    let mut data = hash.bytes().to_vec();
    data.push(COMMIT_MSG_CODE);
    data
}

impl<C, P, R, B> Istanbul<C, P, R, B>
where
    C: ChainReader,
    P: StateProcessor,
    R: ValidatorRegistry<P::State>,
    B: Broadcaster,
{
    /// Verify `proposal`, claimed to be proposed by `src`.
    ///
    /// `Ok(())` means the proposal is valid and there is no need to retry. A
    /// [`FutureBlock`](BackendError::FutureBlock) error means it should be verified again after its
    /// [`retry_delay`](BackendError::retry_delay). Any other error means it is invalid.
    pub fn verify(&self, proposal: &dyn Proposal, src: &Address) -> Result<(), BackendError> {
        let result = self.verify_proposal(proposal, src);

        if let Err(err) = &result {
            if !err.is_future_block() {
                log::debug!(
                    "Rejected proposal, number: {}, hash: {}, proposer: {}, err: {}",
                    proposal.number(),
                    proposal.hash(),
                    src,
                    err
                );
                Event::publish(
                    &self.event_publisher,
                    Event::RejectProposal(RejectProposalEvent {
                        timestamp: SystemTime::now(),
                        block: proposal.hash(),
                        number: proposal.number(),
                        proposer: *src,
                        reason: err.to_string(),
                    }),
                );
            }
        }

        result
    }

    fn verify_proposal(&self, proposal: &dyn Proposal, src: &Address) -> Result<(), BackendError> {
        let block = proposal.as_block().ok_or_else(|| {
            log::error!("Invalid proposal, {}", proposal.hash());
            BackendError::InvalidProposal
        })?;

        if self.has_bad_proposal(&block.hash()) {
            return Err(BackendError::BlacklistedHash);
        }

        if derive_tx_root(&block.transactions) != block.header.tx_hash {
            return Err(BackendError::MismatchTxHashes);
        }

        if calc_uncle_hash(&block.uncles) != nil_uncle_hash() {
            return Err(BackendError::InvalidUncleHash);
        }

        if block.header.coinbase != *src {
            return Err(BackendError::InvalidCoinbase);
        }

        match self.verify_header(&block.header) {
            Ok(()) | Err(BackendError::EmptyCommittedSeals) => (),
            Err(err) => return Err(err),
        }

        let parent_state = self
            .processor
            .state_at(&block.parent_hash())
            .map_err(|err| {
                log::error!("Failed to load the state of the parent block: {}", err);
                BackendError::Execution(err)
            })?;
        let mut state = parent_state.clone();

        let output = self
            .processor
            .process_block(block, &mut state)
            .map_err(|err| {
                log::error!("Failed to process the proposed block: {}", err);
                BackendError::Execution(err)
            })?;
        self.processor
            .validate_state(block, &state, &output.receipts, output.gas_used)
            .map_err(|err| {
                log::error!("Failed to validate the state of the proposed block: {}", err);
                BackendError::Execution(err)
            })?;

        if self.config.epoch.is_last_block_of_epoch(block.number()) {
            self.verify_val_set_diff(block, &state)?;
        }

        Ok(())
    }

    // Check that the validator-set diff in the extra-data of `block`, the last block of an epoch, is the diff
    // between the validator set of its parent and the validators registered in `state`.
    fn verify_val_set_diff(&self, block: &Block, state: &P::State) -> Result<(), BackendError> {
        let extra = extract_istanbul_extra(&block.header)?;
        if !extra.has_well_formed_diff() {
            log::warn!("Validator set diff is not sorted, or adds and removes the same validator");
            return Err(BackendError::InvalidValidatorSetDiff);
        }

        match self.registry.validators_at(&block.header, state) {
            Err(err) => {
                log::error!("Failed to read the registered validators: {}", err);
                if !extra.added_validators.is_empty() || !extra.removed_validators.is_empty() {
                    log::warn!("Validator set diff is not empty, but the registered validators are unknown");
                    return Err(BackendError::InvalidValidatorSetDiff);
                }
            }
            Ok(registered) => {
                let parent_validators = self.parent_validators(block).addresses();
                let (added, removed) = validator_set_diff(&parent_validators, &registered);
                if !diff_matches(&extra, &added, &removed) {
                    log::warn!(
                        "Validator set diff does not match, expected added: {:?}, removed: {:?}",
                        added,
                        removed
                    );
                    return Err(BackendError::InvalidValidatorSetDiff);
                }
            }
        }

        Ok(())
    }

    /// Check `header` against the header rules, including the committed seals.
    ///
    /// The Genesis Block always passes.
    pub fn verify_header(&self, header: &Header) -> Result<(), BackendError> {
        if header.number.is_genesis() {
            return Ok(());
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        if let Some(delay) = Duration::from_secs(header.time).checked_sub(now) {
            if !delay.is_zero() {
                return Err(BackendError::FutureBlock { delay });
            }
        }

        let extra = extract_istanbul_extra(header)?;

        if header.uncle_hash != nil_uncle_hash() {
            return Err(BackendError::InvalidUncleHash);
        }

        let parent = self
            .chain
            .header(&header.parent_hash, header.number.parent())
            .ok_or(BackendError::UnknownAncestor {
                number: header.number,
            })?;
        if parent.time.saturating_add(self.config.block_period.as_secs()) > header.time {
            return Err(BackendError::InvalidTimestamp);
        }

        let validators = self
            .snapshots
            .snapshot(&self.chain, parent.number, header.parent_hash)?
            .val_set
            .clone();

        let signer = self.author(header)?;
        if !validators.contains(&signer) {
            return Err(BackendError::UnauthorizedSigner { signer });
        }

        verify_committed_seals(header, &extra, &validators)
    }

    /// Get the address of the proposer of `header`, recovered from its proposer seal.
    pub fn author(&self, header: &Header) -> Result<Address, BackendError> {
        let extra = extract_istanbul_extra(header)?;
        Ok(get_signature_address(
            &header.sig_hash().bytes(),
            &extra.seal,
        )?)
    }
}

fn diff_matches(extra: &IstanbulExtra, added: &[Address], removed: &[Address]) -> bool {
    compare_validator_slices(&extra.added_validators, added)
        && compare_validator_slices(&extra.removed_validators, removed)
}

// Check that the committed seals of `header` were produced by distinct members of `validators`, and that
// there are at least a quorum of them.
fn verify_committed_seals(
    header: &Header,
    extra: &IstanbulExtra,
    validators: &ValidatorSet,
) -> Result<(), BackendError> {
    if extra.committed_seals.is_empty() {
        return Err(BackendError::EmptyCommittedSeals);
    }

    let committed_data = prepare_committed_seal(&header.hash());
    let mut signers: Vec<Address> = Vec::with_capacity(extra.committed_seals.len());
    for seal in &extra.committed_seals {
        let signer = get_signature_address(&committed_data, seal)
            .map_err(|_| BackendError::InvalidCommittedSeals)?;
        if !validators.contains(&signer) || signers.contains(&signer) {
            return Err(BackendError::InvalidCommittedSeals);
        }
        signers.push(signer);
    }

    if signers.len() < validators.min_quorum_size() {
        return Err(BackendError::InvalidCommittedSeals);
    }

    Ok(())
}
