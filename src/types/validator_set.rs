/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that store information about validator sets or changes to validator sets.

use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};

use super::data_types::{Address, Round};

/// How the proposer of a round is picked from a [`ValidatorSet`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum ProposerPolicy {
    /// Rotate to the next validator every round, starting after the last block's proposer.
    #[default]
    RoundRobin,

    /// Keep the last block's proposer until a round change happens.
    Sticky,
}

/// A member of a [`ValidatorSet`], identified by its address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize)]
pub struct Validator {
    address: Address,
}

impl Validator {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

impl Display for Validator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.address, f)
    }
}

/// Stores the identities of validators.
///
/// ## Ordering of validators
///
/// `ValidatorSet` internally maintains the list of validators in ascending order of their `Address`es,
/// without duplicates. Two sets built from the same addresses, in whatever order and with whatever
/// repetitions, are therefore equal, which is what makes validator set derivation deterministic across
/// nodes.
///
/// ## Proposer selection
///
/// The set also remembers the proposer it last selected with [`calc_proposer`](Self::calc_proposer),
/// following its [`ProposerPolicy`].
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ValidatorSet {
    // Validators are included here in ascending order of address.
    validators: Vec<Validator>,
    policy: ProposerPolicy,
    proposer: Option<Validator>,
}

impl ValidatorSet {
    /// Create a validator set containing `addresses`.
    pub fn new(addresses: &[Address], policy: ProposerPolicy) -> ValidatorSet {
        let mut validators: Vec<Validator> = addresses.iter().copied().map(Validator::new).collect();
        validators.sort();
        validators.dedup();
        Self {
            validators,
            policy,
            proposer: None,
        }
    }

    /// Create an empty validator set.
    pub fn empty(policy: ProposerPolicy) -> ValidatorSet {
        Self::new(&[], policy)
    }

    /// Put `address` into the validator set, placing it in a position that preserves the
    /// [ordering of validators](Self#ordering-of-validators). Returns whether it was newly added.
    pub fn put(&mut self, address: Address) -> bool {
        match self.position(&address) {
            Ok(_) => false,
            Err(insert_pos) => {
                self.validators.insert(insert_pos, Validator::new(address));
                true
            }
        }
    }

    /// Remove `address` from the validator set, if it actually is in the validator set. Returns whether it was
    /// removed.
    pub fn remove(&mut self, address: &Address) -> bool {
        match self.position(address) {
            Ok(pos) => {
                self.validators.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Apply a validator-set diff: remove every address in `removed`, then put every address in `added`.
    pub fn apply_diff(&mut self, added: &[Address], removed: &[Address]) {
        for address in removed {
            self.remove(address);
        }
        for address in added {
            self.put(*address);
        }
    }

    /// Get a validator and its index in the [sorted order](Self#ordering-of-validators), if `address` is in
    /// the validator set.
    pub fn get_by_address(&self, address: &Address) -> Option<(usize, &Validator)> {
        self.position(address)
            .ok()
            .map(|pos| (pos, &self.validators[pos]))
    }

    /// Get the validator at `index` in the [sorted order](Self#ordering-of-validators).
    pub fn get_by_index(&self, index: usize) -> Option<&Validator> {
        self.validators.get(index)
    }

    /// Check whether the validator set contains `address`.
    pub fn contains(&self, address: &Address) -> bool {
        self.position(address).is_ok()
    }

    /// Get the validators in ascending order of address.
    pub fn list(&self) -> &[Validator] {
        &self.validators
    }

    /// Get the addresses of the validators in ascending order.
    pub fn addresses(&self) -> Vec<Address> {
        self.validators.iter().map(Validator::address).collect()
    }

    /// Get the number of validators currently in the validator set.
    pub fn size(&self) -> usize {
        self.validators.len()
    }

    /// Check whether the validator set is empty (i.e., `self.size() == 0`).
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Select the proposer of `round`, given the proposer of the last block, and remember it.
    ///
    /// `last_proposer` may be the zero address (e.g., when the last block is the Genesis Block), in which case
    /// selection starts from the first validator. Returns `None` only if the validator set is empty.
    pub fn calc_proposer(&mut self, last_proposer: &Address, round: Round) -> Option<Validator> {
        if self.validators.is_empty() {
            self.proposer = None;
            return None;
        }

        // Reduced modulo the set size first, so that large rounds cannot overflow.
        let size = self.validators.len() as u64;
        let round = round.int() % size;
        let seed = if last_proposer.is_zero() {
            round
        } else {
            let offset = self
                .get_by_address(last_proposer)
                .map(|(pos, _)| pos as u64)
                .unwrap_or(0);
            match self.policy {
                ProposerPolicy::RoundRobin => offset + round + 1,
                ProposerPolicy::Sticky => offset + round,
            }
        };

        let pick = (seed % size) as usize;
        self.proposer = Some(self.validators[pick]);
        self.proposer
    }

    /// Get the proposer last selected by [`calc_proposer`](Self::calc_proposer).
    pub fn get_proposer(&self) -> Option<Validator> {
        self.proposer
    }

    pub fn is_proposer(&self, address: &Address) -> bool {
        self.proposer
            .is_some_and(|proposer| proposer.address() == *address)
    }

    /// Maximum number of faulty validators tolerated: `ceil(N/3) - 1`.
    pub fn f(&self) -> usize {
        ((self.size() + 2) / 3).saturating_sub(1)
    }

    /// Minimum number of committed seals that finalizes a block: `ceil(2N/3)`.
    pub fn min_quorum_size(&self) -> usize {
        (2 * self.size() + 2) / 3
    }

    fn position(&self, address: &Address) -> Result<usize, usize> {
        self.validators
            .binary_search_by(|validator| validator.address.cmp(address))
    }
}

/// Compute the diff that turns `old` into `new`: the addresses `added` (in `new` but not in `old`) and
/// `removed` (in `old` but not in `new`). Both lists are strictly ascending.
pub fn validator_set_diff(old: &[Address], new: &[Address]) -> (Vec<Address>, Vec<Address>) {
    let mut old = old.to_vec();
    old.sort();
    old.dedup();
    let mut new = new.to_vec();
    new.sort();
    new.dedup();

    let added = new
        .iter()
        .filter(|address| old.binary_search(address).is_err())
        .copied()
        .collect();
    let removed = old
        .iter()
        .filter(|address| new.binary_search(address).is_err())
        .copied()
        .collect();

    (added, removed)
}

/// Check whether two address lists are identical, element by element.
pub fn compare_validator_slices(a: &[Address], b: &[Address]) -> bool {
    a == b
}
