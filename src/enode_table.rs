/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The table of validator endpoints, and the connect/disconnect logic of the validator peer mesh.
//!
//! Validators learn each other's endpoints from [announce messages](crate::announce). The
//! [`ValidatorEnodeTable`] stores the most recent endpoint announced by each validator, and turns decisions
//! about *which* validators should be connected into calls to the injected `add_peer` and `remove_peer`
//! callbacks. The callbacks are never invoked while the table's lock is held, since they call into the
//! transport, which has locks of its own.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::types::{
    data_types::{Address, EnodeUrl},
    validator_set::ValidatorSet,
};

/// Callback that establishes or tears down the validator-class connection to an endpoint.
pub type PeerCallback = Box<dyn Fn(&EnodeUrl) + Send + Sync>;

/// The endpoint a validator announced, and the timestamp of the announcement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnodeEntry {
    pub enode_url: EnodeUrl,
    pub timestamp: u64,
}

/// What a call to [`ValidatorEnodeTable::upsert`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated { previous: EnodeUrl },
    /// The table already had this endpoint. Its timestamp was refreshed.
    Unchanged,
    /// The table already had an announcement at least as recent. Nothing was recorded.
    Stale,
}

/// What a call to [`ValidatorEnodeTable::refresh_val_peers`] changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PeerChanges {
    pub added: Vec<EnodeUrl>,
    pub removed: Vec<EnodeUrl>,
}

pub struct ValidatorEnodeTable {
    entries: RwLock<HashMap<Address, EnodeEntry>>,
    add_peer: PeerCallback,
    remove_peer: PeerCallback,
}

impl ValidatorEnodeTable {
    pub fn new(add_peer: PeerCallback, remove_peer: PeerCallback) -> ValidatorEnodeTable {
        Self {
            entries: RwLock::new(HashMap::new()),
            add_peer,
            remove_peer,
        }
    }

    /// Record that `address` announced `enode_url` at `timestamp`. Announcements older than the one already
    /// stored for `address` are ignored.
    ///
    /// If `connect` is true and the stored endpoint changed, the validator-class connection follows it: the
    /// previous endpoint, if any, is disconnected, and the new one is connected.
    pub fn upsert(
        &self,
        address: Address,
        enode_url: EnodeUrl,
        timestamp: u64,
        connect: bool,
    ) -> UpsertOutcome {
        let outcome = {
            let mut entries = self.write();
            let outcome = match entries.get(&address).cloned() {
                Some(entry) if entry.timestamp >= timestamp => return UpsertOutcome::Stale,
                Some(entry) if entry.enode_url == enode_url => UpsertOutcome::Unchanged,
                Some(entry) => UpsertOutcome::Updated {
                    previous: entry.enode_url,
                },
                None => UpsertOutcome::Inserted,
            };
            entries.insert(
                address,
                EnodeEntry {
                    enode_url: enode_url.clone(),
                    timestamp,
                },
            );
            outcome
        };

        if connect {
            match &outcome {
                UpsertOutcome::Inserted => (self.add_peer)(&enode_url),
                UpsertOutcome::Updated { previous } => {
                    (self.remove_peer)(previous);
                    (self.add_peer)(&enode_url);
                }
                UpsertOutcome::Unchanged | UpsertOutcome::Stale => (),
            }
        }

        outcome
    }

    /// Get the entry stored for `address`.
    pub fn get(&self, address: &Address) -> Option<EnodeEntry> {
        self.read().get(address).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Make the validator-class connections match `val_set`, given that the connections currently open are
    /// `connected`.
    ///
    /// Every member of `val_set` other than `self_address` whose endpoint is known gets connected, and every
    /// connection in `connected` that does not lead to one of them is torn down. Calling this twice with the
    /// same arguments changes nothing the second time, apart from connecting peers that are still pending
    /// at the transport.
    pub fn refresh_val_peers(
        &self,
        val_set: &ValidatorSet,
        self_address: &Address,
        connected: &[EnodeUrl],
    ) -> PeerChanges {
        let wanted: BTreeSet<EnodeUrl> = {
            let entries = self.read();
            val_set
                .list()
                .iter()
                .filter(|validator| validator.address() != *self_address)
                .filter_map(|validator| entries.get(&validator.address()))
                .map(|entry| entry.enode_url.clone())
                .collect()
        };
        let connected: BTreeSet<EnodeUrl> = connected.iter().cloned().collect();

        let changes = PeerChanges {
            added: wanted.difference(&connected).cloned().collect(),
            removed: connected.difference(&wanted).cloned().collect(),
        };
        for enode_url in &changes.added {
            (self.add_peer)(enode_url);
        }
        for enode_url in &changes.removed {
            (self.remove_peer)(enode_url);
        }

        changes
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Address, EnodeEntry>> {
        self.entries
            .read()
            .expect("a thread panicked while holding the enode table lock")
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Address, EnodeEntry>> {
        self.entries
            .write()
            .expect("a thread panicked while holding the enode table lock")
    }
}
