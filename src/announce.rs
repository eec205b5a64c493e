/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types of the announce protocol, through which validators learn each other's endpoints.
//!
//! ## Protocol
//!
//! Every [`announce_interval`](crate::config::Configuration::announce_interval), a validator signs an
//! [`AnnounceMessage`] carrying its address and endpoint, and gossips it to all of its peers. A node that
//! receives an announce message:
//! 1. Checks that it was signed by the address it names, and that the address is a member of the current
//!    validator set.
//! 2. Records the endpoint in its [`ValidatorEnodeTable`](crate::enode_table::ValidatorEnodeTable),
//!    connecting to it if the node is itself a validator.
//! 3. Regossips the message, unless it already regossiped the same endpoint for the same validator within
//!    the [`announce_regossip_cooldown`](crate::config::Configuration::announce_regossip_cooldown). The
//!    [`AnnounceGossipTimestamps`] table tracks this.

use std::{
    collections::HashMap,
    sync::{mpsc::Sender, Mutex},
    thread::JoinHandle,
    time::{Duration, Instant},
};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{
    crypto_primitives::{get_signature_address, SignatureError},
    data_types::{Address, EnodeUrl, SignatureBytes},
};

/// A validator's signed advertisement of its endpoint.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AnnounceMessage {
    pub address: Address,
    pub enode_url: EnodeUrl,
    /// Seconds since the Unix Epoch at which the message was created.
    pub timestamp: u64,
    pub signature: Vec<u8>,
}

impl AnnounceMessage {
    /// Create an unsigned announce message.
    pub fn new(address: Address, enode_url: EnodeUrl, timestamp: u64) -> AnnounceMessage {
        Self {
            address,
            enode_url,
            timestamp,
            signature: Vec::new(),
        }
    }

    /// Get the bytes that the announcing validator signs: everything except the signature.
    pub fn signing_payload(&self) -> Vec<u8> {
        (self.address, self.enode_url.clone(), self.timestamp)
            .try_to_vec()
            .expect("serializing into a Vec cannot fail")
    }

    pub fn with_signature(mut self, signature: SignatureBytes) -> AnnounceMessage {
        self.signature = signature.to_vec();
        self
    }

    /// Get the address that signed this message.
    pub fn signer(&self) -> Result<Address, SignatureError> {
        get_signature_address(&self.signing_payload(), &self.signature)
    }

    pub fn encode(&self) -> Vec<u8> {
        self.try_to_vec()
            .expect("serializing into a Vec cannot fail")
    }

    pub fn decode(payload: &[u8]) -> Result<AnnounceMessage, std::io::Error> {
        AnnounceMessage::try_from_slice(payload)
    }
}

/// The endpoint last gossiped about a validator, and when.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnounceGossipTimestamp {
    pub enode_url: EnodeUrl,
    pub timestamp: Instant,
}

/// Per-validator record of the last announce message gossiped, used to throttle regossiping.
#[derive(Default)]
pub struct AnnounceGossipTimestamps {
    last_gossiped: Mutex<HashMap<Address, AnnounceGossipTimestamp>>,
}

impl AnnounceGossipTimestamps {
    pub fn new() -> AnnounceGossipTimestamps {
        Self::default()
    }

    /// Decide whether an announce message carrying `enode_url` for `address` should be gossiped now, and if
    /// so, record that it was.
    ///
    /// It should not if the same endpoint was gossiped for `address` less than `cooldown` ago.
    pub fn should_gossip(&self, address: Address, enode_url: &EnodeUrl, cooldown: Duration) -> bool {
        let mut last_gossiped = self.lock();
        if let Some(last) = last_gossiped.get(&address) {
            if last.enode_url == *enode_url && last.timestamp.elapsed() < cooldown {
                return false;
            }
        }

        last_gossiped.insert(
            address,
            AnnounceGossipTimestamp {
                enode_url: enode_url.clone(),
                timestamp: Instant::now(),
            },
        );
        true
    }

    /// Record that an announce message carrying `enode_url` for `address` was gossiped just now.
    pub fn record(&self, address: Address, enode_url: EnodeUrl) {
        self.lock().insert(
            address,
            AnnounceGossipTimestamp {
                enode_url,
                timestamp: Instant::now(),
            },
        );
    }

    pub fn get(&self, address: &Address) -> Option<AnnounceGossipTimestamp> {
        self.lock().get(address).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Address, AnnounceGossipTimestamp>> {
        self.last_gossiped
            .lock()
            .expect("a thread panicked while holding the announce table lock")
    }
}

/// Handle to a running announce thread.
pub(crate) struct Announcer {
    pub(crate) handle: JoinHandle<()>,
    pub(crate) shutdown: Sender<()>,
}
