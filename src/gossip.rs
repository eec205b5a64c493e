/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Bookkeeping that keeps gossip from relaying the same message over and over.
//!
//! Messages are identified by the hash of their payload. [`GossipCaches`] remembers:
//! 1. In the *self cache*, the messages this node has originated or already processed.
//! 2. In one *per-peer cache* for every peer, the messages that peer is known to have, either because this
//!    node sent them to it or because it sent them to this node.
//!
//! Both are [`BoundedCache`]s. A message whose hash was evicted may be relayed again, which the consensus
//! protocol tolerates.

use std::sync::Arc;

use crate::{
    cache::BoundedCache,
    types::{
        crypto_primitives::hash_bytes,
        data_types::{Address, CryptoHash},
    },
};

type MessageCache = BoundedCache<CryptoHash, ()>;

pub struct GossipCaches {
    known_messages: MessageCache,
    recent_messages: BoundedCache<Address, Arc<MessageCache>>,
    message_cache_capacity: usize,
}

impl GossipCaches {
    /// Create empty caches. `peer_cache_capacity` bounds the number of peers remembered, and
    /// `message_cache_capacity` the number of messages remembered in the self cache and in each per-peer cache.
    pub fn new(peer_cache_capacity: usize, message_cache_capacity: usize) -> GossipCaches {
        Self {
            known_messages: BoundedCache::new(message_cache_capacity),
            recent_messages: BoundedCache::new(peer_cache_capacity),
            message_cache_capacity,
        }
    }

    /// Get the hash that identifies a message with `payload`.
    pub fn message_hash(payload: &[u8]) -> CryptoHash {
        hash_bytes(payload)
    }

    /// Record in the self cache that this node has seen `hash`.
    pub fn mark_known(&self, hash: CryptoHash) {
        self.known_messages.add(hash, ());
    }

    /// Check whether this node has seen `hash`.
    pub fn is_known(&self, hash: &CryptoHash) -> bool {
        self.known_messages.contains(hash)
    }

    /// Record that `peer` has `hash`. Returns `false` if this was already recorded, in which case the
    /// message should not be sent to `peer` again.
    pub fn mark_peer(&self, peer: Address, hash: CryptoHash) -> bool {
        let peer_cache = self.peer_cache(peer);
        if peer_cache.contains(&hash) {
            return false;
        }
        peer_cache.add(hash, ());
        true
    }

    /// Check whether `peer` is known to have `hash`.
    pub fn peer_has(&self, peer: &Address, hash: &CryptoHash) -> bool {
        self.recent_messages
            .get(peer)
            .is_some_and(|peer_cache| peer_cache.contains(hash))
    }

    // Get the per-peer cache of `peer`, creating it if it does not exist.
    fn peer_cache(&self, peer: Address) -> Arc<MessageCache> {
        let capacity = self.message_cache_capacity;
        self.recent_messages
            .get_or_insert_with(peer, || Arc::new(BoundedCache::new(capacity)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    #[test]
    fn peer_caches_are_independent() {
        let caches = GossipCaches::new(4, 4);
        let hash = GossipCaches::message_hash(b"prepare");

        assert!(caches.mark_peer(address(1), hash));
        assert!(!caches.mark_peer(address(1), hash));
        assert!(caches.mark_peer(address(2), hash));
        assert!(caches.peer_has(&address(1), &hash));
        assert!(!caches.peer_has(&address(3), &hash));
    }

    #[test]
    fn evicted_messages_may_be_sent_again() {
        let caches = GossipCaches::new(4, 2);
        let hashes: Vec<CryptoHash> = (0u8..3)
            .map(|i| GossipCaches::message_hash(&[i]))
            .collect();

        for hash in &hashes {
            assert!(caches.mark_peer(address(1), *hash));
        }

        assert!(!caches.peer_has(&address(1), &hashes[0]));
        assert!(caches.mark_peer(address(1), hashes[0]));
    }

    #[test]
    fn self_cache_is_independent_of_peers() {
        let caches = GossipCaches::new(4, 4);
        let hash = GossipCaches::message_hash(b"commit");

        caches.mark_peer(address(1), hash);
        assert!(!caches.is_known(&hash));

        caches.mark_known(hash);
        assert!(caches.is_known(&hash));
    }
}
