/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Sending messages to peers, and handling messages received from them.

use std::collections::HashSet;

use crate::{
    chain::{ChainReader, StateProcessor, ValidatorRegistry},
    engine::{CoreEvent, MessageEvent},
    gossip::GossipCaches,
    networking::{messages::MessageCode, network::Broadcaster, sending::send_detached},
    types::{
        block::Block,
        data_types::Address,
        validator_set::ValidatorSet,
    },
};

use super::{BackendError, Istanbul};

impl<C, P, R, B> Istanbul<C, P, R, B>
where
    C: ChainReader,
    P: StateProcessor,
    R: ValidatorRegistry<P::State>,
    B: Broadcaster,
{
    /// Send `payload` to the members of `val_set` other than this node, or to every connected peer if
    /// `val_set` is `None`.
    ///
    /// Unless `ignore_cache`, the message is recorded as seen by this node, and peers already known to have
    /// it are skipped. Sends happen on background threads; this never blocks on a peer.
    pub fn gossip(
        &self,
        val_set: Option<&ValidatorSet>,
        payload: &[u8],
        code: MessageCode,
        ignore_cache: bool,
    ) {
        let hash = if ignore_cache {
            None
        } else {
            let hash = GossipCaches::message_hash(payload);
            self.gossip_caches.mark_known(hash);
            Some(hash)
        };

        let targets: Option<HashSet<Address>> = val_set.map(|val_set| {
            let me = self.address();
            val_set
                .list()
                .iter()
                .map(|validator| validator.address())
                .filter(|address| *address != me)
                .collect()
        });
        if targets.as_ref().is_some_and(HashSet::is_empty) {
            return;
        }

        for (address, peer) in self.broadcaster.find_peers(targets.as_ref()) {
            if targets
                .as_ref()
                .is_some_and(|targets| !targets.contains(&address))
            {
                continue;
            }
            if let Some(hash) = hash {
                if !self.gossip_caches.mark_peer(address, hash) {
                    continue;
                }
            }
            send_detached(address, peer, code, payload.to_vec());
        }
    }

    /// Send a consensus message to the members of `val_set`, and deliver it to this node's own core engine.
    pub fn broadcast(&self, val_set: &ValidatorSet, payload: &[u8]) {
        self.gossip(Some(val_set), payload, MessageCode::Consensus, false);
        self.event_mux.post(CoreEvent::Message(MessageEvent {
            payload: payload.to_vec(),
        }));
    }

    /// Handle a message with `code` and `payload` received from the peer with address `peer`.
    ///
    /// Returns whether the message was for the backend. Messages with unknown codes are not, and are left
    /// for the caller to handle.
    pub fn handle_msg(&self, peer: Address, code: u64, payload: &[u8]) -> Result<bool, BackendError> {
        let Some(code) = MessageCode::from_code(code) else {
            return Ok(false);
        };

        let hash = GossipCaches::message_hash(payload);
        self.gossip_caches.mark_peer(peer, hash);

        match code {
            MessageCode::Consensus => {
                if !self.is_core_started() {
                    return Err(BackendError::EngineStopped);
                }
                if self.gossip_caches.is_known(&hash) {
                    return Ok(true);
                }
                self.gossip_caches.mark_known(hash);
                self.event_mux.post(CoreEvent::Message(MessageEvent {
                    payload: payload.to_vec(),
                }));
                Ok(true)
            }
            MessageCode::Announce => {
                self.handle_announce(payload)?;
                Ok(true)
            }
        }
    }

    /// React to `block` becoming the head of the chain: tell the core engine, and at the last block of an
    /// epoch, update the validator peer mesh to the new validator set.
    pub fn new_chain_head(&self, block: &Block) -> Result<(), BackendError> {
        if !self.is_core_started() {
            return Err(BackendError::EngineStopped);
        }

        self.event_mux.post(CoreEvent::FinalCommitted);

        if self.config.epoch.is_last_block_of_epoch(block.number()) {
            let val_set = self.validator_set_at(block.number(), block.hash());
            self.refresh_val_peers(&val_set);
        }

        Ok(())
    }
}
