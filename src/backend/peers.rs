/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The validator peer mesh, and the announce protocol that feeds it endpoints.

use std::{
    sync::{
        mpsc::{self, RecvTimeoutError},
        Arc,
    },
    thread,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    announce::{AnnounceMessage, Announcer},
    chain::{ChainReader, StateProcessor, ValidatorRegistry},
    enode_table::{PeerChanges, UpsertOutcome},
    events::{AnnounceEvent, Event, ReceiveAnnounceEvent, UpdateValidatorPeersEvent},
    networking::{messages::MessageCode, network::Broadcaster},
    types::{data_types::EnodeUrl, validator_set::ValidatorSet},
};

use super::{BackendError, EngineError, Istanbul};

impl<C, P, R, B> Istanbul<C, P, R, B>
where
    C: ChainReader,
    P: StateProcessor,
    R: ValidatorRegistry<P::State>,
    B: Broadcaster,
{
    /// Make the validator-class connections match `val_set`.
    ///
    /// If this node is a member of `val_set`, it ends up connected to every other member whose endpoint is
    /// known, and to nobody else. Otherwise, every validator-class connection is torn down.
    pub fn refresh_val_peers(&self, val_set: &ValidatorSet) -> PeerChanges {
        let me = self.address();
        let connected = self.broadcaster.validator_peers();
        let is_validator = val_set.contains(&me);

        let changes = if is_validator {
            self.val_enode_table
                .refresh_val_peers(val_set, &me, &connected)
        } else {
            for enode_url in &connected {
                self.broadcaster.remove_validator_peer(enode_url);
            }
            PeerChanges {
                added: Vec::new(),
                removed: connected,
            }
        };

        log::trace!(
            "Refreshed validator peers, is validator: {}, added: {}, removed: {}",
            is_validator,
            changes.added.len(),
            changes.removed.len()
        );
        Event::publish(
            &self.event_publisher,
            Event::UpdateValidatorPeers(UpdateValidatorPeersEvent {
                timestamp: SystemTime::now(),
                is_validator,
                added: changes.added.clone(),
                removed: changes.removed.clone(),
            }),
        );

        changes
    }

    /// Get the endpoints of the currently connected validator-class peers.
    pub fn validator_peers(&self) -> Vec<EnodeUrl> {
        self.broadcaster.validator_peers()
    }

    /// Gossip a signed announce message advertising this node's endpoint to every peer.
    ///
    /// Does nothing if this node is not in the current validator set, or if the transport is not listening.
    pub fn send_announce(&self) -> Result<(), BackendError> {
        let me = self.address();
        if !self.current_validators().contains(&me) {
            log::trace!("Not announcing, {} is not a validator", me);
            return Ok(());
        }
        let Some(enode_url) = self.enode() else {
            log::trace!("Not announcing, the transport is not listening");
            return Ok(());
        };

        let message = AnnounceMessage::new(me, enode_url.clone(), unix_now_secs());
        let signature = self.sign(&message.signing_payload())?;
        let payload = message.with_signature(signature).encode();

        self.gossip(None, &payload, MessageCode::Announce, true);
        self.announce_gossiped.record(me, enode_url.clone());

        Event::publish(
            &self.event_publisher,
            Event::Announce(AnnounceEvent {
                timestamp: SystemTime::now(),
                enode_url,
            }),
        );
        Ok(())
    }

    /// Handle an announce message received from a peer: record the announced endpoint, connect to it if this
    /// node is a validator, and regossip the message unless it was regossiped recently.
    ///
    /// An announce no newer than the last one recorded for its validator is dropped without being
    /// regossiped.
    pub fn handle_announce(&self, payload: &[u8]) -> Result<(), BackendError> {
        let message = AnnounceMessage::decode(payload).map_err(|err| {
            log::debug!("Failed to decode announce message: {}", err);
            BackendError::InvalidAnnounce
        })?;
        if message.signer()? != message.address {
            return Err(BackendError::InvalidSignature);
        }

        let me = self.address();
        if message.address == me {
            return Ok(());
        }

        let val_set = self.current_validators();
        if !val_set.contains(&message.address) {
            return Err(BackendError::UnauthorizedAnnounce {
                address: message.address,
            });
        }

        let outcome = self.val_enode_table.upsert(
            message.address,
            message.enode_url.clone(),
            message.timestamp,
            val_set.contains(&me),
        );
        if outcome == UpsertOutcome::Stale {
            log::trace!(
                "Ignoring stale announce, address: {}, timestamp: {}",
                message.address,
                message.timestamp
            );
            return Ok(());
        }

        let regossiped = self.announce_gossiped.should_gossip(
            message.address,
            &message.enode_url,
            self.config.announce_regossip_cooldown,
        );
        if regossiped {
            self.gossip(None, payload, MessageCode::Announce, false);
        }

        Event::publish(
            &self.event_publisher,
            Event::ReceiveAnnounce(ReceiveAnnounceEvent {
                timestamp: SystemTime::now(),
                origin: message.address,
                enode_url: message.enode_url,
                regossiped,
            }),
        );
        Ok(())
    }

    /// Start a thread that calls [`send_announce`](Self::send_announce) right away and then every
    /// [`announce_interval`](crate::config::Configuration::announce_interval).
    ///
    /// The thread stops when [`stop_announcing`](Self::stop_announcing) is called or the backend is dropped.
    pub fn start_announcing(self: &Arc<Self>) -> Result<(), EngineError> {
        let mut announcer = self
            .announcer
            .lock()
            .expect("a thread panicked while holding the announcer lock");
        if announcer.is_some() {
            return Err(EngineError::AlreadyAnnouncing);
        }

        let (shutdown, shutdown_receiver) = mpsc::channel();
        let backend = Arc::downgrade(self);
        let interval = self.config.announce_interval;
        let handle = thread::spawn(move || loop {
            match backend.upgrade() {
                Some(backend) => {
                    if let Err(err) = backend.send_announce() {
                        log::warn!("Failed to announce: {}", err);
                    }
                }
                None => return,
            }

            match shutdown_receiver.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => (),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
            }
        });

        *announcer = Some(Announcer { handle, shutdown });
        Ok(())
    }

    /// Stop the announce thread, waiting for it to exit.
    pub fn stop_announcing(&self) -> Result<(), EngineError> {
        let announcer = self
            .announcer
            .lock()
            .expect("a thread panicked while holding the announcer lock")
            .take()
            .ok_or(EngineError::NotAnnouncing)?;

        let _ = announcer.shutdown.send(());
        if announcer.handle.thread().id() != thread::current().id() {
            let _ = announcer.handle.join();
        }
        Ok(())
    }
}

fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|since_epoch| since_epoch.as_secs())
        .unwrap_or(0)
}
