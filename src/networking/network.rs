/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use std::{
    collections::{HashMap, HashSet},
    error::Error,
};

use crate::types::{block::Block, data_types::{Address, EnodeUrl}};

use super::messages::MessageCode;

/// Error returned by a transport when a send fails. Send errors are logged and otherwise ignored.
pub type SendError = Box<dyn Error + Send + Sync>;

/// A handle to a single connected peer.
pub trait PeerHandle: Clone + Send + 'static {
    /// Send `payload` to the peer as a message with the given `code`.
    ///
    /// This is always called from a thread dedicated to this one send, so it may block.
    fn send(&self, code: MessageCode, payload: Vec<u8>) -> Result<(), SendError>;
}

/// The peer-to-peer transport, as seen by the backend.
///
/// ## Validator peers
///
/// Besides its general peer connections, a validator keeps 'validator-class' connections to every other
/// validator in the current validator set. These are established and torn down only by the backend, by
/// calling [`add_validator_peer`](Self::add_validator_peer) and
/// [`remove_validator_peer`](Self::remove_validator_peer). Both must be idempotent.
pub trait Broadcaster: Send + Sync + 'static {
    type Peer: PeerHandle;

    /// Get the connected peers, keyed by address. If `targets` is `Some`, only peers whose address is in
    /// `targets` are returned.
    fn find_peers(&self, targets: Option<&HashSet<Address>>) -> HashMap<Address, Self::Peer>;

    /// Hand a finalized `block` over to the chain-insertion pipeline for asynchronous import. `tag`
    /// identifies the backend as the origin of the block.
    fn enqueue(&self, tag: &str, block: Block);

    /// Establish a validator-class connection to `enode_url`.
    fn add_validator_peer(&self, enode_url: &EnodeUrl);

    /// Tear down the validator-class connection to `enode_url`, if there is one.
    fn remove_validator_peer(&self, enode_url: &EnodeUrl);

    /// Get the endpoints of the currently connected validator-class peers.
    fn validator_peers(&self) -> Vec<EnodeUrl>;

    /// Get the endpoint other nodes can reach this node at, if the transport is listening.
    fn local_node(&self) -> Option<EnodeUrl>;
}
