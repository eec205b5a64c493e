/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of Istanbul-rs events for event handling and logging.
//!
//! An event for a given action indicates that the action has been completed. Events are published by the
//! backend onto a channel drained by the event bus thread, which passes each event to
//! the handlers registered for its type on the [`BackendSpec`](crate::backend::BackendSpec), and to the
//! default [loggers](crate::logging) if logging is enabled.

use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::types::data_types::{Address, BlockNumber, CryptoHash, EnodeUrl};

pub enum Event {
    // Events that hand a committed block over to someone else.
    CommitBlock(CommitBlockEvent),
    ImportBlock(ImportBlockEvent),
    // Verification events.
    RejectProposal(RejectProposalEvent),
    // Validator mesh events.
    UpdateValidatorPeers(UpdateValidatorPeersEvent),
    Announce(AnnounceEvent),
    ReceiveAnnounce(ReceiveAnnounceEvent),
    // Identity events.
    Authorize(AuthorizeEvent),
}

impl Event {
    pub(crate) fn publish(event_publisher: &Option<Sender<Event>>, event: Event) {
        if let Some(event_publisher) = event_publisher {
            // The event bus only stops after the backend stops publishing.
            let _ = event_publisher.send(event);
        }
    }
}

/// A block this node proposed was committed, and handed to the sealing loop through the commit channel.
#[derive(Clone, Debug)]
pub struct CommitBlockEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub number: BlockNumber,
    pub committed_seals: usize,
}

/// A block some other node proposed was committed, and handed to the chain-insertion pipeline.
#[derive(Clone, Debug)]
pub struct ImportBlockEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub number: BlockNumber,
}

/// A proposal failed verification. Proposals that are only early (from the future) do not cause this event.
#[derive(Clone, Debug)]
pub struct RejectProposalEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub number: BlockNumber,
    pub proposer: Address,
    pub reason: String,
}

/// The validator-class connections were made to match a new validator set.
#[derive(Clone, Debug)]
pub struct UpdateValidatorPeersEvent {
    pub timestamp: SystemTime,
    pub is_validator: bool,
    pub added: Vec<EnodeUrl>,
    pub removed: Vec<EnodeUrl>,
}

/// This node gossiped an announce message advertising its endpoint.
#[derive(Clone, Debug)]
pub struct AnnounceEvent {
    pub timestamp: SystemTime,
    pub enode_url: EnodeUrl,
}

/// This node accepted an announce message from another validator.
#[derive(Clone, Debug)]
pub struct ReceiveAnnounceEvent {
    pub timestamp: SystemTime,
    pub origin: Address,
    pub enode_url: EnodeUrl,
    pub regossiped: bool,
}

/// The signing identity of this node was replaced.
#[derive(Clone, Debug)]
pub struct AuthorizeEvent {
    pub timestamp: SystemTime,
    pub address: Address,
}
