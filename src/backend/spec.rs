/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build and start a backend.
//!
//! ## Starting a backend
//!
//! Here is an example that demonstrates how to build and start a backend using the builder pattern:
//!
//! ```ignore
//! let (backend, commits) =
//!     BackendSpec::builder()
//!     .chain(chain)
//!     .processor(processor)
//!     .registry(registry)
//!     .broadcaster(broadcaster)
//!     .core(core)
//!     .configuration(configuration)
//!     .on_commit_block(commit_handler)
//!     .build()
//!     .start();
//! ```
//!
//! ### Required setters
//!
//! The required setters are for providing the collaborators the backend needs:
//! - `.chain(...)`
//! - `.processor(...)`
//! - `.registry(...)`
//! - `.broadcaster(...)`
//! - `.core(...)`
//! - `.configuration(...)`
//!
//! ### Optional setters
//!
//! The optional setters are for registering user-defined event handlers for events from
//! [crate::events]:
//! - `.on_commit_block(...)`
//! - `.on_import_block(...)`
//! - `.on_reject_proposal(...)`
//! - `.on_update_validator_peers(...)`
//! - `.on_announce(...)`
//! - `.on_receive_announce(...)`
//! - `.on_authorize(...)`
//!
//! The handlers are run on the event bus thread, in the order the events were published.

use std::sync::{
    mpsc::{self, Receiver},
    Arc, Mutex, RwLock,
};

use typed_builder::TypedBuilder;

use crate::{
    announce::AnnounceGossipTimestamps,
    chain::{ChainReader, StateProcessor, ValidatorRegistry},
    config::Configuration,
    engine::{CoreEngine, EventMux},
    enode_table::ValidatorEnodeTable,
    event_bus::{start_event_bus, EventHandlers, HandlerPtr},
    events::*,
    gossip::GossipCaches,
    networking::network::Broadcaster,
    snapshot::SnapshotStore,
    types::{block::Block, data_types::Address},
};

use super::{Istanbul, Signer};

/// The receiving half of the commit channel. The sealing loop receives from it the blocks it proposed, once
/// they are committed.
pub type CommitReceiver = Receiver<Block>;

/// Stores all necessary parameters and trait implementations required to run an [`Istanbul`] backend.
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [BackendSpec]. On the builder call the following methods to construct a valid [BackendSpec].

    Required:
    - `.chain(...)`
    - `.processor(...)`
    - `.registry(...)`
    - `.broadcaster(...)`
    - `.core(...)`
    - `.configuration(...)`

    Optional:
    - `.on_commit_block(...)`
    - `.on_import_block(...)`
    - `.on_reject_proposal(...)`
    - `.on_update_validator_peers(...)`
    - `.on_announce(...)`
    - `.on_receive_announce(...)`
    - `.on_authorize(...)`
"))]
pub struct BackendSpec<C, P, R, B>
where
    C: ChainReader,
    P: StateProcessor,
    R: ValidatorRegistry<P::State>,
    B: Broadcaster,
{
    #[builder(setter(doc = "Set the reader of stored headers. Required."))]
    chain: C,
    #[builder(setter(doc = "Set the state transition pipeline. Required."))]
    processor: P,
    #[builder(setter(doc = "Set the source of registered validators. Required."))]
    registry: R,
    #[builder(setter(transform = |broadcaster: B| Arc::new(broadcaster),
    doc = "Set the peer-to-peer transport. Required."))]
    broadcaster: Arc<B>,
    #[builder(setter(transform = |core: impl CoreEngine| Box::new(core) as Box<dyn CoreEngine>,
    doc = "Set the consensus core engine. Required."))]
    core: Box<dyn CoreEngine>,
    #[builder(setter(doc = "Set the [configuration](Configuration). Required."))]
    configuration: Configuration,

    #[builder(default, setter(transform = |handler: impl Fn(&CommitBlockEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<CommitBlockEvent>),
    doc = "Register a handler closure to be invoked after a block this node proposed is committed. Optional."))]
    on_commit_block: Option<HandlerPtr<CommitBlockEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ImportBlockEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ImportBlockEvent>),
    doc = "Register a handler closure to be invoked after a block another node proposed is committed. Optional."))]
    on_import_block: Option<HandlerPtr<ImportBlockEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RejectProposalEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<RejectProposalEvent>),
    doc = "Register a handler closure to be invoked after a proposal fails verification. Optional."))]
    on_reject_proposal: Option<HandlerPtr<RejectProposalEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&UpdateValidatorPeersEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<UpdateValidatorPeersEvent>),
    doc = "Register a handler closure to be invoked after the validator peer mesh is refreshed. Optional."))]
    on_update_validator_peers: Option<HandlerPtr<UpdateValidatorPeersEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&AnnounceEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<AnnounceEvent>),
    doc = "Register a handler closure to be invoked after this node announces its endpoint. Optional."))]
    on_announce: Option<HandlerPtr<AnnounceEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveAnnounceEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveAnnounceEvent>),
    doc = "Register a handler closure to be invoked after this node accepts another validator's announcement. Optional."))]
    on_receive_announce: Option<HandlerPtr<ReceiveAnnounceEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&AuthorizeEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<AuthorizeEvent>),
    doc = "Register a handler closure to be invoked after the signing identity is replaced. Optional."))]
    on_authorize: Option<HandlerPtr<AuthorizeEvent>>,
}

impl<C, P, R, B> BackendSpec<C, P, R, B>
where
    C: ChainReader,
    P: StateProcessor,
    R: ValidatorRegistry<P::State>,
    B: Broadcaster,
{
    /// Create the backend, start its event bus thread if any event handler is registered, and return it
    /// together with the receiving half of its commit channel.
    ///
    /// The backend starts without a signing identity; call [`Istanbul::authorize`] before signing.
    pub fn start(self) -> (Arc<Istanbul<C, P, R, B>>, CommitReceiver) {
        let config = self.configuration;

        let event_handlers = EventHandlers::new(
            config.log_events,
            self.on_commit_block,
            self.on_import_block,
            self.on_reject_proposal,
            self.on_update_validator_peers,
            self.on_announce,
            self.on_receive_announce,
            self.on_authorize,
        );

        let (event_publisher, event_subscriber) = if !event_handlers.is_empty() {
            Some(mpsc::channel()).unzip()
        } else {
            (None, None)
        };
        let (event_bus_shutdown, event_bus_shutdown_receiver) = if !event_handlers.is_empty() {
            Some(mpsc::channel()).unzip()
        } else {
            (None, None)
        };
        let event_bus = match (event_subscriber, event_bus_shutdown_receiver) {
            (Some(event_subscriber), Some(shutdown_receiver)) => Some(start_event_bus(
                event_handlers,
                event_subscriber,
                shutdown_receiver,
            )),
            _ => None,
        };

        let (add_peer_broadcaster, remove_peer_broadcaster) =
            (self.broadcaster.clone(), self.broadcaster.clone());
        let val_enode_table = ValidatorEnodeTable::new(
            Box::new(move |enode_url| add_peer_broadcaster.add_validator_peer(enode_url)),
            Box::new(move |enode_url| remove_peer_broadcaster.remove_validator_peer(enode_url)),
        );

        let (commit_sender, commit_receiver) = mpsc::sync_channel(1);

        let backend = Istanbul {
            snapshots: SnapshotStore::new(
                config.epoch,
                config.proposer_policy,
                config.snapshot_cache_capacity,
            ),
            gossip_caches: GossipCaches::new(
                config.peer_cache_capacity,
                config.message_cache_capacity,
            ),
            val_enode_table,
            announce_gossiped: AnnounceGossipTimestamps::new(),
            announcer: Mutex::new(None),
            config,
            chain: self.chain,
            processor: self.processor,
            registry: self.registry,
            broadcaster: self.broadcaster,
            core: self.core,
            signer: RwLock::new(Signer {
                address: Address::zero(),
                sign_fn: None,
            }),
            core_started: RwLock::new(false),
            proposed_block_hash: Mutex::new(None),
            commit_sender,
            event_mux: EventMux::new(),
            event_publisher,
            event_bus,
            event_bus_shutdown,
        };

        (Arc::new(backend), commit_receiver)
    }
}
