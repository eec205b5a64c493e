/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The Istanbul backend: the service object the consensus core engine and the sealing loop call into.
//!
//! [`Istanbul`] binds the round-based agreement protocol run by the core engine to the chain. It is a
//! passive, thread-safe object: the core engine, the block import path, and per-peer network tasks all call
//! its methods concurrently, and it runs no loop of its own apart from the optional
//! [announce thread](Istanbul::start_announcing) and the event bus.
//!
//! Its operations are split across submodules by concern:
//! - `verify`: proposal and header verification.
//! - `commit`: the propose/commit synchronization with the sealing loop.
//! - `gossip`: sending consensus messages, and handling messages received from peers.
//! - `peers`: the validator peer mesh and the announce protocol.
//! - [`spec`]: building and starting a backend.
//!
//! ## Locks
//!
//! Only the signing identity and the core engine's started flag are guarded by read/write locks, and the
//! locally proposed block hash by a mutex. Every cache is internally synchronized, and no backend lock is
//! held while calling into the [`Broadcaster`] or the enode table.

pub mod errors;
pub use errors::{BackendError, EngineError};

pub mod spec;
pub use spec::{BackendSpec, CommitReceiver};

mod commit;
mod gossip;
mod peers;
mod verify;

pub use commit::FETCHER_ID;
pub use verify::{prepare_committed_seal, COMMIT_MSG_CODE};

use std::{
    sync::{
        mpsc::{Sender, SyncSender},
        Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard,
    },
    thread::JoinHandle,
    time::SystemTime,
};

use crate::{
    announce::{AnnounceGossipTimestamps, Announcer},
    chain::{ChainReader, StateProcessor, ValidatorRegistry},
    config::Configuration,
    engine::{CoreEngine, EventMux},
    enode_table::ValidatorEnodeTable,
    events::{AuthorizeEvent, Event},
    gossip::GossipCaches,
    networking::network::Broadcaster,
    snapshot::SnapshotStore,
    types::{
        block::{Block, Proposal},
        crypto_primitives::{get_signature_address, hash_bytes},
        data_types::{Address, BlockNumber, CryptoHash, EnodeUrl, SignatureBytes},
        keypair::SignerFn,
        validator_set::ValidatorSet,
    },
};

/// The identity this node signs with.
struct Signer {
    address: Address,
    sign_fn: Option<SignerFn>,
}

/// A running Istanbul backend. When the last handle to it is dropped, the announce thread (if any) is
/// signalled to stop, and the event bus thread is shut down.
pub struct Istanbul<C, P, R, B>
where
    C: ChainReader,
    P: StateProcessor,
    R: ValidatorRegistry<P::State>,
    B: Broadcaster,
{
    config: Configuration,
    chain: C,
    processor: P,
    registry: R,
    broadcaster: Arc<B>,
    core: Box<dyn CoreEngine>,

    signer: RwLock<Signer>,
    core_started: RwLock<bool>,
    proposed_block_hash: Mutex<Option<CryptoHash>>,
    commit_sender: SyncSender<Block>,

    snapshots: SnapshotStore,
    gossip_caches: GossipCaches,
    val_enode_table: ValidatorEnodeTable,
    announce_gossiped: AnnounceGossipTimestamps,
    announcer: Mutex<Option<Announcer>>,

    event_mux: EventMux,
    event_publisher: Option<Sender<Event>>,
    event_bus: Option<JoinHandle<()>>,
    event_bus_shutdown: Option<Sender<()>>,
}

impl<C, P, R, B> Istanbul<C, P, R, B>
where
    C: ChainReader,
    P: StateProcessor,
    R: ValidatorRegistry<P::State>,
    B: Broadcaster,
{
    /// Get the address this node signs as. The zero address until [`authorize`](Self::authorize) is
    /// called.
    pub fn address(&self) -> Address {
        self.read_signer().address
    }

    /// Get the endpoint other nodes can reach this node at.
    pub fn enode(&self) -> Option<EnodeUrl> {
        self.broadcaster.local_node()
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Get the inbound event stream the core engine subscribes to.
    pub fn event_mux(&self) -> &EventMux {
        &self.event_mux
    }

    /// Replace the signing identity of this node, and tell the core engine about the new address.
    pub fn authorize(&self, address: Address, sign_fn: SignerFn) {
        {
            let mut signer = self
                .signer
                .write()
                .expect("a thread panicked while holding the signer lock");
            signer.address = address;
            signer.sign_fn = Some(sign_fn);
        }
        self.core.set_address(address);

        Event::publish(
            &self.event_publisher,
            Event::Authorize(AuthorizeEvent {
                timestamp: SystemTime::now(),
                address,
            }),
        );
    }

    /// Sign the hash of `data` as this node.
    pub fn sign(&self, data: &[u8]) -> Result<SignatureBytes, BackendError> {
        let signer = self.read_signer();
        let sign_fn = signer
            .sign_fn
            .as_ref()
            .ok_or(BackendError::InvalidSigningFn)?;
        Ok(sign_fn(&signer.address, &hash_bytes(data))?)
    }

    /// Check that `signature` over `data` was produced by `address`.
    pub fn check_signature(
        &self,
        data: &[u8],
        address: &Address,
        signature: &[u8],
    ) -> Result<(), BackendError> {
        let signer = get_signature_address(data, signature).map_err(|err| {
            log::error!("Failed to recover the signer of a signature: {}", err);
            err
        })?;
        if signer != *address {
            return Err(BackendError::InvalidSignature);
        }
        Ok(())
    }

    /// Get the validator set effective at `proposal`, i.e., the set that validates its children.
    pub fn validators(&self, proposal: &dyn Proposal) -> ValidatorSet {
        self.validator_set_at(proposal.number(), proposal.hash())
    }

    /// Get the validator set effective at the parent of `proposal`, i.e., the set that validates
    /// `proposal` itself. Empty if `proposal` is not a block.
    pub fn parent_validators(&self, proposal: &dyn Proposal) -> ValidatorSet {
        match proposal.as_block() {
            Some(block) => self.validator_set_at(block.number().parent(), block.parent_hash()),
            None => ValidatorSet::empty(self.config.proposer_policy),
        }
    }

    /// Get the validator set effective at the block `(number, hash)`.
    ///
    /// If it cannot be derived, e.g., because a header is missing, this returns an empty validator set rather
    /// than an error.
    pub fn validator_set_at(&self, number: BlockNumber, hash: CryptoHash) -> ValidatorSet {
        self.snapshots.validator_set_at(&self.chain, number, hash)
    }

    /// Get the validator set effective at the current head of the chain.
    pub fn current_validators(&self) -> ValidatorSet {
        let head = self.chain.current_block();
        self.validator_set_at(head.number(), head.hash())
    }

    /// Check whether `hash` is on the local bad-block blacklist.
    pub fn has_bad_proposal(&self, hash: &CryptoHash) -> bool {
        self.chain.has_bad_block(hash)
    }

    /// Start the core engine.
    pub fn start_core(&self) -> Result<(), EngineError> {
        let mut core_started = self
            .core_started
            .write()
            .expect("a thread panicked while holding the core lock");
        if *core_started {
            return Err(EngineError::AlreadyStarted);
        }

        *self.lock_proposed_block_hash() = None;
        self.core.start();
        *core_started = true;
        log::debug!("Started the core engine");
        Ok(())
    }

    /// Stop the core engine.
    pub fn stop_core(&self) -> Result<(), EngineError> {
        let mut core_started = self
            .core_started
            .write()
            .expect("a thread panicked while holding the core lock");
        if !*core_started {
            return Err(EngineError::NotStarted);
        }

        self.core.stop();
        *core_started = false;
        log::debug!("Stopped the core engine");
        Ok(())
    }

    pub fn is_core_started(&self) -> bool {
        *self
            .core_started
            .read()
            .expect("a thread panicked while holding the core lock")
    }

    /// Stop the announce thread and the core engine, if they are running.
    pub fn close(&self) {
        let _ = self.stop_announcing();
        let _ = self.stop_core();
    }

    fn read_signer(&self) -> RwLockReadGuard<'_, Signer> {
        self.signer
            .read()
            .expect("a thread panicked while holding the signer lock")
    }

    fn lock_proposed_block_hash(&self) -> MutexGuard<'_, Option<CryptoHash>> {
        self.proposed_block_hash
            .lock()
            .expect("a thread panicked while holding the proposed block hash lock")
    }
}

impl<C, P, R, B> Drop for Istanbul<C, P, R, B>
where
    C: ChainReader,
    P: StateProcessor,
    R: ValidatorRegistry<P::State>,
    B: Broadcaster,
{
    fn drop(&mut self) {
        // The announce thread holds only a weak handle to the backend and exits on its own once it sees the
        // signal, so it is not joined here: this may be running on the announce thread itself.
        if let Ok(announcer) = self.announcer.get_mut() {
            if let Some(announcer) = announcer.take() {
                let _ = announcer.shutdown.send(());
            }
        }

        if let Some(event_bus) = self.event_bus.take() {
            if let Some(event_bus_shutdown) = &self.event_bus_shutdown {
                let _ = event_bus_shutdown.send(());
            }
            let _ = event_bus.join();
        }
    }
}
