/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The seam between the backend and the consensus core engine.
//!
//! The core engine runs the round state machine (pre-prepare, prepare, commit, round change). It calls into
//! the backend for everything that touches blocks, keys, and the network, and the backend calls back into it
//! in only two ways:
//! 1. Through the small [`CoreEngine`] lifecycle trait.
//! 2. By posting [`CoreEvent`]s to the [`EventMux`] the core engine subscribes to.

use std::sync::{
    mpsc::{self, Receiver, Sender},
    Mutex,
};

use crate::types::data_types::Address;

/// Lifecycle operations the backend performs on the consensus core engine.
pub trait CoreEngine: Send + Sync + 'static {
    /// Tell the core engine which address it is signing as.
    fn set_address(&self, address: Address);

    /// Start processing rounds.
    fn start(&self);

    /// Stop processing rounds.
    fn stop(&self);
}

/// A consensus message, as delivered to the core engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub payload: Vec<u8>,
}

/// Something the core engine is told about through the [`EventMux`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoreEvent {
    /// A consensus message, either received from a peer or broadcast by this node.
    Message(MessageEvent),

    /// A new block became the head of the chain.
    FinalCommitted,
}

/// An inbound event stream with any number of subscribers.
#[derive(Default)]
pub struct EventMux {
    subscribers: Mutex<Vec<Sender<CoreEvent>>>,
}

impl EventMux {
    pub fn new() -> EventMux {
        Self::default()
    }

    /// Get a receiver that gets every event posted from now on.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        let (sender, receiver) = mpsc::channel();
        self.lock().push(sender);
        receiver
    }

    /// Deliver `event` to every subscriber. Never blocks. Subscribers whose receivers have been dropped are
    /// forgotten.
    pub fn post(&self, event: CoreEvent) {
        self.lock()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Sender<CoreEvent>>> {
        self.subscribers
            .lock()
            .expect("a thread panicked while holding the event mux lock")
    }
}
