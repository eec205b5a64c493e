/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The thread that passes published [events](crate::events) to their handlers.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::events::*;
use crate::logging::Logger;

pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

// How long the event bus waits for an event before checking for a shutdown signal.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub(crate) struct EventHandlers {
    pub(crate) commit_block_handlers: Vec<HandlerPtr<CommitBlockEvent>>,
    pub(crate) import_block_handlers: Vec<HandlerPtr<ImportBlockEvent>>,
    pub(crate) reject_proposal_handlers: Vec<HandlerPtr<RejectProposalEvent>>,
    pub(crate) update_validator_peers_handlers: Vec<HandlerPtr<UpdateValidatorPeersEvent>>,
    pub(crate) announce_handlers: Vec<HandlerPtr<AnnounceEvent>>,
    pub(crate) receive_announce_handlers: Vec<HandlerPtr<ReceiveAnnounceEvent>>,
    pub(crate) authorize_handlers: Vec<HandlerPtr<AuthorizeEvent>>,
}

impl EventHandlers {
    /// Collect the user-provided handlers, adding the default logger of every event type if `log_events`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        log_events: bool,
        commit_block_handler: Option<HandlerPtr<CommitBlockEvent>>,
        import_block_handler: Option<HandlerPtr<ImportBlockEvent>>,
        reject_proposal_handler: Option<HandlerPtr<RejectProposalEvent>>,
        update_validator_peers_handler: Option<HandlerPtr<UpdateValidatorPeersEvent>>,
        announce_handler: Option<HandlerPtr<AnnounceEvent>>,
        receive_announce_handler: Option<HandlerPtr<ReceiveAnnounceEvent>>,
        authorize_handler: Option<HandlerPtr<AuthorizeEvent>>,
    ) -> EventHandlers {
        fn handlers<T: Logger>(log_events: bool, handler: Option<HandlerPtr<T>>) -> Vec<HandlerPtr<T>> {
            let mut handlers = Vec::new();
            if log_events {
                handlers.push(T::get_logger());
            }
            handlers.extend(handler);
            handlers
        }

        Self {
            commit_block_handlers: handlers(log_events, commit_block_handler),
            import_block_handlers: handlers(log_events, import_block_handler),
            reject_proposal_handlers: handlers(log_events, reject_proposal_handler),
            update_validator_peers_handlers: handlers(log_events, update_validator_peers_handler),
            announce_handlers: handlers(log_events, announce_handler),
            receive_announce_handlers: handlers(log_events, receive_announce_handler),
            authorize_handlers: handlers(log_events, authorize_handler),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.commit_block_handlers.is_empty()
            && self.import_block_handlers.is_empty()
            && self.reject_proposal_handlers.is_empty()
            && self.update_validator_peers_handlers.is_empty()
            && self.announce_handlers.is_empty()
            && self.receive_announce_handlers.is_empty()
            && self.authorize_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::CommitBlock(commit_block_event) => self
                .commit_block_handlers
                .iter()
                .for_each(|handler| handler(&commit_block_event)),

            Event::ImportBlock(import_block_event) => self
                .import_block_handlers
                .iter()
                .for_each(|handler| handler(&import_block_event)),

            Event::RejectProposal(reject_proposal_event) => self
                .reject_proposal_handlers
                .iter()
                .for_each(|handler| handler(&reject_proposal_event)),

            Event::UpdateValidatorPeers(update_validator_peers_event) => self
                .update_validator_peers_handlers
                .iter()
                .for_each(|handler| handler(&update_validator_peers_event)),

            Event::Announce(announce_event) => self
                .announce_handlers
                .iter()
                .for_each(|handler| handler(&announce_event)),

            Event::ReceiveAnnounce(receive_announce_event) => self
                .receive_announce_handlers
                .iter()
                .for_each(|handler| handler(&receive_announce_event)),

            Event::Authorize(authorize_event) => self
                .authorize_handlers
                .iter()
                .for_each(|handler| handler(&authorize_event)),
        }
    }
}

pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => return,
            Err(TryRecvError::Empty) => (),
        }

        match event_subscriber.recv_timeout(POLL_INTERVAL) {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => return,
        }
    })
}
