/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the backend's
//! [configuration](crate::config::Configuration).
//!
//! Istanbul-rs logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [RejectProposal](crate::events::RejectProposalEvent) is printed:
//!
//! ```text
//! RejectProposal, 1701329264, fNGCJyk, 17, UhJtB7M, coinbase is not the address of the proposer
//! ```
//!
//! In the snippet:
//! - The third value is the first seven characters of the Base64 encoding of the hash of the proposed
//!   block.
//! - The fourth value is the number of the proposed block.
//! - The fifth value is the first seven characters of the Base64 encoding of the address of the proposer.
//! - The sixth value is why the proposal was rejected.

use std::time::SystemTime;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};

use crate::events::*;

// Names of each event in PascalCase for printing:
pub const COMMIT_BLOCK: &str = "CommitBlock";
pub const IMPORT_BLOCK: &str = "ImportBlock";
pub const REJECT_PROPOSAL: &str = "RejectProposal";
pub const UPDATE_VALIDATOR_PEERS: &str = "UpdateValidatorPeers";
pub const ANNOUNCE: &str = "Announce";
pub const RECEIVE_ANNOUNCE: &str = "ReceiveAnnounce";
pub const AUTHORIZE: &str = "Authorize";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for CommitBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |commit_block_event: &CommitBlockEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                COMMIT_BLOCK,
                secs_since_unix_epoch(commit_block_event.timestamp),
                first_seven_base64_chars(&commit_block_event.block.bytes()),
                commit_block_event.number,
                commit_block_event.committed_seals
            )
        };
        Box::new(logger)
    }
}

impl Logger for ImportBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |import_block_event: &ImportBlockEvent| {
            log::info!(
                "{}, {}, {}, {}",
                IMPORT_BLOCK,
                secs_since_unix_epoch(import_block_event.timestamp),
                first_seven_base64_chars(&import_block_event.block.bytes()),
                import_block_event.number
            )
        };
        Box::new(logger)
    }
}

impl Logger for RejectProposalEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |reject_proposal_event: &RejectProposalEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                REJECT_PROPOSAL,
                secs_since_unix_epoch(reject_proposal_event.timestamp),
                first_seven_base64_chars(&reject_proposal_event.block.bytes()),
                reject_proposal_event.number,
                first_seven_base64_chars(&reject_proposal_event.proposer.bytes()),
                reject_proposal_event.reason
            )
        };
        Box::new(logger)
    }
}

impl Logger for UpdateValidatorPeersEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |update_validator_peers_event: &UpdateValidatorPeersEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                UPDATE_VALIDATOR_PEERS,
                secs_since_unix_epoch(update_validator_peers_event.timestamp),
                update_validator_peers_event.is_validator,
                update_validator_peers_event.added.len(),
                update_validator_peers_event.removed.len()
            )
        };
        Box::new(logger)
    }
}

impl Logger for AnnounceEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |announce_event: &AnnounceEvent| {
            log::info!(
                "{}, {}, {}",
                ANNOUNCE,
                secs_since_unix_epoch(announce_event.timestamp),
                announce_event.enode_url
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveAnnounceEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_announce_event: &ReceiveAnnounceEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                RECEIVE_ANNOUNCE,
                secs_since_unix_epoch(receive_announce_event.timestamp),
                first_seven_base64_chars(&receive_announce_event.origin.bytes()),
                receive_announce_event.enode_url,
                receive_announce_event.regossiped
            )
        };
        Box::new(logger)
    }
}

impl Logger for AuthorizeEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |authorize_event: &AuthorizeEvent| {
            log::info!(
                "{}, {}, {}",
                AUTHORIZE,
                secs_since_unix_epoch(authorize_event.timestamp),
                first_seven_base64_chars(&authorize_event.address.bytes())
            )
        };
        Box::new(logger)
    }
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking the first 7 characters.
pub(crate) fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

// Events stamped before the Unix Epoch (i.e., with a badly set system clock) are printed with time 0.
fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|since_epoch| since_epoch.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_inputs_are_not_padded() {
        assert_eq!(first_seven_base64_chars(&[0xff]), "/w");
        assert_eq!(first_seven_base64_chars(&[0u8; 32]).len(), 7);
    }
}
