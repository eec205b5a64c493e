/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions for sending messages to peers without blocking.

use std::thread;

use crate::types::data_types::Address;

use super::{messages::MessageCode, network::PeerHandle};

/// Send `payload` to `peer` on a detached thread.
///
/// The caller never learns whether the send succeeded. Failures are logged at the debug level, and a slow
/// or unresponsive peer only ever holds up its own thread.
pub(crate) fn send_detached<P: PeerHandle>(
    address: Address,
    peer: P,
    code: MessageCode,
    payload: Vec<u8>,
) {
    thread::spawn(move || {
        if let Err(err) = peer.send(code, payload) {
            log::debug!("Failed to send {} message to {}: {}", code, address, err);
        }
    });
}
