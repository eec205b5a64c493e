/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Codes that tell the kinds of messages the backend sends and receives apart.

use std::fmt::{self, Display, Formatter};

/// The kind of a message exchanged between backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageCode {
    /// A message produced by the consensus core engine. Its payload is opaque to the backend.
    Consensus,

    /// An [`AnnounceMessage`](crate::announce::AnnounceMessage) advertising a validator's endpoint.
    Announce,
}

impl MessageCode {
    pub const CONSENSUS: u64 = 0x11;
    pub const ANNOUNCE: u64 = 0x12;

    /// Get the code a message of this kind is sent with on the wire.
    pub const fn code(&self) -> u64 {
        match self {
            MessageCode::Consensus => Self::CONSENSUS,
            MessageCode::Announce => Self::ANNOUNCE,
        }
    }

    /// Get the kind of message sent with `code`, if the backend handles it.
    pub const fn from_code(code: u64) -> Option<MessageCode> {
        match code {
            Self::CONSENSUS => Some(MessageCode::Consensus),
            Self::ANNOUNCE => Some(MessageCode::Announce),
            _ => None,
        }
    }
}

impl Display for MessageCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MessageCode::Consensus => write!(f, "Consensus"),
            MessageCode::Announce => write!(f, "Announce"),
        }
    }
}
