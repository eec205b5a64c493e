//! Istanbul-rs is a Rust Programming Language implementation of the backend of the Istanbul BFT consensus
//! engine. It binds a round-based agreement protocol to a concrete chain of blocks, and offers:
//! 1. Deterministic derivation of the [validator set](types::validator_set) effective at any block, from
//!    validator-set diffs embedded in epoch-boundary headers ([snapshot]),
//! 2. Proposal verification and the propose/commit synchronization with the sealing loop ([backend]),
//! 3. Gossip that does not relay the same message twice ([gossip]), and a mesh of direct connections among
//!    the validators ([enode_table], [announce]),
//! 4. Pluggable [chain access and execution](chain), peer-to-peer [networking], and
//!    [consensus core engine](engine).

pub mod announce;

pub mod backend;

pub mod cache;

pub mod chain;

pub mod config;

pub mod engine;

pub mod enode_table;

pub mod events;

pub(crate) mod event_bus;

pub mod gossip;

pub mod logging;

pub mod networking;

pub mod snapshot;

pub mod types;
