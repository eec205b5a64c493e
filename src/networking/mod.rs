//! Pluggable peer-to-peer (P2P) networking.
//!
//! The backend does not own a transport. It reaches peers through a [`Broadcaster`](network::Broadcaster)
//! provided by the library user, and is handed inbound messages through
//! [`Istanbul::handle_msg`](crate::backend::Istanbul::handle_msg).

pub mod network;

pub mod messages;

pub(crate) mod sending;
