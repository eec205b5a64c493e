//! Types and traits that are used across multiple components of Istanbul-rs.

pub mod data_types;

pub mod crypto_primitives;

pub mod keypair;

pub mod block;

pub mod extra;

pub mod validator_set;
