/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! User-defined parameters of the backend.

use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::types::{data_types::EpochLength, validator_set::ProposerPolicy};

pub const DEFAULT_SNAPSHOT_CACHE_CAPACITY: usize = 128;
pub const DEFAULT_PEER_CACHE_CAPACITY: usize = 40;
pub const DEFAULT_MESSAGE_CACHE_CAPACITY: usize = 1024;
pub const DEFAULT_ANNOUNCE_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_ANNOUNCE_REGOSSIP_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// Stores the user-defined parameters required to start the backend, that is:
/// 1. The [epoch length](EpochLength). The validator set can only change at the last block of an epoch,
///    i.e., at blocks whose number is a multiple of the epoch length.
/// 2. The block period, the minimum difference between the timestamps of a block and its parent.
/// 3. The [proposer policy](ProposerPolicy) of the validator sets the backend derives.
/// 4. The capacities of the backend's caches.
/// 5. The timing of the announce protocol.
/// 6. The "Log Events" flag, if set to "true" then logs should be printed.
///
/// ## Cache capacities
///
/// The snapshot cache bounds the number of validator-set snapshots remembered. The peer cache bounds the
/// number of peers whose received messages are remembered, and the message cache bounds the number of
/// messages remembered, both in the self cache and for each peer. Anything evicted is recomputed or, for
/// messages, may be sent again; capacities trade memory for work, never correctness.
///
/// ## Log Events
///
/// Istanbul-rs logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
/// printed onto a terminal or to a file, set up a [logging
/// implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
#[derive(Clone, Debug, TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.epoch(...)`
    - `.block_period(...)`
    - `.log_events(...)`
"))]
pub struct Configuration {
    #[builder(setter(doc = "Set the number of blocks in an epoch. Required."))]
    pub epoch: EpochLength,
    #[builder(setter(doc = "Set the minimum difference between the timestamps of a block and its parent. Required."))]
    pub block_period: Duration,
    #[builder(default, setter(doc = "Set the proposer policy of derived validator sets. Optional, defaults to round robin."))]
    pub proposer_policy: ProposerPolicy,
    #[builder(default = DEFAULT_SNAPSHOT_CACHE_CAPACITY, setter(doc = "Set the number of validator-set snapshots to cache. Optional."))]
    pub snapshot_cache_capacity: usize,
    #[builder(default = DEFAULT_PEER_CACHE_CAPACITY, setter(doc = "Set the number of peers to remember received messages of. Optional."))]
    pub peer_cache_capacity: usize,
    #[builder(default = DEFAULT_MESSAGE_CACHE_CAPACITY, setter(doc = "Set the number of messages to remember, per peer and for this node. Optional."))]
    pub message_cache_capacity: usize,
    #[builder(default = DEFAULT_ANNOUNCE_INTERVAL, setter(doc = "Set how often a validator announces its endpoint. Optional."))]
    pub announce_interval: Duration,
    #[builder(default = DEFAULT_ANNOUNCE_REGOSSIP_COOLDOWN, setter(doc = "Set how long to wait before regossiping an unchanged endpoint of the same validator. Optional."))]
    pub announce_regossip_cooldown: Duration,
    #[builder(setter(doc = "Enable logging? Required."))]
    pub log_events: bool,
}
