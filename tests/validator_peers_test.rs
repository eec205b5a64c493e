//! Tests for keeping the validator peer mesh in line with the validator set.

mod common;

use std::{collections::BTreeSet, time::Duration};

use istanbul_rs::{
    networking::messages::MessageCode,
    types::{
        data_types::EnodeUrl,
        keypair::Keypair,
        validator_set::{ProposerPolicy, ValidatorSet},
    },
};
use log::LevelFilter;

use common::{
    chain::{genesis_block, unix_now, BlockBuilder, MemChain},
    keys::{self, addresses, keypairs},
    logging::setup_logger,
    network::{announce_payload, enode_of},
    node::{configuration, TestNode},
};

const WAIT: Duration = Duration::from_millis(500);

fn setup(epoch: u64, signer: Option<&Keypair>, keypairs: &[Keypair]) -> TestNode {
    setup_logger(LevelFilter::Debug);
    let chain = MemChain::new(genesis_block(&addresses(keypairs)));
    TestNode::start(chain, configuration(epoch), signer)
}

// Have every validator but the first announce its endpoint to `node`.
fn receive_announces(node: &TestNode, keypairs: &[Keypair]) {
    for keypair in &keypairs[1..] {
        let payload = announce_payload(keypair, enode_of(&keypair.address()), unix_now());
        assert!(node
            .backend
            .handle_msg(keypair.address(), MessageCode::ANNOUNCE, &payload)
            .unwrap());
    }
}

fn enodes(keypairs: &[Keypair]) -> BTreeSet<EnodeUrl> {
    keypairs
        .iter()
        .map(|keypair| enode_of(&keypair.address()))
        .collect()
}

#[test]
fn announced_validators_are_connected() {
    let keypairs = keypairs(4);
    let node = setup(30000, Some(&keypairs[0]), &keypairs);

    receive_announces(&node, &keypairs);

    assert_eq!(
        node.broadcaster.connected_validator_peers(),
        enodes(&keypairs[1..])
    );
    for _ in 1..4 {
        let event = node.received_announces.recv_timeout(WAIT).unwrap();
        assert!(keypairs[1..]
            .iter()
            .any(|keypair| keypair.address() == event.origin));
    }
}

#[test]
fn refreshing_with_an_unchanged_validator_set_changes_nothing() {
    let keypairs = keypairs(4);
    let node = setup(30000, Some(&keypairs[0]), &keypairs);
    receive_announces(&node, &keypairs);
    let val_set = node.backend.current_validators();

    for _ in 0..2 {
        let changes = node.backend.refresh_val_peers(&val_set);
        assert!(changes.added.is_empty());
        assert!(changes.removed.is_empty());
        assert_eq!(
            node.broadcaster.connected_validator_peers(),
            enodes(&keypairs[1..])
        );
    }
}

#[test]
fn validators_leaving_the_set_are_disconnected() {
    let keypairs = keypairs(4);
    let node = setup(30000, Some(&keypairs[0]), &keypairs);
    receive_announces(&node, &keypairs);

    let val_set = ValidatorSet::new(&addresses(&keypairs[..3]), ProposerPolicy::RoundRobin);
    let changes = node.backend.refresh_val_peers(&val_set);

    assert_eq!(changes.removed, vec![enode_of(&keypairs[3].address())]);
    assert_eq!(
        node.broadcaster.connected_validator_peers(),
        enodes(&keypairs[1..3])
    );

    let event = node.peer_updates.recv_timeout(WAIT).unwrap();
    assert!(event.is_validator);
    assert_eq!(event.removed, changes.removed);
}

#[test]
fn node_leaving_the_set_disconnects_from_every_validator() {
    let keypairs = keypairs(4);
    let node = setup(30000, Some(&keypairs[0]), &keypairs);
    receive_announces(&node, &keypairs);

    let val_set = ValidatorSet::new(&addresses(&keypairs[1..]), ProposerPolicy::RoundRobin);
    let changes = node.backend.refresh_val_peers(&val_set);

    assert!(changes.added.is_empty());
    assert_eq!(changes.removed.len(), 3);
    assert!(node.broadcaster.connected_validator_peers().is_empty());
    assert!(!node.peer_updates.recv_timeout(WAIT).unwrap().is_validator);
}

#[test]
fn newer_endpoint_replaces_the_old_connection() {
    let keypairs = keypairs(4);
    let node = setup(30000, Some(&keypairs[0]), &keypairs);
    let announcer = &keypairs[1];
    let old = EnodeUrl::new("enode://old@10.0.0.1:30303");
    let new = EnodeUrl::new("enode://new@10.0.0.2:30303");
    let stale = EnodeUrl::new("enode://stale@10.0.0.3:30303");

    for (enode_url, timestamp) in [(old, 100), (new.clone(), 200), (stale, 50)] {
        node.backend
            .handle_announce(&announce_payload(announcer, enode_url, timestamp))
            .unwrap();
    }

    assert_eq!(
        node.broadcaster.connected_validator_peers(),
        BTreeSet::from([new])
    );
}

#[test]
fn non_validator_records_endpoints_without_connecting() {
    let keypairs = keypairs(4);
    let full_node = keys::keypairs(1).remove(0);
    let node = setup(30000, Some(&full_node), &keypairs);

    receive_announces(&node, &keypairs);

    assert!(node.broadcaster.connected_validator_peers().is_empty());
    assert!(node.received_announces.recv_timeout(WAIT).is_ok());
}

#[test]
fn new_head_at_an_epoch_boundary_refreshes_the_mesh() {
    let keypairs = keypairs(4);
    let node = setup(1, Some(&keypairs[0]), &keypairs);
    receive_announces(&node, &keypairs);
    node.backend.start_core().unwrap();

    let genesis = node.chain.block_at(0);
    let head = BlockBuilder::child_of(&genesis)
        .diff(Vec::new(), vec![keypairs[3].address()])
        .sealed_by(&keypairs[1]);
    node.chain.insert(head.clone());
    node.backend.new_chain_head(&head).unwrap();

    assert_eq!(
        node.broadcaster.connected_validator_peers(),
        enodes(&keypairs[1..3])
    );
}
