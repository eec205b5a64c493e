//! Tests for the signing identity and for starting and stopping the core engine.

mod common;

use std::time::Duration;

use istanbul_rs::{
    backend::{BackendError, BackendSpec, EngineError},
    events::AuthorizeEvent,
    types::{crypto_primitives::hash_bytes, data_types::CryptoHash},
};
use log::LevelFilter;

use common::{
    chain::{genesis_block, MemChain},
    core::{CoreCall, RecordingCore},
    keys::{addresses, keypairs},
    logging::setup_logger,
    network::RecordingBroadcaster,
    node::{configuration, TestNode},
    state::{CountingProcessor, StaticRegistry},
};

fn setup() -> TestNode {
    setup_logger(LevelFilter::Debug);
    let keypairs = keypairs(4);
    let chain = MemChain::new(genesis_block(&addresses(&keypairs)));
    TestNode::start(chain, configuration(30000), None)
}

#[test]
fn signing_needs_an_identity() {
    let node = setup();
    assert!(node.backend.address().is_zero());
    assert!(matches!(
        node.backend.sign(b"data"),
        Err(BackendError::InvalidSigningFn)
    ));
}

#[test]
fn authorized_signatures_check_out_only_for_the_signer() {
    let node = setup();
    let keypairs = keypairs(2);
    node.backend
        .authorize(keypairs[0].address(), keypairs[0].signer_fn());

    assert_eq!(node.backend.address(), keypairs[0].address());
    assert_eq!(
        node.core.calls(),
        vec![CoreCall::SetAddress(keypairs[0].address())]
    );

    let data = b"prepare for round 3".to_vec();
    let signature = node.backend.sign(&data).unwrap();
    assert_eq!(
        signature,
        keypairs[0].sign(&hash_bytes(&data)).unwrap()
    );

    assert!(node
        .backend
        .check_signature(&data, &keypairs[0].address(), &signature.to_vec())
        .is_ok());
    assert!(matches!(
        node.backend
            .check_signature(&data, &keypairs[1].address(), &signature.to_vec()),
        Err(BackendError::InvalidSignature)
    ));
    assert!(matches!(
        node.backend
            .check_signature(&data, &keypairs[0].address(), &signature.to_vec()[..64]),
        Err(BackendError::Signature(_))
    ));
}

#[test]
fn reauthorizing_replaces_the_identity() {
    let node = setup();
    let keypairs = keypairs(2);
    node.backend
        .authorize(keypairs[0].address(), keypairs[0].signer_fn());
    node.backend
        .authorize(keypairs[1].address(), keypairs[1].signer_fn());

    let signature = node.backend.sign(b"data").unwrap();
    assert!(node
        .backend
        .check_signature(b"data", &keypairs[1].address(), &signature.to_vec())
        .is_ok());
}

#[test]
fn authorize_is_reported() {
    setup_logger(LevelFilter::Debug);
    let keypairs = keypairs(4);
    let (authorized_sender, authorized) = std::sync::mpsc::channel();
    let (broadcaster, _sent) = RecordingBroadcaster::new();

    let (backend, _commits) = BackendSpec::builder()
        .chain(MemChain::new(genesis_block(&addresses(&keypairs))))
        .processor(CountingProcessor::default())
        .registry(StaticRegistry::new(Vec::new()))
        .broadcaster(broadcaster)
        .core(RecordingCore::default())
        .configuration(configuration(30000))
        .on_authorize(move |event: &AuthorizeEvent| {
            let _ = authorized_sender.send(event.address);
        })
        .build()
        .start();

    backend.authorize(keypairs[2].address(), keypairs[2].signer_fn());
    assert_eq!(
        authorized.recv_timeout(Duration::from_secs(1)).unwrap(),
        keypairs[2].address()
    );
}

#[test]
fn core_starts_and_stops_once() {
    let node = setup();

    node.backend.start_core().unwrap();
    assert!(node.backend.is_core_started());
    assert!(matches!(
        node.backend.start_core(),
        Err(EngineError::AlreadyStarted)
    ));

    node.backend.stop_core().unwrap();
    assert!(!node.backend.is_core_started());
    assert!(matches!(
        node.backend.stop_core(),
        Err(EngineError::NotStarted)
    ));

    assert_eq!(node.core.calls(), vec![CoreCall::Start, CoreCall::Stop]);
}

#[test]
fn starting_the_core_forgets_the_last_proposal() {
    let node = setup();
    node.backend
        .set_proposed_block_hash(CryptoHash::new([7u8; 32]));

    node.backend.start_core().unwrap();
    assert_eq!(node.backend.proposed_block_hash(), None);
}

#[test]
fn close_stops_everything_that_runs() {
    let node = setup();
    node.backend.start_core().unwrap();
    node.backend.start_announcing().unwrap();

    node.backend.close();

    assert!(!node.backend.is_core_started());
    assert!(matches!(
        node.backend.stop_announcing(),
        Err(EngineError::NotAnnouncing)
    ));
}
