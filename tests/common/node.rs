use std::{
    sync::{mpsc, Arc},
    time::Duration,
};

use istanbul_rs::{
    backend::{BackendSpec, CommitReceiver, Istanbul},
    config::Configuration,
    events::{ReceiveAnnounceEvent, RejectProposalEvent, UpdateValidatorPeersEvent},
    types::{data_types::EpochLength, keypair::Keypair},
};

use super::{
    chain::MemChain,
    core::RecordingCore,
    network::{RecordingBroadcaster, SentMessages},
    state::{CountingProcessor, StaticRegistry},
};

pub(crate) type TestBackend =
    Istanbul<MemChain, CountingProcessor, StaticRegistry, RecordingBroadcaster>;

/// A backend wired to in-memory collaborators, together with handles to inspect those collaborators.
pub(crate) struct TestNode {
    pub(crate) backend: Arc<TestBackend>,
    pub(crate) commits: CommitReceiver,
    pub(crate) chain: MemChain,
    pub(crate) processor: CountingProcessor,
    pub(crate) registry: StaticRegistry,
    pub(crate) broadcaster: RecordingBroadcaster,
    pub(crate) sent: SentMessages,
    pub(crate) core: RecordingCore,
    pub(crate) rejected: mpsc::Receiver<RejectProposalEvent>,
    pub(crate) peer_updates: mpsc::Receiver<UpdateValidatorPeersEvent>,
    pub(crate) received_announces: mpsc::Receiver<ReceiveAnnounceEvent>,
}

pub(crate) fn configuration(epoch: u64) -> Configuration {
    Configuration::builder()
        .epoch(EpochLength::new(epoch))
        .block_period(Duration::from_secs(1))
        .log_events(true)
        .build()
}

impl TestNode {
    /// Start a backend over `chain` with the given configuration. If `keypair` is given, the backend is
    /// authorized to sign with it.
    pub(crate) fn start(
        chain: MemChain,
        configuration: Configuration,
        keypair: Option<&Keypair>,
    ) -> TestNode {
        let processor = CountingProcessor::default();
        let registry = StaticRegistry::new(Vec::new());
        let (broadcaster, sent) = RecordingBroadcaster::new();
        let core = RecordingCore::default();

        let (reject_sender, rejected) = mpsc::channel();
        let (peer_update_sender, peer_updates) = mpsc::channel();
        let (receive_announce_sender, received_announces) = mpsc::channel();

        let (backend, commits) = BackendSpec::builder()
            .chain(chain.clone())
            .processor(processor.clone())
            .registry(registry.clone())
            .broadcaster(broadcaster.clone())
            .core(core.clone())
            .configuration(configuration)
            .on_reject_proposal(move |event: &RejectProposalEvent| {
                let _ = reject_sender.send(event.clone());
            })
            .on_update_validator_peers(move |event: &UpdateValidatorPeersEvent| {
                let _ = peer_update_sender.send(event.clone());
            })
            .on_receive_announce(move |event: &ReceiveAnnounceEvent| {
                let _ = receive_announce_sender.send(event.clone());
            })
            .build()
            .start();

        if let Some(keypair) = keypair {
            backend.authorize(keypair.address(), keypair.signer_fn());
        }

        TestNode {
            backend,
            commits,
            chain,
            processor,
            registry,
            broadcaster,
            sent,
            core,
            rejected,
            peer_updates,
            received_announces,
        }
    }
}
