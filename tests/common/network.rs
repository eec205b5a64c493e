use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::{
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
        Arc, Mutex,
    },
    time::Duration,
};

use istanbul_rs::{
    announce::AnnounceMessage,
    networking::{
        messages::MessageCode,
        network::{Broadcaster, PeerHandle, SendError},
    },
    types::{
        block::Block,
        crypto_primitives::hash_bytes,
        data_types::{Address, EnodeUrl},
        keypair::Keypair,
    },
};

/// A message as sent to a [`RecordingPeer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SentMessage {
    pub(crate) to: Address,
    pub(crate) code: MessageCode,
    pub(crate) payload: Vec<u8>,
}

#[derive(Clone)]
pub(crate) struct RecordingPeer {
    address: Address,
    outbox: Sender<SentMessage>,
    // If set, every send waits for a signal on this channel before it is recorded.
    gate: Option<Arc<Mutex<Receiver<()>>>>,
}

impl PeerHandle for RecordingPeer {
    fn send(&self, code: MessageCode, payload: Vec<u8>) -> Result<(), SendError> {
        if let Some(gate) = &self.gate {
            gate.lock().unwrap().recv()?;
        }
        self.outbox
            .send(SentMessage {
                to: self.address,
                code,
                payload,
            })
            .map_err(|err| err.to_string().into())
    }
}

/// A transport stub that records everything the backend asks of it. Clones share the same records.
#[derive(Clone)]
pub(crate) struct RecordingBroadcaster(Arc<BroadcasterInner>);

struct BroadcasterInner {
    peers: Mutex<HashMap<Address, RecordingPeer>>,
    outbox: Sender<SentMessage>,
    enqueued: Mutex<Vec<(String, Block)>>,
    validator_peers: Mutex<BTreeSet<EnodeUrl>>,
    local_node: Mutex<Option<EnodeUrl>>,
}

impl RecordingBroadcaster {
    /// Create a broadcaster together with the receiving end of every message sent through it.
    pub(crate) fn new() -> (RecordingBroadcaster, SentMessages) {
        let (outbox, sent) = mpsc::channel();
        let broadcaster = RecordingBroadcaster(Arc::new(BroadcasterInner {
            peers: Mutex::new(HashMap::new()),
            outbox,
            enqueued: Mutex::new(Vec::new()),
            validator_peers: Mutex::new(BTreeSet::new()),
            local_node: Mutex::new(None),
        }));
        (broadcaster, SentMessages(sent))
    }

    pub(crate) fn connect(&self, addresses: &[Address]) {
        let mut peers = self.0.peers.lock().unwrap();
        for address in addresses {
            peers.insert(
                *address,
                RecordingPeer {
                    address: *address,
                    outbox: self.0.outbox.clone(),
                    gate: None,
                },
            );
        }
    }

    /// Connect a peer whose sends hang until released. Each message sent on the returned channel lets one
    /// send through.
    pub(crate) fn connect_stalled(&self, address: Address) -> Sender<()> {
        let (release, gate) = mpsc::channel();
        self.0.peers.lock().unwrap().insert(
            address,
            RecordingPeer {
                address,
                outbox: self.0.outbox.clone(),
                gate: Some(Arc::new(Mutex::new(gate))),
            },
        );
        release
    }

    pub(crate) fn set_local_node(&self, enode_url: Option<EnodeUrl>) {
        *self.0.local_node.lock().unwrap() = enode_url;
    }

    pub(crate) fn enqueued(&self) -> Vec<(String, Block)> {
        self.0.enqueued.lock().unwrap().clone()
    }

    pub(crate) fn connected_validator_peers(&self) -> BTreeSet<EnodeUrl> {
        self.0.validator_peers.lock().unwrap().clone()
    }
}

impl Broadcaster for RecordingBroadcaster {
    type Peer = RecordingPeer;

    fn find_peers(&self, targets: Option<&HashSet<Address>>) -> HashMap<Address, RecordingPeer> {
        self.0
            .peers
            .lock()
            .unwrap()
            .iter()
            .filter(|(address, _)| targets.map_or(true, |targets| targets.contains(address)))
            .map(|(address, peer)| (*address, peer.clone()))
            .collect()
    }

    fn enqueue(&self, tag: &str, block: Block) {
        self.0
            .enqueued
            .lock()
            .unwrap()
            .push((tag.to_string(), block));
    }

    fn add_validator_peer(&self, enode_url: &EnodeUrl) {
        self.0
            .validator_peers
            .lock()
            .unwrap()
            .insert(enode_url.clone());
    }

    fn remove_validator_peer(&self, enode_url: &EnodeUrl) {
        self.0.validator_peers.lock().unwrap().remove(enode_url);
    }

    fn validator_peers(&self) -> Vec<EnodeUrl> {
        self.0
            .validator_peers
            .lock()
            .unwrap()
            .iter()
            .cloned()
            .collect()
    }

    fn local_node(&self) -> Option<EnodeUrl> {
        self.0.local_node.lock().unwrap().clone()
    }
}

/// The messages sent through a [`RecordingBroadcaster`]. Sends happen on background threads, so reading
/// them waits a little.
pub(crate) struct SentMessages(Receiver<SentMessage>);

impl SentMessages {
    const WAIT: Duration = Duration::from_millis(500);

    /// Wait for `n` messages to be sent, and return them ordered by recipient.
    pub(crate) fn take(&self, n: usize) -> Vec<SentMessage> {
        let mut messages: Vec<SentMessage> = (0..n)
            .map(|_| {
                self.0
                    .recv_timeout(Self::WAIT)
                    .expect("expected another message to be sent")
            })
            .collect();
        messages.sort_by_key(|message| message.to);
        messages
    }

    /// Check that no (further) message is sent.
    pub(crate) fn assert_none(&self) {
        match self.0.recv_timeout(Self::WAIT) {
            Err(RecvTimeoutError::Timeout) => (),
            Ok(message) => panic!("unexpected message sent: {:?}", message),
            Err(RecvTimeoutError::Disconnected) => panic!("broadcaster dropped"),
        }
    }
}

pub(crate) fn enode_of(address: &Address) -> EnodeUrl {
    EnodeUrl::new(format!("enode://{}@127.0.0.1:30303", address))
}

/// Encode an announce message in which `keypair` advertises `enode_url`.
pub(crate) fn announce_payload(keypair: &Keypair, enode_url: EnodeUrl, timestamp: u64) -> Vec<u8> {
    let message = AnnounceMessage::new(keypair.address(), enode_url, timestamp);
    let signature = keypair
        .sign(&hash_bytes(&message.signing_payload()))
        .unwrap();
    message.with_signature(signature).encode()
}
