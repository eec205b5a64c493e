use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
    time::{SystemTime, UNIX_EPOCH},
};

use istanbul_rs::{
    backend::prepare_committed_seal,
    chain::ChainReader,
    types::{
        block::{derive_tx_root, nil_uncle_hash, Block, Header, Transaction},
        crypto_primitives::hash_bytes,
        data_types::{Address, BlockNumber, CryptoHash},
        extra::{write_seal, IstanbulExtra},
        keypair::Keypair,
    },
};

/// An in-memory canonical chain. Clones share the same blocks.
#[derive(Clone)]
pub(crate) struct MemChain(Arc<Mutex<MemChainInner>>);

struct MemChainInner {
    blocks: HashMap<CryptoHash, Block>,
    // The hash of the canonical block at each height.
    canonical: Vec<CryptoHash>,
    bad_blocks: HashSet<CryptoHash>,
    header_lookups: usize,
}

impl MemChain {
    pub(crate) fn new(genesis: Block) -> MemChain {
        let chain = MemChain(Arc::new(Mutex::new(MemChainInner {
            blocks: HashMap::new(),
            canonical: Vec::new(),
            bad_blocks: HashSet::new(),
            header_lookups: 0,
        })));
        chain.insert(genesis);
        chain
    }

    /// Make `block` the canonical block at its height, and the head of the chain.
    pub(crate) fn insert(&self, block: Block) {
        let mut inner = self.lock();
        let height = block.number().int() as usize;
        assert!(height <= inner.canonical.len(), "blocks must be inserted in order");
        inner.canonical.truncate(height);
        inner.canonical.push(block.hash());
        inner.blocks.insert(block.hash(), block);
    }

    /// Forget the block with `hash`, as if it was never stored.
    pub(crate) fn forget(&self, hash: &CryptoHash) {
        self.lock().blocks.remove(hash);
    }

    pub(crate) fn mark_bad(&self, hash: CryptoHash) {
        self.lock().bad_blocks.insert(hash);
    }

    pub(crate) fn block_at(&self, number: u64) -> Block {
        let inner = self.lock();
        inner.blocks[&inner.canonical[number as usize]].clone()
    }

    /// Get how many times a header was looked up by hash.
    pub(crate) fn header_lookups(&self) -> usize {
        self.lock().header_lookups
    }

    fn lock(&self) -> MutexGuard<'_, MemChainInner> {
        self.0.lock().unwrap()
    }
}

impl ChainReader for MemChain {
    fn header_by_hash(&self, hash: &CryptoHash) -> Option<Header> {
        let mut inner = self.lock();
        inner.header_lookups += 1;
        inner.blocks.get(hash).map(|block| block.header.clone())
    }

    fn header_by_number(&self, number: BlockNumber) -> Option<Header> {
        let inner = self.lock();
        let hash = inner.canonical.get(number.int() as usize)?;
        inner.blocks.get(hash).map(|block| block.header.clone())
    }

    fn current_block(&self) -> Block {
        let inner = self.lock();
        let head = inner.canonical.last().expect("the chain has a Genesis Block");
        inner.blocks[head].clone()
    }

    fn has_bad_block(&self, hash: &CryptoHash) -> bool {
        self.lock().bad_blocks.contains(hash)
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Create a Genesis Block whose validator set is `validators`, timestamped far enough in the past that
/// children with increasing timestamps are not in the future.
pub(crate) fn genesis_block(validators: &[Address]) -> Block {
    let mut validators = validators.to_vec();
    validators.sort();

    let header = Header {
        parent_hash: CryptoHash::new([0u8; 32]),
        coinbase: Address::zero(),
        root: CryptoHash::new([0u8; 32]),
        tx_hash: derive_tx_root(&[]),
        receipt_hash: CryptoHash::new([0u8; 32]),
        uncle_hash: nil_uncle_hash(),
        number: BlockNumber::new(0),
        gas_used: 0,
        time: unix_now() - 10_000,
        extra: IstanbulExtra::new(validators, Vec::new()).encode(b"genesis"),
    };
    Block::new(header, Vec::new(), Vec::new())
}

/// Builds a child of a given block.
pub(crate) struct BlockBuilder {
    parent: Header,
    time: u64,
    added: Vec<Address>,
    removed: Vec<Address>,
    transactions: Vec<Transaction>,
}

impl BlockBuilder {
    /// Start building a child of `parent`, timestamped one second after it.
    pub(crate) fn child_of(parent: &Block) -> BlockBuilder {
        BlockBuilder {
            parent: parent.header.clone(),
            time: parent.header.time + 1,
            added: Vec::new(),
            removed: Vec::new(),
            transactions: Vec::new(),
        }
    }

    pub(crate) fn time(mut self, time: u64) -> BlockBuilder {
        self.time = time;
        self
    }

    pub(crate) fn diff(mut self, mut added: Vec<Address>, mut removed: Vec<Address>) -> BlockBuilder {
        added.sort();
        removed.sort();
        self.added = added;
        self.removed = removed;
        self
    }

    pub(crate) fn transactions(mut self, transactions: Vec<Transaction>) -> BlockBuilder {
        self.transactions = transactions;
        self
    }

    /// Finish the block, with `coinbase` as the coinbase and no seals.
    pub(crate) fn unsealed(self, coinbase: Address) -> Block {
        let header = Header {
            parent_hash: self.parent.hash(),
            coinbase,
            root: CryptoHash::new([1u8; 32]),
            tx_hash: derive_tx_root(&self.transactions),
            receipt_hash: CryptoHash::new([2u8; 32]),
            uncle_hash: nil_uncle_hash(),
            number: self.parent.number + 1,
            gas_used: 0,
            time: self.time,
            extra: IstanbulExtra::new(self.added, self.removed).encode(&[]),
        };
        Block::new(header, self.transactions, Vec::new())
    }

    /// Finish the block, proposed and sealed by `proposer`.
    pub(crate) fn sealed_by(self, proposer: &Keypair) -> Block {
        let mut block = self.unsealed(proposer.address());
        let seal = proposer
            .sign(&hash_bytes(&block.header.sig_hash().bytes()))
            .unwrap();
        write_seal(&mut block.header, &seal).unwrap();
        block
    }
}

/// Produce the committed seals of `signers` over `block`.
pub(crate) fn committed_seals(block: &Block, signers: &[Keypair]) -> Vec<Vec<u8>> {
    let digest = hash_bytes(&prepare_committed_seal(&block.hash()));
    signers
        .iter()
        .map(|signer| signer.sign(&digest).unwrap().to_vec())
        .collect()
}
