use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use istanbul_rs::{
    chain::{ExecutionError, ProcessOutput, StateProcessor, ValidatorRegistry},
    types::{
        block::{Block, Header},
        data_types::{Address, CryptoHash},
    },
};

/// The state of a [`CountingProcessor`]: how many transactions have been executed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct CountingState {
    pub(crate) executed: u64,
}

/// A state processor that counts executed transactions. Its state roots can be made to mismatch on demand.
#[derive(Clone, Default)]
pub(crate) struct CountingProcessor {
    state_root_mismatch: Arc<AtomicBool>,
}

impl CountingProcessor {
    pub(crate) fn set_state_root_mismatch(&self, mismatch: bool) {
        self.state_root_mismatch.store(mismatch, Ordering::SeqCst);
    }
}

impl StateProcessor for CountingProcessor {
    type State = CountingState;
    type Receipt = CryptoHash;
    type Log = ();

    fn state_at(&self, _block_hash: &CryptoHash) -> Result<CountingState, ExecutionError> {
        Ok(CountingState::default())
    }

    fn process_block(
        &self,
        block: &Block,
        state: &mut CountingState,
    ) -> Result<ProcessOutput<CryptoHash, ()>, ExecutionError> {
        state.executed += block.transactions.len() as u64;
        Ok(ProcessOutput {
            receipts: block.transactions.iter().map(|tx| tx.hash()).collect(),
            logs: Vec::new(),
            gas_used: 0,
        })
    }

    fn validate_state(
        &self,
        block: &Block,
        _state: &CountingState,
        receipts: &[CryptoHash],
        gas_used: u64,
    ) -> Result<(), ExecutionError> {
        if self.state_root_mismatch.load(Ordering::SeqCst) {
            return Err("invalid merkle root".into());
        }
        if receipts.len() != block.transactions.len() || gas_used != block.header.gas_used {
            return Err("invalid receipts".into());
        }
        Ok(())
    }
}

/// A validator registry whose answer is set by the test.
#[derive(Clone)]
pub(crate) struct StaticRegistry(Arc<Mutex<Result<Vec<Address>, String>>>);

impl StaticRegistry {
    pub(crate) fn new(validators: Vec<Address>) -> StaticRegistry {
        StaticRegistry(Arc::new(Mutex::new(Ok(validators))))
    }

    pub(crate) fn set_validators(&self, validators: Vec<Address>) {
        *self.0.lock().unwrap() = Ok(validators);
    }

    pub(crate) fn set_failing(&self, reason: &str) {
        *self.0.lock().unwrap() = Err(reason.to_string());
    }
}

impl ValidatorRegistry<CountingState> for StaticRegistry {
    fn validators_at(
        &self,
        _header: &Header,
        _state: &CountingState,
    ) -> Result<Vec<Address>, ExecutionError> {
        self.0.lock().unwrap().clone().map_err(Into::into)
    }
}
