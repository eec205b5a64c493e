use std::sync::{Arc, Mutex};

use istanbul_rs::{engine::CoreEngine, types::data_types::Address};

/// What the backend asked a [`RecordingCore`] to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum CoreCall {
    SetAddress(Address),
    Start,
    Stop,
}

/// A core engine stub that records the lifecycle calls made on it. Clones share the same records.
#[derive(Clone, Default)]
pub(crate) struct RecordingCore(Arc<Mutex<Vec<CoreCall>>>);

impl RecordingCore {
    pub(crate) fn calls(&self) -> Vec<CoreCall> {
        self.0.lock().unwrap().clone()
    }
}

impl CoreEngine for RecordingCore {
    fn set_address(&self, address: Address) {
        self.0.lock().unwrap().push(CoreCall::SetAddress(address));
    }

    fn start(&self) {
        self.0.lock().unwrap().push(CoreCall::Start);
    }

    fn stop(&self) {
        self.0.lock().unwrap().push(CoreCall::Stop);
    }
}
