//! Latest-state store shared between the state update path and the control tick.
//!
//! Each update replaces the whole snapshot with a single pointer swap, so a
//! tick sees either the previous state or the new one, never a mix.

use crate::error::StateError;
use crate::types::{ControllerStateMsg, JointState};
use arc_swap::ArcSwapOption;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A state snapshot together with its update sequence number.
#[derive(Debug)]
pub struct StateUpdate {
    pub seq: u64,
    pub state: JointState,
}

#[derive(Debug, Default)]
struct Shared {
    current: ArcSwapOption<StateUpdate>,
    next_seq: AtomicU64,
}

/// Create a connected writer/reader pair with no state yet.
pub fn state_snapshot() -> (StateWriter, StateReader) {
    let shared = Arc::new(Shared::default());
    (
        StateWriter {
            shared: Arc::clone(&shared),
        },
        StateReader { shared },
    )
}

#[derive(Debug, Clone)]
pub struct StateWriter {
    shared: Arc<Shared>,
}

impl StateWriter {
    /// Replace the snapshot. Returns the sequence number of the new snapshot.
    pub fn replace(&self, state: JointState) -> u64 {
        let seq = self.shared.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        self.shared
            .current
            .store(Some(Arc::new(StateUpdate { seq, state })));
        seq
    }

    pub fn apply_message(&self, msg: &ControllerStateMsg) -> Result<u64, StateError> {
        let state = JointState::from_message(msg)?;
        Ok(self.replace(state))
    }
}

#[derive(Debug, Clone)]
pub struct StateReader {
    shared: Arc<Shared>,
}

impl StateReader {
    /// The most recent snapshot, or `None` before the first update.
    pub fn load(&self) -> Option<Arc<StateUpdate>> {
        self.shared.current.load_full()
    }
}
