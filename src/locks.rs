//! Per-loan exclusive sections
//!
//! Every read-check-write cycle on a loan runs while holding that loan's slot.
//! Slots are created on demand and dropped from the registry once nobody
//! holds them, so unrelated loans never wait on each other.
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

// registry size at which idle slots are swept
const PRUNE_THRESHOLD: usize = 64;

pub type LoanSlot = Arc<Mutex<()>>;

#[derive(Debug, Default)]
pub struct LoanLocks {
    slots: Mutex<HashMap<String, LoanSlot>>,
}

impl LoanLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot guarding `loan_id`. Callers lock it for the duration of their cycle:
    ///
    /// ```ignore
    /// let slot = locks.slot(loan_id);
    /// let _guard = slot.lock();
    /// ```
    pub fn slot(&self, loan_id: &str) -> LoanSlot {
        let mut slots = self.slots.lock();
        if slots.len() >= PRUNE_THRESHOLD {
            // only the registry holds these, nobody can be inside them
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        }
        slots.entry(loan_id.to_owned()).or_default().clone()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}
