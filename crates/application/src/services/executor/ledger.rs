//! Live fault ledger
//!
//! Owned by the coordinating task. Chains report handle creation and
//! settlement over a channel; nothing else touches the live set.

use std::collections::HashMap;

use domain::FaultHandle;
use uuid::Uuid;

/// Message from a chain task to the coordinator
#[derive(Debug)]
pub(super) enum LedgerEvent {
    /// A reversible fault is now live
    Applied {
        handle: FaultHandle,
        chain: String,
        record: usize,
    },
    /// The owning chain attempted the revert, successfully or not
    Settled { id: Uuid },
}

/// A handle still owed a revert, with where its record lives
#[derive(Debug)]
pub(super) struct LiveFault {
    pub handle: FaultHandle,
    pub chain: String,
    pub record: usize,
    sequence: u64,
}

#[derive(Debug, Default)]
pub(super) struct FaultLedger {
    live: HashMap<Uuid, LiveFault>,
    next_sequence: u64,
    created: usize,
    revert_attempts: usize,
}

impl FaultLedger {
    pub fn record(&mut self, event: LedgerEvent) {
        match event {
            LedgerEvent::Applied {
                handle,
                chain,
                record,
            } => {
                self.created += 1;
                let sequence = self.next_sequence;
                self.next_sequence += 1;
                self.live.insert(
                    handle.id,
                    LiveFault {
                        handle,
                        chain,
                        record,
                        sequence,
                    },
                );
            },
            LedgerEvent::Settled { id } => {
                if self.live.remove(&id).is_some() {
                    self.revert_attempts += 1;
                }
            },
        }
    }

    /// Take every outstanding handle, most recently applied first
    pub fn drain_newest_first(&mut self) -> Vec<LiveFault> {
        let mut outstanding: Vec<LiveFault> = self.live.drain().map(|(_, live)| live).collect();
        outstanding.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        outstanding
    }

    /// Count a revert issued by the coordinator itself
    pub fn note_revert_attempt(&mut self) {
        self.revert_attempts += 1;
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub const fn created(&self) -> usize {
        self.created
    }

    pub const fn revert_attempts(&self) -> usize {
        self.revert_attempts
    }
}
