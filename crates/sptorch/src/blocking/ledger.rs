//! Per-port block state ledger.

use super::action::{ActionKind, FlowAck};
use serde::Serialize;
use sonic_spt_types::{Endpoint, Generation};
use std::collections::BTreeMap;
use std::fmt;

/// Block state of one port as known to the loop preventer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockState {
    #[default]
    Open,
    Blocked,
    PendingBlock,
    PendingUnblock,
}

impl BlockState {
    /// Returns true while an action is outstanding.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::PendingBlock | Self::PendingUnblock)
    }

    /// Pending state entered when `kind` is emitted.
    pub fn pending_for(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Block => Self::PendingBlock,
            ActionKind::Unblock => Self::PendingUnblock,
        }
    }

    /// Action that the pending state is waiting on.
    pub fn pending_action(&self) -> Option<ActionKind> {
        match self {
            Self::PendingBlock => Some(ActionKind::Block),
            Self::PendingUnblock => Some(ActionKind::Unblock),
            Self::Open | Self::Blocked => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Blocked => "blocked",
            Self::PendingBlock => "pending_block",
            Self::PendingUnblock => "pending_unblock",
        }
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger entry of one port.
///
/// Consecutive emissions of the same action form a run. Any attempt of the
/// current run that is positively acknowledged proves the switch reached
/// the target state, whatever happened to the other attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerEntry {
    pub state: BlockState,
    /// Action of the current run, `None` before the first emission.
    pub action: Option<ActionKind>,
    /// State the port was in when the current run started.
    pub origin: BlockState,
    /// Generation of the last action emitted for the port.
    pub generation: Generation,
    /// Sequence of the first emission of the current run.
    pub first_sequence: u64,
    /// Sequence of the last emission.
    pub sequence: u64,
    /// Consecutive emissions of the current pending action.
    pub attempts: u32,
}

/// What an acknowledgment did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Positive ack moved the port to its target stable state.
    Applied(BlockState),
    /// Negative ack moved the port back to its originating stable state.
    Reverted(BlockState),
    /// Negative ack while the physical state is unknown: another attempt
    /// may still land, or the run interrupted an earlier one. The port stays
    /// pending so the next pass emits again.
    Retry,
    /// Ack of an emission superseded by a later one.
    Stale,
    /// Ack matches no outstanding action (duplicate, unknown port, wrong kind).
    Unexpected,
}

/// Block state of every port the preventer has acted on.
///
/// Ports without an entry are open. The ledger lives in memory only and
/// starts empty on every (re)start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockLedger {
    entries: BTreeMap<Endpoint, LedgerEntry>,
    /// Sequence handed to the last emission; never reset.
    last_sequence: u64,
}

impl BlockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a port.
    pub fn state(&self, end: Endpoint) -> BlockState {
        self.entries
            .get(&end)
            .map(|entry| entry.state)
            .unwrap_or_default()
    }

    pub fn entry(&self, end: Endpoint) -> Option<&LedgerEntry> {
        self.entries.get(&end)
    }

    /// Records that `kind` was emitted for the port in `generation` and
    /// returns the sequence number of the emission.
    pub fn mark_pending(&mut self, end: Endpoint, kind: ActionKind, generation: Generation) -> u64 {
        self.last_sequence += 1;
        let sequence = self.last_sequence;

        let entry = self.entries.entry(end).or_default();
        let pending = BlockState::pending_for(kind);
        if entry.state == pending {
            entry.attempts = entry.attempts.saturating_add(1);
        } else {
            entry.attempts = 1;
            entry.origin = entry.state;
            entry.first_sequence = sequence;
        }
        entry.state = pending;
        entry.action = Some(kind);
        entry.generation = generation;
        entry.sequence = sequence;
        sequence
    }

    /// Applies an acknowledgment from the flow controller.
    pub fn apply_ack(&mut self, ack: &FlowAck) -> AckOutcome {
        let Some(entry) = self.entries.get_mut(&ack.endpoint()) else {
            return AckOutcome::Unexpected;
        };
        let Some(action) = entry.action else {
            return AckOutcome::Unexpected;
        };
        if ack.sequence < entry.first_sequence {
            return AckOutcome::Stale;
        }
        if ack.sequence > entry.sequence || ack.action != action {
            return AckOutcome::Unexpected;
        }

        let target = match action {
            ActionKind::Block => BlockState::Blocked,
            ActionKind::Unblock => BlockState::Open,
        };
        if ack.is_ok() {
            if entry.state == target {
                return AckOutcome::Unexpected;
            }
            entry.state = target;
            entry.attempts = 0;
            AckOutcome::Applied(target)
        } else {
            // A failed attempt says nothing once it has been retried.
            if ack.sequence != entry.sequence {
                return AckOutcome::Stale;
            }
            if entry.state != BlockState::pending_for(action) {
                return AckOutcome::Unexpected;
            }
            if entry.first_sequence != entry.sequence || entry.origin.is_pending() {
                return AckOutcome::Retry;
            }
            entry.state = entry.origin;
            entry.attempts = 0;
            AckOutcome::Reverted(entry.origin)
        }
    }

    /// Drops the entries `keep` rejects and returns their ports.
    pub fn purge(&mut self, keep: impl Fn(Endpoint, &LedgerEntry) -> bool) -> Vec<Endpoint> {
        let gone: Vec<Endpoint> = self
            .entries
            .iter()
            .filter(|(end, entry)| !keep(**end, entry))
            .map(|(end, _)| *end)
            .collect();
        for end in &gone {
            self.entries.remove(end);
        }
        gone
    }

    /// Ports whose drop rule is installed or being installed.
    pub fn blocked_ports(&self) -> impl Iterator<Item = Endpoint> + '_ {
        self.entries
            .iter()
            .filter(|(_, entry)| matches!(entry.state, BlockState::Blocked | BlockState::PendingBlock))
            .map(|(end, _)| *end)
    }

    /// Ports with an outstanding action.
    pub fn pending_ports(&self) -> impl Iterator<Item = (Endpoint, BlockState)> + '_ {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.state.is_pending())
            .map(|(end, entry)| (*end, entry.state))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Endpoint, &LedgerEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forgets every entry. Sequence numbers keep counting so that acks of
    /// earlier emissions stay recognisable.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
