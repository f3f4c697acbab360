//! LoopPreventer - drop-rule reconciliation against the spanning tree.
//!
//! The preventer derives the desired open/blocked state of every
//! inter-switch port from the current [`SpanningTree`](crate::spt::SpanningTree),
//! diffs it against its [`BlockLedger`] and emits the minimal set of
//! [`FlowAction`]s. Ledger entries move through
//! `Open -> PendingBlock -> Blocked -> PendingUnblock -> Open` as the flow
//! controller acknowledges each action.

mod action;
mod ledger;
mod preventer;

pub use action::{AckStatus, ActionKind, DropRule, FlowAck, FlowAction, DEFAULT_DROP_RULE_PRIORITY};
pub use ledger::{AckOutcome, BlockLedger, BlockState, LedgerEntry};
pub use preventer::{LoopPreventer, LoopPreventerConfig, ReconcilePlan};
