//! Spanning-tree loop guard for SONiC-managed OpenFlow fabrics.
//!
//! sptorchd keeps a live view of switch connectivity, elects the switch with
//! the lowest datapath id as root, computes a breadth-first spanning tree
//! towards it and installs drop rules on every inter-switch port that would
//! otherwise close a loop.
//!
//! # Architecture
//!
//! ```text
//! TopologyEvent ──▶ TopologyStore ──▶ select_root ──▶ compute_tree ──▶ LoopPreventer
//!                    (mutation)        (min id)        (BFS)           (ledger diff)
//!                                                                           │
//!        FlowAck ◀──────────────── FlowController ◀──── FlowAction ◀────────┘
//! ```
//!
//! Events are processed one at a time by [`SptOrch`]. Every recomputation
//! bumps the topology [`Generation`](sonic_spt_types::Generation); drop-rule
//! actions carry it so that acknowledgments overtaken by a later
//! recomputation are discarded.
//!
//! Switches without a path to the root keep all their ports open, and so
//! does every port when the topology is empty.

pub mod audit;
pub mod blocking;
pub mod config;
pub mod daemon;
pub mod error;
pub mod events;
pub mod orch;
pub mod spt;
pub mod topology;

pub use audit::{
    init_logging, init_logging_pretty, DiagnosticCategory, DiagnosticOutcome, DiagnosticRecord,
    DiagnosticsSink, TracingSink,
};
pub use blocking::{
    AckOutcome, AckStatus, ActionKind, BlockLedger, BlockState, DropRule, FlowAck, FlowAction,
    LoopPreventer, LoopPreventerConfig, ReconcilePlan,
};
pub use config::{SptConfig, DEFAULT_CONFIG_PATH};
pub use daemon::{
    ChannelEventSource, LoopbackFlowController, ReplayEventSource, SptDaemon, TopologyEventSource,
};
pub use error::{FlowControllerError, Result, SptError, TopologyError};
pub use events::TopologyEvent;
pub use orch::{EventOutcome, FlowController, SptOrch, SptOrchConfig, SptOrchStats};
pub use spt::{compute_tree, select_root, SpanningTree, TreeEntry};
pub use topology::{PortRecord, Switch, TopologySnapshot, TopologyStore};
