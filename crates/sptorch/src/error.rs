//! Error types for the spanning-tree loop guard.
//!
//! None of these terminate the control loop: topology errors drop the
//! offending event, flow controller errors leave the ledger entry pending
//! for the next reconciliation pass.

use sonic_spt_types::{PortId, SwitchId};
use thiserror::Error;

/// Invalid references or invariant violations detected by the topology store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// Event references a switch that is not in the store.
    #[error("Unknown switch: {0}")]
    UnknownSwitch(SwitchId),

    /// Event references a port that is not on the switch.
    #[error("Unknown port {port} on switch {switch}")]
    UnknownPort { switch: SwitchId, port: PortId },

    /// Both ends of a link sit on the same switch.
    #[error("Self-loop link on switch {0}")]
    SelfLoop(SwitchId),

    /// Adding the switch would exceed the configured ceiling.
    #[error("Switch limit of {limit} reached, refusing {switch}")]
    SwitchLimitExceeded { switch: SwitchId, limit: usize },
}

impl TopologyError {
    /// Returns true for the `UnknownEntity` class of conditions.
    pub fn is_unknown_entity(&self) -> bool {
        matches!(self, Self::UnknownSwitch(_) | Self::UnknownPort { .. })
    }
}

/// Failure reported synchronously by the flow controller when submitting an action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowControllerError {
    #[error("Switch {0} not connected")]
    NotConnected(SwitchId),

    #[error("Send failed: {0}")]
    SendFailed(String),
}

/// Top-level error type.
#[derive(Debug, Error)]
pub enum SptError {
    /// The store holds no switches, so there is nothing to elect.
    #[error("No root available: topology is empty")]
    NoRootAvailable,

    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("Flow controller error: {0}")]
    FlowController(#[from] FlowControllerError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid event: {0}")]
    Event(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for loop guard operations.
pub type Result<T> = std::result::Result<T, SptError>;
