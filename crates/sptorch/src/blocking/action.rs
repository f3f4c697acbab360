//! Drop-rule actions and their acknowledgments.

use serde::{Deserialize, Serialize};
use sonic_spt_types::{Endpoint, Generation, PortId, SwitchId};
use std::fmt;

/// Flow priority of loop-prevention drop rules.
pub const DEFAULT_DROP_RULE_PRIORITY: u16 = 65000;

/// Direction of a block state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Install a drop rule matching all traffic entering the port.
    Block,
    /// Remove the drop rule from the port.
    Unblock,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Unblock => "unblock",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A drop rule on one switch port, tagged with the generation that produced it.
///
/// `sequence` numbers every emission, so a retry within one generation can
/// be told apart from the attempt it repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropRule {
    pub switch: SwitchId,
    pub port: PortId,
    pub generation: Generation,
    pub sequence: u64,
    pub priority: u16,
}

impl DropRule {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.switch, self.port)
    }
}

/// Action handed to the flow controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowAction {
    pub kind: ActionKind,
    pub rule: DropRule,
}

impl FlowAction {
    /// Acknowledgment that reports this action as applied.
    pub fn ack_ok(&self) -> FlowAck {
        FlowAck {
            switch: self.rule.switch,
            port: self.rule.port,
            generation: self.rule.generation,
            sequence: self.rule.sequence,
            action: self.kind,
            status: AckStatus::Ok,
        }
    }

    /// Acknowledgment that reports this action as failed.
    pub fn ack_failed(&self, reason: impl Into<String>) -> FlowAck {
        FlowAck {
            status: AckStatus::Failed {
                reason: reason.into(),
            },
            ..self.ack_ok()
        }
    }
}

impl fmt::Display for FlowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}[{}] ({}#{})",
            self.kind, self.rule.switch, self.rule.port, self.rule.generation, self.rule.sequence
        )
    }
}

/// Result reported by the flow controller for an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AckStatus {
    Ok,
    Failed { reason: String },
}

/// Out-of-band acknowledgment of a [`FlowAction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowAck {
    pub switch: SwitchId,
    pub port: PortId,
    pub generation: Generation,
    pub sequence: u64,
    pub action: ActionKind,
    #[serde(flatten)]
    pub status: AckStatus,
}

impl FlowAck {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.switch, self.port)
    }

    pub fn is_ok(&self) -> bool {
        self.status == AckStatus::Ok
    }
}
