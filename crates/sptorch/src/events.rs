//! Topology events consumed by the control loop.

use serde::{Deserialize, Serialize};
use sonic_spt_types::{Endpoint, PortId, SwitchId};
use std::fmt;

/// A topology change reported by the event source.
///
/// Serialised as internally tagged JSON so that an event stream can be
/// recorded and replayed, one event per line:
///
/// ```json
/// {"type":"switch_up","switch":1,"ports":[1,2,65534]}
/// {"type":"link_up","a":{"switch":1,"port":1},"b":{"switch":2,"port":1}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TopologyEvent {
    /// Switch connected or re-sent its features.
    SwitchUp {
        switch: SwitchId,
        #[serde(default)]
        ports: Vec<PortId>,
    },
    SwitchDown {
        switch: SwitchId,
    },
    /// Link discovered between two ports.
    LinkUp {
        a: Endpoint,
        b: Endpoint,
    },
    /// Link between two ports lost.
    LinkDown {
        a: Endpoint,
        b: Endpoint,
    },
    PortUp {
        switch: SwitchId,
        port: PortId,
    },
    PortDown {
        switch: SwitchId,
        port: PortId,
    },
}

impl TopologyEvent {
    /// Short snake_case name of the variant.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SwitchUp { .. } => "switch_up",
            Self::SwitchDown { .. } => "switch_down",
            Self::LinkUp { .. } => "link_up",
            Self::LinkDown { .. } => "link_down",
            Self::PortUp { .. } => "port_up",
            Self::PortDown { .. } => "port_down",
        }
    }

    /// Parses one JSON-encoded event.
    pub fn from_json(line: &str) -> crate::Result<Self> {
        serde_json::from_str(line).map_err(|e| crate::SptError::Event(format!("{e}: {line}")))
    }

    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| crate::SptError::Event(e.to_string()))
    }
}

impl fmt::Display for TopologyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SwitchUp { switch, ports } => {
                write!(f, "switch_up {} ({} ports)", switch, ports.len())
            }
            Self::SwitchDown { switch } => write!(f, "switch_down {}", switch),
            Self::LinkUp { a, b } => write!(f, "link_up {} <--> {}", a, b),
            Self::LinkDown { a, b } => write!(f, "link_down {} <--> {}", a, b),
            Self::PortUp { switch, port } => write!(f, "port_up {}[{}]", switch, port),
            Self::PortDown { switch, port } => write!(f, "port_down {}[{}]", switch, port),
        }
    }
}
