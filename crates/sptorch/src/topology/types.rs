//! Switch and port records.

use sonic_spt_types::{Endpoint, PortId, SwitchId};
use std::collections::BTreeMap;

/// Per-port state kept by the topology store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortRecord {
    /// Far end of the link on this port, `None` while unresolved or host-facing.
    pub neighbor: Option<Endpoint>,
    /// Physical block state as last acknowledged by the flow controller.
    pub blocked: bool,
}

impl PortRecord {
    /// Returns true if the port leads to another switch.
    pub fn is_inter_switch(&self) -> bool {
        self.neighbor.is_some()
    }
}

/// A switch and its ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Switch {
    pub id: SwitchId,
    pub ports: BTreeMap<PortId, PortRecord>,
}

impl Switch {
    /// Creates a switch with the given ports, all unresolved and open.
    pub fn new(id: SwitchId, ports: impl IntoIterator<Item = PortId>) -> Self {
        Self {
            id,
            ports: ports
                .into_iter()
                .map(|port| (port, PortRecord::default()))
                .collect(),
        }
    }

    /// Returns the inter-switch ports in ascending port order.
    pub fn inter_switch_ports(&self) -> impl Iterator<Item = (PortId, Endpoint)> + '_ {
        self.ports
            .iter()
            .filter_map(|(port, record)| record.neighbor.map(|peer| (*port, peer)))
    }

    /// Number of ports on the switch.
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }
}
