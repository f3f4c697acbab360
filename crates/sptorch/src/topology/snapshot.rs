//! Read-only view of the topology graph.

use super::types::{PortRecord, Switch};
use sonic_spt_types::{Endpoint, Link, PortId, SwitchId};
use std::collections::{BTreeMap, BTreeSet};

/// Immutable view of the store, handed to root selection, tree computation
/// and reconciliation for one pass.
#[derive(Debug, Clone, Copy)]
pub struct TopologySnapshot<'a> {
    switches: &'a BTreeMap<SwitchId, Switch>,
}

impl<'a> TopologySnapshot<'a> {
    pub(crate) fn new(switches: &'a BTreeMap<SwitchId, Switch>) -> Self {
        Self { switches }
    }

    /// Switch ids in ascending order.
    pub fn switch_ids(&self) -> impl Iterator<Item = SwitchId> + 'a {
        self.switches.keys().copied()
    }

    /// Returns the switch, if present.
    pub fn switch(&self, id: SwitchId) -> Option<&'a Switch> {
        self.switches.get(&id)
    }

    /// Returns every switch in ascending id order.
    pub fn switches(&self) -> impl Iterator<Item = &'a Switch> + 'a {
        self.switches.values()
    }

    /// Returns true if the switch is present.
    pub fn contains(&self, id: SwitchId) -> bool {
        self.switches.contains_key(&id)
    }

    /// Returns the record of a port.
    pub fn port(&self, end: Endpoint) -> Option<&'a PortRecord> {
        self.switches.get(&end.switch)?.ports.get(&end.port)
    }

    pub fn len(&self) -> usize {
        self.switches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
    }

    /// Neighbor switches of `id`, ascending and without duplicates.
    pub fn neighbors(&self, id: SwitchId) -> BTreeSet<SwitchId> {
        self.switches
            .get(&id)
            .map(|switch| {
                switch
                    .inter_switch_ports()
                    .map(|(_, peer)| peer.switch)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Lowest-numbered port on `from` that leads to `to`, with the peer port.
    pub fn port_towards(&self, from: SwitchId, to: SwitchId) -> Option<(PortId, PortId)> {
        self.switches
            .get(&from)?
            .inter_switch_ports()
            .find(|(_, peer)| peer.switch == to)
            .map(|(port, peer)| (port, peer.port))
    }

    /// Every link in the graph, each reported once.
    pub fn links(&self) -> BTreeSet<Link> {
        self.switches
            .values()
            .flat_map(|switch| {
                switch
                    .inter_switch_ports()
                    .map(move |(port, peer)| Link::new(Endpoint::new(switch.id, port), peer))
            })
            .collect()
    }
}
