//! Topology store mutations.

use super::snapshot::TopologySnapshot;
use super::types::{PortRecord, Switch};
use crate::error::TopologyError;
use sonic_spt_types::{Endpoint, PortId, SwitchId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Default ceiling on the number of switches the store accepts.
pub const DEFAULT_MAX_SWITCHES: usize = 1024;

/// Outcome of a store mutation: `Ok(true)` if the graph changed,
/// `Ok(false)` for an idempotent no-op.
pub type TopologyResult = Result<bool, TopologyError>;

/// Owner of the switch graph and every port record.
///
/// Links are stored as symmetric neighbor fields on the two port records;
/// a port has at most one neighbor and a link never joins a switch to itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyStore {
    switches: BTreeMap<SwitchId, Switch>,
    max_switches: usize,
}

impl Default for TopologyStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SWITCHES)
    }
}

impl TopologyStore {
    /// Creates an empty store accepting at most `max_switches` switches.
    pub fn new(max_switches: usize) -> Self {
        Self {
            switches: BTreeMap::new(),
            max_switches,
        }
    }

    /// Creates the switch, or replaces the port set of an existing one.
    ///
    /// Ports that survive a replacement keep their neighbor and block state.
    /// Ports that disappear take their links with them. Reserved
    /// pseudo-ports are ignored.
    pub fn add_switch(
        &mut self,
        id: SwitchId,
        ports: impl IntoIterator<Item = PortId>,
    ) -> TopologyResult {
        let wanted: BTreeSet<PortId> = ports.into_iter().filter(PortId::is_physical).collect();

        let Some(existing) = self.switches.get(&id) else {
            if self.switches.len() >= self.max_switches {
                return Err(TopologyError::SwitchLimitExceeded {
                    switch: id,
                    limit: self.max_switches,
                });
            }
            self.switches.insert(id, Switch::new(id, wanted));
            return Ok(true);
        };

        let stale: Vec<PortId> = existing
            .ports
            .keys()
            .filter(|port| !wanted.contains(port))
            .copied()
            .collect();
        let fresh: Vec<PortId> = wanted
            .iter()
            .filter(|port| !existing.ports.contains_key(port))
            .copied()
            .collect();

        for port in &stale {
            self.detach(Endpoint::new(id, *port));
        }
        if let Some(switch) = self.switches.get_mut(&id) {
            for port in &stale {
                switch.ports.remove(port);
            }
            for port in &fresh {
                switch.ports.insert(*port, PortRecord::default());
            }
        }

        if !stale.is_empty() || !fresh.is_empty() {
            debug!(switch = %id, removed = stale.len(), added = fresh.len(), "Replaced switch port set");
        }
        Ok(!stale.is_empty() || !fresh.is_empty())
    }

    /// Deletes the switch with all its ports and incident links.
    pub fn remove_switch(&mut self, id: SwitchId) -> TopologyResult {
        let Some(switch) = self.switches.remove(&id) else {
            return Ok(false);
        };

        for (port, peer) in switch.inter_switch_ports() {
            let own = Endpoint::new(id, port);
            if let Some(record) = self.record_mut(peer) {
                if record.neighbor == Some(own) {
                    record.neighbor = None;
                }
            }
        }
        Ok(true)
    }

    /// Records a link between two ports, on both sides.
    ///
    /// Any other link previously recorded on either port is cleared first.
    pub fn set_link(&mut self, a: Endpoint, b: Endpoint) -> TopologyResult {
        if a.switch == b.switch {
            return Err(TopologyError::SelfLoop(a.switch));
        }
        let a_record = self.record(a)?;
        let b_record = self.record(b)?;
        if a_record.neighbor == Some(b) && b_record.neighbor == Some(a) {
            return Ok(false);
        }

        self.detach(a);
        self.detach(b);
        if let Some(record) = self.record_mut(a) {
            record.neighbor = Some(b);
        }
        if let Some(record) = self.record_mut(b) {
            record.neighbor = Some(a);
        }
        Ok(true)
    }

    /// Clears the link on `end` and on its recorded neighbor.
    pub fn clear_link(&mut self, end: Endpoint) -> TopologyResult {
        self.record(end)?;
        Ok(self.detach(end).is_some())
    }

    /// Adds a port record to an existing switch.
    pub fn add_port(&mut self, switch: SwitchId, port: PortId) -> TopologyResult {
        if !port.is_physical() {
            return Err(TopologyError::UnknownPort { switch, port });
        }
        let sw = self
            .switches
            .get_mut(&switch)
            .ok_or(TopologyError::UnknownSwitch(switch))?;
        if sw.ports.contains_key(&port) {
            return Ok(false);
        }
        sw.ports.insert(port, PortRecord::default());
        Ok(true)
    }

    /// Removes a port record, clearing any link through it.
    pub fn remove_port(&mut self, switch: SwitchId, port: PortId) -> TopologyResult {
        let end = Endpoint::new(switch, port);
        self.record(end)?;
        self.detach(end);
        if let Some(sw) = self.switches.get_mut(&switch) {
            sw.ports.remove(&port);
        }
        Ok(true)
    }

    /// Mirrors the acknowledged physical block state of a port.
    pub fn set_port_blocked(&mut self, end: Endpoint, blocked: bool) -> TopologyResult {
        let changed = self.record(end)?.blocked != blocked;
        if let Some(record) = self.record_mut(end) {
            record.blocked = blocked;
        }
        Ok(changed)
    }

    /// Returns the recorded neighbor of a port.
    pub fn neighbor(&self, end: Endpoint) -> Option<Endpoint> {
        self.record(end).ok().and_then(|record| record.neighbor)
    }

    /// Returns the record of a port.
    pub fn port(&self, end: Endpoint) -> Option<&PortRecord> {
        self.switches.get(&end.switch)?.ports.get(&end.port)
    }

    /// Returns a switch.
    pub fn switch(&self, id: SwitchId) -> Option<&Switch> {
        self.switches.get(&id)
    }

    /// Returns true if the switch is present.
    pub fn contains_switch(&self, id: SwitchId) -> bool {
        self.switches.contains_key(&id)
    }

    /// Number of switches in the store.
    pub fn switch_count(&self) -> usize {
        self.switches.len()
    }

    /// Configured switch ceiling.
    pub fn max_switches(&self) -> usize {
        self.max_switches
    }

    /// Returns an immutable view of the current graph.
    pub fn snapshot(&self) -> TopologySnapshot<'_> {
        TopologySnapshot::new(&self.switches)
    }

    /// Renders one line per switch with its port to neighbor mappings.
    pub fn dump(&self) -> Vec<String> {
        self.switches
            .values()
            .map(|switch| {
                let ports: Vec<String> = switch
                    .ports
                    .iter()
                    .map(|(port, record)| {
                        let peer = record
                            .neighbor
                            .map_or_else(|| "unknown".to_string(), |peer| peer.to_string());
                        let flag = if record.blocked { " (blocked)" } else { "" };
                        format!("port {port}: {peer}{flag}")
                    })
                    .collect();
                format!("Switch {}: {}", switch.id, ports.join(", "))
            })
            .collect()
    }

    fn record(&self, end: Endpoint) -> Result<&PortRecord, TopologyError> {
        let switch = self
            .switches
            .get(&end.switch)
            .ok_or(TopologyError::UnknownSwitch(end.switch))?;
        switch.ports.get(&end.port).ok_or(TopologyError::UnknownPort {
            switch: end.switch,
            port: end.port,
        })
    }

    fn record_mut(&mut self, end: Endpoint) -> Option<&mut PortRecord> {
        self.switches.get_mut(&end.switch)?.ports.get_mut(&end.port)
    }

    /// Takes the neighbor off `end` and clears the back reference on the peer.
    fn detach(&mut self, end: Endpoint) -> Option<Endpoint> {
        let peer = self.record_mut(end)?.neighbor.take()?;
        if let Some(record) = self.record_mut(peer) {
            if record.neighbor == Some(end) {
                record.neighbor = None;
            }
        }
        Some(peer)
    }
}
