//! Desired block state and reconciliation.

use super::action::{ActionKind, DropRule, FlowAck, FlowAction, DEFAULT_DROP_RULE_PRIORITY};
use super::ledger::{AckOutcome, BlockLedger, BlockState};
use crate::spt::SpanningTree;
use crate::topology::TopologySnapshot;
use sonic_spt_types::{Endpoint, Generation};
use std::collections::BTreeSet;

/// LoopPreventer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopPreventerConfig {
    /// Flow priority of installed drop rules.
    pub drop_rule_priority: u16,
    /// Keep the peer side of tree edges open on non-root switches.
    ///
    /// Off by default: a reachable non-root switch then keeps only its
    /// uplink open, which also blocks its ports toward its own tree
    /// children. In a chain s1 - s2 - s3 the leaf s3 is cut off from the
    /// root. Turn this on to keep every tree edge open on both ends.
    pub open_tree_downlinks: bool,
}

impl Default for LoopPreventerConfig {
    fn default() -> Self {
        Self {
            drop_rule_priority: DEFAULT_DROP_RULE_PRIORITY,
            open_tree_downlinks: false,
        }
    }
}

/// Output of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Actions to hand to the flow controller, in port order.
    pub actions: Vec<FlowAction>,
    /// Ports whose pending action had not been acknowledged and was re-emitted.
    pub retried: Vec<Endpoint>,
    /// Ledger entries dropped because the port no longer exists.
    pub purged: Vec<Endpoint>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.retried.is_empty() && self.purged.is_empty()
    }
}

/// Diffs the spanning tree against the block ledger.
#[derive(Debug, Clone, Default)]
pub struct LoopPreventer {
    config: LoopPreventerConfig,
    ledger: BlockLedger,
}

impl LoopPreventer {
    pub fn new(config: LoopPreventerConfig) -> Self {
        Self {
            config,
            ledger: BlockLedger::new(),
        }
    }

    pub fn config(&self) -> &LoopPreventerConfig {
        &self.config
    }

    pub fn ledger(&self) -> &BlockLedger {
        &self.ledger
    }

    /// Inter-switch ports that should carry a drop rule.
    ///
    /// Only reachable non-root switches block anything: every inter-switch
    /// port other than the uplink is blocked. The root, isolated switches and
    /// host-facing ports stay open. Without a tree nothing is blocked.
    pub fn desired_blocked(
        &self,
        snapshot: &TopologySnapshot<'_>,
        tree: Option<&SpanningTree>,
    ) -> BTreeSet<Endpoint> {
        let Some(tree) = tree else {
            return BTreeSet::new();
        };
        let downlinks = if self.config.open_tree_downlinks {
            tree.downlinks()
        } else {
            Default::default()
        };

        let mut blocked = BTreeSet::new();
        for switch in snapshot.switches() {
            let Some(entry) = tree.entry(switch.id) else {
                // Root or isolated
                continue;
            };
            let children = downlinks.get(&switch.id);
            for (port, _) in switch.inter_switch_ports() {
                if port == entry.port || children.is_some_and(|ports| ports.contains(&port)) {
                    continue;
                }
                blocked.insert(Endpoint::new(switch.id, port));
            }
        }
        blocked
    }

    /// Reconciles the ledger against the desired state and returns the
    /// actions to emit, tagged with `generation`.
    ///
    /// Every emitted action moves its ledger entry to the matching pending
    /// state. A port still pending from an earlier pass gets its action
    /// emitted again.
    ///
    /// Entries of removed switches are dropped silently. A port that went
    /// away on a switch still present may keep its drop rule, so it gets an
    /// unblock until the ledger holds it open; only then is it dropped.
    pub fn reconcile(
        &mut self,
        snapshot: &TopologySnapshot<'_>,
        tree: Option<&SpanningTree>,
        generation: Generation,
    ) -> ReconcilePlan {
        let mut plan = ReconcilePlan {
            purged: self.ledger.purge(|end, entry| {
                snapshot.port(end).is_some()
                    || (snapshot.contains(end.switch) && entry.state != BlockState::Open)
            }),
            ..Default::default()
        };
        let desired = self.desired_blocked(snapshot, tree);

        for switch in snapshot.switches() {
            for port in switch.ports.keys() {
                let end = Endpoint::new(switch.id, *port);
                self.reconcile_port(&mut plan, end, desired.contains(&end), generation);
            }
        }

        let vanished: Vec<Endpoint> = self
            .ledger
            .iter()
            .map(|(end, _)| *end)
            .filter(|end| snapshot.port(*end).is_none())
            .collect();
        for end in vanished {
            self.reconcile_port(&mut plan, end, false, generation);
        }
        plan
    }

    fn reconcile_port(
        &mut self,
        plan: &mut ReconcilePlan,
        end: Endpoint,
        want_blocked: bool,
        generation: Generation,
    ) {
        let kind = match (self.ledger.state(end), want_blocked) {
            (BlockState::Open, true) => ActionKind::Block,
            (BlockState::Blocked, false) => ActionKind::Unblock,
            (BlockState::PendingBlock, true) => {
                plan.retried.push(end);
                ActionKind::Block
            }
            (BlockState::PendingBlock, false) => ActionKind::Unblock,
            (BlockState::PendingUnblock, false) => {
                plan.retried.push(end);
                ActionKind::Unblock
            }
            (BlockState::PendingUnblock, true) => ActionKind::Block,
            (BlockState::Open, false) | (BlockState::Blocked, true) => return,
        };

        let sequence = self.ledger.mark_pending(end, kind, generation);
        plan.actions.push(FlowAction {
            kind,
            rule: DropRule {
                switch: end.switch,
                port: end.port,
                generation,
                sequence,
                priority: self.config.drop_rule_priority,
            },
        });
    }

    /// Applies a flow controller acknowledgment to the ledger.
    pub fn handle_ack(&mut self, ack: &FlowAck) -> AckOutcome {
        self.ledger.apply_ack(ack)
    }

    /// Forgets all block state.
    pub fn reset(&mut self) {
        self.ledger.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spt::{compute_tree, select_root};
    use crate::topology::TopologyStore;
    use pretty_assertions::assert_eq;
    use sonic_spt_types::{PortId, SwitchId};

    fn sw(id: u64) -> SwitchId {
        SwitchId::new(id)
    }

    fn ep(id: u64, port: u16) -> Endpoint {
        Endpoint::new(sw(id), PortId::new(port))
    }

    fn ports(list: &[u16]) -> Vec<PortId> {
        list.iter().copied().map(PortId::new).collect()
    }

    /// s1 - s2 - s3 in a line, plus s1 - s3 closing a triangle.
    fn triangle() -> TopologyStore {
        let mut store = TopologyStore::default();
        store.add_switch(sw(1), ports(&[1, 2, 3])).unwrap();
        store.add_switch(sw(2), ports(&[1, 2, 3])).unwrap();
        store.add_switch(sw(3), ports(&[1, 2, 3])).unwrap();
        store.set_link(ep(1, 1), ep(2, 1)).unwrap();
        store.set_link(ep(1, 2), ep(3, 1)).unwrap();
        store.set_link(ep(2, 2), ep(3, 2)).unwrap();
        store
    }

    fn tree_of(store: &TopologyStore, generation: u64) -> SpanningTree {
        let snapshot = store.snapshot();
        let root = select_root(&snapshot).unwrap();
        compute_tree(&snapshot, root, Generation::new(generation))
    }

    fn ack_all(preventer: &mut LoopPreventer, plan: &ReconcilePlan) {
        for action in &plan.actions {
            preventer.handle_ack(&action.ack_ok());
        }
    }

    #[test]
    fn test_desired_state_triangle() {
        let store = triangle();
        let tree = tree_of(&store, 1);
        let preventer = LoopPreventer::default();

        let desired = preventer.desired_blocked(&store.snapshot(), Some(&tree));
        assert_eq!(desired, BTreeSet::from([ep(2, 2), ep(3, 2)]));
    }

    #[test]
    fn test_no_tree_blocks_nothing() {
        let store = triangle();
        let preventer = LoopPreventer::default();
        assert!(preventer.desired_blocked(&store.snapshot(), None).is_empty());
    }

    #[test]
    fn test_open_tree_downlinks() {
        // s1 - s2 - s3 chain with an extra s2 - s3 parallel link
        let mut store = TopologyStore::default();
        store.add_switch(sw(1), ports(&[1])).unwrap();
        store.add_switch(sw(2), ports(&[1, 2, 3])).unwrap();
        store.add_switch(sw(3), ports(&[1, 2])).unwrap();
        store.set_link(ep(1, 1), ep(2, 1)).unwrap();
        store.set_link(ep(2, 2), ep(3, 1)).unwrap();
        store.set_link(ep(2, 3), ep(3, 2)).unwrap();
        let tree = tree_of(&store, 1);

        let strict = LoopPreventer::default();
        assert_eq!(
            strict.desired_blocked(&store.snapshot(), Some(&tree)),
            BTreeSet::from([ep(2, 2), ep(2, 3), ep(3, 2)])
        );

        let relaxed = LoopPreventer::new(LoopPreventerConfig {
            open_tree_downlinks: true,
            ..Default::default()
        });
        assert_eq!(
            relaxed.desired_blocked(&store.snapshot(), Some(&tree)),
            BTreeSet::from([ep(2, 3), ep(3, 2)])
        );
    }

    #[test]
    fn test_reconcile_emits_blocks_then_idempotent() {
        let store = triangle();
        let tree = tree_of(&store, 1);
        let mut preventer = LoopPreventer::default();

        let plan = preventer.reconcile(&store.snapshot(), Some(&tree), Generation::new(1));
        assert_eq!(plan.actions.len(), 2);
        assert!(plan.actions.iter().all(|a| a.kind == ActionKind::Block));
        assert_eq!(plan.actions[0].rule.priority, DEFAULT_DROP_RULE_PRIORITY);
        assert_eq!(plan.actions[0].rule.generation, Generation::new(1));
        assert_eq!(preventer.ledger().state(ep(2, 2)), BlockState::PendingBlock);

        ack_all(&mut preventer, &plan);
        assert_eq!(preventer.ledger().state(ep(2, 2)), BlockState::Blocked);

        let again = preventer.reconcile(&store.snapshot(), Some(&tree), Generation::new(1));
        assert!(again.is_empty());
    }

    #[test]
    fn test_unacknowledged_action_is_retried() {
        let store = triangle();
        let tree = tree_of(&store, 1);
        let mut preventer = LoopPreventer::default();

        preventer.reconcile(&store.snapshot(), Some(&tree), Generation::new(1));
        let retry = preventer.reconcile(&store.snapshot(), Some(&tree), Generation::new(1));
        assert_eq!(retry.retried, vec![ep(2, 2), ep(3, 2)]);
        assert_eq!(retry.actions.len(), 2);
        assert_eq!(preventer.ledger().entry(ep(2, 2)).unwrap().attempts, 2);
    }

    #[test]
    fn test_link_removal_unblocks() {
        let mut store = triangle();
        let mut preventer = LoopPreventer::default();
        let tree = tree_of(&store, 1);
        let plan = preventer.reconcile(&store.snapshot(), Some(&tree), Generation::new(1));
        ack_all(&mut preventer, &plan);

        store.clear_link(ep(2, 2)).unwrap();
        let tree = tree_of(&store, 2);
        let plan = preventer.reconcile(&store.snapshot(), Some(&tree), Generation::new(2));
        assert_eq!(
            plan.actions
                .iter()
                .map(|a| (a.kind, a.rule.endpoint()))
                .collect::<Vec<_>>(),
            vec![(ActionKind::Unblock, ep(2, 2)), (ActionKind::Unblock, ep(3, 2))]
        );
        assert_eq!(preventer.ledger().state(ep(3, 2)), BlockState::PendingUnblock);
    }

    #[test]
    fn test_removed_switch_purged_without_actions() {
        let mut store = triangle();
        let mut preventer = LoopPreventer::default();
        let tree = tree_of(&store, 1);
        let plan = preventer.reconcile(&store.snapshot(), Some(&tree), Generation::new(1));
        ack_all(&mut preventer, &plan);

        store.remove_switch(sw(3)).unwrap();
        let tree = tree_of(&store, 2);
        let plan = preventer.reconcile(&store.snapshot(), Some(&tree), Generation::new(2));
        assert_eq!(plan.purged, vec![ep(3, 2)]);
        // s2:2 lost its neighbor, so its drop rule comes off
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].kind, ActionKind::Unblock);
        assert_eq!(plan.actions[0].rule.endpoint(), ep(2, 2));
    }

    #[test]
    fn test_pending_reverses_direction() {
        let mut store = triangle();
        let mut preventer = LoopPreventer::default();
        let tree = tree_of(&store, 1);
        preventer.reconcile(&store.snapshot(), Some(&tree), Generation::new(1));

        store.clear_link(ep(2, 2)).unwrap();
        let tree = tree_of(&store, 2);
        let plan = preventer.reconcile(&store.snapshot(), Some(&tree), Generation::new(2));
        assert!(plan.retried.is_empty());
        assert!(plan.actions.iter().all(|a| a.kind == ActionKind::Unblock));

        // The block acks from generation 1 arrive late
        let stale = FlowAck {
            switch: sw(2),
            port: PortId::new(2),
            generation: Generation::new(1),
            sequence: 1,
            action: ActionKind::Block,
            status: crate::blocking::AckStatus::Ok,
        };
        assert_eq!(preventer.handle_ack(&stale), AckOutcome::Stale);
        assert_eq!(preventer.ledger().state(ep(2, 2)), BlockState::PendingUnblock);
    }

    /// s1 and s2 joined by two parallel links; s2:2 ends up blocked.
    fn parallel() -> TopologyStore {
        let mut store = TopologyStore::default();
        store.add_switch(sw(1), ports(&[1, 2])).unwrap();
        store.add_switch(sw(2), ports(&[1, 2])).unwrap();
        store.set_link(ep(1, 1), ep(2, 1)).unwrap();
        store.set_link(ep(1, 2), ep(2, 2)).unwrap();
        store
    }

    #[test]
    fn test_removed_port_on_live_switch_unblocked() {
        let mut store = parallel();
        let mut preventer = LoopPreventer::default();
        let tree = tree_of(&store, 1);
        let plan = preventer.reconcile(&store.snapshot(), Some(&tree), Generation::new(1));
        ack_all(&mut preventer, &plan);
        assert_eq!(preventer.ledger().state(ep(2, 2)), BlockState::Blocked);

        store.remove_port(sw(2), PortId::new(2)).unwrap();
        let tree = tree_of(&store, 2);
        let plan = preventer.reconcile(&store.snapshot(), Some(&tree), Generation::new(2));
        assert!(plan.purged.is_empty());
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].kind, ActionKind::Unblock);
        assert_eq!(plan.actions[0].rule.endpoint(), ep(2, 2));

        // Retried until acknowledged, then forgotten
        let retry = preventer.reconcile(&store.snapshot(), Some(&tree), Generation::new(2));
        assert_eq!(retry.retried, vec![ep(2, 2)]);
        ack_all(&mut preventer, &retry);
        let done = preventer.reconcile(&store.snapshot(), Some(&tree), Generation::new(2));
        assert_eq!(done.purged, vec![ep(2, 2)]);
        assert!(done.actions.is_empty());
        assert!(preventer.ledger().is_empty());
    }

    #[test]
    fn test_returning_port_is_not_left_blocked() {
        let mut store = parallel();
        let mut preventer = LoopPreventer::default();
        let tree = tree_of(&store, 1);
        let plan = preventer.reconcile(&store.snapshot(), Some(&tree), Generation::new(1));
        ack_all(&mut preventer, &plan);

        // Port flaps before the unblock is acknowledged
        store.remove_port(sw(2), PortId::new(2)).unwrap();
        let tree = tree_of(&store, 2);
        let unblock = preventer.reconcile(&store.snapshot(), Some(&tree), Generation::new(2));
        store.add_port(sw(2), PortId::new(2)).unwrap();
        let tree = tree_of(&store, 3);
        let plan = preventer.reconcile(&store.snapshot(), Some(&tree), Generation::new(3));
        assert_eq!(plan.retried, vec![ep(2, 2)]);
        assert_eq!(plan.actions[0].kind, ActionKind::Unblock);

        ack_all(&mut preventer, &unblock);
        assert_eq!(preventer.ledger().state(ep(2, 2)), BlockState::Open);
        let plan = preventer.reconcile(&store.snapshot(), Some(&tree), Generation::new(3));
        assert!(plan.is_empty());
    }

    #[test]
    fn test_retry_counts_as_work() {
        let plan = ReconcilePlan {
            retried: vec![ep(2, 2)],
            ..Default::default()
        };
        assert!(!plan.is_empty());
        assert!(ReconcilePlan::default().is_empty());
    }
}
