//! SptOrch - the serial control loop.
//!
//! Each [`TopologyEvent`] is applied to the [`TopologyStore`]; when the graph
//! changed, the root is re-elected, the spanning tree recomputed under a new
//! [`Generation`] and the [`LoopPreventer`] reconciled. Resulting drop-rule
//! actions leave through the [`FlowController`] callbacks. Nothing in here
//! returns an error to the caller: invalid events are dropped, flow
//! controller failures leave ledger entries pending for the next pass.

use crate::audit::{DiagnosticCategory, DiagnosticOutcome, DiagnosticRecord, DiagnosticsSink, TracingSink};
use crate::blocking::{
    AckOutcome, AckStatus, ActionKind, BlockLedger, BlockState, DropRule, FlowAck, FlowAction,
    LoopPreventer, LoopPreventerConfig, ReconcilePlan,
};
use crate::config::SptConfig;
use crate::error::{FlowControllerError, TopologyError};
use crate::events::TopologyEvent;
use crate::spt::{compute_tree, select_root, SpanningTree};
use crate::topology::{TopologyResult, TopologyStore, DEFAULT_MAX_SWITCHES};
use sonic_spt_types::{Endpoint, Generation, SwitchId};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SOURCE: &str = "SptOrch";

/// SptOrch configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SptOrchConfig {
    pub max_switches: usize,
    pub preventer: LoopPreventerConfig,
}

impl Default for SptOrchConfig {
    fn default() -> Self {
        Self {
            max_switches: DEFAULT_MAX_SWITCHES,
            preventer: LoopPreventerConfig::default(),
        }
    }
}

impl From<&SptConfig> for SptOrchConfig {
    fn from(config: &SptConfig) -> Self {
        Self {
            max_switches: config.topology.max_switches,
            preventer: config.preventer_config(),
        }
    }
}

/// SptOrch statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SptOrchStats {
    pub events_processed: u64,
    pub events_dropped: u64,
    pub recomputations: u64,
    pub root_changes: u64,
    pub blocks_issued: u64,
    pub unblocks_issued: u64,
    pub acks_applied: u64,
    pub stale_acks: u64,
    pub action_failures: u64,
}

/// Callbacks through which drop-rule actions reach the switches.
///
/// Both calls only submit the action; the result arrives later as a
/// [`FlowAck`] passed to [`SptOrch::handle_ack`]. An `Err` means the action
/// could not even be submitted.
pub trait FlowController: Send + Sync {
    fn install_drop_rule(&self, rule: &DropRule) -> Result<(), FlowControllerError>;
    fn remove_drop_rule(&self, rule: &DropRule) -> Result<(), FlowControllerError>;
}

/// Result of processing one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// The graph changed; the tree was recomputed for `generation` and
    /// `actions` drop-rule actions were emitted.
    Applied { generation: Generation, actions: usize },
    /// The event did not change the graph.
    Unchanged,
    /// The event referenced something invalid and was dropped.
    Dropped(TopologyError),
}

/// Spanning-tree loop guard control loop.
pub struct SptOrch {
    config: SptOrchConfig,
    stats: SptOrchStats,
    flow: Arc<dyn FlowController>,
    diagnostics: Arc<dyn DiagnosticsSink>,

    store: TopologyStore,
    preventer: LoopPreventer,
    root: Option<SwitchId>,
    tree: Option<SpanningTree>,
    generation: Generation,
}

impl SptOrch {
    /// Creates a control loop with an empty topology.
    pub fn new(config: SptOrchConfig, flow: Arc<dyn FlowController>) -> Self {
        Self {
            store: TopologyStore::new(config.max_switches),
            preventer: LoopPreventer::new(config.preventer.clone()),
            config,
            stats: SptOrchStats::default(),
            flow,
            diagnostics: Arc::new(TracingSink),
            root: None,
            tree: None,
            generation: Generation::ZERO,
        }
    }

    /// Replaces the default tracing diagnostics sink.
    pub fn set_diagnostics(&mut self, sink: Arc<dyn DiagnosticsSink>) {
        self.diagnostics = sink;
    }

    pub fn diagnostics(&self) -> &Arc<dyn DiagnosticsSink> {
        &self.diagnostics
    }

    pub fn config(&self) -> &SptOrchConfig {
        &self.config
    }

    pub fn stats(&self) -> &SptOrchStats {
        &self.stats
    }

    pub fn store(&self) -> &TopologyStore {
        &self.store
    }

    /// Current root, `None` while the topology is empty.
    pub fn root(&self) -> Option<SwitchId> {
        self.root
    }

    pub fn tree(&self) -> Option<&SpanningTree> {
        self.tree.as_ref()
    }

    pub fn ledger(&self) -> &BlockLedger {
        self.preventer.ledger()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Block state the ledger holds for a port.
    pub fn block_state(&self, end: Endpoint) -> BlockState {
        self.preventer.ledger().state(end)
    }

    /// Applies one topology event and runs it to a fixed point.
    pub fn process_event(&mut self, event: TopologyEvent) -> EventOutcome {
        self.stats.events_processed += 1;
        debug!(event = %event, "Processing topology event");

        match self.apply(&event) {
            Err(error) => {
                self.stats.events_dropped += 1;
                warn!(event = %event, error = %error, "Dropping topology event");
                self.diagnostics.record(
                    Self::event_record(&event)
                        .with_outcome(DiagnosticOutcome::Ignored)
                        .with_error(error.to_string()),
                );
                EventOutcome::Dropped(error)
            }
            Ok(false) => {
                debug!(event = %event, "Topology unchanged");
                EventOutcome::Unchanged
            }
            Ok(true) => {
                self.diagnostics.record(Self::event_record(&event));
                if !matches!(event, TopologyEvent::LinkUp { .. } | TopologyEvent::LinkDown { .. }) {
                    self.dump_store();
                }
                let actions = self.recompute();
                EventOutcome::Applied {
                    generation: self.generation,
                    actions,
                }
            }
        }
    }

    /// Applies a flow controller acknowledgment.
    ///
    /// A positive ack is mirrored into the port's `blocked` flag. A negative
    /// ack returns the port to its previous stable state when that state is
    /// known, otherwise the port stays pending; either way the next pass
    /// emits again if the tree still asks for it.
    pub fn handle_ack(&mut self, ack: FlowAck) -> AckOutcome {
        let end = ack.endpoint();
        let outcome = self.preventer.handle_ack(&ack);

        match outcome {
            AckOutcome::Applied(state) => {
                self.stats.acks_applied += 1;
                let blocked = state == BlockState::Blocked;
                if let Err(e) = self.store.set_port_blocked(end, blocked) {
                    debug!(port = %end, error = %e, "Acknowledged port no longer in topology");
                }
                let category = match ack.action {
                    ActionKind::Block => DiagnosticCategory::PortBlock,
                    ActionKind::Unblock => DiagnosticCategory::PortUnblock,
                };
                info!(port = %end, state = %state, generation = %ack.generation, "Port {}", state);
                self.diagnostics.record(
                    DiagnosticRecord::new(category, SOURCE, format!("{}_acknowledged", ack.action))
                        .with_object_id(end.to_string())
                        .with_object_type("port")
                        .with_details(serde_json::json!({
                            "generation": ack.generation.as_u64(),
                            "state": state.as_str(),
                        })),
                );
            }
            AckOutcome::Reverted(_) | AckOutcome::Retry => {
                self.stats.action_failures += 1;
                let state = self.preventer.ledger().state(end);
                let reason = match &ack.status {
                    AckStatus::Failed { reason } => reason.as_str(),
                    AckStatus::Ok => "",
                };
                warn!(port = %end, action = %ack.action, reason, "Flow controller rejected action");
                self.diagnostics.record(
                    DiagnosticRecord::new(DiagnosticCategory::ActionFailure, SOURCE, ack.action.as_str())
                        .with_object_id(end.to_string())
                        .with_object_type("port")
                        .with_details(serde_json::json!({
                            "generation": ack.generation.as_u64(),
                            "state": state.as_str(),
                        }))
                        .with_error(reason),
                );
            }
            AckOutcome::Stale => {
                self.stats.stale_acks += 1;
                debug!(port = %end, generation = %ack.generation, sequence = ack.sequence, "Discarding stale ack");
            }
            AckOutcome::Unexpected => {
                debug!(port = %end, action = %ack.action, generation = %ack.generation, "Discarding unexpected ack");
            }
        }
        outcome
    }

    /// Runs a reconciliation pass against the current tree without
    /// recomputing it. Re-emits every action still pending.
    pub fn reconcile(&mut self) -> usize {
        let plan = self.preventer.reconcile(
            &self.store.snapshot(),
            self.tree.as_ref(),
            self.generation,
        );
        self.dispatch(plan)
    }

    fn apply(&mut self, event: &TopologyEvent) -> TopologyResult {
        match event {
            TopologyEvent::SwitchUp { switch, ports } => {
                let reserved = ports.iter().filter(|port| !port.is_physical()).count();
                if reserved > 0 {
                    debug!(switch = %switch, reserved, "Ignoring reserved ports");
                }
                self.store.add_switch(*switch, ports.iter().copied())
            }
            TopologyEvent::SwitchDown { switch } => self.store.remove_switch(*switch),
            TopologyEvent::LinkUp { a, b } => self.store.set_link(*a, *b),
            TopologyEvent::LinkDown { a, b } => match self.store.neighbor(*a) {
                Some(peer) if peer != *b => {
                    info!(a = %a, b = %b, current = %peer, "Ignoring stale link down");
                    Ok(false)
                }
                _ => self.store.clear_link(*a),
            },
            TopologyEvent::PortUp { switch, port } => self.store.add_port(*switch, *port),
            TopologyEvent::PortDown { switch, port } => self.store.remove_port(*switch, *port),
        }
    }

    /// Re-elects the root, rebuilds the tree under a new generation and
    /// reconciles.
    fn recompute(&mut self) -> usize {
        self.generation = self.generation.next();
        self.stats.recomputations += 1;

        let snapshot = self.store.snapshot();
        let root = select_root(&snapshot).ok();
        if root != self.root {
            self.stats.root_changes += 1;
            match root {
                Some(root) => info!(root = %root, previous = ?self.root, "Root elected"),
                None => warn!("No root available, all ports left open"),
            }
            self.diagnostics.record(
                DiagnosticRecord::new(DiagnosticCategory::RootChange, SOURCE, "elect_root")
                    .with_object_type("switch")
                    .with_object_id(root.map(|r| r.to_string()).unwrap_or_default())
                    .with_details(serde_json::json!({
                        "previous": self.root.map(|r| r.to_string()),
                        "root": root.map(|r| r.to_string()),
                        "generation": self.generation.as_u64(),
                    })),
            );
            self.root = root;
        }

        let tree = root.map(|root| compute_tree(&snapshot, root, self.generation));
        if let Some(tree) = &tree {
            let previously_isolated = self
                .tree
                .as_ref()
                .map(|t| t.isolated().clone())
                .unwrap_or_default();
            for id in tree.isolated().difference(&previously_isolated) {
                warn!(switch = %id, root = %tree.root(), "Switch isolated from root, leaving its ports open");
            }
            for id in previously_isolated.difference(tree.isolated()) {
                if tree.is_reachable(*id) {
                    info!(switch = %id, "Switch rejoined the tree");
                }
            }

            let edges: Vec<String> = tree
                .edges()
                .map(|(id, next_hop)| format!("{} -> {}", id, next_hop))
                .collect();
            debug!(generation = %self.generation, ?edges, "Spanning tree computed");
            self.diagnostics.record(
                DiagnosticRecord::new(DiagnosticCategory::TreeChange, SOURCE, "compute_tree")
                    .with_object_type("tree")
                    .with_object_id(self.generation.to_string())
                    .with_details(serde_json::json!({
                        "root": tree.root().to_string(),
                        "reachable": tree.reachable_count(),
                        "isolated": tree.isolated().iter().map(|id| id.to_string()).collect::<Vec<_>>(),
                        "edges": edges,
                    })),
            );
        }
        self.tree = tree;

        self.reconcile()
    }

    /// Hands the plan's actions to the flow controller.
    fn dispatch(&mut self, plan: ReconcilePlan) -> usize {
        for end in &plan.purged {
            debug!(port = %end, "Purged block state of removed port");
        }
        for action in plan.actions.iter().filter(|a| self.store.port(a.rule.endpoint()).is_none()) {
            info!(port = %action.rule.endpoint(), "Removing drop rule of vanished port");
        }
        for end in &plan.retried {
            let attempts = self
                .preventer
                .ledger()
                .entry(*end)
                .map(|entry| entry.attempts)
                .unwrap_or_default();
            warn!(port = %end, attempts, "Action not acknowledged, retrying");
            self.diagnostics.record(
                DiagnosticRecord::new(DiagnosticCategory::ActionFailure, SOURCE, "action_timed_out")
                    .with_object_id(end.to_string())
                    .with_object_type("port")
                    .with_details(serde_json::json!({ "attempts": attempts }))
                    .with_error("no acknowledgment before the next pass"),
            );
        }

        for action in &plan.actions {
            self.submit(action);
        }
        plan.actions.len()
    }

    fn submit(&mut self, action: &FlowAction) {
        let rule = &action.rule;
        let (result, category, name) = match action.kind {
            ActionKind::Block => (
                self.flow.install_drop_rule(rule),
                DiagnosticCategory::PortBlock,
                "install_drop_rule",
            ),
            ActionKind::Unblock => (
                self.flow.remove_drop_rule(rule),
                DiagnosticCategory::PortUnblock,
                "remove_drop_rule",
            ),
        };
        let record = DiagnosticRecord::new(category, SOURCE, name)
            .with_object_id(rule.endpoint().to_string())
            .with_object_type("port")
            .with_details(serde_json::json!({
                "generation": rule.generation.as_u64(),
                "sequence": rule.sequence,
                "priority": rule.priority,
            }));

        match result {
            Ok(()) => {
                match action.kind {
                    ActionKind::Block => self.stats.blocks_issued += 1,
                    ActionKind::Unblock => self.stats.unblocks_issued += 1,
                }
                debug!(action = %action, "Submitted drop rule action");
                self.diagnostics
                    .record(record.with_outcome(DiagnosticOutcome::InProgress));
            }
            Err(e) => {
                self.stats.action_failures += 1;
                warn!(action = %action, error = %e, "Failed to submit drop rule action");
                self.diagnostics.record(DiagnosticRecord {
                    category: DiagnosticCategory::ActionFailure,
                    ..record.with_error(e.to_string())
                });
            }
        }
    }

    fn event_record(event: &TopologyEvent) -> DiagnosticRecord {
        let (category, object_type, object_id) = match event {
            TopologyEvent::SwitchUp { switch, .. } | TopologyEvent::SwitchDown { switch } => {
                (DiagnosticCategory::SwitchChange, "switch", switch.to_string())
            }
            TopologyEvent::LinkUp { a, b } | TopologyEvent::LinkDown { a, b } => {
                (DiagnosticCategory::LinkChange, "link", format!("{} <--> {}", a, b))
            }
            TopologyEvent::PortUp { switch, port } | TopologyEvent::PortDown { switch, port } => {
                (DiagnosticCategory::PortChange, "port", format!("{}[{}]", switch, port))
            }
        };
        DiagnosticRecord::new(category, SOURCE, event.name())
            .with_object_type(object_type)
            .with_object_id(object_id)
    }

    fn dump_store(&self) {
        if tracing::enabled!(tracing::Level::DEBUG) {
            for line in self.store.dump() {
                debug!("{}", line);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sonic_spt_types::PortId;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        actions: Mutex<Vec<FlowAction>>,
        fail: Mutex<bool>,
    }

    impl Recorder {
        fn push(&self, kind: ActionKind, rule: &DropRule) -> Result<(), FlowControllerError> {
            if *self.fail.lock().unwrap() {
                return Err(FlowControllerError::NotConnected(rule.switch));
            }
            self.actions.lock().unwrap().push(FlowAction { kind, rule: *rule });
            Ok(())
        }

        fn take(&self) -> Vec<FlowAction> {
            std::mem::take(&mut *self.actions.lock().unwrap())
        }
    }

    impl FlowController for Recorder {
        fn install_drop_rule(&self, rule: &DropRule) -> Result<(), FlowControllerError> {
            self.push(ActionKind::Block, rule)
        }

        fn remove_drop_rule(&self, rule: &DropRule) -> Result<(), FlowControllerError> {
            self.push(ActionKind::Unblock, rule)
        }
    }

    fn sw(id: u64) -> SwitchId {
        SwitchId::new(id)
    }

    fn ep(id: u64, port: u16) -> Endpoint {
        Endpoint::new(sw(id), PortId::new(port))
    }

    fn switch_up(id: u64, ports: &[u16]) -> TopologyEvent {
        TopologyEvent::SwitchUp {
            switch: sw(id),
            ports: ports.iter().copied().map(PortId::new).collect(),
        }
    }

    fn link_up(a: Endpoint, b: Endpoint) -> TopologyEvent {
        TopologyEvent::LinkUp { a, b }
    }

    fn setup() -> (SptOrch, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let orch = SptOrch::new(SptOrchConfig::default(), recorder.clone());
        (orch, recorder)
    }

    #[test]
    fn test_root_follows_switch_set() {
        let (mut orch, _) = setup();
        assert_eq!(orch.root(), None);

        orch.process_event(switch_up(5, &[1]));
        assert_eq!(orch.root(), Some(sw(5)));
        orch.process_event(switch_up(2, &[1]));
        assert_eq!(orch.root(), Some(sw(2)));
        orch.process_event(TopologyEvent::SwitchDown { switch: sw(2) });
        assert_eq!(orch.root(), Some(sw(5)));
        orch.process_event(TopologyEvent::SwitchDown { switch: sw(5) });
        assert_eq!(orch.root(), None);
        assert!(orch.tree().is_none());

        assert_eq!(orch.stats().root_changes, 4);
        assert_eq!(orch.stats().recomputations, 4);
        assert_eq!(orch.generation(), Generation::new(4));
    }

    #[test]
    fn test_invalid_events_dropped() {
        let (mut orch, recorder) = setup();
        orch.process_event(switch_up(1, &[1]));

        let outcome = orch.process_event(link_up(ep(1, 1), ep(9, 1)));
        assert_eq!(outcome, EventOutcome::Dropped(TopologyError::UnknownSwitch(sw(9))));

        let outcome = orch.process_event(TopologyEvent::PortUp {
            switch: sw(1),
            port: PortId::LOCAL,
        });
        assert!(matches!(outcome, EventOutcome::Dropped(TopologyError::UnknownPort { .. })));

        assert_eq!(orch.stats().events_processed, 3);
        assert_eq!(orch.stats().events_dropped, 2);
        assert_eq!(orch.generation(), Generation::new(1));
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn test_duplicate_event_unchanged() {
        let (mut orch, _) = setup();
        orch.process_event(switch_up(1, &[1]));
        assert_eq!(orch.process_event(switch_up(1, &[1])), EventOutcome::Unchanged);
        assert_eq!(orch.stats().recomputations, 1);
    }

    #[test]
    fn test_stale_link_down_ignored() {
        let (mut orch, _) = setup();
        orch.process_event(switch_up(1, &[1]));
        orch.process_event(switch_up(2, &[1]));
        orch.process_event(switch_up(3, &[1]));
        orch.process_event(link_up(ep(1, 1), ep(2, 1)));
        // s1:1 rewired to s3
        orch.process_event(link_up(ep(1, 1), ep(3, 1)));

        let outcome = orch.process_event(TopologyEvent::LinkDown {
            a: ep(1, 1),
            b: ep(2, 1),
        });
        assert_eq!(outcome, EventOutcome::Unchanged);
        assert_eq!(orch.store().neighbor(ep(1, 1)), Some(ep(3, 1)));
    }

    #[test]
    fn test_submit_failure_retried_on_reconcile() {
        let (mut orch, recorder) = setup();
        orch.process_event(switch_up(1, &[1, 2]));
        orch.process_event(switch_up(2, &[1, 2]));
        orch.process_event(link_up(ep(1, 1), ep(2, 1)));
        *recorder.fail.lock().unwrap() = true;

        let outcome = orch.process_event(link_up(ep(1, 2), ep(2, 2)));
        assert_eq!(
            outcome,
            EventOutcome::Applied {
                generation: Generation::new(4),
                actions: 1
            }
        );
        assert_eq!(orch.stats().action_failures, 1);
        assert_eq!(orch.block_state(ep(2, 2)), BlockState::PendingBlock);
        assert!(recorder.take().is_empty());

        *recorder.fail.lock().unwrap() = false;
        assert_eq!(orch.reconcile(), 1);
        let actions = recorder.take();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ActionKind::Block);
        assert_eq!(actions[0].rule.endpoint(), ep(2, 2));
        assert_eq!(actions[0].rule.generation, Generation::new(4));

        assert_eq!(orch.handle_ack(actions[0].ack_ok()), AckOutcome::Applied(BlockState::Blocked));
        assert!(orch.store().port(ep(2, 2)).unwrap().blocked);
        assert_eq!(orch.reconcile(), 0);
        assert_eq!(orch.stats().blocks_issued, 1);
        assert_eq!(orch.stats().acks_applied, 1);
    }

    #[test]
    fn test_failed_unblock_keeps_port_blocked() {
        let (mut orch, recorder) = setup();
        orch.process_event(switch_up(1, &[1, 2]));
        orch.process_event(switch_up(2, &[1, 2]));
        orch.process_event(link_up(ep(1, 1), ep(2, 1)));
        orch.process_event(link_up(ep(1, 2), ep(2, 2)));
        let block = recorder.take().remove(0);
        orch.handle_ack(block.ack_ok());

        orch.process_event(TopologyEvent::LinkDown {
            a: ep(1, 2),
            b: ep(2, 2),
        });
        let unblock = recorder.take().remove(0);
        assert_eq!(unblock.kind, ActionKind::Unblock);

        let outcome = orch.handle_ack(unblock.ack_failed("table full"));
        assert_eq!(outcome, AckOutcome::Reverted(BlockState::Blocked));
        assert!(orch.store().port(ep(2, 2)).unwrap().blocked);
        assert_eq!(orch.stats().action_failures, 1);

        // Retried as a fresh unblock on the next pass
        assert_eq!(orch.reconcile(), 1);
        assert_eq!(recorder.take()[0].kind, ActionKind::Unblock);
    }

    #[test]
    fn test_emptied_topology_purges_ledger() {
        let (mut orch, recorder) = setup();
        orch.process_event(switch_up(1, &[1, 2]));
        orch.process_event(switch_up(2, &[1, 2]));
        orch.process_event(link_up(ep(1, 1), ep(2, 1)));
        orch.process_event(link_up(ep(1, 2), ep(2, 2)));
        for action in recorder.take() {
            orch.handle_ack(action.ack_ok());
        }
        assert_eq!(orch.ledger().blocked_ports().count(), 1);

        orch.process_event(TopologyEvent::SwitchDown { switch: sw(2) });
        orch.process_event(TopologyEvent::SwitchDown { switch: sw(1) });
        assert!(orch.ledger().is_empty());
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn test_retry_success_after_first_attempt_failed() {
        let (mut orch, recorder) = setup();
        orch.process_event(switch_up(1, &[1, 2]));
        orch.process_event(switch_up(2, &[1, 2]));
        orch.process_event(link_up(ep(1, 1), ep(2, 1)));
        orch.process_event(link_up(ep(1, 2), ep(2, 2)));
        let first = recorder.take().remove(0);

        // Timer pass re-emits under the same generation
        assert_eq!(orch.reconcile(), 1);
        let second = recorder.take().remove(0);
        assert_eq!(first.rule.generation, second.rule.generation);
        assert_ne!(first.rule.sequence, second.rule.sequence);

        assert_eq!(orch.handle_ack(first.ack_failed("busy")), AckOutcome::Stale);
        assert_eq!(orch.handle_ack(second.ack_ok()), AckOutcome::Applied(BlockState::Blocked));
        assert!(orch.store().port(ep(2, 2)).unwrap().blocked);

        orch.process_event(TopologyEvent::LinkDown {
            a: ep(1, 2),
            b: ep(2, 2),
        });
        let actions = recorder.take();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ActionKind::Unblock);
        assert_eq!(actions[0].rule.endpoint(), ep(2, 2));
    }

    #[test]
    fn test_port_flap_removes_drop_rule() {
        let (mut orch, recorder) = setup();
        orch.process_event(switch_up(1, &[1, 2]));
        orch.process_event(switch_up(2, &[1, 2]));
        orch.process_event(link_up(ep(1, 1), ep(2, 1)));
        orch.process_event(link_up(ep(1, 2), ep(2, 2)));
        let block = recorder.take().remove(0);
        orch.handle_ack(block.ack_ok());

        let down = TopologyEvent::PortDown {
            switch: sw(2),
            port: PortId::new(2),
        };
        assert!(matches!(orch.process_event(down), EventOutcome::Applied { actions: 1, .. }));
        let unblock = recorder.take().remove(0);
        assert_eq!(unblock.kind, ActionKind::Unblock);
        assert_eq!(unblock.rule.endpoint(), ep(2, 2));
        assert_eq!(orch.handle_ack(unblock.ack_ok()), AckOutcome::Applied(BlockState::Open));

        orch.process_event(TopologyEvent::PortUp {
            switch: sw(2),
            port: PortId::new(2),
        });
        assert!(recorder.take().is_empty());
        assert_eq!(orch.block_state(ep(2, 2)), BlockState::Open);
        assert!(!orch.store().port(ep(2, 2)).unwrap().blocked);
        assert_eq!(orch.ledger().blocked_ports().count(), 0);
        assert_eq!(orch.reconcile(), 0);
    }
}
