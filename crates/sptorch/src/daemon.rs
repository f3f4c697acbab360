//! sptorchd runtime: event sources, the loopback flow controller and the
//! main select loop.

use crate::audit::{DiagnosticCategory, DiagnosticRecord};
use crate::blocking::{ActionKind, DropRule, FlowAck, FlowAction};
use crate::error::{FlowControllerError, Result, SptError};
use crate::events::TopologyEvent;
use crate::orch::{FlowController, SptOrch};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Serial stream of topology events.
#[async_trait]
pub trait TopologyEventSource: Send {
    /// Returns the next event, or `None` once the stream has ended.
    async fn next_event(&mut self) -> Result<Option<TopologyEvent>>;
}

/// Event source fed through an mpsc channel.
pub struct ChannelEventSource {
    rx: mpsc::Receiver<TopologyEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: mpsc::Receiver<TopologyEvent>) -> Self {
        Self { rx }
    }

    /// Creates a connected sender/source pair.
    pub fn channel(capacity: usize) -> (mpsc::Sender<TopologyEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl TopologyEventSource for ChannelEventSource {
    async fn next_event(&mut self) -> Result<Option<TopologyEvent>> {
        Ok(self.rx.recv().await)
    }
}

/// Event source reading a JSON-lines event stream, from a recorded file or
/// from stdin.
///
/// Blank lines and lines starting with `#` are skipped. Lines that do not
/// parse are logged and skipped.
pub struct ReplayEventSource {
    name: String,
    lines: Lines<BufReader<Box<dyn AsyncRead + Send + Unpin>>>,
    line_no: usize,
    skipped: usize,
}

impl ReplayEventSource {
    pub fn new(name: impl Into<String>, reader: Box<dyn AsyncRead + Send + Unpin>) -> Self {
        Self {
            name: name.into(),
            lines: BufReader::new(reader).lines(),
            line_no: 0,
            skipped: 0,
        }
    }

    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).await?;
        Ok(Self::new(path.display().to_string(), Box::new(file)))
    }

    pub fn stdin() -> Self {
        Self::new("<stdin>", Box::new(tokio::io::stdin()))
    }

    /// Number of malformed lines skipped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

#[async_trait]
impl TopologyEventSource for ReplayEventSource {
    async fn next_event(&mut self) -> Result<Option<TopologyEvent>> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_no += 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match TopologyEvent::from_json(line) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => {
                    self.skipped += 1;
                    warn!(source = %self.name, line = self.line_no, error = %e, "Skipping malformed event");
                }
            }
        }
        Ok(None)
    }
}

/// Flow controller that logs each drop rule and acknowledges it at once.
///
/// Used for replaying recorded event streams without switches attached.
pub struct LoopbackFlowController {
    acks: mpsc::UnboundedSender<FlowAck>,
}

impl LoopbackFlowController {
    pub fn new(acks: mpsc::UnboundedSender<FlowAck>) -> Self {
        Self { acks }
    }

    fn ack(&self, kind: ActionKind, rule: &DropRule) -> std::result::Result<(), FlowControllerError> {
        let action = FlowAction { kind, rule: *rule };
        info!(action = %action, priority = rule.priority, "Drop rule");
        self.acks
            .send(action.ack_ok())
            .map_err(|e| FlowControllerError::SendFailed(e.to_string()))
    }
}

impl FlowController for LoopbackFlowController {
    fn install_drop_rule(&self, rule: &DropRule) -> std::result::Result<(), FlowControllerError> {
        self.ack(ActionKind::Block, rule)
    }

    fn remove_drop_rule(&self, rule: &DropRule) -> std::result::Result<(), FlowControllerError> {
        self.ack(ActionKind::Unblock, rule)
    }
}

/// Drives an [`SptOrch`] from an event source and an ack channel.
pub struct SptDaemon<S> {
    orch: SptOrch,
    source: S,
    acks: mpsc::UnboundedReceiver<FlowAck>,
    retry_interval: Duration,
}

impl<S: TopologyEventSource> SptDaemon<S> {
    pub fn new(
        orch: SptOrch,
        source: S,
        acks: mpsc::UnboundedReceiver<FlowAck>,
        retry_interval: Duration,
    ) -> Self {
        Self {
            orch,
            source,
            acks,
            retry_interval,
        }
    }

    pub fn orch(&self) -> &SptOrch {
        &self.orch
    }

    pub fn into_orch(self) -> SptOrch {
        self.orch
    }

    /// Runs until the event source ends or ctrl-c is received.
    ///
    /// Events are processed one at a time. Acks are applied as they arrive
    /// and a reconciliation pass runs on every retry tick. When the source
    /// ends, queued acks are drained and a final pass is run.
    pub async fn run(&mut self) -> Result<()> {
        if self.retry_interval.is_zero() {
            return Err(SptError::Config("retry interval must be > 0".to_string()));
        }
        self.orch.diagnostics().record(DiagnosticRecord::new(
            DiagnosticCategory::SystemLifecycle,
            "SptDaemon",
            "start",
        ));
        info!(retry_interval_ms = self.retry_interval.as_millis() as u64, "sptorchd: Listening for topology events");

        let mut retry = tokio::time::interval(self.retry_interval);
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);
        retry.tick().await;

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);
        let mut acks_open = true;

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("sptorchd: Received shutdown signal");
                    break;
                }
                ack = self.acks.recv(), if acks_open => match ack {
                    Some(ack) => {
                        self.orch.handle_ack(ack);
                    }
                    None => {
                        debug!("Ack channel closed");
                        acks_open = false;
                    }
                },
                _ = retry.tick() => {
                    let emitted = self.orch.reconcile();
                    if emitted > 0 {
                        debug!(emitted, "Retry pass emitted actions");
                    }
                }
                event = self.source.next_event() => match event? {
                    Some(event) => {
                        self.orch.process_event(event);
                    }
                    None => {
                        info!("sptorchd: Event source exhausted");
                        self.drain_acks();
                        self.orch.reconcile();
                        self.drain_acks();
                        break;
                    }
                },
            }
        }

        self.log_summary();
        Ok(())
    }

    fn drain_acks(&mut self) {
        while let Ok(ack) = self.acks.try_recv() {
            self.orch.handle_ack(ack);
        }
    }

    fn log_summary(&self) {
        let stats = self.orch.stats();
        let blocked: Vec<String> = self
            .orch
            .ledger()
            .blocked_ports()
            .map(|end| end.to_string())
            .collect();
        let pending = self.orch.ledger().pending_ports().count();
        info!(
            root = ?self.orch.root().map(|r| r.to_string()),
            generation = %self.orch.generation(),
            switches = self.orch.store().switch_count(),
            events = stats.events_processed,
            dropped = stats.events_dropped,
            recomputations = stats.recomputations,
            blocks = stats.blocks_issued,
            unblocks = stats.unblocks_issued,
            failures = stats.action_failures,
            pending,
            ?blocked,
            "sptorchd: Summary"
        );
        self.orch.diagnostics().record(
            DiagnosticRecord::new(DiagnosticCategory::SystemLifecycle, "SptDaemon", "stop")
                .with_details(serde_json::json!({
                    "events_processed": stats.events_processed,
                    "recomputations": stats.recomputations,
                    "blocked_ports": blocked,
                })),
        );
    }
}
