//! Structured diagnostics for topology and block-state changes.
//!
//! Every switch/link/port change, root change, tree recomputation and
//! block/unblock decision produces a [`DiagnosticRecord`]. Records are handed
//! to a [`DiagnosticsSink`]; the default [`TracingSink`] emits them through
//! `tracing` under the `audit` target via [`audit_log!`](crate::audit_log), so
//! they can be filtered separately from operational logs
//! (`RUST_LOG=audit=info`).
//!
//! Diagnostics are a non-authoritative observer: nothing in the control loop
//! reads them back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic record categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCategory {
    /// Switch connected, disconnected or had its port set replaced
    SwitchChange,
    /// Link discovered or lost
    LinkChange,
    /// Port added or removed
    PortChange,
    /// Root elected, replaced or lost
    RootChange,
    /// Spanning tree recomputed
    TreeChange,
    /// Drop rule installed on a port
    PortBlock,
    /// Drop rule removed from a port
    PortUnblock,
    /// Flow controller rejected or never acknowledged an action
    ActionFailure,
    /// Daemon startup and shutdown
    SystemLifecycle,
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticCategory::SwitchChange => write!(f, "SWITCH_CHANGE"),
            DiagnosticCategory::LinkChange => write!(f, "LINK_CHANGE"),
            DiagnosticCategory::PortChange => write!(f, "PORT_CHANGE"),
            DiagnosticCategory::RootChange => write!(f, "ROOT_CHANGE"),
            DiagnosticCategory::TreeChange => write!(f, "TREE_CHANGE"),
            DiagnosticCategory::PortBlock => write!(f, "PORT_BLOCK"),
            DiagnosticCategory::PortUnblock => write!(f, "PORT_UNBLOCK"),
            DiagnosticCategory::ActionFailure => write!(f, "ACTION_FAILURE"),
            DiagnosticCategory::SystemLifecycle => write!(f, "SYSTEM_LIFECYCLE"),
        }
    }
}

/// Outcome of a diagnosed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticOutcome {
    Success,
    Failure,
    /// Action emitted, acknowledgment outstanding
    InProgress,
    /// Event dropped without effect
    Ignored,
}

impl fmt::Display for DiagnosticOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticOutcome::Success => write!(f, "success"),
            DiagnosticOutcome::Failure => write!(f, "failure"),
            DiagnosticOutcome::InProgress => write!(f, "in_progress"),
            DiagnosticOutcome::Ignored => write!(f, "ignored"),
        }
    }
}

/// A single structured diagnostic record.
///
/// Built with [`DiagnosticRecord::new`] and the `with_*` builder methods.
/// The outcome starts as `Success`; [`with_error`](Self::with_error) flips it
/// to `Failure`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    /// UTC time the record was created
    pub timestamp: DateTime<Utc>,

    pub category: DiagnosticCategory,

    /// Component that produced the record, e.g. `SptOrch`
    pub source: String,

    /// Short operation name, e.g. `link_up`, `install_drop_rule`
    pub action: String,

    pub outcome: DiagnosticOutcome,

    /// Affected object, e.g. `00-00-00-00-00-02[3]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,

    /// Kind of the affected object: `switch`, `port`, `link`, `tree`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DiagnosticRecord {
    /// Creates a record stamped with the current time.
    pub fn new(
        category: DiagnosticCategory,
        source: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            category,
            source: source.into(),
            action: action.into(),
            outcome: DiagnosticOutcome::Success,
            object_id: None,
            object_type: None,
            details: None,
            error: None,
        }
    }

    pub fn with_outcome(mut self, outcome: DiagnosticOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_object_id(mut self, id: impl Into<String>) -> Self {
        self.object_id = Some(id.into());
        self
    }

    pub fn with_object_type(mut self, obj_type: impl Into<String>) -> Self {
        self.object_type = Some(obj_type.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Records the error and marks the outcome as `Failure`.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self.outcome = DiagnosticOutcome::Failure;
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization_failed","message":"{}"}}"#, e))
    }
}

/// Receiver of diagnostic records.
pub trait DiagnosticsSink: Send + Sync {
    fn record(&self, record: DiagnosticRecord);
}

/// Sink that logs every record through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn record(&self, record: DiagnosticRecord) {
        crate::audit_log!(record);
    }
}

/// Logs a [`DiagnosticRecord`] under the `audit` target.
///
/// Successful records log at info, in-progress and ignored ones at debug,
/// failures at warn.
#[macro_export]
macro_rules! audit_log {
    ($record:expr) => {
        let record = $record;
        match record.outcome {
            $crate::audit::DiagnosticOutcome::Success => {
                tracing::info!(
                    target: "audit",
                    category = %record.category,
                    source = %record.source,
                    action = %record.action,
                    object = record.object_id.as_deref().unwrap_or(""),
                    audit_json = %record.to_json(),
                    "AUDIT: {} - {} - {}",
                    record.category,
                    record.action,
                    record.outcome
                );
            }
            $crate::audit::DiagnosticOutcome::InProgress
            | $crate::audit::DiagnosticOutcome::Ignored => {
                tracing::debug!(
                    target: "audit",
                    category = %record.category,
                    source = %record.source,
                    action = %record.action,
                    object = record.object_id.as_deref().unwrap_or(""),
                    audit_json = %record.to_json(),
                    "AUDIT: {} - {} - {}",
                    record.category,
                    record.action,
                    record.outcome
                );
            }
            $crate::audit::DiagnosticOutcome::Failure => {
                tracing::warn!(
                    target: "audit",
                    category = %record.category,
                    source = %record.source,
                    action = %record.action,
                    object = record.object_id.as_deref().unwrap_or(""),
                    error = record.error.as_deref().unwrap_or(""),
                    audit_json = %record.to_json(),
                    "AUDIT: {} - {} - {}",
                    record.category,
                    record.action,
                    record.outcome
                );
            }
        }
    };
}

/// Installs a JSON `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `log_level` when set.
pub fn init_logging(log_level: &str) -> Result<(), crate::SptError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .json(),
        )
        .try_init()
        .map_err(|e| crate::SptError::Config(format!("logging: {e}")))
}

/// Installs a human-readable `tracing` subscriber.
pub fn init_logging_pretty(log_level: &str) -> Result<(), crate::SptError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_line_number(true).compact())
        .try_init()
        .map_err(|e| crate::SptError::Config(format!("logging: {e}")))
}
