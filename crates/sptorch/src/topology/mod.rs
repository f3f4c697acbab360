//! TopologyStore - authoritative view of switches, ports and links.
//!
//! All topology mutations go through [`TopologyStore`]. Every operation is a
//! total function: references to unknown switches or ports come back as a
//! [`TopologyError`](crate::error::TopologyError) for the caller to log, and
//! leave the store untouched.
//!
//! Consumers that only read (root selection, tree computation,
//! reconciliation) work off a borrowed [`TopologySnapshot`].

mod snapshot;
mod store;
mod types;

pub use snapshot::TopologySnapshot;
pub use store::{TopologyResult, TopologyStore, DEFAULT_MAX_SWITCHES};
pub use types::{PortRecord, Switch};
