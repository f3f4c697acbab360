//! Identifier types for the spanning-tree loop guard.
//!
//! This crate provides type-safe representations of the entities the
//! loop-prevention control loop reasons about:
//!
//! - [`SwitchId`]: OpenFlow datapath identifiers (totally ordered)
//! - [`PortId`]: OpenFlow port numbers, scoped to one switch
//! - [`Endpoint`]: a (switch, port) pair
//! - [`Link`]: an unordered pair of endpoints
//! - [`Generation`]: the topology recomputation counter

mod generation;
mod link;
mod port;
mod switch;

pub use generation::Generation;
pub use link::{Endpoint, Link};
pub use port::PortId;
pub use switch::SwitchId;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid datapath id: {0}")]
    InvalidSwitchId(String),

    #[error("invalid port number: {0}")]
    InvalidPortId(String),

    #[error("invalid endpoint format: {0} (expected <switch>:<port>)")]
    InvalidEndpoint(String),
}
