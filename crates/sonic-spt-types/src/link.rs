//! Link endpoints and unordered links.

use crate::{ParseError, PortId, SwitchId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One side of a link: a port on a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    pub switch: SwitchId,
    pub port: PortId,
}

impl Endpoint {
    /// Creates a new endpoint.
    pub const fn new(switch: SwitchId, port: PortId) -> Self {
        Self { switch, port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.switch, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = ParseError;

    /// Parses `<switch>:<port>`, e.g. `s1:2` or `00-00-00-00-00-01:2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (switch, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ParseError::InvalidEndpoint(s.to_string()))?;
        Ok(Self::new(switch.parse()?, port.parse()?))
    }
}

impl From<(SwitchId, PortId)> for Endpoint {
    fn from((switch, port): (SwitchId, PortId)) -> Self {
        Self::new(switch, port)
    }
}

/// An unordered pair of endpoints.
///
/// The endpoints are stored in ascending order so that `Link::new(a, b)`
/// and `Link::new(b, a)` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Link {
    low: Endpoint,
    high: Endpoint,
}

impl Link {
    /// Creates a link between two endpoints.
    pub fn new(a: Endpoint, b: Endpoint) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    /// Returns both endpoints, lower one first.
    pub const fn endpoints(&self) -> (Endpoint, Endpoint) {
        (self.low, self.high)
    }

    /// Returns the endpoint opposite to `end`, if `end` belongs to this link.
    pub fn peer_of(&self, end: Endpoint) -> Option<Endpoint> {
        if end == self.low {
            Some(self.high)
        } else if end == self.high {
            Some(self.low)
        } else {
            None
        }
    }

    /// Returns true if both ends sit on the same switch.
    pub fn is_self_loop(&self) -> bool {
        self.low.switch == self.high.switch
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <--> {}", self.low, self.high)
    }
}
