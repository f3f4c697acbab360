//! OpenFlow port number type.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// OpenFlow 1.0 port number, meaningful only together with a [`SwitchId`](crate::SwitchId).
///
/// Numbers above [`PortId::MAX_PHYSICAL`] are reserved pseudo-ports
/// (`IN_PORT`, `FLOOD`, `CONTROLLER`, `LOCAL`, ...) and never carry links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortId(u16);

impl PortId {
    /// Highest physical port number (`OFPP_MAX`).
    pub const MAX_PHYSICAL: u16 = 0xff00;

    /// The switch-local pseudo-port (`OFPP_LOCAL`).
    pub const LOCAL: PortId = PortId(0xfffe);

    /// The controller pseudo-port (`OFPP_CONTROLLER`).
    pub const CONTROLLER: PortId = PortId(0xfffd);

    /// Creates a port id from a raw port number.
    pub const fn new(port_no: u16) -> Self {
        PortId(port_no)
    }

    /// Returns the raw port number.
    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns true if this is a physical port rather than a reserved pseudo-port.
    pub const fn is_physical(&self) -> bool {
        self.0 <= Self::MAX_PHYSICAL
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::LOCAL => write!(f, "LOCAL"),
            Self::CONTROLLER => write!(f, "CONTROLLER"),
            _ => write!(f, "{}", self.0),
        }
    }
}

impl FromStr for PortId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "LOCAL" => Ok(Self::LOCAL),
            "CONTROLLER" => Ok(Self::CONTROLLER),
            other => other
                .parse::<u16>()
                .map(PortId)
                .map_err(|_| ParseError::InvalidPortId(s.to_string())),
        }
    }
}

impl From<u16> for PortId {
    fn from(port_no: u16) -> Self {
        PortId(port_no)
    }
}

impl From<PortId> for u16 {
    fn from(port: PortId) -> u16 {
        port.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_physical_range() {
        assert!(PortId::new(1).is_physical());
        assert!(PortId::new(PortId::MAX_PHYSICAL).is_physical());
        assert!(!PortId::LOCAL.is_physical());
        assert!(!PortId::CONTROLLER.is_physical());
        assert!(!PortId::new(0xfffb).is_physical());
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("3".parse::<PortId>().unwrap(), PortId::new(3));
        assert_eq!("LOCAL".parse::<PortId>().unwrap(), PortId::LOCAL);
        assert_eq!(PortId::new(12).to_string(), "12");
        assert_eq!(PortId::LOCAL.to_string(), "LOCAL");
        assert!("eth0".parse::<PortId>().is_err());
        assert!("70000".parse::<PortId>().is_err());
    }
}
