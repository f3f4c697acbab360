//! Datapath identifier type.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// OpenFlow datapath identifier of a switch.
///
/// The ordering of `SwitchId` is the numeric ordering of the datapath id and
/// drives root election and every tie-break in tree computation.
///
/// # Examples
///
/// ```
/// use sonic_spt_types::SwitchId;
///
/// let dpid: SwitchId = "00-00-00-00-00-01".parse().unwrap();
/// assert_eq!(dpid, SwitchId::new(1));
/// assert_eq!(dpid.to_string(), "00-00-00-00-00-01");
///
/// // Mininet switch names map to their datapath id
/// let s2: SwitchId = "s2".parse().unwrap();
/// assert!(dpid < s2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SwitchId(u64);

impl SwitchId {
    /// Creates a switch id from a raw datapath id.
    pub const fn new(dpid: u64) -> Self {
        SwitchId(dpid)
    }

    /// Returns the raw datapath id.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SwitchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Lower 48 bits are the MAC part, upper 16 bits the implementer part.
        let bytes = self.0.to_be_bytes();
        write!(
            f,
            "{:02x}-{:02x}-{:02x}-{:02x}-{:02x}-{:02x}",
            bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]
        )?;
        let upper = self.0 >> 48;
        if upper != 0 {
            write!(f, "|{upper}")?;
        }
        Ok(())
    }
}

impl FromStr for SwitchId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidSwitchId(s.to_string());
        let s = s.trim();

        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return u64::from_str_radix(hex, 16).map(SwitchId).map_err(|_| invalid());
        }

        if let Some(num) = s.strip_prefix('s') {
            return num.parse::<u64>().map(SwitchId).map_err(|_| invalid());
        }

        if s.contains('-') {
            let (mac_part, upper) = match s.split_once('|') {
                Some((mac, upper)) => (mac, upper.parse::<u64>().map_err(|_| invalid())?),
                None => (s, 0),
            };
            if upper > u64::from(u16::MAX) {
                return Err(invalid());
            }

            let parts: Vec<&str> = mac_part.split('-').collect();
            if parts.len() != 6 {
                return Err(invalid());
            }
            let mut dpid = upper;
            for part in parts {
                let octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
                dpid = (dpid << 8) | u64::from(octet);
            }
            return Ok(SwitchId(dpid));
        }

        s.parse::<u64>().map(SwitchId).map_err(|_| invalid())
    }
}

impl From<u64> for SwitchId {
    fn from(dpid: u64) -> Self {
        SwitchId(dpid)
    }
}

impl From<SwitchId> for u64 {
    fn from(id: SwitchId) -> u64 {
        id.0
    }
}
