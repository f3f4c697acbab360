//! Root selection.

use crate::error::SptError;
use crate::topology::TopologySnapshot;
use sonic_spt_types::SwitchId;

/// Returns the switch with the lowest id present in the snapshot.
///
/// Reachability plays no part: an isolated switch with the lowest id stays
/// root until it leaves the store.
pub fn select_root(snapshot: &TopologySnapshot<'_>) -> Result<SwitchId, SptError> {
    snapshot.switch_ids().next().ok_or(SptError::NoRootAvailable)
}
