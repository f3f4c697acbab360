//! Breadth-first spanning tree towards the root.

use crate::topology::TopologySnapshot;
use sonic_spt_types::{Generation, PortId, SwitchId};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Tree position of one reachable non-root switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeEntry {
    /// Neighbor the switch forwards to in order to reach the root.
    pub next_hop: SwitchId,
    /// Local port leading to the next hop.
    pub port: PortId,
    /// Port on the next hop at the other end of that link.
    pub peer_port: PortId,
    /// Hop count to the root.
    pub hops: u32,
}

/// Next-hop-to-root mapping for every switch reachable from the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanningTree {
    root: SwitchId,
    generation: Generation,
    entries: BTreeMap<SwitchId, TreeEntry>,
    isolated: BTreeSet<SwitchId>,
}

impl SpanningTree {
    pub fn root(&self) -> SwitchId {
        self.root
    }

    /// Generation this tree was computed for.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Tree entry of a reachable non-root switch.
    pub fn entry(&self, id: SwitchId) -> Option<&TreeEntry> {
        self.entries.get(&id)
    }

    pub fn next_hop(&self, id: SwitchId) -> Option<SwitchId> {
        self.entries.get(&id).map(|entry| entry.next_hop)
    }

    /// Hop count to the root; `Some(0)` for the root, `None` if isolated.
    pub fn hops(&self, id: SwitchId) -> Option<u32> {
        if id == self.root {
            Some(0)
        } else {
            self.entries.get(&id).map(|entry| entry.hops)
        }
    }

    pub fn is_root(&self, id: SwitchId) -> bool {
        id == self.root
    }

    pub fn is_reachable(&self, id: SwitchId) -> bool {
        id == self.root || self.entries.contains_key(&id)
    }

    /// Switches present in the topology with no path to the root.
    pub fn isolated(&self) -> &BTreeSet<SwitchId> {
        &self.isolated
    }

    pub fn is_isolated(&self, id: SwitchId) -> bool {
        self.isolated.contains(&id)
    }

    /// `(switch, next_hop)` pairs of the tree.
    pub fn edges(&self) -> impl Iterator<Item = (SwitchId, SwitchId)> + '_ {
        self.entries.iter().map(|(id, entry)| (*id, entry.next_hop))
    }

    /// Ports each switch uses towards its tree children.
    pub fn downlinks(&self) -> BTreeMap<SwitchId, BTreeSet<PortId>> {
        let mut downlinks: BTreeMap<SwitchId, BTreeSet<PortId>> = BTreeMap::new();
        for entry in self.entries.values() {
            downlinks
                .entry(entry.next_hop)
                .or_default()
                .insert(entry.peer_port);
        }
        downlinks
    }

    /// Number of switches with a path to the root, root included.
    pub fn reachable_count(&self) -> usize {
        self.entries.len() + 1
    }
}

/// Runs a breadth-first search from `root` and records, for every switch
/// reached, the neighbor it was first discovered from.
///
/// Neighbors are visited in ascending id order so equal-length paths always
/// resolve the same way. With parallel links the lowest-numbered local port
/// towards the next hop is the uplink.
pub fn compute_tree(
    snapshot: &TopologySnapshot<'_>,
    root: SwitchId,
    generation: Generation,
) -> SpanningTree {
    let mut entries = BTreeMap::new();
    let mut visited = BTreeSet::from([root]);
    let mut queue = VecDeque::from([(root, 0u32)]);

    while let Some((node, hops)) = queue.pop_front() {
        for neighbor in snapshot.neighbors(node) {
            if !visited.insert(neighbor) {
                continue;
            }
            if let Some((port, peer_port)) = snapshot.port_towards(neighbor, node) {
                entries.insert(
                    neighbor,
                    TreeEntry {
                        next_hop: node,
                        port,
                        peer_port,
                        hops: hops + 1,
                    },
                );
            }
            queue.push_back((neighbor, hops + 1));
        }
    }

    let isolated = snapshot
        .switch_ids()
        .filter(|id| !visited.contains(id))
        .collect();

    SpanningTree {
        root,
        generation,
        entries,
        isolated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::TopologyStore;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use sonic_spt_types::Endpoint;

    fn sw(id: u64) -> SwitchId {
        SwitchId::new(id)
    }

    fn ep(id: u64, port: u16) -> Endpoint {
        Endpoint::new(sw(id), PortId::new(port))
    }

    fn store_with(switches: u64, ports: u16) -> TopologyStore {
        let mut store = TopologyStore::default();
        for id in 1..=switches {
            store.add_switch(sw(id), (1..=ports).map(PortId::new)).unwrap();
        }
        store
    }

    #[test]
    fn test_single_switch_tree() {
        let store = store_with(1, 2);
        let tree = compute_tree(&store.snapshot(), sw(1), Generation::new(1));
        assert_eq!(tree.root(), sw(1));
        assert_eq!(tree.hops(sw(1)), Some(0));
        assert_eq!(tree.edges().count(), 0);
        assert!(tree.isolated().is_empty());
        assert_eq!(tree.reachable_count(), 1);
    }

    #[test]
    fn test_triangle_prefers_direct_links() {
        let mut store = store_with(3, 3);
        store.set_link(ep(1, 1), ep(2, 1)).unwrap();
        store.set_link(ep(1, 2), ep(3, 1)).unwrap();
        store.set_link(ep(2, 2), ep(3, 2)).unwrap();

        let tree = compute_tree(&store.snapshot(), sw(1), Generation::new(1));
        assert_eq!(
            tree.entry(sw(2)),
            Some(&TreeEntry { next_hop: sw(1), port: PortId::new(1), peer_port: PortId::new(1), hops: 1 })
        );
        assert_eq!(
            tree.entry(sw(3)),
            Some(&TreeEntry { next_hop: sw(1), port: PortId::new(1), peer_port: PortId::new(2), hops: 1 })
        );
    }

    #[test]
    fn test_square_tie_break_by_lowest_id() {
        // 1 - 2, 1 - 3, 2 - 4, 3 - 4: switch 4 has two shortest paths
        let mut store = store_with(4, 2);
        store.set_link(ep(1, 1), ep(2, 1)).unwrap();
        store.set_link(ep(1, 2), ep(3, 1)).unwrap();
        store.set_link(ep(2, 2), ep(4, 2)).unwrap();
        store.set_link(ep(3, 2), ep(4, 1)).unwrap();

        let tree = compute_tree(&store.snapshot(), sw(1), Generation::new(1));
        assert_eq!(tree.next_hop(sw(4)), Some(sw(2)));
        assert_eq!(tree.entry(sw(4)).unwrap().port, PortId::new(2));
        assert_eq!(tree.hops(sw(4)), Some(2));
    }

    #[test]
    fn test_parallel_links_use_lowest_port() {
        let mut store = store_with(2, 3);
        store.set_link(ep(1, 3), ep(2, 2)).unwrap();
        store.set_link(ep(1, 1), ep(2, 3)).unwrap();

        let tree = compute_tree(&store.snapshot(), sw(1), Generation::new(1));
        let entry = tree.entry(sw(2)).unwrap();
        assert_eq!(entry.port, PortId::new(2));
        assert_eq!(entry.peer_port, PortId::new(3));
    }

    #[test]
    fn test_disconnected_switches_isolated() {
        let mut store = store_with(4, 2);
        store.set_link(ep(1, 1), ep(2, 1)).unwrap();
        store.set_link(ep(3, 1), ep(4, 1)).unwrap();

        let tree = compute_tree(&store.snapshot(), sw(1), Generation::new(1));
        assert!(tree.is_reachable(sw(2)));
        assert!(tree.is_isolated(sw(3)));
        assert!(tree.is_isolated(sw(4)));
        assert_eq!(tree.next_hop(sw(3)), None);
        assert_eq!(tree.hops(sw(4)), None);

        // Reconnecting brings them back
        store.set_link(ep(2, 2), ep(3, 2)).unwrap();
        let tree = compute_tree(&store.snapshot(), sw(1), Generation::new(2));
        assert!(tree.isolated().is_empty());
        assert_eq!(tree.hops(sw(4)), Some(3));
    }

    #[test]
    fn test_downlinks() {
        let mut store = store_with(3, 3);
        store.set_link(ep(1, 1), ep(2, 1)).unwrap();
        store.set_link(ep(2, 2), ep(3, 1)).unwrap();

        let tree = compute_tree(&store.snapshot(), sw(1), Generation::new(1));
        let downlinks = tree.downlinks();
        assert_eq!(downlinks.get(&sw(1)), Some(&BTreeSet::from([PortId::new(1)])));
        assert_eq!(downlinks.get(&sw(2)), Some(&BTreeSet::from([PortId::new(2)])));
        assert_eq!(downlinks.get(&sw(3)), None);
    }

    /// All-pairs hop distances by repeated relaxation, independent of the BFS.
    fn reference_distances(links: &[(u64, u64)], n: u64) -> BTreeMap<(u64, u64), u32> {
        let mut dist = BTreeMap::new();
        for i in 1..=n {
            dist.insert((i, i), 0u32);
        }
        for &(a, b) in links {
            dist.insert((a, b), 1);
            dist.insert((b, a), 1);
        }
        for k in 1..=n {
            for i in 1..=n {
                for j in 1..=n {
                    if let (Some(&ik), Some(&kj)) = (dist.get(&(i, k)), dist.get(&(k, j))) {
                        let through = ik.saturating_add(kj);
                        let entry = dist.entry((i, j)).or_insert(u32::MAX);
                        if through < *entry {
                            *entry = through;
                        }
                    }
                }
            }
        }
        dist
    }

    #[test]
    fn test_random_graphs_shortest_paths_and_acyclic() {
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..50 {
            let n: u64 = rng.gen_range(2..=9);
            let ports_per_switch = 12u16;
            let mut store = store_with(n, ports_per_switch);
            let mut next_port: BTreeMap<u64, u16> = (1..=n).map(|id| (id, 1)).collect();
            let mut links = Vec::new();

            for _ in 0..rng.gen_range(0..=(n * 2)) {
                let a = rng.gen_range(1..=n);
                let b = rng.gen_range(1..=n);
                if a == b || next_port[&a] > ports_per_switch || next_port[&b] > ports_per_switch {
                    continue;
                }
                let pa = next_port[&a];
                let pb = next_port[&b];
                store.set_link(ep(a, pa), ep(b, pb)).unwrap();
                *next_port.get_mut(&a).unwrap() += 1;
                *next_port.get_mut(&b).unwrap() += 1;
                links.push((a, b));
            }

            let tree = compute_tree(&store.snapshot(), sw(1), Generation::new(1));
            let dist = reference_distances(&links, n);

            for id in 1..=n {
                match dist.get(&(id, 1)) {
                    Some(&d) if d != u32::MAX => {
                        assert_eq!(tree.hops(sw(id)), Some(d), "switch {id}");
                        assert!(!tree.is_isolated(sw(id)));
                    }
                    _ => {
                        assert!(tree.is_isolated(sw(id)), "switch {id}");
                        assert_eq!(tree.next_hop(sw(id)), None);
                    }
                }
            }

            // Every next hop is one hop closer, so following next hops always
            // terminates at the root: no cycles.
            for (child, parent) in tree.edges() {
                assert_eq!(tree.hops(parent).unwrap() + 1, tree.hops(child).unwrap());
                let mut cursor = child;
                let mut steps = 0;
                while let Some(next) = tree.next_hop(cursor) {
                    cursor = next;
                    steps += 1;
                    assert!(steps <= n, "cycle through {child}");
                }
                assert_eq!(cursor, sw(1));
            }
        }
    }
}
