//! Root election and spanning tree computation.
//!
//! Both are pure functions of a [`TopologySnapshot`](crate::topology::TopologySnapshot):
//! the root is the lowest switch id present, the tree is a breadth-first
//! search from it with neighbors visited in ascending id order.

mod path;
mod root;

pub use path::{compute_tree, SpanningTree, TreeEntry};
pub use root::select_root;
