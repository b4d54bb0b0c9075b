//! Fixed-capacity arena for streaming quadtree nodes

use crate::core::types::Vec3;
use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Generational handle to a node in the pool
    pub struct NodeKey;
}

/// A resident quadtree node, in quadtree space
#[derive(Clone, Copy, Debug)]
pub struct StreamNode {
    /// This node's own linear index
    pub index: u32,
    /// Depth in the tree, 0 = root
    pub level: u32,
    /// Center position; x,y in [-1,1], z = base height in [0,1]
    pub origin: Vec3,
    /// Full XY extent
    pub width: f32,
    /// Z extent
    pub height: f32,
}

/// Fixed-capacity node arena with O(1) alloc/free
///
/// Keys stay valid until the node is freed; reusing a slot bumps the
/// generation so stale keys resolve to `None`. There is no dynamic growth:
/// callers size the pool up front and exhaustion is fatal.
pub struct NodePool {
    nodes: SlotMap<NodeKey, StreamNode>,
    capacity: usize,
}

impl NodePool {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "node pool capacity must be non-zero");
        log::debug!("created node pool: {} slots", capacity);
        Self {
            nodes: SlotMap::with_capacity_and_key(capacity),
            capacity,
        }
    }

    /// Allocate a node; panics when the pool is exhausted
    pub fn alloc(&mut self, node: StreamNode) -> NodeKey {
        assert!(
            self.nodes.len() < self.capacity,
            "node pool exhausted ({} slots)",
            self.capacity
        );
        self.nodes.insert(node)
    }

    /// Return a node to the pool; panics on a stale or foreign key
    pub fn free(&mut self, key: NodeKey) {
        let removed = self.nodes.remove(key);
        assert!(removed.is_some(), "freed a node that was not allocated");
    }

    pub fn get(&self, key: NodeKey) -> Option<&StreamNode> {
        self.nodes.get(key)
    }

    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut StreamNode> {
        self.nodes.get_mut(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
