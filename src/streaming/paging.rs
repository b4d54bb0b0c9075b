//! Streaming quadtree: the split/merge residency state machine
//!
//! Every update tick the tree is walked top-down from the root, splitting
//! nodes whose bounds fall inside their level's LOD radius around the pivot
//! and merging everything else. Nodes entering or leaving the wanted set are
//! pushed onto load/release queues that an external consumer services at its
//! own rate, completing transitions through [`StreamingQuadtree::set_node_data`].
//!
//! The tree is single-threaded and synchronous: all methods must be called
//! from the thread that owns the instance, and `set_node_data` must not be
//! interleaved with an in-progress `update`.

use crate::core::types::{Result, Vec3};
use crate::math::Aabb;
use crate::streaming::config::StreamingConfig;
use crate::streaming::linear::{self, LinearQuadtree, INVALID_INDEX, MAX_LEVEL_COUNT};
use crate::streaming::pool::{NodeKey, NodePool, StreamNode};

/// Linear index of the root slot
pub const ROOT_INDEX: u32 = 0;

/// Residency state of one quadtree slot
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NodeState {
    /// No node allocated, no data
    #[default]
    Invalid,
    /// Node allocated, waiting in the load queue
    QueuedForLoad,
    /// Consumer data resident; the node may now split
    Loaded,
    /// Still resident, waiting in the release queue
    QueuedForRelease,
}

/// Geometry of one node, in quadtree space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeRegion {
    /// Center position; x,y in [-1,1], z = base height
    pub origin: Vec3,
    /// Full XY extent
    pub width: f32,
    /// Z extent
    pub height: f32,
    pub level: u32,
}

/// Streaming quadtree paging engine, generic over the consumer payload `D`
///
/// Three parallel [`LinearQuadtree`]s share one index space: the borrowed
/// node handle, the residency state, and the opaque payload. Their slots
/// must always agree; see the state/data consistency checks in the tests.
pub struct StreamingQuadtree<D> {
    level_count: u32,
    max_level: u32,
    pool: NodePool,
    /// Node handle per slot; None = slot not allocated
    nodes: LinearQuadtree<Option<NodeKey>>,
    states: LinearQuadtree<NodeState>,
    /// Consumer payload per slot; Some = resident
    data: LinearQuadtree<Option<D>>,
    load_queue: Vec<u32>,
    release_queue: Vec<u32>,
    draw_list: Vec<u32>,
    dirty: bool,
    pivot: Vec3,
    facing: Vec3,
    last_pivot: Vec3,
    pivot_epsilon: f32,
    lod_scale: f32,
    /// Squared split radius per level; grows geometrically toward the root
    lod_radii_sq: Vec<f32>,
}

impl<D> StreamingQuadtree<D> {
    /// Create a tree with the root allocated and queued for load
    pub fn new(level_count: u32, node_pool_capacity: usize) -> Self {
        assert!(
            (1..=MAX_LEVEL_COUNT).contains(&level_count),
            "level count {} out of range 1..={}",
            level_count,
            MAX_LEVEL_COUNT
        );
        let mut tree = Self {
            level_count,
            max_level: level_count - 1,
            pool: NodePool::new(node_pool_capacity),
            nodes: LinearQuadtree::new(level_count),
            states: LinearQuadtree::new(level_count),
            data: LinearQuadtree::new(level_count),
            load_queue: Vec::new(),
            release_queue: Vec::new(),
            draw_list: Vec::new(),
            dirty: true,
            pivot: Vec3::ZERO,
            facing: Vec3::ZERO,
            last_pivot: Vec3::ZERO,
            pivot_epsilon: 1e-4,
            lod_scale: 1.0,
            lod_radii_sq: Vec::new(),
        };
        tree.recompute_lod_radii();

        let root = tree.pool.alloc(StreamNode {
            index: ROOT_INDEX,
            level: 0,
            origin: Vec3::ZERO,
            width: 2.0,
            height: 1.0,
        });
        tree.nodes.set(ROOT_INDEX, Some(root));
        tree.queue_for_load(ROOT_INDEX);

        log::debug!(
            "created streaming quadtree: {} levels, {} slots",
            level_count,
            tree.nodes.len()
        );
        tree
    }

    /// Validated construction from external configuration
    pub fn from_config(config: &StreamingConfig) -> Result<Self> {
        config.validate()?;
        let mut tree = Self::new(config.level_count, config.node_pool_capacity);
        tree.pivot_epsilon = config.pivot_epsilon;
        tree.set_lod_scale(config.lod_scale);
        Ok(tree)
    }

    /// Supply the pivot position and facing direction, in quadtree space
    pub fn set_pivot(&mut self, position: Vec3, facing: Vec3) {
        self.pivot = position;
        self.facing = facing.normalize_or_zero();
    }

    /// Tune subdivision aggressiveness; larger values split farther out
    pub fn set_lod_scale(&mut self, lod_scale: f32) {
        if lod_scale != self.lod_scale {
            self.lod_scale = lod_scale;
            self.recompute_lod_radii();
            self.dirty = true;
        }
    }

    /// Run one residency update tick
    ///
    /// Re-evaluates split/merge decisions when the pivot moved past the
    /// epsilon or the LOD scale changed, then rebuilds the draw list. The
    /// split/merge pass always completes before the draw-list rebuild, and
    /// the load-queue sort runs last regardless of dirtiness.
    pub fn update(&mut self) {
        if self.pivot.distance_squared(self.last_pivot) > self.pivot_epsilon * self.pivot_epsilon {
            self.last_pivot = self.pivot;
            self.dirty = true;
        }
        if self.dirty {
            self.update_residency();
            self.rebuild_draw_list();
            self.dirty = false;
        }
        self.sort_load_queue();
    }

    /// Complete a queued transition for `index`
    ///
    /// `Some` marks the node loaded (which may immediately unlock a pending
    /// split); `None` hands the slot back, completing a queued release or
    /// forcibly evicting a loaded node. A `Some` completion for a load that
    /// was cancelled while the consumer held it is silently dropped.
    pub fn set_node_data(&mut self, index: u32, data: Option<D>) {
        match data {
            Some(payload) => {
                // a popped load may have been cancelled by a merge while the
                // consumer held it; the slot has no node then and the late
                // payload is dropped
                if self.nodes.get(index).is_none() {
                    log::trace!("node {}: late load completion dropped", index);
                    return;
                }
                // tolerate consumers that complete a load without popping,
                // and cancel a pending release when data is forced onto a
                // queued node
                remove_queued(&mut self.load_queue, index);
                remove_queued(&mut self.release_queue, index);
                self.data.set(index, Some(payload));
                self.states.set(index, NodeState::Loaded);
                self.dirty = true;
            }
            None => {
                self.data.set(index, None);
                self.release_node(index);
                self.dirty = true;
            }
        }
    }

    /// Pop the most urgent pending load, if any
    pub fn pop_load_queue(&mut self) -> Option<u32> {
        self.load_queue.pop()
    }

    /// Pop the next pending release, if any
    pub fn pop_release_queue(&mut self) -> Option<u32> {
        self.release_queue.pop()
    }

    /// Node indices that should render this frame: loaded leaves, or loaded
    /// interior nodes standing in while their children stream
    pub fn draw_list(&self) -> &[u32] {
        &self.draw_list
    }

    pub fn node_state(&self, index: u32) -> NodeState {
        *self.states.get(index)
    }

    pub fn node_data(&self, index: u32) -> Option<&D> {
        self.data.get(index).as_ref()
    }

    /// Geometry of an allocated node, None for unallocated slots
    pub fn node_region(&self, index: u32) -> Option<NodeRegion> {
        let key = (*self.nodes.get(index))?;
        let node = self.pool.get(key)?;
        Some(NodeRegion {
            origin: node.origin,
            width: node.width,
            height: node.height,
            level: node.level,
        })
    }

    pub fn load_queue_len(&self) -> usize {
        self.load_queue.len()
    }

    pub fn release_queue_len(&self) -> usize {
        self.release_queue.len()
    }

    /// Number of currently allocated nodes
    pub fn resident_nodes(&self) -> usize {
        self.pool.len()
    }

    pub fn level_count(&self) -> u32 {
        self.level_count
    }

    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    pub fn pivot(&self) -> Vec3 {
        self.pivot
    }

    // --- split/merge pass ---

    fn update_residency(&mut self) {
        let level_count = self.level_count;
        linear::traverse(level_count, ROOT_INDEX, 0, |index, level| {
            if self.want_split(index, level) {
                self.split(index, level);
                true
            } else {
                self.merge(index, level);
                false
            }
        });
    }

    fn want_split(&self, index: u32, level: u32) -> bool {
        if level >= self.max_level {
            return false;
        }
        // a node must finish loading before its children can be considered
        if *self.states.get(index) != NodeState::Loaded {
            return false;
        }
        let Some(key) = *self.nodes.get(index) else {
            return false;
        };
        let Some(node) = self.pool.get(key) else {
            return false;
        };
        let half = node.width * 0.5;
        let bounds = Aabb::new(
            Vec3::new(node.origin.x - half, node.origin.y - half, node.origin.z),
            Vec3::new(
                node.origin.x + half,
                node.origin.y + half,
                node.origin.z + node.height,
            ),
        );
        bounds.distance_sq(self.pivot) < self.lod_radii_sq[level as usize]
    }

    fn split(&mut self, index: u32, level: u32) {
        let first_child = linear::first_child_index(index, level, self.level_count);
        debug_assert_ne!(first_child, INVALID_INDEX);

        let key = (*self.nodes.get(index)).expect("split of unallocated slot");
        let parent = *self.pool.get(key).expect("split of freed node");
        let quarter = parent.width * 0.25;

        for k in 0..4u32 {
            let child_index = first_child + k;
            if self.nodes.get(child_index).is_none() {
                let x = parent.origin.x + if k & 2 != 0 { quarter } else { -quarter };
                let y = parent.origin.y + if k & 1 != 0 { quarter } else { -quarter };
                let child_key = self.pool.alloc(StreamNode {
                    index: child_index,
                    level: level + 1,
                    origin: Vec3::new(x, y, parent.origin.z),
                    width: parent.width * 0.5,
                    height: parent.height,
                });
                self.nodes.set(child_index, Some(child_key));
            }
            // a child may be in any state from a previous cycle; queueing
            // handles every case uniformly
            self.queue_for_load(child_index);
        }
        log::trace!("split node {} at level {}", index, level);
    }

    fn merge(&mut self, index: u32, level: u32) {
        let first_child = linear::first_child_index(index, level, self.level_count);
        if first_child == INVALID_INDEX {
            return;
        }
        // leaf test: nothing allocated below
        if (0..4).all(|k| self.nodes.get(first_child + k).is_none()) {
            return;
        }
        // post-order: descendants first, then the children themselves;
        // the node itself stays resident as the new effective leaf
        for k in 0..4 {
            let child_index = first_child + k;
            if self.nodes.get(child_index).is_some() {
                self.merge(child_index, level + 1);
                self.queue_for_release(child_index);
            }
        }
        log::trace!("merged node {} at level {}", index, level);
    }

    // --- queue operations ---

    fn queue_for_load(&mut self, index: u32) {
        match *self.states.get(index) {
            NodeState::QueuedForLoad | NodeState::Loaded => {}
            NodeState::QueuedForRelease => {
                // the data was never dropped, so cancel the release and keep it
                remove_queued(&mut self.release_queue, index);
                self.states.set(index, NodeState::Loaded);
                log::trace!("node {}: pending release cancelled", index);
            }
            NodeState::Invalid => {
                debug_assert!(!self.load_queue.contains(&index));
                self.load_queue.push(index);
                self.states.set(index, NodeState::QueuedForLoad);
            }
        }
    }

    fn queue_for_release(&mut self, index: u32) {
        match *self.states.get(index) {
            NodeState::QueuedForRelease | NodeState::Invalid => {}
            NodeState::QueuedForLoad => {
                // nothing was loaded yet, so there is nothing to hand back
                remove_queued(&mut self.load_queue, index);
                self.release_node(index);
                log::trace!("node {}: pending load cancelled", index);
            }
            NodeState::Loaded => {
                debug_assert!(!self.release_queue.contains(&index));
                self.release_queue.push(index);
                self.states.set(index, NodeState::QueuedForRelease);
            }
        }
    }

    fn release_node(&mut self, index: u32) {
        debug_assert!(
            self.data.get(index).is_none(),
            "released node {} still holds data",
            index
        );
        let key = self
            .nodes
            .get_mut(index)
            .take()
            .expect("released a node that was never allocated");
        self.pool.free(key);
        self.states.set(index, NodeState::Invalid);
        // tolerate consumers that complete a release without popping
        remove_queued(&mut self.release_queue, index);
    }

    // --- draw list & queue ordering ---

    fn rebuild_draw_list(&mut self) {
        self.draw_list.clear();
        let level_count = self.level_count;
        let states = &self.states;
        let draw_list = &mut self.draw_list;
        linear::traverse(level_count, ROOT_INDEX, 0, |index, level| {
            if *states.get(index) != NodeState::Loaded {
                // keep looking for loaded descendants
                return true;
            }
            let first_child = linear::first_child_index(index, level, level_count);
            let covered = first_child != INVALID_INDEX
                && (0..4).all(|k| *states.get(first_child + k) == NodeState::Loaded);
            if !covered {
                // render this node as a stand-in until the children arrive
                draw_list.push(index);
            }
            covered
        });
    }

    fn sort_load_queue(&mut self) {
        if self.load_queue.len() < 2 {
            return;
        }
        let mut keyed: Vec<(f32, u32)> = self
            .load_queue
            .iter()
            .map(|&index| (self.load_priority(index), index))
            .collect();
        // ascending: pop_load_queue takes from the back, so the most urgent
        // entry must end up last
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
        self.load_queue.clear();
        self.load_queue.extend(keyed.into_iter().map(|(_, index)| index));
    }

    /// Higher for nearby nodes in front of the facing direction
    fn load_priority(&self, index: u32) -> f32 {
        let Some(key) = *self.nodes.get(index) else {
            return f32::MIN;
        };
        let Some(node) = self.pool.get(key) else {
            return f32::MIN;
        };
        let center = Vec3::new(
            node.origin.x,
            node.origin.y,
            node.origin.z + node.height * 0.5,
        );
        let to = center - self.pivot;
        let dist_sq = to.length_squared();
        if dist_sq <= f32::EPSILON {
            return f32::MAX; // pivot inside the node
        }
        (1.0 + self.facing.dot(to / dist_sq.sqrt())) / (1.0 + dist_sq)
    }

    fn recompute_lod_radii(&mut self) {
        let mut radii = vec![0.0f32; self.level_count as usize];
        // the leaf split radius is one leaf-node width; each shallower level
        // grows it geometrically, so split distances increase monotonically
        // from leaf to root
        let mut radius = 2.0 / (1u32 << self.max_level) as f32;
        for level in (0..self.level_count).rev() {
            radii[level as usize] = radius * radius;
            radius *= 1.0 + self.lod_scale;
        }
        self.lod_radii_sq = radii;
    }
}

fn remove_queued(queue: &mut Vec<u32>, index: u32) {
    if let Some(pos) = queue.iter().position(|&i| i == index) {
        queue.remove(pos);
    }
}
