//! Linear quadtree index arithmetic
//!
//! A complete 4-ary tree laid out level-major in a flat array, Morton order
//! within each level. Parent/child/neighbor lookups are pure arithmetic;
//! no tree pointers are stored. The flat layout also packs naturally into
//! textures should the tree ever need to live on the GPU.

use crate::math::morton::{decode_morton_2d, encode_morton_2d};

/// Sentinel for "no such node"; check before using a result as an index
pub const INVALID_INDEX: u32 = u32::MAX;

/// Deepest tree a u32 index can address (2 bits per level)
pub const MAX_LEVEL_COUNT: u32 = 16;

/// Number of nodes at a single level
pub fn node_count(level: u32) -> u32 {
    1 << (2 * level)
}

/// Total node count over levels `0..level_count`
pub fn total_node_count(level_count: u32) -> u32 {
    // geometric series: (4^n - 1) / 3
    (((1u64 << (2 * level_count)) - 1) / 3) as u32
}

/// Offset of the first node of a level within the flat array
pub fn level_start_index(level: u32) -> u32 {
    total_node_count(level)
}

/// Level of a linear index, or INVALID_INDEX if out of range
pub fn find_level(index: u32, level_count: u32) -> u32 {
    for level in 0..level_count {
        if index < level_start_index(level + 1) {
            return level;
        }
    }
    INVALID_INDEX
}

/// Grid coordinates of a linear index within its level
pub fn to_cartesian(index: u32, level: u32) -> (u32, u32) {
    debug_assert!(index >= level_start_index(level));
    debug_assert!(index < level_start_index(level + 1));
    decode_morton_2d(index - level_start_index(level))
}

/// Linear index for grid coordinates at a level, or INVALID_INDEX when
/// `x` or `y` falls outside `[0, 2^level)`
pub fn to_index(x: u32, y: u32, level: u32) -> u32 {
    let width = 1u32 << level;
    if x >= width || y >= width {
        return INVALID_INDEX;
    }
    level_start_index(level) + encode_morton_2d(x, y)
}

/// Index of the node offset by (dx, dy) on the same level; no wraparound
pub fn neighbor_index(index: u32, level: u32, dx: i32, dy: i32) -> u32 {
    if index == INVALID_INDEX
        || index < level_start_index(level)
        || index >= level_start_index(level + 1)
    {
        return INVALID_INDEX;
    }
    let (x, y) = to_cartesian(index, level);
    let nx = x as i32 + dx;
    let ny = y as i32 + dy;
    let width = 1i32 << level;
    if nx < 0 || ny < 0 || nx >= width || ny >= width {
        return INVALID_INDEX;
    }
    to_index(nx as u32, ny as u32, level)
}

/// Parent index, or INVALID_INDEX for the root level
pub fn parent_index(index: u32, level: u32) -> u32 {
    if index == INVALID_INDEX || level == 0 {
        return INVALID_INDEX;
    }
    level_start_index(level - 1) + ((index - level_start_index(level)) >> 2)
}

/// Index of the first of the 4 children, or INVALID_INDEX at the deepest level
pub fn first_child_index(index: u32, level: u32, level_count: u32) -> u32 {
    if index == INVALID_INDEX || level + 1 >= level_count {
        return INVALID_INDEX;
    }
    level_start_index(level + 1) + ((index - level_start_index(level)) << 2)
}

/// Depth-first traversal with an explicit stack
///
/// The visitor returns whether to descend into the node's 4 children. The
/// stack never recurses through the call frame, so traversal memory stays
/// bounded at the max supported depth.
pub fn traverse<F>(level_count: u32, root_index: u32, root_level: u32, mut visit: F)
where
    F: FnMut(u32, u32) -> bool,
{
    let mut stack: Vec<(u32, u32)> = Vec::with_capacity(4 * level_count as usize);
    stack.push((root_index, root_level));
    while let Some((index, level)) = stack.pop() {
        if !visit(index, level) {
            continue;
        }
        let first_child = first_child_index(index, level, level_count);
        if first_child == INVALID_INDEX {
            continue;
        }
        // reversed push so children visit in Morton order
        for k in (0..4).rev() {
            stack.push((first_child + k, level + 1));
        }
    }
}

/// Flat per-node payload storage over the linear index space
///
/// One slot per tree node across all levels. Slots only ever mutate in
/// place; the level count is fixed at construction.
pub struct LinearQuadtree<T> {
    level_count: u32,
    nodes: Vec<T>,
}

impl<T> LinearQuadtree<T> {
    /// Create with every slot at its default value
    pub fn new(level_count: u32) -> Self
    where
        T: Default,
    {
        assert!(
            (1..=MAX_LEVEL_COUNT).contains(&level_count),
            "level count {} out of range 1..={}",
            level_count,
            MAX_LEVEL_COUNT
        );
        let total = total_node_count(level_count) as usize;
        Self {
            level_count,
            nodes: (0..total).map(|_| T::default()).collect(),
        }
    }

    /// Create with every slot set to `value`
    pub fn new_filled(level_count: u32, value: T) -> Self
    where
        T: Clone,
    {
        assert!(
            (1..=MAX_LEVEL_COUNT).contains(&level_count),
            "level count {} out of range 1..={}",
            level_count,
            MAX_LEVEL_COUNT
        );
        let total = total_node_count(level_count) as usize;
        Self {
            level_count,
            nodes: vec![value; total],
        }
    }

    pub fn level_count(&self) -> u32 {
        self.level_count
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: u32) -> &T {
        &self.nodes[index as usize]
    }

    pub fn get_mut(&mut self, index: u32) -> &mut T {
        &mut self.nodes[index as usize]
    }

    pub fn set(&mut self, index: u32, value: T) {
        self.nodes[index as usize] = value;
    }
}
