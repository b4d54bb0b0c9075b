//! Shadow atlas region allocator
//!
//! Packs power-of-two shadow map regions into texture array layers using a
//! boolean quadtree per layer, `true` meaning the subtree rooted there is
//! entirely free. Reuses the streaming quadtree's linear index arithmetic
//! but carries none of its residency semantics: this is plain
//! free/occupied space allocation.

use crate::streaming::linear::{self, LinearQuadtree, INVALID_INDEX};

/// A granted atlas region, in pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtlasRegion {
    pub layer: u32,
    /// Linear quadtree index within the layer
    pub index: u32,
    pub level: u32,
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

/// Quadtree-backed allocator for square atlas regions
pub struct ShadowAtlas {
    size: u32,
    min_size: u32,
    max_size: u32,
    layers: Vec<LinearQuadtree<bool>>,
}

impl ShadowAtlas {
    /// Create an atlas of `layer_count` square layers of `size` pixels
    ///
    /// All sizes must be powers of two; allocations are clamped to
    /// `[min_size, max_size]`.
    pub fn new(size: u32, min_size: u32, max_size: u32, layer_count: u32) -> Self {
        assert!(
            size.is_power_of_two() && min_size.is_power_of_two() && max_size.is_power_of_two(),
            "atlas sizes must be powers of two"
        );
        assert!(min_size <= max_size && max_size <= size, "atlas size limits out of order");
        assert!(layer_count > 0, "atlas needs at least one layer");

        let level_count = (size / min_size).trailing_zeros() + 1;
        let layers = (0..layer_count)
            .map(|_| LinearQuadtree::new_filled(level_count, true))
            .collect();
        log::debug!(
            "created shadow atlas: {}x{} px, {} layers, {} levels",
            size,
            size,
            layer_count,
            level_count
        );
        Self {
            size,
            min_size,
            max_size,
            layers,
        }
    }

    /// Allocate a square region of at least `requested` pixels
    ///
    /// The size is rounded up to a power of two and clamped to the atlas
    /// limits. Returns None when every layer is exhausted.
    pub fn alloc(&mut self, requested: u32) -> Option<AtlasRegion> {
        let size = requested.next_power_of_two().clamp(self.min_size, self.max_size);
        let target_level = (self.size / size).trailing_zeros();

        for (layer, tree) in self.layers.iter_mut().enumerate() {
            if let Some(index) = Self::alloc_recursive(tree, 0, 0, target_level) {
                let (cx, cy) = linear::to_cartesian(index, target_level);
                log::trace!("atlas alloc: {} px at layer {} index {}", size, layer, index);
                return Some(AtlasRegion {
                    layer: layer as u32,
                    index,
                    level: target_level,
                    x: cx * size,
                    y: cy * size,
                    size,
                });
            }
        }
        None
    }

    /// Release a previously granted region
    pub fn free(&mut self, region: AtlasRegion) {
        let tree = &mut self.layers[region.layer as usize];
        assert!(
            !*tree.get(region.index),
            "freed an atlas region that was not allocated"
        );
        Self::mark_subtree(tree, region.index, region.level, true);

        // coalesce upward: a parent is free only once all four children are
        let mut index = region.index;
        let mut level = region.level;
        while level > 0 {
            let parent = linear::parent_index(index, level);
            let first_child = linear::first_child_index(parent, level - 1, tree.level_count());
            if (0..4).all(|k| *tree.get(first_child + k)) {
                tree.set(parent, true);
                index = parent;
                level -= 1;
            } else {
                break;
            }
        }
        log::trace!("atlas free: layer {} index {}", region.layer, region.index);
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn min_size(&self) -> u32 {
        self.min_size
    }

    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    pub fn layer_count(&self) -> u32 {
        self.layers.len() as u32
    }

    fn alloc_recursive(
        tree: &mut LinearQuadtree<bool>,
        index: u32,
        level: u32,
        target_level: u32,
    ) -> Option<u32> {
        if level == target_level {
            if *tree.get(index) {
                // claim the whole block so deeper searches skip it
                Self::mark_subtree(tree, index, level, false);
                return Some(index);
            }
            return None;
        }
        // a false interior node may still have free space below; only the
        // target-level check consults the flag
        let first_child = linear::first_child_index(index, level, tree.level_count());
        debug_assert_ne!(first_child, INVALID_INDEX);
        for k in 0..4 {
            if let Some(found) = Self::alloc_recursive(tree, first_child + k, level + 1, target_level)
            {
                tree.set(index, false);
                return Some(found);
            }
        }
        None
    }

    fn mark_subtree(tree: &mut LinearQuadtree<bool>, index: u32, level: u32, value: bool) {
        tree.set(index, value);
        let first_child = linear::first_child_index(index, level, tree.level_count());
        if first_child == INVALID_INDEX {
            return;
        }
        for k in 0..4 {
            Self::mark_subtree(tree, first_child + k, level + 1, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlaps(a: &AtlasRegion, b: &AtlasRegion) -> bool {
        a.layer == b.layer
            && a.x < b.x + b.size
            && a.x + a.size > b.x
            && a.y < b.y + b.size
            && a.y + a.size > b.y
    }

    #[test]
    fn test_alloc_rounds_and_clamps() {
        let mut atlas = ShadowAtlas::new(1024, 64, 512, 1);

        assert_eq!(atlas.alloc(100).unwrap().size, 128);
        assert_eq!(atlas.alloc(1).unwrap().size, 64);
        assert_eq!(atlas.alloc(4096).unwrap().size, 512);
        assert_eq!(atlas.alloc(512).unwrap().size, 512);
    }

    #[test]
    fn test_alloc_free_roundtrip() {
        let mut atlas = ShadowAtlas::new(512, 64, 512, 1);

        let region = atlas.alloc(512).unwrap();
        assert_eq!((region.x, region.y), (0, 0));
        // the layer is one solid block now
        assert!(atlas.alloc(64).is_none());

        atlas.free(region);
        assert!(atlas.alloc(64).is_some());
    }

    #[test]
    fn test_fill_drain_refill() {
        let mut atlas = ShadowAtlas::new(512, 64, 512, 1);

        // fill the layer with 64px cells
        let cells = (512 / 64) * (512 / 64);
        let mut regions = Vec::new();
        for _ in 0..cells {
            regions.push(atlas.alloc(64).unwrap());
        }
        assert!(atlas.alloc(64).is_none());

        // no permanent fragmentation: a full free cycle coalesces back to
        // the root and a layer-sized block fits again
        for region in regions.drain(..) {
            atlas.free(region);
        }
        assert!(atlas.alloc(512).is_some());
    }

    #[test]
    fn test_mixed_sizes_do_not_overlap() {
        let mut atlas = ShadowAtlas::new(1024, 64, 512, 1);

        let mut regions = Vec::new();
        for &size in &[512, 128, 256, 64, 128, 256, 64, 512] {
            if let Some(region) = atlas.alloc(size) {
                regions.push(region);
            }
        }
        assert!(regions.len() >= 6);

        for (i, a) in regions.iter().enumerate() {
            assert!(a.x + a.size <= 1024 && a.y + a.size <= 1024);
            for b in regions.iter().skip(i + 1) {
                assert!(!overlaps(a, b), "{:?} overlaps {:?}", a, b);
            }
        }
    }

    #[test]
    fn test_blocks_protect_their_interior() {
        let mut atlas = ShadowAtlas::new(512, 64, 512, 1);

        // a 256 block must not be carved up by later small allocations
        let block = atlas.alloc(256).unwrap();
        let mut smalls = Vec::new();
        while let Some(region) = atlas.alloc(64) {
            smalls.push(region);
        }
        for small in &smalls {
            assert!(!overlaps(&block, small), "{:?} inside {:?}", small, block);
        }
        // remaining three quadrants worth of 64px cells
        assert_eq!(smalls.len(), 3 * 16);
    }

    #[test]
    fn test_partial_free_keeps_siblings() {
        let mut atlas = ShadowAtlas::new(256, 64, 256, 1);

        let a = atlas.alloc(128).unwrap();
        let b = atlas.alloc(128).unwrap();

        atlas.free(a);
        // b still occupies its quadrant, so a full-layer block cannot fit
        assert!(atlas.alloc(256).is_none());

        atlas.free(b);
        assert!(atlas.alloc(256).is_some());
    }

    #[test]
    fn test_layers_spill() {
        let mut atlas = ShadowAtlas::new(256, 256, 256, 3);

        let regions: Vec<_> = (0..3).map(|_| atlas.alloc(256).unwrap()).collect();
        assert_eq!(regions[0].layer, 0);
        assert_eq!(regions[1].layer, 1);
        assert_eq!(regions[2].layer, 2);
        assert!(atlas.alloc(256).is_none());
    }
}
