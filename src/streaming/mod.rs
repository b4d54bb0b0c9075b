//! Streaming quadtree spatial paging
//!
//! A complete 4-ary tree addressed by Morton-ordered linear indices, a
//! fixed-capacity node pool, and a split/merge state machine that keeps a
//! bounded set of leaf regions resident around a moving pivot. Load/release
//! work is handed to an external consumer through pull-based queues.

pub mod linear;
pub mod pool;
pub mod paging;
pub mod config;

pub use linear::{LinearQuadtree, INVALID_INDEX, MAX_LEVEL_COUNT};
pub use pool::{NodeKey, NodePool, StreamNode};
pub use paging::{NodeRegion, NodeState, StreamingQuadtree, ROOT_INDEX};
pub use config::StreamingConfig;
