//! Quadstream - a streaming quadtree spatial paging engine
//!
//! Keeps a bounded set of leaf regions resident around a moving pivot by
//! walking a linear quadtree every update and pushing load/release work onto
//! queues serviced by an external consumer.

pub mod core;
pub mod math;
pub mod streaming;
pub mod atlas;
