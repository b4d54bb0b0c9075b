//! Math primitives for quadtree-space geometry

pub mod morton;
pub mod aabb;

pub use aabb::Aabb;
pub use morton::{decode_morton_2d, encode_morton_2d};
