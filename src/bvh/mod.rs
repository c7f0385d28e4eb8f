//! Bounding-volume primitives and the mutable BVH used as the interest index.
//!
//! ```text
//! Tree<B, T>  (tree.rs)    ← insert / delete / find-by-point
//!   └── Bound (bound.rs)   ← Aabb, Sphere
//!         └── Vector (vector.rs) ← Vec2, Vec3
//! ```

pub mod bound;
pub mod tree;
pub mod vector;

pub use bound::{Aabb, Bound, Sphere};
pub use tree::{NodeHandle, Tree};
pub use vector::{Scalar, Vec2, Vec3, Vector};
