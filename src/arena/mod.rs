//! [Arena allocated](https://en.wikipedia.org/wiki/Region-based_memory_management)
//! tree structure for fast, directional (i.e., breadth-first/depth-first) traversal.
//!
//! Used by [`crate::kinematics`] to represent a [`crate::world::World`]'s frame
//! hierarchy: frames are nodes, joints are the parent-child edges, and a
//! [`crate::switch::Switch`] mutates the tree between time slices.

pub mod depth;
pub mod directed;
pub mod iterables;
mod utils;

pub use depth::DepthFirstArenaTree;
pub use directed::{ArenaIndex, ArenaNode, DirectedArenaTree};
pub use iterables::{BaseDirectionIterable, DepthFirstIterable, DirectionIterable, Nodelike, OptimizedDirectionIterable};
