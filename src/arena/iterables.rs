//! Definition of the interfaces for tree iteration.

use crate::errors::EngineError;
use std::{fmt::Debug, hash::Hash};

/// Container that holds data in a tree node.
pub trait Nodelike<Load, NodeId> {
    fn is_leaf(&self) -> bool;
    fn get(&self) -> &Load;
    fn get_mut(&mut self) -> &mut Load;
    fn id(&self) -> &NodeId;
    /// Distance to the root node. Required for reconstructing ancestor chains.
    fn depth(&self) -> usize;
}

pub trait BaseDirectionIterable<Load, NodeId>
where
    Load: PartialEq,
    NodeId: Eq + Clone + Hash + Debug,
{
    type Node: 'static + Nodelike<Load, NodeId> + Debug;

    fn root(&self) -> Result<&Self::Node, EngineError>;
    fn children(&self, node: &Self::Node) -> Result<Vec<&Self::Node>, EngineError>;
    fn node_by_id(&self, node_id: &NodeId) -> Option<&Self::Node>;
    fn node_by_id_mut(&mut self, node_id: &NodeId) -> Option<&mut Self::Node>;
    fn nodes(&self) -> &[Self::Node];
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A datastructure holding a tree hierarchy of [`Nodelike`] payloads.
///
/// Mutability is tricky once node references have been handed out: prefer
/// building the tree up-front and only mutating payloads in place afterwards.
pub trait DirectionIterable<Load, NodeId>: BaseDirectionIterable<Load, NodeId>
where
    Load: PartialEq,
    NodeId: Eq + Clone + Hash + Debug,
{
    fn iter_depth(&self) -> impl Iterator<Item = &Self::Node>;
    fn iter_depth_sub(&self, root: &Self::Node) -> impl Iterator<Item = &Self::Node>;

    fn iter_breadth(&self) -> impl Iterator<Item = &Self::Node>;

    /// Adds a new node to the tree. A tree can have multiple root nodes; their parent is `None`.
    fn add(&mut self, load: Load, node_ref: NodeId, parent: &NodeId) -> Result<NodeId, EngineError>;

    /// Deletes all nodes and sets a new root.
    fn set_root(&mut self, root_load: Load, root_ref: NodeId) -> NodeId;

    /// Consumes `self`, producing a tree reordered for O(1) depth-first subtree slicing.
    fn depth_first(self) -> impl DepthFirstIterable<Load, NodeId>;
}

pub trait OptimizedDirectionIterable<Load, NodeId>: BaseDirectionIterable<Load, NodeId>
where
    Load: PartialEq,
    NodeId: Eq + Clone + Hash + Debug,
{
    fn iter(&self) -> impl Iterator<Item = &Self::Node>;
    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Self::Node>;
}

pub trait DepthFirstIterable<Load, NodeId>: OptimizedDirectionIterable<Load, NodeId>
where
    Load: PartialEq,
    NodeId: Eq + Clone + Hash + Debug,
{
    fn iter_sub(&self, root: &Self::Node) -> impl Iterator<Item = &Self::Node>;
    fn iter_sub_mut(&mut self, root: &Self::Node) -> impl Iterator<Item = &mut Self::Node>;
}
