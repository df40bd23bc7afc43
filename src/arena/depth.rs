//! Arena tree reordered into depth-first storage order for O(1) subtree
//! slicing (no reference-walking needed at iteration time).

use super::{
    iterables::OptimizedDirectionIterable, utils::sort_by_indices, ArenaNode, BaseDirectionIterable,
    DepthFirstIterable, DirectedArenaTree, DirectionIterable,
};
use crate::errors::EngineError;
use itertools::Itertools;
use std::{fmt::Debug, hash::Hash};

/// Wraps a [`DirectedArenaTree`] whose nodes have been permuted so that a
/// depth-first walk is simply a storage-order slice `nodes[start..start+width]`.
pub struct DepthFirstArenaTree<Load, NodeId>(DirectedArenaTree<Load, NodeId>);

impl<Load, NodeId> From<DirectedArenaTree<Load, NodeId>> for DepthFirstArenaTree<Load, NodeId>
where
    Load: 'static + Debug + PartialEq,
    NodeId: Eq + 'static + Clone + Hash + Debug,
{
    fn from(mut value: DirectedArenaTree<Load, NodeId>) -> Self {
        let optimal_order = value.iter_depth().map(|node| node.index()).collect_vec();

        DirectedArenaTree::update_child_indices(&mut value.nodes, &optimal_order);
        sort_by_indices(&mut value.nodes, optimal_order);

        value.lookup.clear();
        value.nodes.iter().for_each(|node| {
            value.lookup.insert(node.id.clone(), node.index);
        });
        Self(value)
    }
}

impl<Load, NodeId> BaseDirectionIterable<Load, NodeId> for DepthFirstArenaTree<Load, NodeId>
where
    Load: 'static + Debug + PartialEq,
    NodeId: Eq + 'static + Clone + Hash + Debug,
{
    type Node = ArenaNode<Load, NodeId>;

    fn root(&self) -> Result<&Self::Node, EngineError> {
        self.0.root()
    }

    fn children(&self, node: &Self::Node) -> Result<Vec<&Self::Node>, EngineError> {
        self.0.children(node)
    }

    fn node_by_id(&self, node_id: &NodeId) -> Option<&Self::Node> {
        self.0.node_by_id(node_id)
    }

    fn node_by_id_mut(&mut self, node_id: &NodeId) -> Option<&mut Self::Node> {
        self.0.node_by_id_mut(node_id)
    }

    fn nodes(&self) -> &[Self::Node] {
        self.0.nodes()
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

impl<Load, NodeId> OptimizedDirectionIterable<Load, NodeId> for DepthFirstArenaTree<Load, NodeId>
where
    Load: 'static + Debug + PartialEq,
    NodeId: Eq + 'static + Clone + Hash + Debug,
{
    fn iter(&self) -> impl Iterator<Item = &Self::Node> {
        self.0.nodes.iter()
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Self::Node> {
        self.0.nodes.iter_mut()
    }
}

impl<Load, NodeId> DepthFirstIterable<Load, NodeId> for DepthFirstArenaTree<Load, NodeId>
where
    Load: 'static + Debug + PartialEq,
    NodeId: Eq + 'static + Clone + Hash + Debug,
{
    fn iter_sub(&self, root: &Self::Node) -> impl Iterator<Item = &Self::Node> {
        let (start, width) = (root.index().0, root.width);
        self.0.nodes[start..start + width].iter()
    }

    fn iter_sub_mut(&mut self, root: &Self::Node) -> impl Iterator<Item = &mut Self::Node> {
        let (start, width) = (root.index().0, root.width);
        self.0.nodes[start..start + width].iter_mut()
    }
}
