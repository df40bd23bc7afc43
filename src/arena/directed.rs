//! Directionally iterable, [arena-memory-allocated] tree implementation which
//! supports depth- and breadth-first node iteration.
//!
//! Iteration walks child references and is therefore slower than the
//! storage-order iteration of [`super::depth::DepthFirstArenaTree`].
//!
//! [arena-memory-allocated]: https://en.wikipedia.org/wiki/Region-based_memory_management

use super::iterables::{BaseDirectionIterable, DirectionIterable, Nodelike};
use super::depth::DepthFirstArenaTree;
use crate::errors::EngineError;
use core::fmt;
use itertools::Itertools;
use std::{collections::HashMap, collections::VecDeque, fmt::Debug, hash::Hash};

/// Position index in an arena memory allocation.
#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub struct ArenaIndex(pub usize);

/// The node datatype used throughout this crate by all implementers of the
/// tree traits in [`super::iterables`].
#[derive(Debug)]
pub struct ArenaNode<Load, NodeId> {
    pub(super) load: Load,
    /// Index in the arena allocation.
    pub(super) index: ArenaIndex,
    pub(super) id: NodeId,
    pub(super) children: Vec<ArenaIndex>,
    /// Size of the subtree rooted here (including itself). Used to make
    /// depth-first subtree slicing in [`DepthFirstArenaTree`] O(1).
    pub(super) width: usize,
    depth: usize,
    pub(super) parent_ref: Option<ArenaIndex>,
}

impl<Load, NodeId> ArenaNode<Load, NodeId> {
    fn new(
        payload: Load,
        node_ref: NodeId,
        index: ArenaIndex,
        width: usize,
        children: Vec<ArenaIndex>,
        depth: usize,
        parent_ref: Option<ArenaIndex>,
    ) -> Self {
        ArenaNode {
            load: payload,
            id: node_ref,
            index,
            width,
            children,
            depth,
            parent_ref,
        }
    }

    /// Arena index of the parent node, `None` for roots.
    pub fn parent(&self) -> Option<ArenaIndex> {
        self.parent_ref
    }

    pub fn index(&self) -> ArenaIndex {
        self.index
    }
}

impl<Load, NodeId> Nodelike<Load, NodeId> for ArenaNode<Load, NodeId> {
    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn get(&self) -> &Load {
        &self.load
    }

    fn get_mut(&mut self) -> &mut Load {
        &mut self.load
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn id(&self) -> &NodeId {
        &self.id
    }
}

impl<Load, NodeId> fmt::Display for ArenaNode<Load, NodeId>
where
    Load: fmt::Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Arena index {:?}, children: {:?}, payload: {}",
            self.index, self.children, self.load
        )
    }
}

/// Iterable tree that uses arena-memory-allocation and allows unoptimized
/// (reference-walking) traversal in either direction. Converts into a
/// [`DepthFirstArenaTree`] for O(1) subtree slicing via `.depth_first()` / `.into()`.
///
/// The tree is mutable (nodes can be added), unlike the direction-optimized trees.
pub struct DirectedArenaTree<Load, NodeId> {
    pub(crate) nodes: Vec<ArenaNode<Load, NodeId>>,
    pub(super) max_depth: usize,
    pub(super) lookup: HashMap<NodeId, ArenaIndex>,
}

impl<Load, NodeId> DirectedArenaTree<Load, NodeId>
where
    NodeId: Eq + Hash,
{
    pub fn with_capacity(capacity: usize) -> Self {
        DirectedArenaTree {
            nodes: Vec::with_capacity(capacity),
            max_depth: 0,
            lookup: HashMap::with_capacity(capacity),
        }
    }

    pub fn new() -> Self {
        DirectedArenaTree {
            nodes: vec![],
            max_depth: 0,
            lookup: HashMap::new(),
        }
    }

    /// Given a new index permutation, updates every child/self reference. Used
    /// when reordering the arena into depth-first storage order.
    pub(super) fn update_child_indices(nodes: &mut [ArenaNode<Load, NodeId>], indices: &[ArenaIndex]) {
        nodes.iter_mut().for_each(|node| {
            node.children.iter_mut().for_each(|child_ref| {
                *child_ref = ArenaIndex(
                    indices
                        .iter()
                        .position(|i| *i == *child_ref)
                        .expect("internal error: could not find child index after reordering"),
                )
            });
            node.index = ArenaIndex(
                indices
                    .iter()
                    .position(|i| *i == node.index)
                    .expect("internal error: could not find node index after reordering"),
            );
        });
    }
}

impl<Load, NodeId> Default for DirectedArenaTree<Load, NodeId>
where
    NodeId: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<Load, NodeId> BaseDirectionIterable<Load, NodeId> for DirectedArenaTree<Load, NodeId>
where
    Load: 'static + fmt::Debug + PartialEq,
    NodeId: Eq + 'static + Clone + Hash + Debug,
{
    type Node = ArenaNode<Load, NodeId>;

    fn root(&self) -> Result<&Self::Node, EngineError> {
        self.nodes.first().ok_or(EngineError::UnknownFrame("<root>".into()))
    }

    fn children(&self, node: &Self::Node) -> Result<Vec<&Self::Node>, EngineError> {
        self.node_by_id(node.id())
            .ok_or_else(|| EngineError::UnknownFrame(format!("{:?}", node.id())))?;
        Ok(self
            .nodes
            .iter()
            .filter(|n| node.children.contains(&n.index))
            .collect_vec())
    }

    fn node_by_id(&self, node_ref: &NodeId) -> Option<&Self::Node> {
        let index = self.lookup.get(node_ref)?;
        self.nodes.get(index.0)
    }

    fn node_by_id_mut(&mut self, node_ref: &NodeId) -> Option<&mut Self::Node> {
        let index = *self.lookup.get(node_ref)?;
        self.nodes.get_mut(index.0)
    }

    fn nodes(&self) -> &[Self::Node] {
        &self.nodes
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }
}

impl<Load, NodeId> DirectionIterable<Load, NodeId> for DirectedArenaTree<Load, NodeId>
where
    Load: 'static + fmt::Debug + PartialEq,
    NodeId: Eq + 'static + Clone + Hash + Debug,
{
    fn iter_depth(&self) -> impl Iterator<Item = &Self::Node> {
        self.depth_first_from(ArenaIndex(0)).into_iter()
    }

    fn iter_depth_sub(&self, root: &Self::Node) -> impl Iterator<Item = &Self::Node> {
        self.depth_first_from(root.index).into_iter()
    }

    fn iter_breadth(&self) -> impl Iterator<Item = &Self::Node> {
        self.breadth_first_from(ArenaIndex(0)).into_iter()
    }

    fn add(&mut self, load: Load, node_id: NodeId, parent: &NodeId) -> Result<NodeId, EngineError> {
        let parent = self
            .node_by_id(parent)
            .ok_or_else(|| EngineError::UnknownFrame(format!("{parent:?}")))?;

        let index = self.nodes.len();
        if self.nodes.iter().any(|n| *n.id() == node_id) {
            return Err(EngineError::DuplicateFrame(format!("{node_id:?}")));
        }
        let parent_index = parent.index;
        let mut parent = self
            .nodes
            .get_mut(parent_index.0)
            .expect("looked-up parent index must be valid");

        parent.children.push(ArenaIndex(index));
        let depth = parent.depth + 1;
        parent.width += 1;

        while let Some(parent_ref) = parent.parent_ref {
            parent = self
                .nodes
                .get_mut(parent_ref.0)
                .expect("parent chain index must be valid");
            parent.width += 1;
        }

        self.max_depth = self.max_depth.max(depth + 1);
        self.lookup.insert(node_id.clone(), ArenaIndex(index));
        self.nodes.push(ArenaNode::new(
            load,
            node_id,
            ArenaIndex(index),
            1,
            vec![],
            depth,
            Some(parent_index),
        ));

        Ok(self.nodes.last().unwrap().id.clone())
    }

    fn set_root(&mut self, root_load: Load, root_ref: NodeId) -> NodeId {
        self.nodes.clear();
        self.lookup.clear();
        let root = ArenaNode::<Load, NodeId>::new(root_load, root_ref.clone(), ArenaIndex(0), 1, vec![], 0, None);
        self.nodes.push(root);
        self.max_depth = 1;
        self.lookup.insert(root_ref, ArenaIndex(0));
        self.nodes[0].id.clone()
    }

    fn depth_first(self) -> impl super::iterables::DepthFirstIterable<Load, NodeId> {
        let result: DepthFirstArenaTree<Load, NodeId> = self.into();
        result
    }
}

impl<Load, NodeId> DirectedArenaTree<Load, NodeId>
where
    Load: 'static + fmt::Debug + PartialEq,
    NodeId: Eq + 'static + Clone + Hash + Debug,
{
    pub(super) fn depth_first_from(&self, root: ArenaIndex) -> Vec<&ArenaNode<Load, NodeId>> {
        let mut stack = vec![root];
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index.0];
            order.push(node);
            // push in reverse so children are visited in insertion order
            stack.extend(node.children.iter().rev().copied());
        }
        order
    }

    pub(super) fn breadth_first_from(&self, root: ArenaIndex) -> Vec<&ArenaNode<Load, NodeId>> {
        let mut queue = VecDeque::from([root]);
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(index) = queue.pop_front() {
            let node = &self.nodes[index.0];
            order.push(node);
            queue.extend(node.children.iter().copied());
        }
        order
    }
}
