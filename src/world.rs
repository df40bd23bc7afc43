//! The blueprint kinematic graph: frames connected by joints, before any
//! time-slicing happens. A [`crate::path_config::PathConfig`] is built by
//! replicating a `World` once per path slice.

use crate::arena::{BaseDirectionIterable, DirectedArenaTree, DirectionIterable, Nodelike};
use crate::errors::{EngineError, EngineResult};
use nalgebra::Isometry3;

/// One of the three coordinate axes a revolute/prismatic joint rotates or
/// translates about, expressed in the joint's own local frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn unit_vector(self) -> nalgebra::Vector3<f64> {
        match self {
            Axis::X => nalgebra::Vector3::x(),
            Axis::Y => nalgebra::Vector3::y(),
            Axis::Z => nalgebra::Vector3::z(),
        }
    }
}

/// The joint connecting a frame to its parent. Determines how many decision
/// vector columns the frame owns at each free slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointKind {
    /// Single rotational DOF about `Axis`.
    Revolute(Axis),
    /// Single translational DOF along `Axis`.
    Prismatic(Axis),
    /// Full SE(3) freedom: 3 translational + 3 (tangent-space) rotational DOF.
    Free,
    /// Pure SO(3) freedom, parameterized on the manifold by a unit quaternion
    /// (4 stored components, 3 tangent-space DOF).
    Quaternion,
    /// No DOF; the child frame is welded to its parent at `local_offset`.
    Rigid,
}

impl JointKind {
    /// Tangent-space dimension: the number of decision-vector columns this
    /// joint contributes at a free slice.
    pub fn dof(&self) -> usize {
        match self {
            JointKind::Revolute(_) | JointKind::Prismatic(_) => 1,
            JointKind::Free => 6,
            JointKind::Quaternion => 3,
            JointKind::Rigid => 0,
        }
    }
}

/// Newtype around a frame's position in [`World`]'s internal arena. Stable
/// for the lifetime of the `World` (frames are never removed, only added).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub usize);

#[derive(Debug, Clone)]
pub(crate) struct FrameSpec {
    pub joint: JointKind,
    /// Fixed transform from the parent frame to this joint's own origin.
    pub local_offset: Isometry3<f64>,
    /// First column this frame's own DOF occupy within one slice's local
    /// (unsliced) joint-state vector; `None` for `Rigid` joints.
    pub dof_offset: Option<usize>,
    /// Per-DOF `(lower, upper)` bound, one entry per `joint.dof()`. Defaults
    /// to unconstrained; set with [`World::set_joint_limit`].
    pub limits: Vec<(Option<f64>, Option<f64>)>,
}

/// The static kinematic graph: named frames connected by joints, rooted at a
/// single world frame. Frame names are resolved to [`FrameId`]s once, at
/// `add_frame` time, matching the arena's `NodeId`-indirection pattern.
pub struct World {
    pub(crate) tree: DirectedArenaTree<FrameSpec, String>,
    total_dof: usize,
}

impl World {
    /// Creates a world with a single root frame named `root`, welded to the
    /// global origin.
    pub fn new(root: impl Into<String>) -> Self {
        let mut tree = DirectedArenaTree::new();
        tree.set_root(
            FrameSpec {
                joint: JointKind::Rigid,
                local_offset: Isometry3::identity(),
                dof_offset: None,
                limits: Vec::new(),
            },
            root.into(),
        );
        World { tree, total_dof: 0 }
    }

    /// Adds a frame as a child of `parent`, returning its stable [`FrameId`].
    pub fn add_frame(
        &mut self,
        name: impl Into<String>,
        parent: &str,
        joint: JointKind,
        local_offset: Isometry3<f64>,
    ) -> EngineResult<FrameId> {
        let name = name.into();
        let dof_offset = if joint.dof() > 0 {
            let offset = self.total_dof;
            self.total_dof += joint.dof();
            Some(offset)
        } else {
            None
        };
        self.tree.add(
            FrameSpec {
                joint,
                local_offset,
                dof_offset,
                limits: vec![(None, None); joint.dof()],
            },
            name.clone(),
            &parent.to_string(),
        )?;
        self.frame_id(&name)
            .ok_or_else(|| EngineError::UnknownFrame(name.clone()))
    }

    /// Sets the `(lower, upper)` bound for DOF `index` (0-based, within this
    /// frame's own joint) of `frame`. Out-of-range indices are ignored.
    pub fn set_joint_limit(&mut self, frame: FrameId, index: usize, bound: (Option<f64>, Option<f64>)) {
        let Some(name) = self.frame_name(frame).map(str::to_string) else {
            return;
        };
        if let Some(node) = self.tree.node_by_id_mut(&name) {
            if let Some(slot) = node.get_mut().limits.get_mut(index) {
                *slot = bound;
            }
        }
    }

    pub fn frame_id(&self, name: &str) -> Option<FrameId> {
        self.tree.node_by_id(&name.to_string()).map(|n| FrameId(n.index().0))
    }

    pub fn frame_name(&self, id: FrameId) -> Option<&str> {
        self.tree.nodes().get(id.0).map(|n| n.id().as_str())
    }

    pub(crate) fn spec(&self, id: FrameId) -> &FrameSpec {
        &self.tree.nodes()[id.0]
    }

    pub fn parent_of(&self, id: FrameId) -> Option<FrameId> {
        self.tree.nodes()[id.0].parent().map(|idx| FrameId(idx.0))
    }

    pub fn joint_kind(&self, id: FrameId) -> JointKind {
        self.spec(id).joint
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Total number of tangent-space DOF across all frames (i.e. the size of
    /// one slice's local joint-state vector).
    pub fn total_dof(&self) -> usize {
        self.total_dof
    }

    /// Frame ids in depth-first order (parents always precede children).
    pub fn frames_depth_first(&self) -> Vec<FrameId> {
        self.tree.iter_depth().map(|n| FrameId(n.index().0)).collect()
    }
}
