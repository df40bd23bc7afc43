//! Concrete implementation of the kinematic evaluator consumed through the
//! [`KinematicModel`] trait (spec §6's "external interface", made concrete).
//!
//! Forward kinematics is a chain-rule accumulation over the frame tree: each
//! frame's world pose is its parent's world pose composed with its fixed
//! local offset and its own joint transform. This is a single consolidated
//! `scan`-based accumulation, the pattern the arena module's depth-first
//! traversal exists to support efficiently.

use crate::errors::{EngineError, EngineResult};
use crate::world::{Axis, JointKind, World};
use nalgebra::{DVector, Isometry3, Translation3, UnitQuaternion, Vector3};

pub use crate::world::FrameId;

/// World-frame pose and joint axis of one frame, cached after
/// [`KinematicModel::forward_kinematics`].
#[derive(Debug, Clone)]
pub struct FrameState {
    pub pose: Isometry3<f64>,
    /// World-frame direction of this frame's own joint axis, used to build
    /// the geometric Jacobian column for revolute joints. `None` for joints
    /// without a single well-defined axis (`Free`, `Quaternion`, `Rigid`).
    pub joint_axis_world: Option<Vector3<f64>>,
}

/// Evaluator trait a caller's own kinematics backend implements; this crate
/// ships [`ArenaKinematicModel`] as the reference implementation.
pub trait KinematicModel {
    /// Sets the local joint-state vector (tangent-space, one slice's worth).
    fn set_joint_state(&mut self, q: &[f64]) -> EngineResult<()>;
    /// Recomputes every frame's world pose from the current joint state.
    fn forward_kinematics(&mut self);
    fn frame(&self, id: FrameId) -> &FrameState;
    /// Per-DOF `(lower, upper)` bounds, indexed the same way as `set_joint_state`.
    fn joint_limits(&self) -> &[(Option<f64>, Option<f64>)];
    fn dof(&self) -> usize;
    /// `frame`'s own slice of the local joint-state vector (empty for
    /// zero-DOF joints). Lets features that are direct functions of joint
    /// state (`qItself`, `controlCost`) read the actual value rather than
    /// only the Jacobian structure.
    fn joint_state(&self, frame: FrameId) -> &[f64];

    /// Geometric Jacobian of `frame`'s world position with respect to every
    /// ancestor joint's local DOF: one `(frame, local_dof, linear_velocity)`
    /// triplet per column, computed by walking the chain from `frame` to the
    /// root and, for each revolute ancestor, crossing its world-frame axis
    /// with the lever arm to `frame`'s origin (prismatic ancestors contribute
    /// the axis itself, independent of the lever arm).
    fn position_jacobian(&self, frame: FrameId) -> Vec<(FrameId, usize, Vector3<f64>)> {
        let _ = frame;
        Vec::new()
    }

    /// Geometric Jacobian of `frame`'s world orientation (angular velocity)
    /// with respect to every ancestor joint's local DOF.
    fn orientation_jacobian(&self, frame: FrameId) -> Vec<(FrameId, usize, Vector3<f64>)> {
        let _ = frame;
        Vec::new()
    }
}

/// Arena-tree-backed [`KinematicModel`]: walks `world`'s frames in
/// depth-first order and accumulates `Isometry3` transforms with a single
/// pass, mirroring the chain-rule structure of the underlying tree.
pub struct ArenaKinematicModel<'w> {
    world: &'w World,
    order: Vec<FrameId>,
    q: DVector<f64>,
    states: Vec<FrameState>,
    limits: Vec<(Option<f64>, Option<f64>)>,
}

impl<'w> ArenaKinematicModel<'w> {
    pub fn new(world: &'w World) -> Self {
        let order = world.frames_depth_first();
        let dof = world.total_dof();
        let mut limits = vec![(None, None); dof];
        for &id in &order {
            if let Some(offset) = world.spec(id).dof_offset {
                for (i, bound) in world.spec(id).limits.iter().enumerate() {
                    limits[offset + i] = *bound;
                }
            }
        }
        let states = order
            .iter()
            .map(|_| FrameState {
                pose: Isometry3::identity(),
                joint_axis_world: None,
            })
            .collect();
        let mut model = ArenaKinematicModel {
            world,
            order,
            q: DVector::zeros(dof),
            states,
            limits,
        };
        model.forward_kinematics();
        model
    }

    fn joint_transform(joint: JointKind, q_local: &[f64]) -> (Isometry3<f64>, Option<Vector3<f64>>) {
        match joint {
            JointKind::Rigid => (Isometry3::identity(), None),
            JointKind::Revolute(axis) => {
                let axis_vec = axis.unit_vector();
                let rotation = UnitQuaternion::from_axis_angle(&nalgebra::Unit::new_normalize(axis_vec), q_local[0]);
                (Isometry3::from_parts(Translation3::identity(), rotation), Some(axis_vec))
            }
            JointKind::Prismatic(axis) => {
                let axis_vec = axis.unit_vector();
                (Isometry3::from_parts((axis_vec * q_local[0]).into(), UnitQuaternion::identity()), Some(axis_vec))
            }
            JointKind::Quaternion => {
                let half = Vector3::new(q_local[0], q_local[1], q_local[2]);
                let angle = half.norm();
                let rotation = if angle < 1e-12 {
                    UnitQuaternion::identity()
                } else {
                    UnitQuaternion::from_axis_angle(&nalgebra::Unit::new_normalize(half), angle)
                };
                (Isometry3::from_parts(Translation3::identity(), rotation), None)
            }
            JointKind::Free => {
                let translation = Vector3::new(q_local[0], q_local[1], q_local[2]);
                let angles = Vector3::new(q_local[3], q_local[4], q_local[5]);
                let angle = angles.norm();
                let rotation = if angle < 1e-12 {
                    UnitQuaternion::identity()
                } else {
                    UnitQuaternion::from_axis_angle(&nalgebra::Unit::new_normalize(angles), angle)
                };
                (Isometry3::from_parts(translation.into(), rotation), None)
            }
        }
    }
}

impl<'w> KinematicModel for ArenaKinematicModel<'w> {
    fn set_joint_state(&mut self, q: &[f64]) -> EngineResult<()> {
        if q.len() != self.q.len() {
            return Err(EngineError::DimensionMismatch {
                feature: "joint_state",
                expected: self.q.len(),
                actual: q.len(),
            });
        }
        self.q.copy_from_slice(q);
        Ok(())
    }

    fn forward_kinematics(&mut self) {
        for (slot, &id) in self.order.iter().enumerate() {
            let spec = self.world.spec(id);
            let local_q: &[f64] = match spec.dof_offset {
                Some(offset) => {
                    let count = self.world.joint_kind(id).dof();
                    &self.q.as_slice()[offset..offset + count]
                }
                None => &[],
            };
            let (joint_local, axis_local) = Self::joint_transform(spec.joint, local_q);
            let frame_local = spec.local_offset * joint_local;

            let parent_pose = self
                .world
                .parent_of(id)
                .map(|parent| {
                    let parent_slot = self.order.iter().position(|&f| f == parent).expect("parent precedes child");
                    self.states[parent_slot].pose
                })
                .unwrap_or_else(Isometry3::identity);

            let world_pose = parent_pose * frame_local;
            let axis_world = axis_local.map(|a| world_pose.rotation * a);
            self.states[slot] = FrameState {
                pose: world_pose,
                joint_axis_world: axis_world,
            };
        }
    }

    fn frame(&self, id: FrameId) -> &FrameState {
        let slot = self.order.iter().position(|&f| f == id).expect("unknown frame id");
        &self.states[slot]
    }

    fn joint_limits(&self) -> &[(Option<f64>, Option<f64>)] {
        &self.limits
    }

    fn dof(&self) -> usize {
        self.q.len()
    }

    fn joint_state(&self, frame: FrameId) -> &[f64] {
        match self.world.spec(frame).dof_offset {
            Some(offset) => {
                let count = self.world.joint_kind(frame).dof();
                &self.q.as_slice()[offset..offset + count]
            }
            None => &[],
        }
    }

    fn position_jacobian(&self, frame: FrameId) -> Vec<(FrameId, usize, Vector3<f64>)> {
        let frame_pos = self.frame(frame).pose.translation.vector;
        let mut columns = Vec::new();
        let mut current = self.world.parent_of(frame);
        while let Some(ancestor) = current {
            let spec = self.world.spec(ancestor);
            if let Some(offset) = spec.dof_offset {
                let axis_world = self.frame(ancestor).joint_axis_world;
                match (spec.joint, axis_world) {
                    (JointKind::Revolute(_), Some(axis)) => {
                        let lever = frame_pos - self.frame(ancestor).pose.translation.vector;
                        columns.push((ancestor, offset, axis.cross(&lever)));
                    }
                    (JointKind::Prismatic(_), Some(axis)) => {
                        columns.push((ancestor, offset, axis));
                    }
                    _ => {}
                }
            }
            current = self.world.parent_of(ancestor);
        }
        columns
    }

    fn orientation_jacobian(&self, frame: FrameId) -> Vec<(FrameId, usize, Vector3<f64>)> {
        let mut columns = Vec::new();
        let mut current = Some(frame);
        while let Some(node) = current {
            let spec = self.world.spec(node);
            if let (Some(offset), JointKind::Revolute(_), Some(axis)) =
                (spec.dof_offset, spec.joint, self.frame(node).joint_axis_world)
            {
                columns.push((node, offset, axis));
            }
            current = self.world.parent_of(node);
        }
        columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn two_link_arm() -> World {
        let mut world = World::new("base");
        world
            .add_frame("shoulder", "base", JointKind::Revolute(Axis::Z), Isometry3::identity())
            .unwrap();
        world
            .add_frame(
                "elbow",
                "shoulder",
                JointKind::Revolute(Axis::Z),
                Isometry3::translation(1.0, 0.0, 0.0),
            )
            .unwrap();
        world
    }

    #[test]
    fn zero_configuration_is_identity_chain() {
        let world = two_link_arm();
        let model = ArenaKinematicModel::new(&world);
        let elbow = world.frame_id("elbow").unwrap();
        let pose = model.frame(elbow).pose;
        assert_abs_diff_eq!(pose.translation.vector.x, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn quarter_turn_shoulder_rotates_elbow_into_y() {
        let world = two_link_arm();
        let mut model = ArenaKinematicModel::new(&world);
        model.set_joint_state(&[std::f64::consts::FRAC_PI_2, 0.0]).unwrap();
        model.forward_kinematics();
        let elbow = world.frame_id("elbow").unwrap();
        let pose = model.frame(elbow).pose;
        assert_abs_diff_eq!(pose.translation.vector.x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(pose.translation.vector.y, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn rejects_wrong_length_joint_state() {
        let world = two_link_arm();
        let mut model = ArenaKinematicModel::new(&world);
        let err = model.set_joint_state(&[0.0]).unwrap_err();
        assert!(matches!(err, EngineError::DimensionMismatch { .. }));
    }
}
