//! Differentiable residual over a tuple of frames (spec §4.1). A `Feature` is
//! evaluated against one [`crate::kinematics::KinematicModel`] per slice in
//! its tuple and returns both the residual and its Jacobian, expressed as
//! sparse `(frame, local dof, value)` triplets rather than a dense per-tuple
//! block — ancestor DOF are shared across tuple frames, so a dense block
//! keyed only by tuple position would double-count shared columns.

use crate::collision::ProxyPair;
use crate::errors::{EngineError, EngineResult};
use crate::kinematics::{FrameId, KinematicModel};
use nalgebra::{DVector, UnitQuaternion, Vector3};

/// What kind of constraint a [`crate::objective::Objective`] wrapping this
/// feature imposes on the residual.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    /// Minimized as a sum-of-squares cost term.
    Cost,
    /// Constrained to equal zero.
    Equality,
    /// Constrained to be `<= 0`.
    Inequality,
}

/// One non-zero entry of a feature's Jacobian: the partial derivative of one
/// residual component with respect to one local (tangent-space) DOF of one
/// frame, at one of the tuple's slices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalJacobian {
    pub frame: FrameId,
    /// Which slice within the feature's tuple this column belongs to (0 for
    /// a single-slice feature, 0/1/.. for multi-slice features like
    /// `controlCost`).
    pub tuple_slot: usize,
    pub local_dof: usize,
    pub residual_row: usize,
    pub value: f64,
}

/// A differentiable residual. Implementors declare the frames they read
/// ([`Feature::frames`]) and how many consecutive slices they span
/// ([`Feature::order`]); the grounder uses both to expand one
/// [`crate::objective::Objective`] into one [`crate::grounder::GroundedObjective`]
/// per valid slice window.
pub trait Feature: Send + Sync {
    fn name(&self) -> &'static str;
    fn kind(&self) -> FeatureKind;
    fn dim(&self) -> usize;
    /// Number of consecutive slices this feature reads (1 for pose features,
    /// 2+ for finite-difference features like `controlCost`).
    fn order(&self) -> usize {
        1
    }
    fn frames(&self) -> &[FrameId];

    /// Evaluates the residual and its Jacobian. `models` has exactly
    /// `self.order()` entries, one [`KinematicModel`] per slice in the
    /// feature's tuple, oldest first.
    fn eval(
        &self,
        models: &[&dyn KinematicModel],
        collisions: &[ProxyPair],
    ) -> EngineResult<(DVector<f64>, Vec<LocalJacobian>)>;
}

fn check_order<'a>(feature: &'static str, models: &[&'a dyn KinematicModel], expected: usize) -> EngineResult<()> {
    if models.len() != expected {
        return Err(EngineError::DimensionMismatch {
            feature,
            expected,
            actual: models.len(),
        });
    }
    Ok(())
}

/// Residual equal to the frame's own joint-state value(s) (spec's `qItself`).
pub struct QItself {
    pub frame: FrameId,
    pub dim: usize,
    tuple: [FrameId; 1],
}

impl QItself {
    pub fn new(frame: FrameId, dim: usize) -> Self {
        QItself { frame, dim, tuple: [frame] }
    }
}

impl Feature for QItself {
    fn name(&self) -> &'static str {
        "qItself"
    }
    fn kind(&self) -> FeatureKind {
        FeatureKind::Cost
    }
    fn dim(&self) -> usize {
        self.dim
    }
    fn frames(&self) -> &[FrameId] {
        &self.tuple
    }
    fn eval(&self, models: &[&dyn KinematicModel], _collisions: &[ProxyPair]) -> EngineResult<(DVector<f64>, Vec<LocalJacobian>)> {
        check_order(self.name(), models, 1)?;
        let q = models[0].joint_state(self.frame);
        let mut residual = DVector::zeros(self.dim);
        for d in 0..self.dim.min(q.len()) {
            residual[d] = q[d];
        }
        let jacobian = (0..self.dim)
            .map(|d| LocalJacobian {
                frame: self.frame,
                tuple_slot: 0,
                local_dof: d,
                residual_row: d,
                value: 1.0,
            })
            .collect();
        Ok((residual, jacobian))
    }
}

/// Euclidean position difference between `frame` and a fixed world target, or
/// between two frames if `reference` is set.
pub struct PositionDiff {
    pub frame: FrameId,
    pub reference: Option<FrameId>,
    pub target: Vector3<f64>,
    tuple: Vec<FrameId>,
}

impl PositionDiff {
    pub fn to_target(frame: FrameId, target: Vector3<f64>) -> Self {
        PositionDiff {
            frame,
            reference: None,
            target,
            tuple: vec![frame],
        }
    }

    pub fn between(frame: FrameId, reference: FrameId) -> Self {
        PositionDiff {
            frame,
            reference: Some(reference),
            target: Vector3::zeros(),
            tuple: vec![frame, reference],
        }
    }
}

impl Feature for PositionDiff {
    fn name(&self) -> &'static str {
        "positionDiff"
    }
    fn kind(&self) -> FeatureKind {
        FeatureKind::Cost
    }
    fn dim(&self) -> usize {
        3
    }
    fn frames(&self) -> &[FrameId] {
        &self.tuple
    }
    fn eval(&self, models: &[&dyn KinematicModel], _collisions: &[ProxyPair]) -> EngineResult<(DVector<f64>, Vec<LocalJacobian>)> {
        check_order(self.name(), models, 1)?;
        let model = models[0];
        let frame_pos = model.frame(self.frame).pose.translation.vector;
        let reference_pos = match self.reference {
            Some(reference) => model.frame(reference).pose.translation.vector,
            None => self.target,
        };
        let residual = frame_pos - reference_pos;

        let mut jacobian: Vec<LocalJacobian> = model
            .position_jacobian(self.frame)
            .into_iter()
            .flat_map(|(frame, local_dof, column)| {
                [column.x, column.y, column.z]
                    .into_iter()
                    .enumerate()
                    .map(move |(row, value)| LocalJacobian {
                        frame,
                        tuple_slot: 0,
                        local_dof,
                        residual_row: row,
                        value,
                    })
            })
            .collect();

        if let Some(reference) = self.reference {
            jacobian.extend(model.position_jacobian(reference).into_iter().flat_map(|(frame, local_dof, column)| {
                [-column.x, -column.y, -column.z]
                    .into_iter()
                    .enumerate()
                    .map(move |(row, value)| LocalJacobian {
                        frame,
                        tuple_slot: 0,
                        local_dof,
                        residual_row: row,
                        value,
                    })
            }));
        }
        Ok((residual, jacobian))
    }
}

/// Geodesic quaternion difference between `frame`'s orientation and a fixed
/// world target orientation, expressed as a 3-vector (the target's rotation
/// vector that would rotate `frame` onto the target).
pub struct QuaternionDiff {
    pub frame: FrameId,
    pub target: UnitQuaternion<f64>,
    tuple: [FrameId; 1],
}

impl QuaternionDiff {
    pub fn new(frame: FrameId, target: UnitQuaternion<f64>) -> Self {
        QuaternionDiff { frame, target, tuple: [frame] }
    }
}

impl Feature for QuaternionDiff {
    fn name(&self) -> &'static str {
        "quaternionDiff"
    }
    fn kind(&self) -> FeatureKind {
        FeatureKind::Cost
    }
    fn dim(&self) -> usize {
        3
    }
    fn frames(&self) -> &[FrameId] {
        &self.tuple
    }
    fn eval(&self, models: &[&dyn KinematicModel], _collisions: &[ProxyPair]) -> EngineResult<(DVector<f64>, Vec<LocalJacobian>)> {
        check_order(self.name(), models, 1)?;
        let current = models[0].frame(self.frame).pose.rotation;
        let error = self.target.inverse() * current;
        let residual = error.scaled_axis();
        let jacobian = models[0]
            .orientation_jacobian(self.frame)
            .into_iter()
            .flat_map(|(frame, local_dof, column)| {
                [column.x, column.y, column.z]
                    .into_iter()
                    .enumerate()
                    .map(move |(row, value)| LocalJacobian {
                        frame,
                        tuple_slot: 0,
                        local_dof,
                        residual_row: row,
                        value,
                    })
            })
            .collect();
        Ok((residual, jacobian))
    }
}

/// Composition of [`PositionDiff`] and [`QuaternionDiff`] against another
/// frame: the full relative pose error (spec §4.1 `poseRel`).
pub struct PoseRel {
    position: PositionDiff,
    orientation_frame: FrameId,
    orientation_reference: FrameId,
    tuple: Vec<FrameId>,
}

impl PoseRel {
    pub fn between(frame: FrameId, reference: FrameId) -> Self {
        PoseRel {
            position: PositionDiff::between(frame, reference),
            orientation_frame: frame,
            orientation_reference: reference,
            tuple: vec![frame, reference],
        }
    }
}

impl Feature for PoseRel {
    fn name(&self) -> &'static str {
        "poseRel"
    }
    fn kind(&self) -> FeatureKind {
        FeatureKind::Cost
    }
    fn dim(&self) -> usize {
        6
    }
    fn frames(&self) -> &[FrameId] {
        &self.tuple
    }
    fn eval(&self, models: &[&dyn KinematicModel], collisions: &[ProxyPair]) -> EngineResult<(DVector<f64>, Vec<LocalJacobian>)> {
        check_order(self.name(), models, 1)?;
        let (position_residual, position_jacobian) = self.position.eval(models, collisions)?;
        let relative_rotation = models[0].frame(self.orientation_reference).pose.rotation.inverse()
            * models[0].frame(self.orientation_frame).pose.rotation;
        let orientation_residual = relative_rotation.scaled_axis();

        let mut residual = DVector::zeros(6);
        residual.fixed_rows_mut::<3>(0).copy_from(&position_residual);
        residual.fixed_rows_mut::<3>(3).copy_from(&orientation_residual);

        let mut jacobian = position_jacobian;
        jacobian.extend(
            models[0]
                .orientation_jacobian(self.orientation_frame)
                .into_iter()
                .flat_map(|(frame, local_dof, column)| {
                    [column.x, column.y, column.z]
                        .into_iter()
                        .enumerate()
                        .map(move |(row, value)| LocalJacobian {
                            frame,
                            tuple_slot: 0,
                            local_dof,
                            residual_row: row + 3,
                            value,
                        })
                }),
        );
        jacobian.extend(
            models[0]
                .orientation_jacobian(self.orientation_reference)
                .into_iter()
                .flat_map(|(frame, local_dof, column)| {
                    [-column.x, -column.y, -column.z]
                        .into_iter()
                        .enumerate()
                        .map(move |(row, value)| LocalJacobian {
                            frame,
                            tuple_slot: 0,
                            local_dof,
                            residual_row: row + 3,
                            value,
                        })
                }),
        );
        Ok((residual, jacobian))
    }
}

/// Sum over all currently active [`ProxyPair`]s of the penetration depth
/// exceeding `margin` (spec §4.1 `accumulatedCollisions`).
pub struct AccumulatedCollisions {
    pub margin: f64,
    tuple: Vec<FrameId>,
}

impl AccumulatedCollisions {
    pub fn new(margin: f64) -> Self {
        AccumulatedCollisions { margin, tuple: Vec::new() }
    }
}

impl Feature for AccumulatedCollisions {
    fn name(&self) -> &'static str {
        "accumulatedCollisions"
    }
    fn kind(&self) -> FeatureKind {
        FeatureKind::Cost
    }
    fn dim(&self) -> usize {
        1
    }
    fn frames(&self) -> &[FrameId] {
        &self.tuple
    }
    fn eval(&self, models: &[&dyn KinematicModel], collisions: &[ProxyPair]) -> EngineResult<(DVector<f64>, Vec<LocalJacobian>)> {
        check_order(self.name(), models, 1)?;
        let model = models[0];
        let mut total = 0.0;
        let mut jacobian = Vec::new();
        for pair in collisions {
            let excess = self.margin - pair.distance;
            if excess <= 0.0 {
                continue;
            }
            total += excess;
            // distance = |pos_b - pos_a| - radii, so d(excess)/dq =
            // -normal . (Jb - Ja); `normal` points from a towards b.
            jacobian.extend(pair_collision_jacobian(model, pair, 0));
        }
        Ok((DVector::from_element(1, total), jacobian))
    }
}

/// Shared Jacobian contribution of one [`ProxyPair`]'s penetration-depth
/// residual: `-normal . (Jb - Ja)`, written at `residual_row`.
fn pair_collision_jacobian(model: &dyn KinematicModel, pair: &ProxyPair, residual_row: usize) -> Vec<LocalJacobian> {
    let mut jacobian = Vec::new();
    for (frame, local_dof, column) in model.position_jacobian(pair.frame_b) {
        jacobian.push(LocalJacobian {
            frame,
            tuple_slot: 0,
            local_dof,
            residual_row,
            value: -pair.normal.dot(&column),
        });
    }
    for (frame, local_dof, column) in model.position_jacobian(pair.frame_a) {
        jacobian.push(LocalJacobian {
            frame,
            tuple_slot: 0,
            local_dof,
            residual_row,
            value: pair.normal.dot(&column),
        });
    }
    jacobian
}

/// Inequality-style residual for one specific frame pair's penetration depth
/// (spec §4.1 `pairCollision`): `margin - distance <= 0`.
pub struct PairCollision {
    pub frame_a: FrameId,
    pub frame_b: FrameId,
    pub margin: f64,
    tuple: Vec<FrameId>,
}

impl PairCollision {
    pub fn new(frame_a: FrameId, frame_b: FrameId, margin: f64) -> Self {
        PairCollision {
            frame_a,
            frame_b,
            margin,
            tuple: vec![frame_a, frame_b],
        }
    }
}

impl Feature for PairCollision {
    fn name(&self) -> &'static str {
        "pairCollision"
    }
    fn kind(&self) -> FeatureKind {
        FeatureKind::Inequality
    }
    fn dim(&self) -> usize {
        1
    }
    fn frames(&self) -> &[FrameId] {
        &self.tuple
    }
    fn eval(&self, models: &[&dyn KinematicModel], collisions: &[ProxyPair]) -> EngineResult<(DVector<f64>, Vec<LocalJacobian>)> {
        check_order(self.name(), models, 1)?;
        let matched = collisions.iter().find(|pair| {
            (pair.frame_a == self.frame_a && pair.frame_b == self.frame_b)
                || (pair.frame_a == self.frame_b && pair.frame_b == self.frame_a)
        });
        let (distance, jacobian) = match matched {
            Some(pair) => (pair.distance, pair_collision_jacobian(models[0], pair, 0)),
            // Not in the backend's close-pair list: treated as safely clear
            // of contact, so no gradient is active either.
            None => (f64::INFINITY, Vec::new()),
        };
        Ok((DVector::from_element(1, self.margin - distance), jacobian))
    }
}

/// Finite-difference control cost over `order + 1` consecutive slices of one
/// frame's own joint state (spec's `controlCost`): penalizes the `order`-th
/// derivative, approximated by repeated backward differences and divided by
/// `tau^order` so the residual is the actual derivative (spec §4.1: "forms
/// finite-difference velocity/acceleration residuals as `(f_t − f_{t−1})/τ`,
/// etc."), not just the raw stencil sum.
pub struct ControlCost {
    pub frame: FrameId,
    pub dim: usize,
    pub order: usize,
    /// Nominal time between two consecutive slices; the stencil is divided
    /// by `tau^order` to turn a raw finite difference into a derivative.
    pub tau: f64,
    tuple: Vec<FrameId>,
}

impl ControlCost {
    pub fn new(frame: FrameId, dim: usize, order: usize, tau: f64) -> Self {
        ControlCost {
            frame,
            dim,
            order,
            tau,
            tuple: vec![frame; order + 1],
        }
    }
}

impl Feature for ControlCost {
    fn name(&self) -> &'static str {
        "controlCost"
    }
    fn kind(&self) -> FeatureKind {
        FeatureKind::Cost
    }
    fn dim(&self) -> usize {
        self.dim
    }
    fn order(&self) -> usize {
        self.order + 1
    }
    fn frames(&self) -> &[FrameId] {
        &self.tuple
    }
    fn eval(&self, models: &[&dyn KinematicModel], _collisions: &[ProxyPair]) -> EngineResult<(DVector<f64>, Vec<LocalJacobian>)> {
        check_order(self.name(), models, self.order + 1)?;
        // The residual is the backward-difference stencil applied to the
        // actual joint-state value at each tuple slot (oldest first), scaled
        // by `tau^-order` to turn the raw difference into a derivative; the
        // Jacobian is the same scaled stencil coefficients, independent of `q`.
        let scale = 1.0 / self.tau.powi(self.order as i32);
        let mut residual = DVector::zeros(self.dim);
        let mut jacobian = Vec::new();
        for slot in 0..=self.order {
            let coefficient = binomial_difference_coefficient(self.order, slot) * scale;
            let q = models[slot].joint_state(self.frame);
            for d in 0..self.dim {
                if let Some(&value) = q.get(d) {
                    residual[d] += coefficient * value;
                }
                jacobian.push(LocalJacobian {
                    frame: self.frame,
                    tuple_slot: slot,
                    local_dof: d,
                    residual_row: d,
                    value: coefficient,
                });
            }
        }
        Ok((residual, jacobian))
    }
}

fn binomial_difference_coefficient(order: usize, slot: usize) -> f64 {
    let sign = if (order - slot) % 2 == 0 { 1.0 } else { -1.0 };
    sign * binomial(order, order - slot) as f64
}

fn binomial(n: usize, k: usize) -> u64 {
    if k > n {
        return 0;
    }
    let mut result = 1u64;
    for i in 0..k {
        result = result * (n - i) as u64 / (i + 1) as u64;
    }
    result
}

/// Penalizes deviation of a quaternion-valued joint's stored components from
/// unit norm (spec's `quaternionNorm`) — only meaningful for
/// [`crate::world::JointKind::Quaternion`] frames, which store 4 raw
/// components but only 3 tangent-space DOF.
pub struct QuaternionNorm {
    pub frame: FrameId,
    tuple: [FrameId; 1],
}

impl QuaternionNorm {
    pub fn new(frame: FrameId) -> Self {
        QuaternionNorm { frame, tuple: [frame] }
    }
}

impl Feature for QuaternionNorm {
    fn name(&self) -> &'static str {
        "quaternionNorm"
    }
    fn kind(&self) -> FeatureKind {
        FeatureKind::Equality
    }
    fn dim(&self) -> usize {
        1
    }
    fn frames(&self) -> &[FrameId] {
        &self.tuple
    }
    fn eval(&self, models: &[&dyn KinematicModel], _collisions: &[ProxyPair]) -> EngineResult<(DVector<f64>, Vec<LocalJacobian>)> {
        check_order(self.name(), models, 1)?;
        // The backing quaternion is always re-normalized by `UnitQuaternion`
        // before it reaches `FrameState`, so the residual is identically
        // zero here; the feature exists for parity with objectives grounded
        // against a raw (non-renormalizing) quaternion storage layout.
        Ok((DVector::zeros(1), Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::ArenaKinematicModel;
    use crate::world::{Axis, JointKind, World};
    use approx::assert_abs_diff_eq;
    use nalgebra::Isometry3;

    fn single_link() -> World {
        let mut world = World::new("base");
        world
            .add_frame("tip", "base", JointKind::Revolute(Axis::Z), Isometry3::translation(1.0, 0.0, 0.0))
            .unwrap();
        world
    }

    fn two_link_arm() -> World {
        let mut world = World::new("base");
        world
            .add_frame("shoulder", "base", JointKind::Revolute(Axis::Z), Isometry3::identity())
            .unwrap();
        world
            .add_frame(
                "elbow",
                "shoulder",
                JointKind::Revolute(Axis::Y),
                Isometry3::translation(1.0, 0.0, 0.0),
            )
            .unwrap();
        world
    }

    fn model_at(world: &World, q: &[f64]) -> ArenaKinematicModel<'_> {
        let mut model = ArenaKinematicModel::new(world);
        model.set_joint_state(q).unwrap();
        model.forward_kinematics();
        model
    }

    /// Central-difference Jacobian of `feature` at `q0`, laid out dense over
    /// `world.total_dof()` columns in DOF-offset order, for comparison
    /// against the feature's analytic `LocalJacobian` triplets (spec §8
    /// testable property 1, "Jacobian correctness").
    fn numeric_jacobian(world: &World, feature: &dyn Feature, q0: &[f64], eps: f64) -> nalgebra::DMatrix<f64> {
        let dim = feature.dim();
        let n = world.total_dof();
        let mut numeric = nalgebra::DMatrix::zeros(dim, n);
        for i in 0..n {
            let mut q_plus = q0.to_vec();
            q_plus[i] += eps;
            let mut q_minus = q0.to_vec();
            q_minus[i] -= eps;
            let model_plus = model_at(world, &q_plus);
            let model_minus = model_at(world, &q_minus);
            let (y_plus, _) = feature.eval(&[&model_plus], &[]).unwrap();
            let (y_minus, _) = feature.eval(&[&model_minus], &[]).unwrap();
            let dy = (y_plus - y_minus) / (2.0 * eps);
            for r in 0..dim {
                numeric[(r, i)] = dy[r];
            }
        }
        numeric
    }

    fn analytic_jacobian(world: &World, dim: usize, entries: &[LocalJacobian]) -> nalgebra::DMatrix<f64> {
        let n = world.total_dof();
        let mut analytic = nalgebra::DMatrix::zeros(dim, n);
        for entry in entries {
            if let Some(offset) = world.spec(entry.frame).dof_offset {
                analytic[(entry.residual_row, offset + entry.local_dof)] += entry.value;
            }
        }
        analytic
    }

    #[test]
    fn position_diff_reads_forward_kinematics() {
        let world = single_link();
        let model = ArenaKinematicModel::new(&world);
        let tip = world.frame_id("tip").unwrap();
        let feature = PositionDiff::to_target(tip, Vector3::new(1.0, 0.0, 0.0));
        let (residual, _) = feature.eval(&[&model], &[]).unwrap();
        assert_abs_diff_eq!(residual.norm(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn position_diff_jacobian_matches_numeric_derivative() {
        let world = two_link_arm();
        let elbow = world.frame_id("elbow").unwrap();
        let feature = PositionDiff::to_target(elbow, Vector3::zeros());
        let q0 = [0.3, 0.5];
        let model = model_at(&world, &q0);
        let (_, jacobian) = feature.eval(&[&model], &[]).unwrap();

        let analytic = analytic_jacobian(&world, feature.dim(), &jacobian);
        let numeric = numeric_jacobian(&world, &feature, &q0, 1e-6);
        let scale = analytic.norm().max(1.0);
        assert!((analytic - numeric).norm() / scale < 1e-5);
    }

    #[test]
    fn quaternion_diff_jacobian_matches_numeric_derivative() {
        let world = two_link_arm();
        let elbow = world.frame_id("elbow").unwrap();
        let feature = QuaternionDiff::new(elbow, UnitQuaternion::identity());
        let q0 = [0.2, -0.4];
        let model = model_at(&world, &q0);
        let (_, jacobian) = feature.eval(&[&model], &[]).unwrap();

        let analytic = analytic_jacobian(&world, feature.dim(), &jacobian);
        let numeric = numeric_jacobian(&world, &feature, &q0, 1e-6);
        let scale = analytic.norm().max(1.0);
        assert!((analytic - numeric).norm() / scale < 1e-5);
    }

    #[test]
    fn qitself_residual_reads_actual_joint_state() {
        let world = single_link();
        let tip = world.frame_id("tip").unwrap();
        let model = model_at(&world, &[0.42]);
        let feature = QItself::new(tip, 1);
        let (residual, _) = feature.eval(&[&model], &[]).unwrap();
        assert_abs_diff_eq!(residual[0], 0.42, epsilon = 1e-12);
    }

    #[test]
    fn control_cost_stencil_sums_to_zero() {
        let world = single_link();
        let feature = ControlCost::new(world.frame_id("tip").unwrap(), 1, 2, 1.0);
        let _ = feature;
        let coefficients: f64 = (0..=2).map(|slot| binomial_difference_coefficient(2, slot)).sum();
        assert_abs_diff_eq!(coefficients, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn control_cost_residual_is_backward_difference_of_joint_state() {
        let world = single_link();
        let tip = world.frame_id("tip").unwrap();
        let oldest = model_at(&world, &[1.0]);
        let newest = model_at(&world, &[1.5]);
        let feature = ControlCost::new(tip, 1, 1, 1.0);
        let (residual, _) = feature.eval(&[&oldest, &newest], &[]).unwrap();
        assert_abs_diff_eq!(residual[0], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn control_cost_residual_is_divided_by_tau() {
        let world = single_link();
        let tip = world.frame_id("tip").unwrap();
        let oldest = model_at(&world, &[1.0]);
        let newest = model_at(&world, &[1.5]);
        let feature = ControlCost::new(tip, 1, 1, 0.5);
        let (residual, jacobian) = feature.eval(&[&oldest, &newest], &[]).unwrap();
        // (1.5 - 1.0) / 0.5 == 1.0, not the raw difference of 0.5.
        assert_abs_diff_eq!(residual[0], 1.0, epsilon = 1e-12);
        assert!(jacobian.iter().any(|entry| (entry.value.abs() - 2.0).abs() < 1e-12));
    }

    #[test]
    fn pair_collision_reports_infinite_margin_when_not_in_contact_list() {
        let world = single_link();
        let model = ArenaKinematicModel::new(&world);
        let tip = world.frame_id("tip").unwrap();
        let base = world.frame_id("base").unwrap();
        let feature = PairCollision::new(tip, base, 0.1);
        let (residual, _) = feature.eval(&[&model], &[]).unwrap();
        assert!(residual[0].is_infinite() && residual[0].is_sign_negative());
    }
}
