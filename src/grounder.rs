//! Deterministic expansion of [`Objective`]s into concrete [`GroundedObjective`]s
//! over a [`PathConfig`]'s slices (spec §4.5). Grounding is idempotent: the
//! same `(path_config, objectives)` pair always produces the same, identically
//! ordered result.

use crate::errors::{EngineError, EngineResult};
use crate::objective::Objective;
use crate::path_config::PathConfig;

/// One concrete instantiation of an [`Objective`] at one slice window: the
/// feature reads `internal_slices`, oldest first, and its residual
/// contributes rows starting at `row_offset` in the flattened residual
/// vector of its [`FeatureType`](crate::objective::FeatureType).
#[derive(Debug, Clone)]
pub struct GroundedObjective {
    pub objective_index: usize,
    /// Internal (storage) slice indices the feature reads, oldest first.
    pub internal_slices: Vec<usize>,
    pub row_offset: usize,
}

/// Stateless expander; `ground` is a pure function of its arguments.
pub struct Grounder;

impl Grounder {
    /// Expands every objective into one [`GroundedObjective`] per valid slice
    /// window within its interval, in objective-then-ascending-slice order.
    /// Row offsets are assigned by walking objectives and their windows in
    /// that same order (not bucketed by [`FeatureType`](crate::objective::FeatureType) —
    /// `row_types` alongside the residual vector carries per-row typing), so
    /// repeated calls over an unchanged input produce byte-identical output.
    pub fn ground(
        path_config: &PathConfig,
        objectives: &[Objective],
        steps_per_phase: usize,
    ) -> EngineResult<Vec<GroundedObjective>> {
        let mut grounded = Vec::new();
        let mut row_cursor = 0usize;
        let t = path_config.t();

        for (objective_index, objective) in objectives.iter().enumerate() {
            let order = objective.feature.order();
            if path_config.k_order() + 1 < order {
                return Err(EngineError::KOrderTooSmall {
                    k_order: path_config.k_order(),
                    order,
                });
            }

            let (t0, t1) = objective.slice_interval(steps_per_phase, path_config.k_order(), t);
            if t0 > t1 {
                return Err(EngineError::NonMonotonicTuple(vec![t0, t1]));
            }

            for s in objective.candidate_slices(steps_per_phase, path_config.k_order(), t, order) {
                let window: Vec<i64> = ((s - order as i64 + 1)..=s).collect();
                let mut internal_slices = Vec::with_capacity(window.len());
                let mut in_domain = true;
                for signed in &window {
                    match path_config.to_internal(*signed) {
                        Ok(internal) => internal_slices.push(internal),
                        Err(_) => {
                            in_domain = false;
                            break;
                        }
                    }
                }
                if !in_domain {
                    continue;
                }

                grounded.push(GroundedObjective {
                    objective_index,
                    internal_slices,
                    row_offset: row_cursor,
                });
                row_cursor += objective.feature.dim();
            }
        }

        Ok(grounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::QItself;
    use crate::objective::Objective;
    use crate::world::{Axis, JointKind, World};

    fn config() -> (PathConfig, Vec<Objective>) {
        let mut world = World::new("base");
        let joint = world
            .add_frame("joint", "base", JointKind::Revolute(Axis::Z), nalgebra::Isometry3::identity())
            .unwrap();
        let path_config = PathConfig::new(world, 4, 1);
        let objective = Objective::new("hold", Box::new(QItself::new(joint, 1)), (0.0, 3.0));
        (path_config, vec![objective])
    }

    #[test]
    fn grounding_is_deterministic_and_ordered() {
        let (path_config, objectives) = config();
        let first = Grounder::ground(&path_config, &objectives, 1).unwrap();
        let second = Grounder::ground(&path_config, &objectives, 1).unwrap();
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.internal_slices, b.internal_slices);
            assert_eq!(a.row_offset, b.row_offset);
        }
        let slices: Vec<_> = first.iter().map(|g| g.internal_slices.clone()).collect();
        assert_eq!(slices, vec![vec![1], vec![2], vec![3], vec![4]]);
    }

    #[test]
    fn rejects_an_inverted_interval() {
        let (path_config, _) = config();
        let joint = path_config.world().frame_id("joint").unwrap();
        let objective = Objective::new("backwards", Box::new(QItself::new(joint, 1)), (3.0, 0.0));
        let err = Grounder::ground(&path_config, &[objective], 1).unwrap_err();
        assert!(matches!(err, EngineError::NonMonotonicTuple(_)));
    }

    #[test]
    fn rejects_k_order_smaller_than_feature_order() {
        let mut world = World::new("base");
        let joint = world
            .add_frame("joint", "base", JointKind::Revolute(Axis::Z), nalgebra::Isometry3::identity())
            .unwrap();
        let path_config = PathConfig::new(world, 4, 0);
        let objective = Objective::new(
            "accel",
            Box::new(crate::feature::ControlCost::new(joint, 1, 2, 0.1)),
            (0.0, 3.0),
        );
        let err = Grounder::ground(&path_config, &[objective], 1).unwrap_err();
        assert!(matches!(err, EngineError::KOrderTooSmall { .. }));
    }

    #[test]
    fn restricts_grounding_to_windows_inside_the_declared_interval() {
        let mut world = World::new("base");
        let joint = world
            .add_frame("joint", "base", JointKind::Revolute(Axis::Z), nalgebra::Isometry3::identity())
            .unwrap();
        let path_config = PathConfig::new(world, 3, 2);
        // order() == 3 (two-slice control cost), interval (0,2): only t=2's
        // window (0,1,2) stays fully inside [t0,t1]; t=0 and t=1 would dip
        // before t0 and are excluded per spec's `t ∈ [t0+o, t1]` rule.
        let objective = Objective::new(
            "smooth",
            Box::new(crate::feature::ControlCost::new(joint, 1, 2, 0.1)),
            (0.0, 2.0),
        );
        let grounded = Grounder::ground(&path_config, &[objective], 1).unwrap();
        assert_eq!(grounded.len(), 1);
        assert_eq!(grounded[0].internal_slices, vec![2, 3, 4]);
    }
}
