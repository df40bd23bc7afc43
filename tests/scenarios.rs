//! Scenario-level integration tests exercising the full setup → ground →
//! evaluate pipeline (spec §8's end-to-end properties), as far as testable
//! without an actual NLP solver loop.

use ktraj::{Engine, EngineConfig};
use ktraj::feature::{ControlCost, PairCollision, PositionDiff, QItself};
use ktraj::objective::Objective;
use ktraj::path_state::PathState;
use ktraj::switch::{InitPolicy, Switch};
use ktraj::world::{Axis, JointKind, World};
use nalgebra::{Isometry3, Vector3};

fn two_link_arm() -> (World, ktraj::FrameId, ktraj::FrameId) {
    let mut world = World::new("base");
    let shoulder = world
        .add_frame("shoulder", "base", JointKind::Revolute(Axis::Z), Isometry3::identity())
        .unwrap();
    let elbow = world
        .add_frame("elbow", "shoulder", JointKind::Revolute(Axis::Z), Isometry3::translation(1.0, 0.0, 0.0))
        .unwrap();
    (world, shoulder, elbow)
}

/// "Reach": a positionDiff cost objective grounded over every free slice
/// evaluates cleanly and the residual/Jacobian agree between the sparse and
/// dense views.
#[test]
fn reach_objective_evaluates_and_views_agree() {
    let (world, _shoulder, elbow) = two_link_arm();
    let config = EngineConfig::new(1).without_collisions().with_steps_per_phase(1);
    let mut engine = Engine::new(world, config);
    engine.add_objective(Objective::new(
        "reach",
        Box::new(PositionDiff::to_target(elbow, Vector3::new(0.0, 1.0, 0.0))),
        (0.0, 4.0),
    ));

    let transcription = engine.run_prepare(5).unwrap();
    let state = PathState::zeros(transcription.path_config());
    let report = transcription.evaluate(&state, None).unwrap();

    assert_eq!(report.residual.len(), transcription.total_rows());
    assert!(report.degeneracy.is_clean());

    let dense = transcription.dense(&report);
    for triplet in &report.triplets {
        assert!((dense[(triplet.row, triplet.col)] - triplet.value).abs() < 1e-12);
    }
}

/// "Thin obstacle": a pairCollision inequality objective reports an
/// unbounded (non-colliding) residual when the collision backend is
/// disabled, confirming the feature degrades gracefully rather than panicking.
#[test]
fn thin_obstacle_without_collision_backend_reports_no_contact() {
    let (world, shoulder, elbow) = two_link_arm();
    let config = EngineConfig::new(1).without_collisions().with_steps_per_phase(1);
    let mut engine = Engine::new(world, config);
    engine.add_objective(Objective::new("clearance", Box::new(PairCollision::new(shoulder, elbow, 0.1)), (0.0, 2.0)));

    let transcription = engine.run_prepare(3).unwrap();
    let state = PathState::zeros(transcription.path_config());
    let report = transcription.evaluate(&state, None).unwrap();
    assert!(report.residual.iter().all(|v| v.is_infinite() && v.is_sign_negative()));
}

/// "Switch": re-parenting a frame mid-path auto-generates a consistency
/// objective and the path config reflects the new parentage from its
/// effective slice onward.
#[test]
fn switch_reparents_and_grounds_a_consistency_objective() {
    let (mut world, shoulder, _elbow) = two_link_arm();
    let anchor = world.add_frame("anchor", "base", JointKind::Rigid, Isometry3::translation(2.0, 0.0, 0.0)).unwrap();

    let config = EngineConfig::new(1).without_collisions().with_steps_per_phase(1);
    let mut engine = Engine::new(world, config);
    engine.add_objective(Objective::new("hold", Box::new(QItself::new(shoulder, 1)), (0.0, 3.0)));
    // `before = true` delays the switch one slice past `at`, so the new
    // parentage only holds from slice 2 onward.
    engine.add_switch(Switch::new(shoulder, anchor, 1, true, InitPolicy::Copy));

    let transcription = engine.run_prepare(4).unwrap();
    let base = transcription.path_config().world().frame_id("base").unwrap();
    let anchor_id = transcription.path_config().world().frame_id("anchor").unwrap();

    let still_old = transcription.path_config().to_internal(1).unwrap();
    let switched = transcription.path_config().to_internal(2).unwrap();
    assert_eq!(transcription.path_config().effective_parent(still_old, shoulder), Some(base));
    assert_eq!(transcription.path_config().effective_parent(switched, shoulder), Some(anchor_id));

    let state = PathState::zeros(transcription.path_config());
    let report = transcription.evaluate(&state, None).unwrap();
    assert!(report.degeneracy.is_clean());
}

/// A `Copy`-policy switch's initialization sample seeds the re-parented
/// frame's joint state for continuity across the switch instant, rather than
/// leaving it at the noise-only default.
#[test]
fn copy_policy_switch_seeds_initialization_sample_for_continuity() {
    let (mut world, shoulder, _elbow) = two_link_arm();
    let anchor = world.add_frame("anchor", "base", JointKind::Revolute(Axis::Z), Isometry3::translation(2.0, 0.0, 0.0)).unwrap();

    let config = EngineConfig::new(1)
        .without_collisions()
        .with_noise_amplitude(0.0)
        .with_steps_per_phase(1);
    let mut engine = Engine::new(world, config);
    engine.add_objective(Objective::new("hold", Box::new(QItself::new(shoulder, 1)), (0.0, 2.0)));
    // before=false is the immediate case: effective_from() == 1, so the
    // switch seeds slice 1 from slice 0.
    engine.add_switch(Switch::new(shoulder, anchor, 1, false, InitPolicy::Copy));

    let transcription = engine.run_prepare(3).unwrap();
    let mut state = PathState::from_waypoints(
        transcription.path_config(),
        &[(shoulder, vec![(0, 0.1), (1, 0.4), (2, 0.9)])],
    )
    .unwrap();
    let switch = Switch::new(shoulder, anchor, 1, false, InitPolicy::Copy);
    state.apply_switch_init(transcription.path_config(), &switch).unwrap();

    let internal0 = transcription.path_config().to_internal(0).unwrap();
    let internal1 = transcription.path_config().to_internal(1).unwrap();
    let at_0 = state.get(transcription.path_config(), internal0, shoulder).unwrap()[0];
    let at_1 = state.get(transcription.path_config(), internal1, shoulder).unwrap()[0];
    assert!((at_1 - at_0).abs() < 1e-12);

    let sample = transcription.get_initialization_sample(7).unwrap();
    assert_eq!(sample.dims(), transcription.total_cols());
}

/// "Waypoint init": an initialization built from waypoints warm-starts
/// cleanly into a valid decision vector of the expected size.
#[test]
fn waypoint_initialization_has_expected_shape() {
    let (world, shoulder, _elbow) = two_link_arm();
    let config = EngineConfig::new(2).without_collisions().with_steps_per_phase(1);
    let mut engine = Engine::new(world, config);
    engine.add_objective(Objective::new("hold", Box::new(QItself::new(shoulder, 1)), (0.0, 3.0)));
    let transcription = engine.run_prepare(4).unwrap();

    let state = PathState::from_waypoints(transcription.path_config(), &[(shoulder, vec![(0, 0.0), (3, 1.0)])]).unwrap();
    assert_eq!(state.dims(), transcription.total_cols());

    let warm_started = state.warm_start(transcription.path_config()).unwrap();
    assert_eq!(warm_started.dims(), state.dims());
}

/// A `controlCost` objective of order 2, declared over an interval that
/// starts in the pinned prefix, grounds tuples whose windows dip into that
/// prefix (but never before the objective's own declared start), exercising
/// the path where every slice (prefix included) needs its own kinematic
/// model to evaluate against.
#[test]
fn control_cost_grounds_cleanly_against_the_pinned_prefix() {
    let (world, shoulder, _elbow) = two_link_arm();
    let config = EngineConfig::new(2).without_collisions().with_steps_per_phase(1);
    let tau = config.tau;
    let mut engine = Engine::new(world, config);
    engine.add_objective(Objective::new("smooth", Box::new(ControlCost::new(shoulder, 1, 2, tau)), (-2.0, 2.0)));

    let transcription = engine.run_prepare(3).unwrap();
    let state = PathState::zeros(transcription.path_config());
    let report = transcription.evaluate(&state, None).unwrap();

    assert!(report.degeneracy.is_clean());
    assert!(report.residual.iter().all(|v| v.abs() < 1e-12));
}

/// Scaling an objective scales both its residual and every Jacobian entry by
/// the same factor, at every view `evaluate` produces.
#[test]
fn scaled_objective_scales_residual_and_jacobian_rows() {
    let (world, _shoulder, elbow) = two_link_arm();
    let config = EngineConfig::new(1).without_collisions().with_steps_per_phase(1);
    let mut unscaled_engine = Engine::new(world, config);
    unscaled_engine.add_objective(Objective::new(
        "reach",
        Box::new(PositionDiff::to_target(elbow, Vector3::new(0.0, 1.0, 0.0))),
        (0.0, 1.0),
    ));
    let unscaled = unscaled_engine.run_prepare(2).unwrap();
    let state = PathState::zeros(unscaled.path_config());
    let unscaled_report = unscaled.evaluate(&state, None).unwrap();

    let (world, _shoulder, elbow) = two_link_arm();
    let config = EngineConfig::new(1).without_collisions().with_steps_per_phase(1);
    let mut scaled_engine = Engine::new(world, config);
    scaled_engine.add_objective(
        Objective::new("reach", Box::new(PositionDiff::to_target(elbow, Vector3::new(0.0, 1.0, 0.0))), (0.0, 1.0))
            .with_scale(2.0),
    );
    let scaled = scaled_engine.run_prepare(2).unwrap();
    let scaled_report = scaled.evaluate(&state, None).unwrap();

    assert!((scaled_report.residual.clone() - unscaled_report.residual.clone() * 2.0).norm() < 1e-12);
    let unscaled_dense = unscaled.dense(&unscaled_report);
    let scaled_dense = scaled.dense(&scaled_report);
    assert!((scaled_dense - unscaled_dense * 2.0).norm() < 1e-12);
}

/// "Bounds": per-column bounds reported by the transcription match the
/// joint limits configured on the world.
#[test]
fn bounds_reflect_configured_joint_limits() {
    let (mut world, shoulder, _elbow) = two_link_arm();
    world.set_joint_limit(shoulder, 0, (Some(-1.0), Some(1.0)));

    let config = EngineConfig::new(1).without_collisions().with_steps_per_phase(1);
    let mut engine = Engine::new(world, config);
    engine.add_objective(Objective::new("hold", Box::new(QItself::new(shoulder, 1)), (0.0, 2.0)));
    let transcription = engine.run_prepare(3).unwrap();

    let (lower, upper) = transcription.bounds();
    let internal = transcription.path_config().to_internal(0).unwrap();
    let columns = transcription.path_config().columns(internal, shoulder).unwrap();
    assert_eq!(lower[columns.start], -1.0);
    assert_eq!(upper[columns.start], 1.0);
}
