//! Exposes a grounded problem as the residual/Jacobian contract an NLP
//! solver expects, in three equivalent views: sparse-flat triplets, a
//! per-objective factored view, and a materialized dense Jacobian (spec
//! §4.6 — "implement once, three packers"). With the `rayon` feature enabled,
//! grounded objectives are evaluated across a work-stealing pool instead of
//! sequentially; the two paths produce identical results since each grounded
//! objective only reads its own tuple's kinematic models.

use crate::collision::{CollisionBackend, ProxyPair};
use crate::config::EngineConfig;
use crate::errors::{DegeneracyCounter, EngineResult};
use crate::feature::LocalJacobian;
use crate::grounder::{GroundedObjective, Grounder};
use crate::kinematics::{ArenaKinematicModel, FrameId, KinematicModel};
use crate::objective::{FeatureType, Objective};
use crate::path_config::PathConfig;
use crate::path_state::{PathState, SplineBasis};
use crate::switch::Switch;
use crate::telemetry;
use nalgebra::{DMatrix, DVector};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use std::time::Instant;
use tracing_attributes::instrument;

/// One non-zero entry of the stacked Jacobian, in global row/column space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triplet {
    pub row: usize,
    pub col: usize,
    pub value: f64,
}

/// Result of one [`Transcription::evaluate`] call: the stacked residual, its
/// Jacobian as triplets, each row's type, and a tally of numeric
/// degeneracies encountered (never fatal — spec §4.8).
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub residual: DVector<f64>,
    pub triplets: Vec<Triplet>,
    pub row_types: Vec<FeatureType>,
    pub degeneracy: DegeneracyCounter,
    /// Wall-clock breakdown of this evaluation, in the same three phases
    /// [`crate::telemetry::RunLog`] reports per solver iteration; a caller's
    /// own convergence loop combines these with its own step-solve timing.
    pub timing: EvaluationTiming,
}

/// Wall-clock time spent in each phase of one [`Transcription::evaluate`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationTiming {
    pub kinematics: std::time::Duration,
    pub collisions: std::time::Duration,
    pub features: std::time::Duration,
}

/// Owns the grounded problem for one `(world, objectives)` pair: the column
/// layout from [`PathConfig`], the row layout from [`Grounder::ground`], and
/// the collision frames to refresh before evaluating collision features.
pub struct Transcription {
    path_config: PathConfig,
    objectives: Vec<Objective>,
    grounded: Vec<GroundedObjective>,
    row_types: Vec<FeatureType>,
    total_rows: usize,
    collision_frames: Vec<FrameId>,
    config: EngineConfig,
    switches: Vec<Switch>,
}

impl Transcription {
    pub fn new(path_config: PathConfig, objectives: Vec<Objective>, config: EngineConfig) -> EngineResult<Self> {
        Self::with_switches(path_config, objectives, config, Vec::new())
    }

    /// Like [`Transcription::new`], additionally recording the [`Switch`]es
    /// that were applied to `path_config` so [`Transcription::get_initialization_sample`]
    /// can honor their [`crate::switch::InitPolicy`].
    pub fn with_switches(
        path_config: PathConfig,
        objectives: Vec<Objective>,
        config: EngineConfig,
        switches: Vec<Switch>,
    ) -> EngineResult<Self> {
        let grounded = Grounder::ground(&path_config, &objectives, config.steps_per_phase)?;
        let mut row_types = Vec::new();
        let mut total_rows = 0;
        for g in &grounded {
            let objective = &objectives[g.objective_index];
            for _ in 0..objective.feature.dim() {
                row_types.push(objective.feature_type);
            }
            total_rows += objective.feature.dim();
        }
        let collision_frames = path_config.world().frames_depth_first();
        Ok(Transcription {
            path_config,
            objectives,
            grounded,
            row_types,
            total_rows,
            collision_frames,
            config,
            switches,
        })
    }

    pub fn path_config(&self) -> &PathConfig {
        &self.path_config
    }

    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    pub fn total_cols(&self) -> usize {
        self.path_config.total_dims()
    }

    pub fn grounded_objectives(&self) -> &[GroundedObjective] {
        &self.grounded
    }

    /// Evaluates every grounded objective under `state`, producing the
    /// sparse-flat view directly; [`Transcription::factored`] and
    /// [`Transcription::dense`] are repackagings of the same triplets.
    #[instrument(level = "debug", skip_all, fields(rows = self.total_rows, cols = self.total_cols()))]
    pub fn evaluate(&self, state: &PathState, collision_backend: Option<&mut dyn CollisionBackend>) -> EngineResult<EvaluationReport> {
        let world = self.path_config.world();
        let mut residual = DVector::zeros(self.total_rows);
        let mut triplets = Vec::new();
        let mut degeneracy = DegeneracyCounter::default();

        let kinematics_timer = Instant::now();
        let _kinematics_span = telemetry::kinematics_span(self.path_config.slice_count()).entered();
        // Every slice gets a kinematic model, including the pinned prefix:
        // features of order > 0 (controlCost, finite-difference velocities)
        // read `order()` consecutive slices, which may dip into the prefix.
        // A prefix slice has no decision-vector columns, so its model is left
        // at `ArenaKinematicModel::new`'s default (all-zero) joint state —
        // the pinned boundary condition spec §8's "prefix pinning" property
        // describes.
        let mut models: Vec<ArenaKinematicModel> = Vec::with_capacity(self.path_config.slice_count());
        for slice in 0..self.path_config.slice_count() {
            let mut model = ArenaKinematicModel::new(world);
            if let Some(range) = self.path_config.slice_range(slice) {
                let q = state.values().as_slice()[range].to_vec();
                model.set_joint_state(&q)?;
                model.forward_kinematics();
            }
            models.push(model);
        }
        drop(_kinematics_span);
        let time_kinematics = kinematics_timer.elapsed();

        let collisions_timer = Instant::now();
        let collisions: Vec<ProxyPair> = if self.config.compute_collisions {
            let _collision_span = telemetry::collision_span(self.collision_frames.len()).entered();
            match (collision_backend, models.last()) {
                (Some(backend), Some(last_model)) => backend.refresh_proxies(last_model, &self.collision_frames),
                _ => Vec::new(),
            }
        } else {
            Vec::new()
        };
        let time_collisions = collisions_timer.elapsed();

        let features_timer = Instant::now();
        let _feature_span = telemetry::feature_span(self.grounded.len()).entered();

        // Each grounded objective reads only its own tuple's kinematic models
        // and is independent of every other's residual/Jacobian computation,
        // so this fan-out parallelizes cleanly across objectives; accumulating
        // into the shared residual/triplet buffers afterward stays sequential.
        let eval_one = |grounded: &GroundedObjective| -> EngineResult<(usize, DVector<f64>, Vec<LocalJacobian>)> {
            let objective = &self.objectives[grounded.objective_index];
            let refs: Vec<&dyn KinematicModel> = grounded
                .internal_slices
                .iter()
                .map(|&slice| &models[slice] as &dyn KinematicModel)
                .collect();
            let (values, jacobian) = objective.feature.eval(&refs, &collisions)?;
            let scaled_values = values * objective.scale;
            let scaled_jacobian = jacobian
                .into_iter()
                .map(|entry| LocalJacobian {
                    value: entry.value * objective.scale,
                    ..entry
                })
                .collect();
            Ok((grounded.row_offset, scaled_values, scaled_jacobian))
        };

        #[cfg(feature = "rayon")]
        let evaluated: Vec<_> = self.grounded.par_iter().map(eval_one).collect();
        #[cfg(not(feature = "rayon"))]
        let evaluated: Vec<_> = self.grounded.iter().map(eval_one).collect();

        for (grounded, result) in self.grounded.iter().zip(evaluated) {
            let (row_offset, values, jacobian) = result?;
            let objective = &self.objectives[grounded.objective_index];
            write_residual(&mut residual, row_offset, &values, objective.name.as_str(), &mut degeneracy);
            write_jacobian(
                &mut triplets,
                &self.path_config,
                grounded,
                &jacobian,
                objective.name.as_str(),
                &mut degeneracy,
                self.config.sparsity_tolerance,
            );
        }

        let time_features = features_timer.elapsed();

        Ok(EvaluationReport {
            residual,
            triplets,
            row_types: self.row_types.clone(),
            degeneracy,
            timing: EvaluationTiming {
                kinematics: time_kinematics,
                collisions: time_collisions,
                features: time_features,
            },
        })
    }

    /// Groups one [`EvaluationReport`]'s rows/triplets per grounded
    /// objective, preserving grounding order.
    pub fn factored<'a>(&self, report: &'a EvaluationReport) -> Vec<(&'a [f64], Vec<Triplet>)> {
        self.grounded
            .iter()
            .map(|g| {
                let dim = self.objectives[g.objective_index].feature.dim();
                let rows = &report.residual.as_slice()[g.row_offset..g.row_offset + dim];
                let triplets = report
                    .triplets
                    .iter()
                    .filter(|t| t.row >= g.row_offset && t.row < g.row_offset + dim)
                    .copied()
                    .collect();
                (rows, triplets)
            })
            .collect()
    }

    /// Materializes the stacked Jacobian as a dense matrix, summing
    /// duplicate `(row, col)` triplets (shared ancestor DOF contribute from
    /// more than one tuple slot).
    pub fn dense(&self, report: &EvaluationReport) -> DMatrix<f64> {
        let mut jacobian = DMatrix::zeros(self.total_rows, self.total_cols());
        for triplet in &report.triplets {
            jacobian[(triplet.row, triplet.col)] += triplet.value;
        }
        jacobian
    }

    /// Per-column `(lower, upper)` bounds, replicated from the backing
    /// frame's joint limits across every free slice it occupies.
    pub fn bounds(&self) -> (DVector<f64>, DVector<f64>) {
        let world = self.path_config.world();
        let model = ArenaKinematicModel::new(world);
        let mut lower = DVector::from_element(self.total_cols(), f64::NEG_INFINITY);
        let mut upper = DVector::from_element(self.total_cols(), f64::INFINITY);
        for frame in world.frames_depth_first() {
            for slice in self.path_config.k_order()..self.path_config.slice_count() {
                let Some(range) = self.path_config.columns(slice, frame) else {
                    continue;
                };
                if let Some(offset) = world.spec(frame).dof_offset {
                    for (i, column) in range.enumerate() {
                        let (lo, hi) = model.joint_limits()[offset + i];
                        lower[column] = lo.unwrap_or(f64::NEG_INFINITY);
                        upper[column] = hi.unwrap_or(f64::INFINITY);
                    }
                }
            }
        }
        (lower, upper)
    }

    /// A random feasible-ish starting point, per spec's
    /// `get_initialization_sample`: zero plus small uniform noise, with every
    /// `Copy`-policy switch's re-parented frame seeded for continuity across
    /// its switch instant (spec §4.4).
    pub fn get_initialization_sample(&self, seed: u64) -> EngineResult<PathState> {
        let mut state = PathState::with_noise(&self.path_config, self.config.noise_amplitude, seed);
        for switch in &self.switches {
            state.apply_switch_init(&self.path_config, switch)?;
        }
        Ok(state)
    }

    /// Evaluates the spline-reparameterized problem: lifts `coefficients`
    /// through `basis` into a full [`PathState`], evaluates it normally, then
    /// post-multiplies the Jacobian by `basis` so the returned report is
    /// expressed in `coefficients`' reduced column space (spec §4.7's "the
    /// Jacobian is post-multiplied by B"). With a full-rank basis (one knot
    /// per free slice) this is numerically identical to [`Transcription::evaluate`]
    /// on the lifted state (spec §8 property 5).
    pub fn evaluate_spline(
        &self,
        coefficients: &DVector<f64>,
        basis: &SplineBasis,
        collision_backend: Option<&mut dyn CollisionBackend>,
    ) -> EngineResult<EvaluationReport> {
        let full_state = PathState::from_values(basis.lift(coefficients));
        let report = self.evaluate(&full_state, collision_backend)?;
        let mut accumulated: std::collections::HashMap<(usize, usize), f64> = std::collections::HashMap::new();
        for triplet in &report.triplets {
            for &(coeff_col, weight) in basis.column(triplet.col) {
                *accumulated.entry((triplet.row, coeff_col)).or_insert(0.0) += triplet.value * weight;
            }
        }
        let triplets = accumulated
            .into_iter()
            .map(|((row, col), value)| Triplet { row, col, value })
            .collect();
        Ok(EvaluationReport { triplets, ..report })
    }
}

fn write_residual(residual: &mut DVector<f64>, row_offset: usize, values: &DVector<f64>, objective: &str, degeneracy: &mut DegeneracyCounter) {
    for (i, &value) in values.iter().enumerate() {
        if value.is_finite() {
            residual[row_offset + i] = value;
        } else {
            residual[row_offset + i] = 0.0;
            degeneracy.non_finite_residuals += 1;
            telemetry::log_degeneracy("residual", objective);
        }
    }
}

fn write_jacobian(
    triplets: &mut Vec<Triplet>,
    path_config: &PathConfig,
    grounded: &GroundedObjective,
    jacobian: &[LocalJacobian],
    objective: &str,
    degeneracy: &mut DegeneracyCounter,
    sparsity_tolerance: f64,
) {
    for entry in jacobian {
        let Some(slice) = grounded.internal_slices.get(entry.tuple_slot) else {
            continue;
        };
        let Some(range) = path_config.columns(*slice, entry.frame) else {
            // Prefix slice or zero-DOF frame: no decision-vector column, so
            // this entry contributes nothing (a pinned boundary condition).
            continue;
        };
        let column = range.start + entry.local_dof;
        let value = if entry.value.is_finite() {
            entry.value
        } else {
            degeneracy.non_finite_jacobian_entries += 1;
            telemetry::log_degeneracy("jacobian", objective);
            0.0
        };
        if value.abs() < sparsity_tolerance {
            continue;
        }
        triplets.push(Triplet {
            row: grounded.row_offset + entry.residual_row,
            col: column,
            value,
        });
    }
}
