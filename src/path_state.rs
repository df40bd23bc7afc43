//! The decision vector: one flat `DVector<f64>` laid out according to a
//! [`PathConfig`]'s column map, plus the initialization policies and
//! warm-start/reparameterization operations spec §4.7 describes.

use crate::errors::{EngineError, EngineResult};
use crate::path_config::{FrameId, PathConfig};
use crate::switch::{InitPolicy, Switch};
use nalgebra::DVector;
use std::collections::HashMap;

/// The optimization variable: one value per decision-vector column, laid out
/// time-major (slice, then frame-in-depth-first-order, then local DOF) to
/// match [`PathConfig::columns`].
#[derive(Debug, Clone)]
pub struct PathState {
    values: DVector<f64>,
}

impl PathState {
    pub fn zeros(path_config: &PathConfig) -> Self {
        PathState {
            values: DVector::zeros(path_config.total_dims()),
        }
    }

    /// Wraps an already-laid-out decision vector, e.g. one lifted through a
    /// [`SplineBasis`].
    pub fn from_values(values: DVector<f64>) -> Self {
        PathState { values }
    }

    /// Builds a path state by linearly interpolating the frame's own joint
    /// value between waypoints given as `(signed slice, value)` pairs, one
    /// set per frame. Frames absent from `waypoints` are left at zero.
    pub fn from_waypoints(path_config: &PathConfig, waypoints: &[(FrameId, Vec<(i64, f64)>)]) -> EngineResult<Self> {
        let mut state = Self::zeros(path_config);
        for (frame, points) in waypoints {
            if points.is_empty() {
                continue;
            }
            let mut sorted = points.clone();
            sorted.sort_by_key(|(s, _)| *s);
            for s in path_config.k_order() as i64 * -1..path_config.t() as i64 {
                let internal = path_config.to_internal(s)?;
                let Some(columns) = path_config.columns(internal, *frame) else {
                    continue;
                };
                let value = interpolate(&sorted, s);
                for column in columns {
                    state.values[column] = value;
                }
            }
        }
        Ok(state)
    }

    /// Adds uniform noise in `[-amplitude, amplitude]` to every free column,
    /// using a deterministic splitmix64 stream seeded by `seed` so repeated
    /// calls with the same seed reproduce the same initialization sample.
    pub fn with_noise(path_config: &PathConfig, amplitude: f64, seed: u64) -> Self {
        let mut state = Self::zeros(path_config);
        let mut generator = SplitMix64::new(seed);
        for value in state.values.iter_mut() {
            *value = amplitude * (2.0 * generator.next_f64() - 1.0);
        }
        state
    }

    /// Applies one [`Switch`]'s [`InitPolicy`] to an already-laid-out state.
    /// `Zero` is a no-op, since a fresh slice's columns already start at zero.
    /// `Copy` seeds `switch.frame`'s joint-state columns at the switch's
    /// first effective slice from the immediately preceding slice's columns,
    /// preserving continuity across the re-parenting instant (spec §4.4).
    /// Only meaningful when both slices give `frame` the same joint
    /// dimension — a switch that also changes the frame's joint type needs a
    /// general inverse-kinematics solve this crate does not provide, and is
    /// left at zero instead of attempting one.
    pub fn apply_switch_init(&mut self, path_config: &PathConfig, switch: &Switch) -> EngineResult<()> {
        if switch.init != InitPolicy::Copy {
            return Ok(());
        }
        let at = path_config.to_internal(switch.effective_from())?;
        if at == 0 {
            return Ok(());
        }
        let (Some(dst), Some(src)) = (path_config.columns(at, switch.frame), path_config.columns(at - 1, switch.frame)) else {
            return Ok(());
        };
        if dst.len() != src.len() {
            return Ok(());
        }
        for (d, s) in dst.zip(src) {
            self.values[d] = self.values[s];
        }
        Ok(())
    }

    pub fn values(&self) -> &DVector<f64> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut DVector<f64> {
        &mut self.values
    }

    pub fn dims(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, path_config: &PathConfig, internal_slice: usize, frame: FrameId) -> Option<&[f64]> {
        let range = path_config.columns(internal_slice, frame)?;
        Some(&self.values.as_slice()[range])
    }

    /// Shifts every free slice's values one slice earlier and repeats the
    /// last slice's values into the newly opened final slice — the standard
    /// warm-start used when re-solving after advancing the receding horizon
    /// by one step.
    pub fn warm_start(&self, path_config: &PathConfig) -> EngineResult<Self> {
        let mut shifted = Self::zeros(path_config);
        let order = path_config.world().frames_depth_first();
        let last_free = path_config.slice_count() - 1;
        for slice in path_config.k_order()..path_config.slice_count() {
            let source_slice = (slice + 1).min(last_free);
            for &frame in &order {
                let (Some(dst), Some(src)) = (path_config.columns(slice, frame), path_config.columns(source_slice, frame))
                else {
                    continue;
                };
                for (d, s) in dst.zip(src) {
                    shifted.values[d] = self.values[s];
                }
            }
        }
        Ok(shifted)
    }
}

/// Linear change of variable lifting a reduced coefficient vector `c` to a
/// full [`PathState`] `x = B*c` (spec §4.7's "spline reparameterization").
/// `B` is the degree-1 (piecewise-linear) B-spline basis over a chosen set of
/// knot slices: full columns at a knot slice copy that knot's coefficient
/// directly, columns between two knots interpolate linearly between them,
/// and columns outside the knot range hold the nearest endpoint's value.
///
/// With one knot per free slice, `B` is the identity and every evaluation is
/// numerically identical to the non-spline variant (spec §8 property 5); the
/// prefix is never part of the basis; it stays pinned exactly as in the
/// non-spline case (spec §9 open question (c)).
pub struct SplineBasis {
    /// Per full (decision-vector) column, the coefficient columns and
    /// weights it is a linear combination of — 1 entry at a knot, 2 entries
    /// between knots, weights summing to 1.
    entries: Vec<Vec<(usize, f64)>>,
    n_coeffs: usize,
}

impl SplineBasis {
    /// Builds the basis over `knots` (signed slice indices, deduplicated and
    /// sorted; must be non-empty and lie within the path's free domain
    /// `0..T`).
    pub fn piecewise_linear(path_config: &PathConfig, knots: &[i64]) -> EngineResult<Self> {
        let mut sorted: Vec<i64> = knots.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.is_empty() {
            return Err(EngineError::NonMonotonicTuple(Vec::new()));
        }
        let internal_knots: Vec<usize> = sorted.iter().map(|&s| path_config.to_internal(s)).collect::<EngineResult<_>>()?;

        let order = path_config.world().frames_depth_first();
        let mut coeff_columns: HashMap<(usize, FrameId), std::ops::Range<usize>> = HashMap::new();
        let mut cursor = 0;
        for (knot_index, _) in internal_knots.iter().enumerate() {
            for &frame in &order {
                let dof = path_config.world().joint_kind(frame).dof();
                if dof == 0 {
                    continue;
                }
                coeff_columns.insert((knot_index, frame), cursor..cursor + dof);
                cursor += dof;
            }
        }
        let n_coeffs = cursor;

        let mut entries = vec![Vec::new(); path_config.total_dims()];
        for &frame in &order {
            let dof = path_config.world().joint_kind(frame).dof();
            if dof == 0 {
                continue;
            }
            for slice in path_config.k_order()..path_config.slice_count() {
                let Some(full_range) = path_config.columns(slice, frame) else {
                    continue;
                };
                let (lo, hi, t) = bracket(&internal_knots, slice);
                for (d, full_col) in full_range.enumerate() {
                    let lo_col = coeff_columns[&(lo, frame)].start + d;
                    if lo == hi {
                        entries[full_col].push((lo_col, 1.0));
                    } else {
                        let hi_col = coeff_columns[&(hi, frame)].start + d;
                        entries[full_col].push((lo_col, 1.0 - t));
                        entries[full_col].push((hi_col, t));
                    }
                }
            }
        }
        Ok(SplineBasis { entries, n_coeffs })
    }

    pub fn n_coeffs(&self) -> usize {
        self.n_coeffs
    }

    /// Lifts a coefficient vector into a full [`PathState`] via `x = B*c`.
    pub fn lift(&self, coefficients: &DVector<f64>) -> DVector<f64> {
        let mut full = DVector::zeros(self.entries.len());
        for (full_col, parts) in self.entries.iter().enumerate() {
            full[full_col] = parts.iter().map(|&(c, w)| w * coefficients[c]).sum();
        }
        full
    }

    /// Per full column, the `(coefficient column, weight)` pairs contributing
    /// to it; used by [`crate::transcription::Transcription`] to
    /// post-multiply a full-space Jacobian column by `B`.
    pub fn column(&self, full_col: usize) -> &[(usize, f64)] {
        &self.entries[full_col]
    }
}

/// Returns `(lo_knot_index, hi_knot_index, t)` bracketing `slice` among
/// sorted internal `knots`: `t in [0,1]` is the fractional position between
/// `lo` and `hi` (0 and equal indices when `slice` coincides with or falls
/// outside the knot range).
fn bracket(knots: &[usize], slice: usize) -> (usize, usize, f64) {
    if slice <= knots[0] {
        return (0, 0, 0.0);
    }
    let last = knots.len() - 1;
    if slice >= knots[last] {
        return (last, last, 0.0);
    }
    for w in 0..last {
        let (a, b) = (knots[w], knots[w + 1]);
        if slice >= a && slice <= b {
            let t = if b == a { 0.0 } else { (slice - a) as f64 / (b - a) as f64 };
            return (w, w + 1, t);
        }
    }
    unreachable!("slice lies within [knots[0], knots[last]] by the checks above")
}

fn interpolate(points: &[(i64, f64)], s: i64) -> f64 {
    if s <= points[0].0 {
        return points[0].1;
    }
    if s >= points[points.len() - 1].0 {
        return points[points.len() - 1].1;
    }
    for window in points.windows(2) {
        let (s0, v0) = window[0];
        let (s1, v1) = window[1];
        if s >= s0 && s <= s1 {
            if s1 == s0 {
                return v0;
            }
            let t = (s - s0) as f64 / (s1 - s0) as f64;
            return v0 + t * (v1 - v0);
        }
    }
    unreachable!("s is within [points[0].0, points[last].0] by the checks above")
}

/// Small, dependency-free PRNG (splitmix64) used only to generate
/// reproducible initialization noise; not cryptographic.
struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    fn new(seed: u64) -> Self {
        SplitMix64 { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E3779B97F4A7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Axis, JointKind, World};
    use nalgebra::Isometry3;

    fn config() -> PathConfig {
        let mut world = World::new("base");
        world
            .add_frame("joint", "base", JointKind::Revolute(Axis::Z), Isometry3::identity())
            .unwrap();
        PathConfig::new(world, 3, 1)
    }

    #[test]
    fn noise_is_reproducible_for_the_same_seed() {
        let path_config = config();
        let a = PathState::with_noise(&path_config, 0.1, 42);
        let b = PathState::with_noise(&path_config, 0.1, 42);
        assert_eq!(a.values(), b.values());
        assert!(a.values().iter().all(|v| v.abs() <= 0.1));
    }

    #[test]
    fn waypoints_interpolate_linearly() {
        let path_config = config();
        let joint = path_config.world().frame_id("joint").unwrap();
        let state = PathState::from_waypoints(&path_config, &[(joint, vec![(0, 0.0), (2, 2.0)])]).unwrap();
        let internal = path_config.to_internal(1).unwrap();
        let value = state.get(&path_config, internal, joint).unwrap()[0];
        assert!((value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn spline_basis_with_one_knot_per_step_is_identity() {
        let path_config = config();
        let basis = SplineBasis::piecewise_linear(&path_config, &[0, 1, 2]).unwrap();
        assert_eq!(basis.n_coeffs(), path_config.total_dims());
        let coefficients = DVector::from_vec(vec![0.1, -0.3, 0.7]);
        let lifted = basis.lift(&coefficients);
        assert_eq!(lifted, coefficients);
    }

    #[test]
    fn spline_basis_interpolates_between_sparse_knots() {
        let path_config = config();
        let basis = SplineBasis::piecewise_linear(&path_config, &[0, 2]).unwrap();
        assert_eq!(basis.n_coeffs(), 2);
        let coefficients = DVector::from_vec(vec![0.0, 2.0]);
        let lifted = basis.lift(&coefficients);
        let internal1 = path_config.to_internal(1).unwrap();
        let joint = path_config.world().frame_id("joint").unwrap();
        let column = path_config.columns(internal1, joint).unwrap().start;
        assert!((lifted[column] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn switch_copy_init_seeds_from_the_preceding_slice() {
        let path_config = config();
        let joint = path_config.world().frame_id("joint").unwrap();
        let mut state = PathState::from_waypoints(&path_config, &[(joint, vec![(0, 0.25), (2, 0.75)])]).unwrap();
        let internal0 = path_config.to_internal(0).unwrap();
        let internal1 = path_config.to_internal(1).unwrap();
        let interpolated = state.get(&path_config, internal1, joint).unwrap()[0];

        // effective_from() == 1: the slice at signed index 1 gets seeded from
        // signed index 0's value, overwriting its own waypoint-interpolated one.
        let switch = Switch::new(joint, joint, 1, false, InitPolicy::Copy);
        state.apply_switch_init(&path_config, &switch).unwrap();

        let preceding = state.get(&path_config, internal0, joint).unwrap()[0];
        let seeded = state.get(&path_config, internal1, joint).unwrap()[0];
        assert!((seeded - preceding).abs() < 1e-12);
        assert!((seeded - interpolated).abs() > 1e-9, "copy should have overwritten the original waypoint-interpolated value");
    }

    #[test]
    fn switch_zero_init_leaves_the_state_untouched() {
        let path_config = config();
        let joint = path_config.world().frame_id("joint").unwrap();
        let mut state = PathState::from_waypoints(&path_config, &[(joint, vec![(0, 0.4), (2, 0.8)])]).unwrap();
        let before = state.values().clone();

        let switch = Switch::new(joint, joint, 1, false, InitPolicy::Zero);
        state.apply_switch_init(&path_config, &switch).unwrap();

        assert_eq!(state.values(), &before);
    }

    #[test]
    fn warm_start_shifts_by_one_slice() {
        let path_config = config();
        let joint = path_config.world().frame_id("joint").unwrap();
        let state = PathState::from_waypoints(&path_config, &[(joint, vec![(0, 0.0), (2, 2.0)])]).unwrap();
        let shifted = state.warm_start(&path_config).unwrap();

        let internal0 = path_config.to_internal(0).unwrap();
        let internal1 = path_config.to_internal(1).unwrap();
        let original_at_1 = state.get(&path_config, internal1, joint).unwrap()[0];
        let shifted_at_0 = shifted.get(&path_config, internal0, joint).unwrap()[0];
        assert!((original_at_1 - shifted_at_0).abs() < 1e-9);
    }
}
