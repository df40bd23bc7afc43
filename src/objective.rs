//! A [`crate::feature::Feature`] paired with a time-interval mask and an
//! expansion rule (spec §4.2).

use crate::feature::{Feature, FeatureKind};

/// How a grounded feature's residual participates in the NLP.
///
/// Mirrors [`FeatureKind`] but is attached to the objective rather than the
/// feature, since the same feature (e.g. `positionDiff`) can be used both as
/// a cost and, wrapped differently, as a hard constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureType {
    Cost,
    Equality,
    Inequality,
}

impl From<FeatureKind> for FeatureType {
    fn from(kind: FeatureKind) -> Self {
        match kind {
            FeatureKind::Cost => FeatureType::Cost,
            FeatureKind::Equality => FeatureType::Equality,
            FeatureKind::Inequality => FeatureType::Inequality,
        }
    }
}

/// One row-generating declaration: a feature, how its residual is typed, and
/// the time window it is grounded against (spec §3's `times`/`stepDelta`).
pub struct Objective {
    pub name: String,
    pub feature: Box<dyn Feature>,
    pub feature_type: FeatureType,
    /// Inclusive phase-unit interval `[τ_from, τ_to]` (spec's `times`).
    /// `None` means "every valid tuple in the domain" (spec §4.2's tie-break
    /// for an empty `times`).
    pub times: Option<(f64, f64)>,
    /// Extra signed slice offset `(Δfrom, Δto)` applied to the two endpoints
    /// after the `times × stepsPerPhase` conversion (spec's `stepDelta`).
    pub step_delta: (i64, i64),
    /// When `Some(n)`, only every `n`-th candidate slice is grounded; `None`
    /// means every slice.
    pub stride: Option<usize>,
    /// Uniform multiplier applied to this objective's residual and Jacobian
    /// rows before they are written into the transcription (spec §4.6 step
    /// 3, "apply scale"). Targets are baked into the feature itself (e.g.
    /// [`crate::feature::PositionDiff::target`]) rather than carried here,
    /// since a target is frame-pair-specific while scale is a uniform weight.
    pub scale: f64,
}

impl Objective {
    /// `times` is `None` for "every valid tuple in the domain" or
    /// `Some((from, to))` as an inclusive phase-unit interval; pass raw slice
    /// numbers here with [`crate::config::EngineConfig::steps_per_phase`] set
    /// to `1` to address slices directly.
    pub fn new(name: impl Into<String>, feature: Box<dyn Feature>, times: impl Into<Option<(f64, f64)>>) -> Self {
        let feature_type = feature.kind().into();
        Objective {
            name: name.into(),
            feature,
            feature_type,
            times: times.into(),
            step_delta: (0, 0),
            stride: None,
            scale: 1.0,
        }
    }

    pub fn with_type(mut self, feature_type: FeatureType) -> Self {
        self.feature_type = feature_type;
        self
    }

    pub fn with_step_delta(mut self, step_delta: (i64, i64)) -> Self {
        self.step_delta = step_delta;
        self
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = Some(stride);
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Resolves `times` into the signed slice interval `[t0, t1]` this
    /// objective is grounded against (spec §4.2 step 1): convert phase units
    /// to slices via `steps_per_phase`, extend by `step_delta`, then clamp to
    /// the path's domain `[-k_order, t - 1]`.
    pub fn slice_interval(&self, steps_per_phase: usize, k_order: usize, t: usize) -> (i64, i64) {
        let lower = -(k_order as i64);
        let upper = t as i64 - 1;
        let (t0, t1) = match self.times {
            Some((from, to)) => (
                (from * steps_per_phase as f64).round() as i64,
                (to * steps_per_phase as f64).round() as i64,
            ),
            None => (lower, upper),
        };
        let t0 = (t0 + self.step_delta.0).clamp(lower, upper);
        let t1 = (t1 + self.step_delta.1).clamp(lower, upper);
        (t0, t1)
    }

    /// Candidate end-of-window slices for a feature of tuple length `order`,
    /// honoring `stride` (spec §4.2 step 2: `t ∈ [t0+o, t1]` where `o = order
    /// - 1`, except the tie-break for a single-instant window, which anchors
    /// the tuple at that instant regardless of `order`).
    pub fn candidate_slices(&self, steps_per_phase: usize, k_order: usize, t: usize, order: usize) -> Vec<i64> {
        let (t0, t1) = self.slice_interval(steps_per_phase, k_order, t);
        if t0 > t1 {
            return Vec::new();
        }
        if t0 == t1 {
            return vec![t1];
        }
        let o = order.saturating_sub(1) as i64;
        let start = t0 + o;
        if start > t1 {
            return Vec::new();
        }
        let step = self.stride.unwrap_or(1).max(1) as i64;
        (start..=t1).step_by(step as usize).collect()
    }
}
