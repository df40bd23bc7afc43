//! `tracing`-based instrumentation. The engine never opens a file or owns a
//! subscriber; it only emits spans/events. A caller who wants a persisted
//! run log attaches their own `tracing_subscriber` layer.

use std::time::Duration;
use tracing::{info, info_span, Span};

/// Per-iteration summary a caller's solver loop can emit through this crate's
/// tracing target (`ktraj::run`) to get a uniform record across runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunLog {
    pub iteration: usize,
    pub cost: f64,
    pub max_equality_violation: f64,
    pub max_inequality_violation: f64,
    pub time_kinematics: Duration,
    pub time_collisions: Duration,
    pub time_features: Duration,
    pub time_newton: Duration,
}

impl RunLog {
    /// Emits this record as a structured `tracing` event at `info` level.
    pub fn emit(&self) {
        info!(
            target: "ktraj::run",
            iteration = self.iteration,
            cost = self.cost,
            max_eq_violation = self.max_equality_violation,
            max_ineq_violation = self.max_inequality_violation,
            time_kinematics_us = self.time_kinematics.as_micros() as u64,
            time_collisions_us = self.time_collisions.as_micros() as u64,
            time_features_us = self.time_features.as_micros() as u64,
            time_newton_us = self.time_newton.as_micros() as u64,
            "iteration complete"
        );
    }
}

/// Span entered while refreshing forward kinematics for one evaluation.
pub fn kinematics_span(slices: usize) -> Span {
    info_span!("kinematics", slices)
}

/// Span entered while refreshing collision proxies for one evaluation.
pub fn collision_span(pairs: usize) -> Span {
    info_span!("collisions", pairs)
}

/// Span entered while evaluating grounded features into residuals/Jacobians.
pub fn feature_span(grounded: usize) -> Span {
    info_span!("features", grounded)
}

/// Logs a numeric degeneracy (non-finite residual/Jacobian entry, or a
/// collision backend failure) at `warn` level. Called from
/// [`crate::transcription::Transcription::evaluate`]; never fatal.
pub fn log_degeneracy(context: &str, objective: &str) {
    tracing::warn!(target: "ktraj::degeneracy", context, objective, "numeric degeneracy replaced with zero");
}
