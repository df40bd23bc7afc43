//! Error types used throughout this crate.
//!
//! Mirrors the propagation policy of spec §7: setup errors are returned
//! synchronously to the caller before optimization starts; evaluation
//! errors never escape a single [`crate::transcription::Transcription::evaluate`]
//! call, they are folded into the summary statistics instead.

use thiserror::Error;

/// Errors raised while assembling a [`crate::world::World`], applying a
/// [`crate::switch::Switch`], or grounding [`crate::objective::Objective`]s.
///
/// All variants here are *setup-invalid* in the vocabulary of spec §7: they
/// are detected at add-time, before any decision vector exists.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("frame `{0}` is not known to this world")]
    UnknownFrame(String),

    #[error("frame name `{0}` is already in use")]
    DuplicateFrame(String),

    #[error("re-parenting frame `{frame}` under `{reference}` would introduce a cycle")]
    ParentCycle { frame: String, reference: String },

    #[error("slice index {0} is out of the path's domain [-{1}, {2}]")]
    SliceOutOfRange(i64, usize, i64),

    #[error("objective slice tuple is not strictly increasing: {0:?}")]
    NonMonotonicTuple(Vec<i64>),

    #[error("k_order {k_order} is smaller than objective order {order}")]
    KOrderTooSmall { k_order: usize, order: usize },

    #[error("feature `{feature}` declared dimension {expected} but returned {actual}")]
    DimensionMismatch {
        feature: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("unsupported joint reconfiguration on frame `{0}`: dimension changed, PathState must be rebuilt")]
    LayoutStale(String),
}

/// Result alias used by fallible setup-time operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Numeric degeneracies encountered *during* evaluation (spec §4.8, §7). These
/// are never fatal: the offending residual/Jacobian entry is replaced with
/// zero and the occurrence is logged via [`crate::telemetry`] and counted in
/// the evaluation report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DegeneracyCounter {
    pub non_finite_residuals: usize,
    pub non_finite_jacobian_entries: usize,
    pub collision_backend_failures: usize,
}

impl DegeneracyCounter {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}
