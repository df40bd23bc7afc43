//! Declarative configuration a caller assembles before calling
//! [`crate::engine::Engine::run_prepare`].

/// Top-level knobs for one transcription run.
///
/// Mirrors the handful of globals a KOMO-style problem is parameterized by:
/// how many slices make up one phase, the nominal time step between slices,
/// the Markov order, and whether collision objectives are grounded at all.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Number of path slices per phase (a "phase" groups slices that share a
    /// mode; switches occur at phase boundaries in the common case).
    pub steps_per_phase: usize,
    /// Nominal time between two consecutive slices, in seconds.
    pub tau: f64,
    /// Markov order `k`: how many preceding slices a `controlCost`-style
    /// feature may read.
    pub k_order: usize,
    /// Whether collision objectives are grounded. Disabling this skips both
    /// grounding `accumulatedCollisions`/`pairCollision` and refreshing the
    /// collision backend during evaluation.
    pub compute_collisions: bool,
    /// Amplitude of the uniform noise added by [`crate::path_state::PathState::with_noise`].
    pub noise_amplitude: f64,
    /// Absolute tolerance below which a residual/Jacobian entry is treated as
    /// exactly zero when packing sparse triplets.
    pub sparsity_tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            steps_per_phase: 20,
            tau: 0.1,
            k_order: 2,
            compute_collisions: true,
            noise_amplitude: 0.01,
            sparsity_tolerance: 1e-12,
        }
    }
}

impl EngineConfig {
    pub fn new(k_order: usize) -> Self {
        EngineConfig {
            k_order,
            ..Default::default()
        }
    }

    pub fn with_tau(mut self, tau: f64) -> Self {
        self.tau = tau;
        self
    }

    pub fn with_steps_per_phase(mut self, steps: usize) -> Self {
        self.steps_per_phase = steps;
        self
    }

    pub fn without_collisions(mut self) -> Self {
        self.compute_collisions = false;
        self
    }

    pub fn with_noise_amplitude(mut self, amplitude: f64) -> Self {
        self.noise_amplitude = amplitude;
        self
    }
}
