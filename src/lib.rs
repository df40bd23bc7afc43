//! ## About
//!
//! This crate transcribes a k-order Markov trajectory optimization problem —
//! a sequence of kinematic configurations linked by differentiable
//! objectives — into the residual/Jacobian contract an NLP solver expects.
//!
//! It owns the kinematic graph (a [`World`] of frames connected by joints),
//! the time-sliced [`PathConfig`] built from it, the grounding of
//! [`Objective`]s into concrete [`GroundedObjective`]s over that graph, and
//! the [`Transcription`] views (sparse-flat, factored, dense) that expose the
//! grounded problem to a caller-supplied solver.
//!
//! The kinematic evaluator and collision backend are consumed through traits
//! ([`KinematicModel`], [`CollisionBackend`]); this crate ships reference
//! implementations of both so the engine is runnable standalone.
//!
//! ## Naming conventions
//! * Traits – adjectives or capability nouns (`Nodelike`, `KinematicModel`).
//! * Structs – substantives naming the entity they represent.
//! * Methods – imperative verbs, except getters/factories which use bare
//!   substantives (no `get_` prefix), matching the standard library.

pub mod arena;
pub mod collision;
pub mod config;
pub mod engine;
pub mod errors;
pub mod feature;
pub mod grounder;
pub mod kinematics;
pub mod objective;
pub mod path_config;
pub mod path_state;
pub mod switch;
pub mod telemetry;
pub mod transcription;
pub mod world;

pub use arena::{ArenaIndex, ArenaNode, DirectedArenaTree, Nodelike};
pub use collision::{CollisionBackend, ProxyPair};
pub use config::EngineConfig;
pub use engine::Engine;
pub use errors::{DegeneracyCounter, EngineError, EngineResult};
pub use feature::{Feature, FeatureKind};
pub use grounder::{GroundedObjective, Grounder};
pub use kinematics::{FrameState, KinematicModel};
pub use objective::{FeatureType, Objective};
pub use path_config::{FrameId, JointKind, PathConfig};
pub use path_state::{PathState, SplineBasis};
pub use switch::{InitPolicy, Switch};
pub use transcription::Transcription;
pub use world::World;
