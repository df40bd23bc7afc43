//! Top-level entry point: assembles a [`World`], applies [`Switch`]es to a
//! [`PathConfig`], collects [`Objective`]s, and grounds the whole thing into
//! a [`Transcription`] via [`Engine::run_prepare`].

use crate::config::EngineConfig;
use crate::errors::EngineResult;
use crate::feature::{Feature, PoseRel};
use crate::objective::{FeatureType, Objective};
use crate::switch::Switch;
use crate::transcription::Transcription;
use crate::world::World;
use tracing_attributes::instrument;

/// Builder/owner of one transcription run's setup-time state. Consumed by
/// [`Engine::run_prepare`], which grounds everything into a [`Transcription`].
pub struct Engine {
    world: World,
    config: EngineConfig,
    objectives: Vec<Objective>,
    switches: Vec<Switch>,
}

impl Engine {
    pub fn new(world: World, config: EngineConfig) -> Self {
        Engine {
            world,
            config,
            objectives: Vec::new(),
            switches: Vec::new(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn add_objective(&mut self, objective: Objective) {
        self.objectives.push(objective);
    }

    /// Registers a mode switch. Per spec §4.3's mode-switch composition, this
    /// also auto-generates an equality objective asserting that `frame`'s
    /// pose relative to its *new* parent stays constant at every slice from
    /// the switch's effective slice through the end of the path (spec §9
    /// "Switch" scenario: "relative pose ... identical for all slices
    /// `t ≥ s`"). The objective's upper bound isn't known until
    /// [`Engine::run_prepare`] fixes `T`, so it is materialized there instead
    /// of here.
    pub fn add_switch(&mut self, switch: Switch) {
        self.switches.push(switch);
    }

    /// Grounds every objective over `t` free slices (plus the configured
    /// `k_order`-deep prefix) and returns the resulting [`Transcription`].
    #[instrument(level = "debug", skip(self), fields(objectives = self.objectives.len(), switches = self.switches.len()))]
    pub fn run_prepare(self, t: usize) -> EngineResult<Transcription> {
        let mut path_config = crate::path_config::PathConfig::new(self.world, t, self.config.k_order);
        for switch in &self.switches {
            path_config.apply_switch(switch)?;
        }
        let mut objectives = self.objectives;
        let k_order = self.config.k_order as i64;
        for switch in &self.switches {
            let at = switch.effective_from();
            // `times: None` resolves to the full domain `[-k_order, t-1]`
            // regardless of `steps_per_phase`; `step_delta` then shifts its
            // lower end up to `at`, giving the literal slice range
            // `[at, t-1]` this auto-generated objective needs, independent
            // of how the caller's other objectives address time.
            let consistency = Objective::new(
                format!("switch-consistency[{:?}@{at}]", switch.frame),
                Box::new(PoseRel::between(switch.frame, switch.new_parent)) as Box<dyn Feature>,
                None::<(f64, f64)>,
            )
            .with_step_delta((at + k_order, 0))
            .with_type(FeatureType::Equality);
            objectives.push(consistency);
        }
        Transcription::with_switches(path_config, objectives, self.config, self.switches)
    }
}
