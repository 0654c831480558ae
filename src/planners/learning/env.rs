//! Gym-like environment around a single learning-driven actor.

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::encoder::{ObservationEncoder, ObservationLayout};
use super::policy::Decision;
use crate::controller::{
    ActorController, Command, ControllerSettings, EpisodeOutcome, RewardProfile,
};
use crate::infra::{Telemetry, Vec2};
use crate::planners::{DriverContext, IntentSource};
use crate::simulation::ProximityProbe;
use crate::state::{ActorId, Arena, Instruction};

/// Environment configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Simulated seconds per step
    pub dt: f64,
    /// Contact radius for overlap detection
    pub actor_radius: f32,
    /// Observation layout
    pub layout: ObservationLayout,
    /// Spawn point before jitter
    pub spawn: Vec2,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            dt: 0.02,
            actor_radius: 0.5,
            layout: ObservationLayout::Arena { obstacle_slots: 0 },
            spawn: Vec2::ZERO,
        }
    }
}

/// Step result from the environment
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Observation after the step (terminal state when `done`)
    pub observation: Vec<f32>,
    /// Reward earned this step
    pub reward: f32,
    /// Episode ended
    pub done: bool,
    /// Ended by the step limit rather than a task outcome
    pub truncated: bool,
    /// Additional info
    pub info: StepInfo,
}

/// Additional information from a step
#[derive(Debug, Clone, PartialEq)]
pub struct StepInfo {
    pub steps: u64,
    pub outcome: Option<EpisodeOutcome>,
    pub cumulative_reward: f32,
    pub carrying: bool,
    pub instruction: Instruction,
}

/// The controller needs an intent source; the environment feeds commands
/// directly, so this one is never asked.
struct ExternalControl;

impl IntentSource for ExternalControl {
    fn name(&self) -> &str {
        "external"
    }

    fn decide(&mut self, _ctx: &DriverContext<'_>, _rng: &mut StdRng) -> Command {
        Command::idle()
    }
}

pub struct WarehouseEnv {
    arena: Arena,
    controller: ActorController,
    encoder: ObservationEncoder,
    probe: ProximityProbe,
    rng: StdRng,
    config: EnvConfig,
    needs_reset: bool,
}

impl WarehouseEnv {
    pub fn new(
        arena: Arena,
        profile: RewardProfile,
        settings: ControllerSettings,
        config: EnvConfig,
        telemetry: Telemetry,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let controller = ActorController::new(
            ActorId(0),
            "agent",
            config.spawn,
            profile,
            Box::new(ExternalControl),
            telemetry,
            settings,
            &mut rng,
        );
        Self {
            arena,
            controller,
            encoder: ObservationEncoder::new(config.layout),
            probe: ProximityProbe::new(config.actor_radius),
            rng,
            config,
            needs_reset: true,
        }
    }

    pub fn observation_size(&self) -> usize {
        self.encoder.size()
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn controller(&self) -> &ActorController {
        &self.controller
    }

    /// Starts a new episode and returns its first observation.
    pub fn reset(&mut self) -> Vec<f32> {
        self.controller.begin_episode(&mut self.arena, &mut self.rng);
        self.probe.forget(self.controller.id());
        self.needs_reset = false;
        self.observation()
    }

    pub fn observation(&self) -> Vec<f32> {
        self.encoder.encode(self.controller.state(), &self.arena)
    }

    /// Applies one decision. A finished episode is closed before returning,
    /// so the caller must `reset` before the next step.
    pub fn step(&mut self, decision: Decision) -> StepResult {
        if self.needs_reset {
            warn!("step called on a finished episode, resetting first");
            self.reset();
        }
        let dt = self.config.dt;
        self.arena.advance(dt, &mut self.rng);

        let mut report =
            self.controller
                .apply_command(&mut self.arena, decision.to_command(), dt, &mut self.rng);
        if !self.controller.is_done() {
            let position = self.controller.state().position;
            for contact in self.probe.contacts(self.controller.id(), position, &self.arena) {
                report.merge(self.controller.on_collision(&contact, &mut self.arena, &mut self.rng));
            }
        }

        let observation = self.observation();
        let state = self.controller.state();
        let info = StepInfo {
            steps: state.episode_steps,
            outcome: report.outcome,
            cumulative_reward: state.cumulative_reward,
            carrying: state.carry.is_carrying(),
            instruction: state.task.instruction(),
        };

        let done = report.is_terminal();
        if done {
            self.controller.end_episode(&mut self.arena, &mut self.rng);
            self.needs_reset = true;
        }

        StepResult {
            observation,
            reward: report.reward,
            done,
            truncated: report.outcome == Some(EpisodeOutcome::Timeout),
            info,
        }
    }
}
