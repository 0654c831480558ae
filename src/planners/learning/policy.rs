use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::encoder::ObservationEncoder;
use crate::controller::{ActionCode, Command, EpisodeOutcome};
use crate::infra::Vec2;
use crate::planners::{DriverContext, IntentSource};
use crate::state::{ActorState, Arena};

/// One step of output from an external policy.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Decision {
    /// Continuous steering, normalized by the controller.
    pub movement: [f32; 2],
    /// Raw discrete action; anything outside `{0, 1, 2}` is a no-op.
    pub action: i32,
}

impl Decision {
    pub fn new(x: f32, y: f32, action: i32) -> Self {
        Self {
            movement: [x, y],
            action,
        }
    }

    pub fn to_command(&self) -> Command {
        Command::steer(
            Vec2::new(self.movement[0], self.movement[1]),
            ActionCode::from_raw(self.action),
        )
    }
}

/// Trained model, remote trainer or scripted stand-in.
pub trait DecisionSource: Send {
    fn on_episode_begin(&mut self) {}

    fn decide(&mut self, observation: &[f32]) -> Decision;

    fn on_episode_end(&mut self, outcome: EpisodeOutcome, cumulative_reward: f32) {
        let _ = (outcome, cumulative_reward);
    }
}

/// Uniform random steering with occasional pick/place. Used for demo runs.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    rng: StdRng,
    action_probability: f64,
}

impl RandomPolicy {
    pub fn new(seed: u64, action_probability: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            action_probability: action_probability.clamp(0.0, 1.0),
        }
    }
}

impl DecisionSource for RandomPolicy {
    fn decide(&mut self, _observation: &[f32]) -> Decision {
        let x = self.rng.random_range(-1.0..=1.0);
        let y = self.rng.random_range(-1.0..=1.0);
        let action = if self.rng.random_bool(self.action_probability) {
            self.rng.random_range(1..=2)
        } else {
            0
        };
        Decision::new(x, y, action)
    }
}

/// Intent source that forwards observations to a `DecisionSource`.
pub struct LearningDriver {
    encoder: ObservationEncoder,
    source: Box<dyn DecisionSource>,
    last_observation: Vec<f32>,
}

impl LearningDriver {
    pub fn new(encoder: ObservationEncoder, source: Box<dyn DecisionSource>) -> Self {
        Self {
            encoder,
            source,
            last_observation: Vec::new(),
        }
    }

    pub fn encoder(&self) -> &ObservationEncoder {
        &self.encoder
    }

    pub fn last_observation(&self) -> &[f32] {
        &self.last_observation
    }
}

impl IntentSource for LearningDriver {
    fn name(&self) -> &str {
        "learning"
    }

    fn on_episode_begin(&mut self, _state: &ActorState, _arena: &Arena, _rng: &mut StdRng) {
        self.last_observation.clear();
        self.source.on_episode_begin();
    }

    fn decide(&mut self, ctx: &DriverContext<'_>, _rng: &mut StdRng) -> Command {
        self.last_observation = self.encoder.encode(ctx.state, ctx.arena);
        let decision = self.source.decide(&self.last_observation);
        decision.to_command()
    }

    fn on_episode_end(&mut self, outcome: EpisodeOutcome, cumulative_reward: f32) {
        debug!(
            "decision source notified: {:?} ({:.4})",
            outcome, cumulative_reward
        );
        self.source.on_episode_end(outcome, cumulative_reward);
    }
}
