//! Intent sources: the pluggable "brains" behind an `ActorController`.
//!
//! Every actor kind produces the same thing each tick, a [`Command`] holding
//! a movement request and an action code. The controller does the rest.

pub mod learning;
pub mod player;
pub mod scripted;

use rand::rngs::StdRng;

use crate::controller::{Command, EpisodeOutcome};
use crate::infra::Vec2;
use crate::state::{ActorState, Arena};

pub use learning::{
    Decision, DecisionSource, LearningDriver, ObservationEncoder, ObservationLayout, RandomPolicy,
    StepResult, WarehouseEnv,
};
pub use player::{InputFrame, InputPoller, PlayerDriver, QueuedInput, SharedInput};
pub use scripted::{RouteMode, ScriptedDriver};

/// Read-only view handed to an intent source once per tick.
pub struct DriverContext<'a> {
    pub state: &'a ActorState,
    pub arena: &'a Arena,
    pub dt: f32,
    pub speed: f32,
}

pub trait IntentSource: Send {
    fn name(&self) -> &str;

    /// Overrides the configured spawn point (before jitter). Scripted walkers
    /// start on their graph node.
    fn spawn_point(&self, arena: &Arena) -> Option<Vec2> {
        let _ = arena;
        None
    }

    fn on_episode_begin(&mut self, state: &ActorState, arena: &Arena, rng: &mut StdRng) {
        let _ = (state, arena, rng);
    }

    fn decide(&mut self, ctx: &DriverContext<'_>, rng: &mut StdRng) -> Command;

    fn on_episode_end(&mut self, outcome: EpisodeOutcome, cumulative_reward: f32) {
        let _ = (outcome, cumulative_reward);
    }
}
