use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::controller::{ActionCode, EpisodeOutcome};
use crate::infra::{Facing, Vec2};
use crate::state::{CarryState, TaskAssignment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorPhase {
    Seeking,
    Carrying,
}

/// Accumulators behind the periodic penalties.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PenaltyTimers {
    pub hold: f64,
    pub stationary: f64,
}

#[derive(Debug, Clone)]
pub struct ActorState {
    pub id: ActorId,
    pub name: String,
    pub position: Vec2,
    pub spawn: Vec2,
    pub facing: Facing,
    /// Last steering intent received, normalized.
    pub intent: Vec2,
    /// Last action code received.
    pub action: ActionCode,
    pub carry: CarryState,
    pub task: TaskAssignment,
    pub cumulative_reward: f32,
    pub episode_steps: u64,
    pub timers: PenaltyTimers,
    pub last_position: Vec2,
    /// Displacement per second over the last tick.
    pub velocity: Vec2,
    /// Set once the current episode has ended; cleared on reset.
    pub outcome: Option<EpisodeOutcome>,
}

impl ActorState {
    pub fn new<R: Rng + ?Sized>(id: ActorId, name: impl Into<String>, spawn: Vec2, rng: &mut R) -> Self {
        Self {
            id,
            name: name.into(),
            position: spawn,
            spawn,
            facing: Facing::default(),
            intent: Vec2::ZERO,
            action: ActionCode::None,
            carry: CarryState::new(),
            task: TaskAssignment::new(rng),
            cumulative_reward: 0.0,
            episode_steps: 0,
            timers: PenaltyTimers::default(),
            last_position: spawn,
            velocity: Vec2::ZERO,
            outcome: None,
        }
    }

    pub fn phase(&self) -> ActorPhase {
        if self.carry.is_carrying() {
            ActorPhase::Carrying
        } else {
            ActorPhase::Seeking
        }
    }

    pub fn is_done(&self) -> bool {
        self.outcome.is_some()
    }

    /// Clears every per-episode field and places the actor at `position`.
    /// The caller is responsible for handing any held item back first.
    pub fn reset<R: Rng + ?Sized>(&mut self, position: Vec2, rng: &mut R) {
        self.position = position;
        self.last_position = position;
        self.velocity = Vec2::ZERO;
        self.intent = Vec2::ZERO;
        self.action = ActionCode::None;
        self.facing = Facing::default();
        self.carry = CarryState::new();
        self.task.reroll(rng);
        self.cumulative_reward = 0.0;
        self.episode_steps = 0;
        self.timers = PenaltyTimers::default();
        self.outcome = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ItemId;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn reset_clears_episode_fields() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = ActorState::new(ActorId(0), "agent", Vec2::ZERO, &mut rng);
        state.carry.pick(ItemId(0));
        state.cumulative_reward = 3.5;
        state.episode_steps = 40;
        state.timers.hold = 4.0;
        state.outcome = Some(EpisodeOutcome::HitWall);
        assert_eq!(state.phase(), ActorPhase::Carrying);

        state.reset(Vec2::new(1.0, 2.0), &mut rng);
        assert_eq!(state.phase(), ActorPhase::Seeking);
        assert_eq!(state.cumulative_reward, 0.0);
        assert_eq!(state.episode_steps, 0);
        assert_eq!(state.timers, PenaltyTimers::default());
        assert_eq!(state.position, Vec2::new(1.0, 2.0));
        assert!(!state.is_done());
    }
}
