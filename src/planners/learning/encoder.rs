//! Observation encoder - turns an actor's view of the arena into a flat
//! feature vector with a fixed layout.

use serde::{Deserialize, Serialize};

use crate::infra::Vec2;
use crate::state::{ActorState, Arena, Instruction};

/// Positions are divided by this in the arena layout.
const POSITION_SCALE: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum ObservationLayout {
    /// Own position, target, the three zones, carry flag, then a fixed number
    /// of obstacle slots.
    Arena { obstacle_slots: usize },
    /// Own position, velocity, carry flag and a one-hot instruction.
    #[default]
    Compact,
}

#[derive(Debug, Clone)]
pub struct ObservationEncoder {
    layout: ObservationLayout,
}

impl ObservationEncoder {
    pub fn new(layout: ObservationLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> ObservationLayout {
        self.layout
    }

    pub fn size(&self) -> usize {
        match self.layout {
            // own (2), target (2), zones (3 * 2), carrying (1)
            // obstacle: position (2), scale (2), rotation (1)
            ObservationLayout::Arena { obstacle_slots } => 11 + 5 * obstacle_slots,
            // position (2), velocity (2), carrying (1), instruction (3)
            ObservationLayout::Compact => 8,
        }
    }

    pub fn encode(&self, state: &ActorState, arena: &Arena) -> Vec<f32> {
        let mut obs = Vec::with_capacity(self.size());
        match self.layout {
            ObservationLayout::Arena { obstacle_slots } => {
                self.encode_arena(&mut obs, state, arena, obstacle_slots)
            }
            ObservationLayout::Compact => self.encode_compact(&mut obs, state),
        }
        debug_assert_eq!(obs.len(), self.size());
        obs
    }

    fn encode_arena(
        &self,
        obs: &mut Vec<f32>,
        state: &ActorState,
        arena: &Arena,
        obstacle_slots: usize,
    ) {
        push_scaled(obs, state.position);

        let target = arena
            .primary_goal_position()
            .or_else(|| arena.nearest_ready_node(state.position).map(|n| n.position))
            .unwrap_or(Vec2::ZERO);
        push_scaled(obs, target);

        for instruction in [
            Instruction::Sorting,
            Instruction::Stacking,
            Instruction::Delivery,
        ] {
            let zone = arena
                .zone(instruction)
                .map(|z| z.position)
                .unwrap_or(Vec2::ZERO);
            push_scaled(obs, zone);
        }

        obs.push(flag(state.carry.is_carrying()));

        // Missing obstacles are zero-padded, extras are dropped
        let mut written = 0;
        for obstacle in arena.obstacles().iter().take(obstacle_slots) {
            push_scaled(obs, obstacle.position);
            push_scaled(obs, obstacle.scale);
            obs.push(obstacle.rotation_deg / 360.0);
            written += 1;
        }
        for _ in written..obstacle_slots {
            obs.extend_from_slice(&[0.0; 5]);
        }
    }

    fn encode_compact(&self, obs: &mut Vec<f32>, state: &ActorState) {
        obs.push(state.position.x);
        obs.push(state.position.y);
        obs.push(state.velocity.x);
        obs.push(state.velocity.y);
        obs.push(flag(state.carry.is_carrying()));

        let instruction = state.task.instruction();
        obs.push(flag(instruction == Instruction::Stacking));
        obs.push(flag(instruction == Instruction::Sorting));
        obs.push(flag(instruction == Instruction::Delivery));
    }
}

fn push_scaled(obs: &mut Vec<f32>, v: Vec2) {
    obs.push(v.x / POSITION_SCALE);
    obs.push(v.y / POSITION_SCALE);
}

fn flag(value: bool) -> f32 {
    if value { 1.0 } else { 0.0 }
}
