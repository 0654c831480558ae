use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::infra::Vec2;
use crate::state::{Instruction, ItemId, ObstacleId, ResourceNodeId};

/// Discrete action slot. Raw codes outside `{0, 1, 2}` decode to `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ActionCode {
    #[default]
    None,
    Pick,
    Place,
}

impl ActionCode {
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => ActionCode::None,
            1 => ActionCode::Pick,
            2 => ActionCode::Place,
            other => {
                trace!("ignoring unknown action code {}", other);
                ActionCode::None
            }
        }
    }

    pub fn as_raw(&self) -> i32 {
        match self {
            ActionCode::None => 0,
            ActionCode::Pick => 1,
            ActionCode::Place => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Movement {
    /// Direction to steer in; normalized and scaled by speed and tick length.
    Intent(Vec2),
    /// Absolute next position produced by a path follower.
    Position(Vec2),
}

impl Default for Movement {
    fn default() -> Self {
        Movement::Intent(Vec2::ZERO)
    }
}

/// What an intent source asks the actor to do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Command {
    pub movement: Movement,
    pub action: ActionCode,
}

impl Command {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn steer(intent: Vec2, action: ActionCode) -> Self {
        Self {
            movement: Movement::Intent(intent),
            action,
        }
    }

    pub fn move_to(position: Vec2, action: ActionCode) -> Self {
        Self {
            movement: Movement::Position(position),
            action,
        }
    }
}

/// Collision/overlap tag as delivered by the physics layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollisionTag {
    Goal,
    ShelfTile,
    Wall,
    SortingArea,
    StackingArea,
    DeliveryArea,
    Unknown(String),
}

impl CollisionTag {
    pub fn zone(&self) -> Option<Instruction> {
        match self {
            CollisionTag::SortingArea => Some(Instruction::Sorting),
            CollisionTag::StackingArea => Some(Instruction::Stacking),
            CollisionTag::DeliveryArea => Some(Instruction::Delivery),
            _ => None,
        }
    }

    pub fn for_zone(instruction: Instruction) -> Self {
        match instruction {
            Instruction::Sorting => CollisionTag::SortingArea,
            Instruction::Stacking => CollisionTag::StackingArea,
            Instruction::Delivery => CollisionTag::DeliveryArea,
        }
    }
}

impl FromStr for CollisionTag {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Goal" => CollisionTag::Goal,
            "ShelfTile" => CollisionTag::ShelfTile,
            "Wall" => CollisionTag::Wall,
            "SortingArea" => CollisionTag::SortingArea,
            "StackingArea" => CollisionTag::StackingArea,
            "DeliveryArea" => CollisionTag::DeliveryArea,
            other => CollisionTag::Unknown(other.to_string()),
        })
    }
}

/// The other party of an overlap event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Item(ItemId),
    Node(ResourceNodeId),
    Obstacle(ObstacleId),
    Zone(Instruction),
    Unknown,
}

/// "This actor entered/overlaps that entity."
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollisionEvent {
    pub tag: CollisionTag,
    pub other: EntityRef,
}

impl CollisionEvent {
    pub fn new(tag: CollisionTag, other: EntityRef) -> Self {
        Self { tag, other }
    }

    pub fn goal(item: ItemId) -> Self {
        Self::new(CollisionTag::Goal, EntityRef::Item(item))
    }

    pub fn shelf(node: ResourceNodeId) -> Self {
        Self::new(CollisionTag::ShelfTile, EntityRef::Node(node))
    }

    pub fn wall(obstacle: ObstacleId) -> Self {
        Self::new(CollisionTag::Wall, EntityRef::Obstacle(obstacle))
    }

    pub fn zone(instruction: Instruction) -> Self {
        Self::new(
            CollisionTag::for_zone(instruction),
            EntityRef::Zone(instruction),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeOutcome {
    Delivered,
    WrongZone,
    Misplaced,
    HitWall,
    PrematureAccess,
    Timeout,
}

/// Reward and termination produced by one controller update.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickReport {
    pub reward: f32,
    pub outcome: Option<EpisodeOutcome>,
}

impl TickReport {
    pub fn reward(reward: f32) -> Self {
        Self {
            reward,
            outcome: None,
        }
    }

    pub fn terminal(reward: f32, outcome: EpisodeOutcome) -> Self {
        Self {
            reward,
            outcome: Some(outcome),
        }
    }

    pub fn merge(&mut self, other: TickReport) {
        self.reward += other.reward;
        if self.outcome.is_none() {
            self.outcome = other.outcome;
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_action_codes_are_none() {
        assert_eq!(ActionCode::from_raw(1), ActionCode::Pick);
        assert_eq!(ActionCode::from_raw(2), ActionCode::Place);
        assert_eq!(ActionCode::from_raw(-3), ActionCode::None);
        assert_eq!(ActionCode::from_raw(42), ActionCode::None);
    }

    #[test]
    fn tags_parse_from_strings() {
        assert_eq!("Wall".parse::<CollisionTag>().unwrap(), CollisionTag::Wall);
        assert_eq!(
            "Conveyor".parse::<CollisionTag>().unwrap(),
            CollisionTag::Unknown("Conveyor".into())
        );
        assert_eq!(
            CollisionTag::StackingArea.zone(),
            Some(Instruction::Stacking)
        );
    }

    #[test]
    fn merge_keeps_first_outcome() {
        let mut report = TickReport::reward(0.5);
        report.merge(TickReport::terminal(-1.0, EpisodeOutcome::WrongZone));
        report.merge(TickReport::terminal(-1.0, EpisodeOutcome::HitWall));
        assert_eq!(report.outcome, Some(EpisodeOutcome::WrongZone));
        assert!((report.reward + 1.5).abs() < 1e-6);
    }
}
