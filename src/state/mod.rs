mod actor_state;
mod arena;
mod carry;
mod resource_node;
mod task;

pub use actor_state::{ActorId, ActorPhase, ActorState, PenaltyTimers};
pub use arena::{
    Arena, ArenaEvent, Collect, Item, ItemKind, Obstacle, ObstacleId, Owner, WallToggle, Zone,
};
pub use carry::{CarryState, ItemId};
pub use resource_node::{ResourceNode, ResourceNodeId};
pub use task::{Instruction, TaskAssignment};
