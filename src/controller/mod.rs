mod actor_controller;
mod events;
pub mod reward;

pub use actor_controller::{ActorController, ControllerSettings};
pub use events::{
    ActionCode, CollisionEvent, CollisionTag, Command, EntityRef, EpisodeOutcome, Movement,
    TickReport,
};
pub use reward::{
    DEFAULT_STEP_BUDGET, MisplaceRule, PrematureAccess, RewardBreakdown, RewardEvent,
    RewardPreset, RewardProfile, RewardShaper, ShapingInput, shape_tick, terminal_reward,
};
