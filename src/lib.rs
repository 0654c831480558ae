pub mod config;
pub mod controller;
pub mod error;
pub mod infra;
pub mod metrics;
pub mod planners;
pub mod simulation;
pub mod state;

// Re-export commonly used types for convenience
pub use config::SimConfig;
pub use controller::{ActorController, EpisodeOutcome, RewardPreset, RewardProfile};
pub use error::{ConfigError, GraphError, SimError};
pub use infra::{Bounds, NavGraph, Vec2};
pub use simulation::{RunLimits, RunSummary, Simulation};
pub use state::{Arena, Instruction};
