//! Learning-driven actors.
//!
//! ```text
//! ActorState + Arena
//!     │
//!     ▼
//! ObservationEncoder ──► DecisionSource (model / trainer / RandomPolicy)
//!                               │
//!                               ▼
//!                        Decision { movement, action }
//!                               │
//!                               ▼
//!                        ActorController
//! ```
//!
//! `LearningDriver` plugs a decision source into the shared simulation,
//! `WarehouseEnv` exposes the same actor through `reset`/`step` for training.

pub mod encoder;
pub mod env;
pub mod policy;

pub use encoder::{ObservationEncoder, ObservationLayout};
pub use env::{EnvConfig, StepInfo, StepResult, WarehouseEnv};
pub use policy::{Decision, DecisionSource, LearningDriver, RandomPolicy};
