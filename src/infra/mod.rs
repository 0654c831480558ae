mod collector;
mod nav_graph;
mod scheduler;
mod telemetry;
mod types;

pub use collector::TelemetryCollector;
pub use nav_graph::{NavGraph, NavNode, NavWalker, NodeId};
pub use scheduler::{Scheduler, SimTime};
pub use telemetry::{
    ChannelSink, CompositeSink, RecordingSink, Telemetry, TelemetryEvent, TelemetrySink,
    TracingSink,
};
pub use types::{Bounds, Facing, Vec2};
