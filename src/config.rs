//! Configuration loading.
//!
//! A run is described by a TOML file (see `warehouse.toml`). Every section
//! has defaults, so an empty file yields the demo warehouse. A few values can
//! be overridden from the environment (and a `.env` file).

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::controller::{
    ActorController, ControllerSettings, DEFAULT_STEP_BUDGET, RewardPreset, RewardProfile,
};
use crate::error::{ConfigError, GraphError, SimError};
use crate::infra::{Bounds, NavGraph, NodeId, Telemetry, TelemetrySink, Vec2};
use crate::planners::{
    IntentSource, InputFrame, LearningDriver, ObservationEncoder, ObservationLayout, PlayerDriver,
    QueuedInput, RandomPolicy, RouteMode, ScriptedDriver,
};
use crate::simulation::{HarnessSettings, SimObserver, Simulation};
use crate::state::{ActorId, Arena, Instruction, WallToggle};

pub const ENV_SEED: &str = "WAREHOUSE_SEED";
pub const ENV_EPISODES: &str = "WAREHOUSE_EPISODES";
pub const ENV_TELEMETRY_DIR: &str = "WAREHOUSE_TELEMETRY_DIR";

/// Complete run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Clock, seed and stop conditions
    #[serde(default)]
    pub simulation: RunConfig,
    /// Reward normalization and penalty intervals
    #[serde(default)]
    pub rewards: RewardConfig,
    /// Zones, goal items and fixed walls
    #[serde(default)]
    pub arena: ArenaConfig,
    /// Shelf tiles and their regeneration window
    #[serde(default)]
    pub shelves: ShelfConfig,
    /// Walls that appear on a timer
    #[serde(default)]
    pub walls: ToggleWallConfig,
    /// Waypoint graph for scripted actors
    #[serde(default)]
    pub nav_graph: NavGraphConfig,
    /// Telemetry output
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default = "default_actors")]
    pub actors: Vec<ActorConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            simulation: RunConfig::default(),
            rewards: RewardConfig::default(),
            arena: ArenaConfig::default(),
            shelves: ShelfConfig::default(),
            walls: ToggleWallConfig::default(),
            nav_graph: NavGraphConfig::default(),
            telemetry: TelemetryConfig::default(),
            actors: default_actors(),
        }
    }
}

impl SimConfig {
    /// Loads and validates configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `WAREHOUSE_*` environment overrides. Unparseable values are
    /// reported and ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(seed) = env_parse::<u64>(ENV_SEED) {
            self.simulation.seed = seed;
        }
        if let Some(episodes) = env_parse::<u64>(ENV_EPISODES) {
            self.simulation.episodes = Some(episodes);
        }
        if let Ok(dir) = env::var(ENV_TELEMETRY_DIR) {
            self.telemetry.dir = Some(PathBuf::from(dir));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.simulation.dt > 0.0) {
            return Err(ConfigError::invalid("simulation.dt", "must be positive"));
        }
        if !(self.simulation.actor_radius >= 0.0) {
            return Err(ConfigError::invalid(
                "simulation.actor_radius",
                "must be non-negative",
            ));
        }
        if self.rewards.step_budget == 0 {
            return Err(ConfigError::invalid("rewards.step_budget", "must be nonzero"));
        }
        if !(self.rewards.hold_interval > 0.0) {
            return Err(ConfigError::invalid("rewards.hold_interval", "must be positive"));
        }
        if !(self.rewards.stationary_interval > 0.0) {
            return Err(ConfigError::invalid(
                "rewards.stationary_interval",
                "must be positive",
            ));
        }
        if !(self.shelves.min_regen_delay >= 0.0) {
            return Err(ConfigError::invalid(
                "shelves.min_regen_delay",
                "must be non-negative",
            ));
        }
        if !(self.shelves.max_regen_delay >= self.shelves.min_regen_delay) {
            return Err(ConfigError::invalid(
                "shelves.max_regen_delay",
                format!(
                    "must be >= min_regen_delay ({}), got {}",
                    self.shelves.min_regen_delay, self.shelves.max_regen_delay
                ),
            ));
        }
        if !self.arena.obstacle_bounds.is_valid() {
            return Err(ConfigError::invalid("arena.obstacle_bounds", "min exceeds max"));
        }
        if !self.arena.goal_respawn.is_valid() {
            return Err(ConfigError::invalid("arena.goal_respawn", "min exceeds max"));
        }
        if self.arena.zones.iter().any(|z| !(z.radius > 0.0)) {
            return Err(ConfigError::invalid("arena.zones.radius", "must be positive"));
        }
        if self.actors.is_empty() {
            return Err(ConfigError::invalid("actors", "at least one actor is required"));
        }
        for actor in &self.actors {
            if !(actor.controller.speed > 0.0) {
                return Err(ConfigError::invalid(
                    "actors.speed",
                    format!("{} must have a positive speed", actor.name),
                ));
            }
        }
        Ok(())
    }

    /// Reward profile for one actor, with configured intervals applied.
    pub fn profile_for(&self, actor: &ActorConfig) -> RewardProfile {
        let mut profile = actor.preset().profile(self.rewards.step_budget);
        if let Some(hold) = profile.hold.as_mut() {
            hold.interval = self.rewards.hold_interval;
        }
        if let Some(stationary) = profile.stationary.as_mut() {
            stationary.interval = self.rewards.stationary_interval;
        }
        profile
    }

    pub fn build_arena(&self, rng: &mut StdRng) -> Result<Arena, SimError> {
        let mut arena = Arena::new(self.arena.held_offset, self.arena.obstacle_bounds);

        for zone in &self.arena.zones {
            arena.add_zone(zone.instruction, zone.position, zone.radius);
        }
        for goal in &self.arena.goals {
            arena.add_goal_item(*goal, self.arena.goal_respawn);
        }
        for wall in &self.arena.obstacles {
            arena.add_obstacle(wall.position, wall.scale, wall.rotation_deg, wall.radius);
        }
        for shelf in &self.shelves.positions {
            arena.add_resource_node(
                *shelf,
                self.shelves.min_regen_delay,
                self.shelves.max_regen_delay,
                self.shelves.start_ready,
                rng,
            )?;
        }
        let toggle = WallToggle {
            min_hidden: self.walls.min_hidden,
            max_hidden: self.walls.max_hidden,
            visible_time: self.walls.visible_time,
        };
        for position in &self.walls.positions {
            arena.add_toggle_wall(*position, self.walls.scale, self.walls.radius, toggle, rng)?;
        }
        if !self.nav_graph.nodes.is_empty() {
            arena.set_nav_graph(Arc::new(self.nav_graph.build()?));
        }
        Ok(arena)
    }

    /// Builds every configured actor. Each controller receives its own
    /// telemetry handle; a missing sink is reported once per actor.
    pub fn build_actors(
        &self,
        arena: &Arena,
        sink: Option<Arc<dyn TelemetrySink>>,
        rng: &mut StdRng,
    ) -> Result<Vec<ActorController>, SimError> {
        let mut actors = Vec::with_capacity(self.actors.len());
        for (index, actor) in self.actors.iter().enumerate() {
            let driver = actor.build_driver(arena, self.simulation.seed.wrapping_add(index as u64))?;
            let telemetry = Telemetry::from_option(sink.clone(), &actor.name);
            let controller = ActorController::new(
                ActorId(index),
                actor.name.clone(),
                actor.spawn,
                self.profile_for(actor),
                driver,
                telemetry,
                actor.controller,
                rng,
            );
            info!(
                "Actor {} uses {:?} rewards with {} driver",
                actor.name,
                actor.preset(),
                controller.driver_name()
            );
            actors.push(controller);
        }

        let scattering = actors
            .iter()
            .filter(|a| a.profile().randomize_obstacles_on_reset)
            .count();
        if scattering > 1 && !arena.obstacles().is_empty() {
            warn!(
                "{} actors scatter the shared walls on every episode start; walls will move under actors mid-episode",
                scattering
            );
        }
        Ok(actors)
    }

    pub fn build_simulation(
        &self,
        sink: Option<Arc<dyn TelemetrySink>>,
        observer: Box<dyn SimObserver>,
    ) -> Result<Simulation, SimError> {
        let mut rng = StdRng::seed_from_u64(self.simulation.seed);
        let arena = self.build_arena(&mut rng)?;
        let actors = self.build_actors(&arena, sink, &mut rng)?;
        let settings = HarnessSettings {
            dt: self.simulation.dt,
            actor_radius: self.simulation.actor_radius,
        };
        Ok(Simulation::new(arena, actors, settings, rng, observer))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid value", key, raw);
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub seed: u64,
    /// Stop after this many completed episodes (all actors combined)
    pub episodes: Option<u64>,
    /// Hard stop on the tick count
    pub max_ticks: Option<u64>,
    /// Simulated seconds per tick
    pub dt: f64,
    /// Contact radius used by the proximity probe
    pub actor_radius: f32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            episodes: Some(20),
            max_ticks: Some(200_000),
            dt: 0.02,
            actor_radius: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Divisor for the normalized terms of the long-horizon presets
    pub step_budget: u64,
    /// Seconds of carrying between hold penalties
    pub hold_interval: f64,
    /// Seconds of standing still (empty-handed) between stationary penalties
    pub stationary_interval: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            step_budget: DEFAULT_STEP_BUDGET,
            hold_interval: 5.0,
            stationary_interval: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub instruction: Instruction,
    pub position: Vec2,
    #[serde(default = "default_zone_radius")]
    pub radius: f32,
}

fn default_zone_radius() -> f32 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObstacleConfig {
    pub position: Vec2,
    #[serde(default = "unit_scale")]
    pub scale: Vec2,
    #[serde(default)]
    pub rotation_deg: f32,
    #[serde(default = "default_wall_radius")]
    pub radius: f32,
}

fn unit_scale() -> Vec2 {
    Vec2::new(1.0, 1.0)
}

fn default_wall_radius() -> f32 {
    0.5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Held item position relative to its carrier
    pub held_offset: Vec2,
    /// Region fixed walls are scattered in on reset
    pub obstacle_bounds: Bounds,
    /// Region a returned goal item respawns in
    pub goal_respawn: Bounds,
    pub goals: Vec<Vec2>,
    pub zones: Vec<ZoneConfig>,
    pub obstacles: Vec<ObstacleConfig>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            held_offset: Vec2::new(0.0, 1.0),
            obstacle_bounds: Bounds::new(-1.5, 1.5, -1.5, 1.5),
            goal_respawn: Bounds::new(3.0, 3.0, -1.5, 1.5),
            goals: Vec::new(),
            zones: vec![
                ZoneConfig {
                    instruction: Instruction::Sorting,
                    position: Vec2::new(-6.0, 4.0),
                    radius: 1.0,
                },
                ZoneConfig {
                    instruction: Instruction::Stacking,
                    position: Vec2::new(0.0, 5.0),
                    radius: 1.0,
                },
                ZoneConfig {
                    instruction: Instruction::Delivery,
                    position: Vec2::new(6.0, 4.0),
                    radius: 1.0,
                },
            ],
            obstacles: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShelfConfig {
    pub min_regen_delay: f64,
    pub max_regen_delay: f64,
    /// Shelves normally start empty and fill after their first delay
    pub start_ready: bool,
    pub positions: Vec<Vec2>,
}

impl Default for ShelfConfig {
    fn default() -> Self {
        Self {
            min_regen_delay: 6.0,
            max_regen_delay: 25.0,
            start_ready: false,
            positions: vec![
                Vec2::new(-4.0, -3.0),
                Vec2::new(-2.0, -3.0),
                Vec2::new(2.0, -3.0),
                Vec2::new(4.0, -3.0),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToggleWallConfig {
    pub min_hidden: f64,
    pub max_hidden: f64,
    pub visible_time: f64,
    pub scale: Vec2,
    pub radius: f32,
    pub positions: Vec<Vec2>,
}

impl Default for ToggleWallConfig {
    fn default() -> Self {
        Self {
            min_hidden: 5.0,
            max_hidden: 35.0,
            visible_time: 10.0,
            scale: Vec2::new(1.0, 0.25),
            radius: 0.4,
            positions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavGraphConfig {
    pub nodes: Vec<Vec2>,
    pub edges: Vec<(usize, usize)>,
    /// Add the reverse of every listed edge
    pub bidirectional: bool,
}

impl Default for NavGraphConfig {
    fn default() -> Self {
        Self {
            nodes: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(-4.0, -2.5),
                Vec2::new(4.0, -2.5),
                Vec2::new(-6.0, 3.0),
                Vec2::new(0.0, 4.0),
                Vec2::new(6.0, 3.0),
            ],
            edges: vec![(0, 1), (0, 2), (0, 3), (0, 4), (0, 5), (1, 3), (2, 5)],
            bidirectional: true,
        }
    }
}

impl NavGraphConfig {
    pub fn build(&self) -> Result<NavGraph, SimError> {
        let mut edges = self.edges.clone();
        if self.bidirectional {
            edges.extend(self.edges.iter().map(|&(a, b)| (b, a)));
        }
        Ok(NavGraph::from_edges(&self.nodes, &edges)?)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Directory for JSONL event files; none disables file output
    pub dir: Option<PathBuf>,
    /// Moving-average window for the end-of-run summary
    pub window: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriverConfig {
    Player {
        #[serde(default)]
        script: Vec<InputFrame>,
    },
    Scripted {
        route: RouteMode,
        #[serde(default = "default_arrival_threshold")]
        arrival_threshold: f32,
    },
    Learning {
        #[serde(default)]
        layout: ObservationLayout,
        #[serde(default = "default_action_probability")]
        action_probability: f64,
    },
}

fn default_arrival_threshold() -> f32 {
    0.1
}

fn default_action_probability() -> f64 {
    0.1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    pub name: String,
    #[serde(flatten)]
    pub driver: DriverConfig,
    /// Reward preset; defaults by driver kind
    #[serde(default)]
    pub preset: Option<RewardPreset>,
    #[serde(default)]
    pub spawn: Vec2,
    #[serde(default)]
    pub controller: ControllerSettings,
}

impl ActorConfig {
    pub fn preset(&self) -> RewardPreset {
        self.preset.unwrap_or(match self.driver {
            DriverConfig::Player { .. } => RewardPreset::ResourcePlayer,
            DriverConfig::Scripted { .. } => RewardPreset::ResourcePatrol,
            DriverConfig::Learning { .. } => RewardPreset::ResourceTask,
        })
    }

    fn build_driver(&self, arena: &Arena, seed: u64) -> Result<Box<dyn IntentSource>, SimError> {
        let driver: Box<dyn IntentSource> = match &self.driver {
            DriverConfig::Player { script } => {
                Box::new(PlayerDriver::new(QueuedInput::new(script.iter().copied())))
            }
            DriverConfig::Scripted {
                route,
                arrival_threshold,
            } => {
                if let RouteMode::Wander { start } = route {
                    let graph = arena.nav().ok_or(GraphError::Empty)?;
                    if graph.node(*start).is_none() {
                        return Err(GraphError::UnknownNode(*start).into());
                    }
                }
                Box::new(ScriptedDriver::new(*route, *arrival_threshold))
            }
            DriverConfig::Learning {
                layout,
                action_probability,
            } => Box::new(LearningDriver::new(
                ObservationEncoder::new(*layout),
                Box::new(RandomPolicy::new(seed, *action_probability)),
            )),
        };
        Ok(driver)
    }
}

fn default_actors() -> Vec<ActorConfig> {
    vec![
        ActorConfig {
            name: "MrPeanut".to_string(),
            driver: DriverConfig::Learning {
                layout: ObservationLayout::Compact,
                action_probability: default_action_probability(),
            },
            preset: Some(RewardPreset::ResourceTask),
            spawn: Vec2::new(0.0, 0.0),
            controller: ControllerSettings {
                speed: 1.0,
                spawn_jitter: Vec2::new(3.5, 1.5),
                ..Default::default()
            },
        },
        ActorConfig {
            name: "MrPickle".to_string(),
            driver: DriverConfig::Scripted {
                route: RouteMode::Wander {
                    start: NodeId(0),
                },
                arrival_threshold: default_arrival_threshold(),
            },
            preset: Some(RewardPreset::ResourcePatrol),
            spawn: Vec2::new(0.0, 0.0),
            controller: ControllerSettings {
                speed: 1.0,
                ..Default::default()
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::LoggingObserver;
    use std::io::Write;

    #[test]
    fn empty_file_yields_demo_warehouse() {
        let config = SimConfig::from_toml_str("").unwrap();
        assert_eq!(config.actors.len(), 2);
        assert_eq!(config.shelves.min_regen_delay, 6.0);
        assert_eq!(config.rewards.step_budget, 200_000);
        assert_eq!(config.arena.zones.len(), 3);
    }

    #[test]
    fn default_config_is_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.actors[0].preset(), RewardPreset::ResourceTask);
    }

    #[test]
    fn rejects_inverted_regen_window() {
        let err = SimConfig::from_toml_str(
            r#"
            [shelves]
            min_regen_delay = 10.0
            max_regen_delay = 2.0
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "shelves.max_regen_delay",
                ..
            }
        ));
    }

    #[test]
    fn parses_actor_table() {
        let config = SimConfig::from_toml_str(
            r#"
            [rewards]
            step_budget = 1000
            hold_interval = 2.5

            [[actors]]
            name = "runner"
            kind = "scripted"
            route = { mode = "errand" }
            spawn = { x = 1.0, y = 2.0 }
            controller = { speed = 0.5 }

            [[actors]]
            name = "human"
            kind = "player"
            script = [{ horizontal = 1.0, vertical = 0.0, pick = false, place = false }]
            "#,
        )
        .unwrap();

        assert_eq!(config.actors.len(), 2);
        let runner = &config.actors[0];
        assert_eq!(runner.preset(), RewardPreset::ResourcePatrol);
        assert_eq!(runner.controller.speed, 0.5);
        assert_eq!(runner.controller.pick_radius, 0.5);
        assert_eq!(runner.spawn, Vec2::new(1.0, 2.0));

        let profile = config.profile_for(runner);
        assert_eq!(profile.hold.unwrap().interval, 2.5);
        assert_eq!(config.actors[1].preset(), RewardPreset::ResourcePlayer);
    }

    #[test]
    fn loads_from_file_and_builds() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[simulation]\nseed = 7\nepisodes = 3").unwrap();

        let config = SimConfig::load(file.path()).unwrap();
        assert_eq!(config.simulation.seed, 7);
        assert_eq!(config.simulation.episodes, Some(3));

        let sim = config.build_simulation(None, Box::new(LoggingObserver)).unwrap();
        assert_eq!(sim.actors().len(), 2);
        assert_eq!(sim.arena().nodes().len(), 4);
        assert!(sim.arena().nav().is_some());
    }

    #[test]
    fn goal_task_actors_sharing_walls_still_build() {
        let config = SimConfig::from_toml_str(
            r#"
            [[arena.obstacles]]
            position = { x = 0.5, y = 0.5 }

            [[actors]]
            name = "first"
            kind = "player"
            preset = "goal_task"

            [[actors]]
            name = "second"
            kind = "player"
            preset = "goal_task"
            "#,
        )
        .unwrap();
        let sim = config.build_simulation(None, Box::new(LoggingObserver)).unwrap();
        assert!(
            sim.actors()
                .iter()
                .all(|a| a.profile().randomize_obstacles_on_reset)
        );
        assert_eq!(sim.arena().obstacles().len(), 1);
    }

    #[test]
    fn wander_start_must_exist() {
        let config = SimConfig::from_toml_str(
            r#"
            [[actors]]
            name = "lost"
            kind = "scripted"
            route = { mode = "wander", start = 99 }
            "#,
        )
        .unwrap();
        assert!(config.build_simulation(None, Box::new(LoggingObserver)).is_err());
    }
}
