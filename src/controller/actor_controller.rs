use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::controller::events::{
    ActionCode, CollisionEvent, CollisionTag, Command, EntityRef, EpisodeOutcome, Movement,
    TickReport,
};
use crate::controller::reward::{
    PrematureAccess, RewardEvent, RewardProfile, RewardShaper, ShapingInput,
};
use crate::infra::{Bounds, Facing, Telemetry, Vec2};
use crate::planners::{DriverContext, IntentSource};
use crate::state::{
    ActorId, ActorPhase, ActorState, Arena, Collect, Instruction, ItemId, ResourceNodeId,
    TaskAssignment,
};

/// Per-actor tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    pub speed: f32,
    /// Reach for action-code pickups.
    pub pick_radius: f32,
    /// Reach for action-code placement around the matching zone.
    pub place_radius: f32,
    /// Half extents of the random offset applied to the spawn point.
    pub spawn_jitter: Vec2,
    pub max_episode_steps: Option<u64>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            speed: 1.0,
            pick_radius: 0.5,
            place_radius: 1.0,
            spawn_jitter: Vec2::ZERO,
            max_episode_steps: None,
        }
    }
}

/// Task/carry state machine shared by every actor kind.
pub struct ActorController {
    state: ActorState,
    settings: ControllerSettings,
    shaper: RewardShaper,
    driver: Box<dyn IntentSource>,
}

impl ActorController {
    pub fn new(
        id: ActorId,
        name: impl Into<String>,
        spawn: Vec2,
        profile: RewardProfile,
        driver: Box<dyn IntentSource>,
        telemetry: Telemetry,
        settings: ControllerSettings,
        rng: &mut StdRng,
    ) -> Self {
        Self {
            state: ActorState::new(id, name, spawn, rng),
            settings,
            shaper: RewardShaper::new(profile, telemetry),
            driver,
        }
    }

    pub fn id(&self) -> ActorId {
        self.state.id
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn state(&self) -> &ActorState {
        &self.state
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn profile(&self) -> &RewardProfile {
        self.shaper.profile()
    }

    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }

    /// Rendering signal.
    pub fn facing(&self) -> Facing {
        self.state.facing
    }

    pub fn phase(&self) -> ActorPhase {
        self.state.phase()
    }

    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }

    /// Pins the current instruction. Only takes effect while not carrying.
    pub fn set_instruction(&mut self, instruction: Instruction) {
        if !self.state.carry.is_carrying() {
            self.state.task = TaskAssignment::fixed(instruction);
        }
    }

    /// Places the actor directly. Used to stage scenarios and by external
    /// physics that owns the body.
    pub fn teleport(&mut self, arena: &mut Arena, position: Vec2) {
        self.state.position = position;
        self.state.last_position = position;
        if let Some(item) = self.state.carry.held_item() {
            arena.sync_held(item, position);
        }
    }

    /// Starts a fresh episode. An item still held from an unfinished episode
    /// goes back to the arena first. Profiles that randomize obstacles move
    /// the shared walls, so they expect to be alone in their arena.
    pub fn begin_episode(&mut self, arena: &mut Arena, rng: &mut StdRng) {
        if let Some(item) = self.state.carry.release() {
            debug!("{} restarted while carrying {:?}", self.state.name, item);
            arena.return_item(item, rng);
        }
        if self.shaper.profile().randomize_obstacles_on_reset {
            arena.randomize_obstacles(rng);
        }
        let base = self.driver.spawn_point(arena).unwrap_or(self.state.spawn);
        let jitter = self.settings.spawn_jitter;
        let position = Bounds::from_center_and_extent(base, jitter.x, jitter.y).sample(rng);

        self.state.reset(position, rng);
        self.driver.on_episode_begin(&self.state, arena, rng);
        debug!(
            "{} begins episode at ({:.2}, {:.2}), instruction {}",
            self.state.name,
            position.x,
            position.y,
            self.state.task.instruction()
        );
    }

    /// Closes the episode: returns any held item to the arena and reports the
    /// cumulative reward. An episode cut short externally counts as a timeout.
    pub fn end_episode(&mut self, arena: &mut Arena, rng: &mut StdRng) -> EpisodeOutcome {
        let outcome = self.state.outcome.unwrap_or(EpisodeOutcome::Timeout);
        self.state.outcome = Some(outcome);
        if let Some(item) = self.state.carry.release() {
            arena.return_item(item, rng);
        }

        let cumulative = self.state.cumulative_reward;
        self.shaper.telemetry().episode_end(
            cumulative,
            &self.state.name,
            outcome,
            self.state.episode_steps,
        );
        self.driver.on_episode_end(outcome, cumulative);
        info!(
            "{} episode ended: {:?}, reward {:.4}, {} steps",
            self.state.name, outcome, cumulative, self.state.episode_steps
        );
        outcome
    }

    /// Asks the intent source for a command and applies it.
    #[tracing::instrument(level = "trace", skip_all, fields(actor = %self.state.name))]
    pub fn tick(&mut self, arena: &mut Arena, dt: f64, rng: &mut StdRng) -> TickReport {
        if self.state.is_done() {
            return TickReport::default();
        }
        let command = {
            let ctx = DriverContext {
                state: &self.state,
                arena: &*arena,
                dt: dt as f32,
                speed: self.settings.speed,
            };
            self.driver.decide(&ctx, rng)
        };
        self.apply_command(arena, command, dt, rng)
    }

    /// Moves, performs the requested action, then applies continuous shaping
    /// and the step limit.
    pub fn apply_command(
        &mut self,
        arena: &mut Arena,
        command: Command,
        dt: f64,
        rng: &mut StdRng,
    ) -> TickReport {
        if self.state.is_done() {
            return TickReport::default();
        }
        self.state.episode_steps += 1;

        let before = self.state.position;
        let (after, direction) = match command.movement {
            Movement::Intent(intent) => {
                let direction = intent.normalized();
                (before + direction * (self.settings.speed * dt as f32), direction)
            }
            Movement::Position(target) => (target, (target - before).normalized()),
        };
        if let Some(facing) = Facing::from_direction(direction) {
            self.state.facing = facing;
        }
        self.state.intent = direction;
        self.state.action = command.action;
        self.state.last_position = before;
        self.state.position = after;
        self.state.velocity = if dt > 0.0 {
            (after - before) * (1.0 / dt as f32)
        } else {
            Vec2::ZERO
        };
        if let Some(item) = self.state.carry.held_item() {
            arena.sync_held(item, after);
        }

        let mut report = match command.action {
            ActionCode::Pick => self.try_pick(arena, rng),
            ActionCode::Place => self.try_place(arena, rng),
            ActionCode::None => TickReport::default(),
        };

        if !self.state.is_done() {
            let carrying = self.state.carry.is_carrying();
            let distance = if carrying {
                None
            } else {
                seek_target(arena, after).map(|t| (t.distance(&before), t.distance(&after)))
            };
            let heading = if carrying {
                arena
                    .zone(self.state.task.instruction())
                    .map(|zone| direction.dot(&(zone.position - after).normalized()))
            } else {
                None
            };
            let input = ShapingInput {
                carrying,
                moved: after != before,
                dt,
                distance,
                heading,
            };
            let (breakdown, timers) = self.shaper.shape(self.state.timers, &input);
            self.state.timers = timers;
            report.merge(self.award(breakdown.total()));
        }

        if !self.state.is_done()
            && let Some(limit) = self.settings.max_episode_steps
            && self.state.episode_steps >= limit
        {
            let amount = self.shaper.terminal(RewardEvent::Timeout);
            report.merge(self.conclude(amount, EpisodeOutcome::Timeout));
        }
        report
    }

    /// Reacts to an overlap reported by physics (or the proximity probe).
    /// Events arriving after the episode ended are ignored.
    pub fn on_collision(
        &mut self,
        event: &CollisionEvent,
        arena: &mut Arena,
        rng: &mut StdRng,
    ) -> TickReport {
        if self.state.is_done() {
            return TickReport::default();
        }
        match (&event.tag, event.other) {
            (CollisionTag::Goal, EntityRef::Item(item)) => self.pick_goal(arena, item),
            (CollisionTag::ShelfTile, EntityRef::Node(node)) => self.collect(arena, node, rng),
            (CollisionTag::Wall, other) => {
                let active = match other {
                    EntityRef::Obstacle(id) => arena.obstacle(id).is_some_and(|o| o.active),
                    _ => true,
                };
                if active {
                    let amount = self.shaper.terminal(RewardEvent::Wall);
                    self.conclude(amount, EpisodeOutcome::HitWall)
                } else {
                    TickReport::default()
                }
            }
            (tag, _) => match tag.zone() {
                Some(zone) => self.enter_zone(zone, arena, rng),
                None => {
                    trace!("{} ignores {:?}", self.state.name, event);
                    TickReport::default()
                }
            },
        }
    }

    fn try_pick(&mut self, arena: &mut Arena, rng: &mut StdRng) -> TickReport {
        if self.state.carry.is_carrying() {
            trace!("{}: pick while carrying ignored", self.state.name);
            return TickReport::default();
        }
        let pos = self.state.position;
        let radius = self.settings.pick_radius;
        let goal = arena
            .nearest_available_goal(pos)
            .filter(|item| item.position.distance(&pos) <= radius)
            .map(|item| item.id);
        if let Some(item) = goal {
            return self.pick_goal(arena, item);
        }
        let node = arena.nearest_node_within(pos, radius).map(|n| n.id);
        match node {
            Some(node) => self.collect(arena, node, rng),
            None => TickReport::default(),
        }
    }

    fn pick_goal(&mut self, arena: &mut Arena, item: ItemId) -> TickReport {
        if self.state.carry.is_carrying() {
            return TickReport::default();
        }
        if !arena.take_goal(item, self.state.id, self.state.position) {
            return TickReport::default();
        }
        self.state.carry.pick(item);
        self.state.timers.hold = 0.0;
        self.award(self.shaper.terminal(RewardEvent::Pickup {
            from_resource: false,
        }))
    }

    fn collect(&mut self, arena: &mut Arena, node: ResourceNodeId, rng: &mut StdRng) -> TickReport {
        if self.state.carry.is_carrying() {
            return TickReport::default();
        }
        match arena.collect_from_node(node, self.state.id, self.state.position, rng) {
            Collect::Collected(item) => {
                self.state.carry.pick(item);
                self.state.timers.hold = 0.0;
                debug!(
                    "{} collected from {:?}, deliver to {}",
                    self.state.name,
                    node,
                    self.state.task.instruction()
                );
                self.award(self.shaper.terminal(RewardEvent::Pickup {
                    from_resource: true,
                }))
            }
            Collect::NotReady => {
                let penalty = self.shaper.terminal(RewardEvent::PrematureAccess);
                let policy = self.shaper.profile().premature;
                match policy {
                    PrematureAccess::Ignore { .. } => {
                        trace!("{} touched unready {:?}", self.state.name, node);
                        self.award(penalty)
                    }
                    PrematureAccess::Terminal { .. } => {
                        self.conclude(penalty, EpisodeOutcome::PrematureAccess)
                    }
                }
            }
            Collect::Missing => TickReport::default(),
        }
    }

    fn try_place(&mut self, arena: &mut Arena, rng: &mut StdRng) -> TickReport {
        if !self.state.carry.is_carrying() {
            trace!("{}: place while empty-handed ignored", self.state.name);
            return TickReport::default();
        }
        let instruction = self.state.task.instruction();
        let in_zone = arena
            .zone(instruction)
            .is_some_and(|z| z.position.distance(&self.state.position) <= self.settings.place_radius);
        if in_zone {
            return self.deliver(arena, rng);
        }

        let Some(rule) = self.shaper.profile().misplace else {
            return TickReport::default();
        };
        if rule.drops_item
            && let Some(item) = self.state.carry.release()
        {
            arena.return_item(item, rng);
        }
        let penalty = self.shaper.terminal(RewardEvent::Misplace);
        if rule.ends_episode {
            self.conclude(penalty, EpisodeOutcome::Misplaced)
        } else {
            self.award(penalty)
        }
    }

    fn enter_zone(&mut self, zone: Instruction, arena: &mut Arena, rng: &mut StdRng) -> TickReport {
        if !self.state.carry.is_carrying() {
            return TickReport::default();
        }
        if self.state.task.matches(zone) {
            return self.deliver(arena, rng);
        }
        debug!(
            "{} entered {} but was told {}",
            self.state.name,
            zone,
            self.state.task.instruction()
        );
        let amount = self.shaper.terminal(RewardEvent::WrongZone);
        if self.shaper.profile().wrong_zone_ends_episode {
            self.conclude(amount, EpisodeOutcome::WrongZone)
        } else {
            self.award(amount)
        }
    }

    fn deliver(&mut self, arena: &mut Arena, rng: &mut StdRng) -> TickReport {
        let delivered_to = self.state.task.instruction();
        if let Some(item) = self.state.carry.release() {
            arena.return_item(item, rng);
        }
        self.state.timers.hold = 0.0;
        let next = self.state.task.reroll(rng);
        info!(
            "{} delivered to {}, next instruction {}",
            self.state.name, delivered_to, next
        );

        let amount = self.shaper.terminal(RewardEvent::Delivery);
        if self.shaper.profile().delivery_ends_episode {
            return self.conclude(amount, EpisodeOutcome::Delivered);
        }
        let report = self.award(amount);
        if self.shaper.profile().report_deliveries {
            self.shaper.telemetry().delivery(
                self.state.cumulative_reward,
                &self.state.name,
                self.state.episode_steps,
            );
            self.state.cumulative_reward = 0.0;
        }
        report
    }

    fn award(&mut self, amount: f32) -> TickReport {
        self.state.cumulative_reward += amount;
        self.shaper.emit(amount, &self.state.name);
        TickReport::reward(amount)
    }

    fn conclude(&mut self, amount: f32, outcome: EpisodeOutcome) -> TickReport {
        let mut report = self.award(amount);
        self.state.outcome = Some(outcome);
        report.outcome = Some(outcome);
        debug!("{} reached terminal outcome {:?}", self.state.name, outcome);
        report
    }
}

/// What a seeking actor is heading for: the nearest free goal item, else the
/// nearest ready shelf.
fn seek_target(arena: &Arena, pos: Vec2) -> Option<Vec2> {
    arena
        .nearest_available_goal(pos)
        .map(|item| item.position)
        .or_else(|| arena.nearest_ready_node(pos).map(|node| node.position))
}
