use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::ConfigError;
use crate::infra::{Bounds, NavGraph, Scheduler, SimTime, Vec2};
use crate::state::{ActorId, Instruction, ItemId, ResourceNode, ResourceNodeId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zone {
    pub instruction: Instruction,
    pub position: Vec2,
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemKind {
    /// Single fixed goal object; respawns inside `respawn` when returned.
    Goal { respawn: Bounds },
    /// Overlay refilled by a shelf tile.
    Overlay { node: ResourceNodeId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Arena,
    Actor(ActorId),
}

#[derive(Debug, Clone)]
pub struct Item {
    pub id: ItemId,
    pub kind: ItemKind,
    pub position: Vec2,
    owner: Owner,
    visible: bool,
}

impl Item {
    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// Lying in the arena and visible, i.e. something an actor could pick up.
    pub fn is_available(&self) -> bool {
        self.owner == Owner::Arena && self.visible
    }

    pub fn is_goal(&self) -> bool {
        matches!(self.kind, ItemKind::Goal { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObstacleId(pub usize);

/// Appearance cycle for a wall that is hidden most of the time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WallToggle {
    pub min_hidden: f64,
    pub max_hidden: f64,
    pub visible_time: f64,
}

#[derive(Debug, Clone)]
pub struct Obstacle {
    pub id: ObstacleId,
    pub position: Vec2,
    pub scale: Vec2,
    pub rotation_deg: f32,
    pub radius: f32,
    pub active: bool,
    pub toggle: Option<WallToggle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TimerKey {
    Regenerate(ResourceNodeId),
    Wall(ObstacleId),
}

/// Things that happened while the arena clock advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaEvent {
    NodeReady(ResourceNodeId),
    WallShown(ObstacleId),
    WallHidden(ObstacleId),
}

/// Outcome of collecting from a shelf tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collect {
    Collected(ItemId),
    NotReady,
    Missing,
}

/// Shared world: zones, items, shelf tiles, walls and the waypoint graph.
/// Items move between arena ownership and actor ownership explicitly.
#[derive(Debug, Clone)]
pub struct Arena {
    now: SimTime,
    zones: Vec<Zone>,
    items: Vec<Item>,
    nodes: Vec<ResourceNode>,
    obstacles: Vec<Obstacle>,
    nav: Option<Arc<NavGraph>>,
    scheduler: Scheduler<TimerKey>,
    held_offset: Vec2,
    obstacle_bounds: Bounds,
}

impl Arena {
    pub fn new(held_offset: Vec2, obstacle_bounds: Bounds) -> Self {
        Self {
            now: 0.0,
            zones: Vec::new(),
            items: Vec::new(),
            nodes: Vec::new(),
            obstacles: Vec::new(),
            nav: None,
            scheduler: Scheduler::new(),
            held_offset,
            obstacle_bounds,
        }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn add_zone(&mut self, instruction: Instruction, position: Vec2, radius: f32) {
        self.zones.retain(|z| z.instruction != instruction);
        self.zones.push(Zone {
            instruction,
            position,
            radius,
        });
    }

    pub fn add_goal_item(&mut self, position: Vec2, respawn: Bounds) -> ItemId {
        let id = ItemId(self.items.len());
        self.items.push(Item {
            id,
            kind: ItemKind::Goal { respawn },
            position,
            owner: Owner::Arena,
            visible: true,
        });
        id
    }

    /// Adds a shelf tile and its overlay item. A tile that does not start
    /// ready schedules its first regeneration immediately.
    pub fn add_resource_node<R: Rng + ?Sized>(
        &mut self,
        position: Vec2,
        min_delay: f64,
        max_delay: f64,
        start_ready: bool,
        rng: &mut R,
    ) -> Result<ResourceNodeId, ConfigError> {
        let node_id = ResourceNodeId(self.nodes.len());
        let item_id = ItemId(self.items.len());
        let mut node = ResourceNode::new(node_id, position, item_id, min_delay, max_delay)?;

        if start_ready {
            node.make_ready();
        } else {
            let deadline = node.begin_regeneration(self.now, rng);
            self.scheduler.schedule(TimerKey::Regenerate(node_id), deadline);
        }

        self.items.push(Item {
            id: item_id,
            kind: ItemKind::Overlay { node: node_id },
            position,
            owner: Owner::Arena,
            visible: start_ready,
        });
        self.nodes.push(node);
        Ok(node_id)
    }

    pub fn add_obstacle(
        &mut self,
        position: Vec2,
        scale: Vec2,
        rotation_deg: f32,
        radius: f32,
    ) -> ObstacleId {
        let id = ObstacleId(self.obstacles.len());
        self.obstacles.push(Obstacle {
            id,
            position,
            scale,
            rotation_deg,
            radius,
            active: true,
            toggle: None,
        });
        id
    }

    /// Adds a wall that starts hidden and appears on a random timer.
    pub fn add_toggle_wall<R: Rng + ?Sized>(
        &mut self,
        position: Vec2,
        scale: Vec2,
        radius: f32,
        toggle: WallToggle,
        rng: &mut R,
    ) -> Result<ObstacleId, ConfigError> {
        if !(toggle.min_hidden >= 0.0 && toggle.max_hidden >= toggle.min_hidden) {
            return Err(ConfigError::invalid(
                "walls.max_hidden",
                "hidden range must satisfy 0 <= min_hidden <= max_hidden",
            ));
        }
        if !(toggle.visible_time > 0.0) {
            return Err(ConfigError::invalid(
                "walls.visible_time",
                "must be positive",
            ));
        }
        let id = self.add_obstacle(position, scale, 0.0, radius);
        let wall = &mut self.obstacles[id.0];
        wall.active = false;
        wall.toggle = Some(toggle);
        let due = self.now + sample_delay(rng, toggle.min_hidden, toggle.max_hidden);
        self.scheduler.schedule(TimerKey::Wall(id), due);
        Ok(id)
    }

    pub fn set_nav_graph(&mut self, graph: Arc<NavGraph>) {
        self.nav = Some(graph);
    }

    /// Advances the clock by `dt` and delivers every deferred event that
    /// became due. Called once per tick before any actor updates.
    pub fn advance<R: Rng + ?Sized>(&mut self, dt: f64, rng: &mut R) -> Vec<ArenaEvent> {
        self.now += dt.max(0.0);
        let now = self.now;
        let mut events = Vec::new();

        for key in self.scheduler.poll(now) {
            match key {
                TimerKey::Regenerate(node_id) => {
                    let Some(node) = self.nodes.get_mut(node_id.0) else {
                        warn!("regeneration fired for unknown node {:?}", node_id);
                        continue;
                    };
                    if node.on_regenerate(now) {
                        let overlay = node.overlay();
                        if let Some(item) = self.items.get_mut(overlay.0) {
                            if item.owner == Owner::Arena {
                                item.visible = true;
                            }
                        }
                        events.push(ArenaEvent::NodeReady(node_id));
                    }
                }
                TimerKey::Wall(obstacle_id) => {
                    let Some(wall) = self.obstacles.get_mut(obstacle_id.0) else {
                        continue;
                    };
                    let Some(toggle) = wall.toggle else {
                        continue;
                    };
                    wall.active = !wall.active;
                    let (event, wait) = if wall.active {
                        (ArenaEvent::WallShown(obstacle_id), toggle.visible_time)
                    } else {
                        (
                            ArenaEvent::WallHidden(obstacle_id),
                            sample_delay(rng, toggle.min_hidden, toggle.max_hidden),
                        )
                    };
                    trace!("{:?} at t={:.2}", event, now);
                    self.scheduler.schedule(key, now + wait);
                    events.push(event);
                }
            }
        }
        events
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone(&self, instruction: Instruction) -> Option<&Zone> {
        self.zones.iter().find(|z| z.instruction == instruction)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(id.0)
    }

    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    pub fn node(&self, id: ResourceNodeId) -> Option<&ResourceNode> {
        self.nodes.get(id.0)
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn obstacle(&self, id: ObstacleId) -> Option<&Obstacle> {
        self.obstacles.get(id.0)
    }

    pub fn nav(&self) -> Option<&Arc<NavGraph>> {
        self.nav.as_ref()
    }

    pub fn held_offset(&self) -> Vec2 {
        self.held_offset
    }

    /// Position of the first goal item; the "target" in observations.
    pub fn primary_goal_position(&self) -> Option<Vec2> {
        self.items.iter().find(|i| i.is_goal()).map(|i| i.position)
    }

    pub fn nearest_available_goal(&self, pos: Vec2) -> Option<&Item> {
        self.items
            .iter()
            .filter(|i| i.is_goal() && i.is_available())
            .min_by(|a, b| a.position.distance(&pos).total_cmp(&b.position.distance(&pos)))
    }

    pub fn nearest_ready_node(&self, pos: Vec2) -> Option<&ResourceNode> {
        self.nodes
            .iter()
            .filter(|n| n.is_ready())
            .min_by(|a, b| a.position.distance(&pos).total_cmp(&b.position.distance(&pos)))
    }

    pub fn nearest_node_within(&self, pos: Vec2, radius: f32) -> Option<&ResourceNode> {
        self.nodes
            .iter()
            .filter(|n| n.position.distance(&pos) <= radius)
            .min_by(|a, b| a.position.distance(&pos).total_cmp(&b.position.distance(&pos)))
    }

    /// Hands an available goal item to `actor`. Fails if it is already held
    /// or is not a goal item.
    pub fn take_goal(&mut self, item: ItemId, actor: ActorId, actor_pos: Vec2) -> bool {
        let offset = self.held_offset;
        let Some(entry) = self.items.get_mut(item.0) else {
            return false;
        };
        if !entry.is_goal() || !entry.is_available() {
            return false;
        }
        entry.owner = Owner::Actor(actor);
        entry.position = actor_pos + offset;
        debug!("{:?} picked up goal {:?}", actor, item);
        true
    }

    /// Consumes the node's overlay on behalf of `actor`. The first caller in
    /// a tick wins; later callers observe `NotReady`.
    pub fn collect_from_node<R: Rng + ?Sized>(
        &mut self,
        node_id: ResourceNodeId,
        actor: ActorId,
        actor_pos: Vec2,
        rng: &mut R,
    ) -> Collect {
        let now = self.now;
        let Some(node) = self.nodes.get_mut(node_id.0) else {
            return Collect::Missing;
        };
        let Some(deadline) = node.try_consume(now, rng) else {
            return Collect::NotReady;
        };
        let taken = node.overlay();
        let position = node.position;
        self.scheduler
            .schedule(TimerKey::Regenerate(node_id), deadline);

        // The held item leaves the shelf for good; the tile refills with a
        // spare overlay so a regenerated shelf never hands out a held item.
        let spare = self.spare_overlay(node_id, taken, position);
        if let Some(node) = self.nodes.get_mut(node_id.0) {
            node.set_overlay(spare);
        }

        let offset = self.held_offset;
        match self.items.get_mut(taken.0) {
            Some(item) => {
                item.owner = Owner::Actor(actor);
                item.visible = true;
                item.position = actor_pos + offset;
                Collect::Collected(taken)
            }
            None => Collect::Missing,
        }
    }

    /// A hidden arena-owned overlay for `node` other than `taken`, reusing a
    /// returned one when possible.
    fn spare_overlay(&mut self, node: ResourceNodeId, taken: ItemId, position: Vec2) -> ItemId {
        let reusable = self.items.iter().position(|item| {
            item.id != taken
                && item.kind == ItemKind::Overlay { node }
                && item.owner == Owner::Arena
        });
        let id = match reusable {
            Some(index) => ItemId(index),
            None => {
                let id = ItemId(self.items.len());
                self.items.push(Item {
                    id,
                    kind: ItemKind::Overlay { node },
                    position,
                    owner: Owner::Arena,
                    visible: false,
                });
                id
            }
        };
        if let Some(item) = self.items.get_mut(id.0) {
            item.position = position;
            item.visible = false;
        }
        id
    }

    /// Keeps a held item at the carrier's position plus the carry offset.
    pub fn sync_held(&mut self, item: ItemId, actor_pos: Vec2) {
        let offset = self.held_offset;
        if let Some(entry) = self.items.get_mut(item.0) {
            if matches!(entry.owner, Owner::Actor(_)) {
                entry.position = actor_pos + offset;
            }
        }
    }

    /// Returns an item to arena ownership. Goal items respawn at a random
    /// point; overlays go back to their shelf as hidden spares.
    pub fn return_item<R: Rng + ?Sized>(&mut self, item: ItemId, rng: &mut R) {
        let Some(entry) = self.items.get_mut(item.0) else {
            warn!("tried to return unknown item {:?}", item);
            return;
        };
        entry.owner = Owner::Arena;
        match entry.kind {
            ItemKind::Goal { respawn } => {
                entry.position = respawn.sample(rng);
                entry.visible = true;
            }
            ItemKind::Overlay { node } => {
                let node = self.nodes.get(node.0);
                entry.position = node.map(|n| n.position).unwrap_or(entry.position);
                entry.visible = node.is_some_and(|n| n.overlay() == item && n.is_ready());
            }
        }
        trace!("{:?} returned to arena at {:?}", item, entry.position);
    }

    /// Scatters every fixed obstacle inside the obstacle bounds.
    pub fn randomize_obstacles<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let bounds = self.obstacle_bounds;
        for obstacle in self.obstacles.iter_mut().filter(|o| o.toggle.is_none()) {
            obstacle.position = bounds.sample(rng);
        }
    }
}

fn sample_delay<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> f64 {
    if max > min {
        rng.random_range(min..=max)
    } else {
        min
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn arena() -> Arena {
        Arena::new(Vec2::new(0.0, 1.0), Bounds::new(-1.5, 1.5, -1.5, 1.5))
    }

    #[test]
    fn regeneration_respects_delay_window() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut arena = arena();
        let node = arena
            .add_resource_node(Vec2::ZERO, 6.0, 25.0, true, &mut rng)
            .unwrap();

        assert_eq!(
            arena.collect_from_node(node, ActorId(0), Vec2::ZERO, &mut rng),
            Collect::Collected(ItemId(0))
        );

        let dt = 0.02;
        let mut ready_at = None;
        while arena.now() < 30.0 {
            arena.advance(dt, &mut rng);
            let ready = arena.node(node).unwrap().is_ready();
            if arena.now() < 6.0 - 1e-9 {
                assert!(!ready, "ready too early at {}", arena.now());
            }
            if ready {
                ready_at = Some(arena.now());
                break;
            }
        }
        let ready_at = ready_at.expect("node never regenerated");
        assert!(ready_at >= 6.0 - 1e-9 && ready_at <= 25.0 + dt);
    }

    #[test]
    fn only_first_collector_in_a_tick_wins() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut arena = arena();
        let node = arena
            .add_resource_node(Vec2::ZERO, 1.0, 2.0, true, &mut rng)
            .unwrap();
        let first = arena.collect_from_node(node, ActorId(0), Vec2::ZERO, &mut rng);
        let second = arena.collect_from_node(node, ActorId(1), Vec2::ZERO, &mut rng);
        assert!(matches!(first, Collect::Collected(_)));
        assert_eq!(second, Collect::NotReady);
    }

    #[test]
    fn returned_overlay_stays_hidden_until_regenerated() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut arena = arena();
        let node = arena
            .add_resource_node(Vec2::new(2.0, 2.0), 1.0, 1.0, true, &mut rng)
            .unwrap();
        let Collect::Collected(item) =
            arena.collect_from_node(node, ActorId(0), Vec2::ZERO, &mut rng)
        else {
            panic!("expected collection");
        };
        assert_eq!(arena.item(item).unwrap().owner(), Owner::Actor(ActorId(0)));
        assert_eq!(arena.item(item).unwrap().position, Vec2::new(0.0, 1.0));

        arena.return_item(item, &mut rng);
        let entry = arena.item(item).unwrap();
        assert_eq!(entry.owner(), Owner::Arena);
        assert_eq!(entry.position, Vec2::new(2.0, 2.0));
        assert!(!entry.is_available());

        let refill = arena.node(node).unwrap().overlay();
        assert_ne!(refill, item);
        assert!(!arena.item(refill).unwrap().is_available());
        arena.advance(1.0, &mut rng);
        assert!(arena.item(refill).unwrap().is_available());
        assert!(!arena.item(item).unwrap().is_available());
    }

    #[test]
    fn regenerated_shelf_never_hands_out_a_held_item() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut arena = arena();
        let node = arena
            .add_resource_node(Vec2::ZERO, 1.0, 1.0, true, &mut rng)
            .unwrap();

        let Collect::Collected(first) =
            arena.collect_from_node(node, ActorId(0), Vec2::ZERO, &mut rng)
        else {
            panic!("expected collection");
        };
        arena.advance(2.0, &mut rng);
        assert!(arena.node(node).unwrap().is_ready());

        let Collect::Collected(second) =
            arena.collect_from_node(node, ActorId(1), Vec2::ZERO, &mut rng)
        else {
            panic!("expected collection");
        };
        assert_ne!(first, second);
        assert_eq!(arena.item(first).unwrap().owner(), Owner::Actor(ActorId(0)));
        assert_eq!(arena.item(second).unwrap().owner(), Owner::Actor(ActorId(1)));

        // Returning the first delivery leaves the second carrier untouched
        arena.return_item(first, &mut rng);
        assert_eq!(arena.item(first).unwrap().owner(), Owner::Arena);
        assert_eq!(arena.item(second).unwrap().owner(), Owner::Actor(ActorId(1)));
    }

    #[test]
    fn returned_overlays_are_reused_as_spares() {
        let mut rng = StdRng::seed_from_u64(23);
        let mut arena = arena();
        let node = arena
            .add_resource_node(Vec2::ZERO, 0.5, 0.5, true, &mut rng)
            .unwrap();

        for _ in 0..20 {
            let Collect::Collected(item) =
                arena.collect_from_node(node, ActorId(0), Vec2::ZERO, &mut rng)
            else {
                panic!("expected collection");
            };
            arena.return_item(item, &mut rng);
            arena.advance(1.0, &mut rng);
        }
        assert_eq!(arena.items().len(), 2);
    }

    #[test]
    fn goal_item_moves_between_owners() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut arena = arena();
        let respawn = Bounds::new(3.0, 3.0, -1.5, 1.5);
        let goal = arena.add_goal_item(Vec2::new(3.0, 0.0), respawn);

        assert!(arena.take_goal(goal, ActorId(0), Vec2::new(2.8, 0.0)));
        assert!(!arena.take_goal(goal, ActorId(1), Vec2::new(2.8, 0.0)));
        arena.sync_held(goal, Vec2::new(1.0, 1.0));
        assert_eq!(arena.item(goal).unwrap().position, Vec2::new(1.0, 2.0));

        arena.return_item(goal, &mut rng);
        let entry = arena.item(goal).unwrap();
        assert!(entry.is_available());
        assert!(respawn.contains(&entry.position));
    }

    #[test]
    fn toggle_wall_cycles_visibility() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut arena = arena();
        let toggle = WallToggle {
            min_hidden: 5.0,
            max_hidden: 35.0,
            visible_time: 10.0,
        };
        let wall = arena
            .add_toggle_wall(Vec2::ZERO, Vec2::new(1.0, 1.0), 0.5, toggle, &mut rng)
            .unwrap();
        assert!(!arena.obstacle(wall).unwrap().active);

        let mut shown_at = None;
        let mut hidden_at = None;
        while arena.now() < 60.0 && hidden_at.is_none() {
            for event in arena.advance(0.1, &mut rng) {
                match event {
                    ArenaEvent::WallShown(_) => shown_at = Some(arena.now()),
                    ArenaEvent::WallHidden(_) => hidden_at = Some(arena.now()),
                    ArenaEvent::NodeReady(_) => {}
                }
            }
        }
        let shown = shown_at.expect("wall never appeared");
        let hidden = hidden_at.expect("wall never hid again");
        assert!((5.0 - 1e-6..=35.1).contains(&shown));
        assert!((hidden - shown - 10.0).abs() < 0.11);
    }
}
