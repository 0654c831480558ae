use std::collections::{HashMap, HashSet};

use crate::controller::{CollisionEvent, CollisionTag, EntityRef};
use crate::infra::Vec2;
use crate::state::{ActorId, Arena};

/// Headless stand-in for the physics layer. Reports an enter event the first
/// tick an actor overlaps something, and nothing while the overlap persists.
#[derive(Debug, Clone)]
pub struct ProximityProbe {
    actor_radius: f32,
    overlaps: HashMap<ActorId, HashSet<EntityRef>>,
}

impl ProximityProbe {
    pub fn new(actor_radius: f32) -> Self {
        Self {
            actor_radius,
            overlaps: HashMap::new(),
        }
    }

    pub fn actor_radius(&self) -> f32 {
        self.actor_radius
    }

    #[tracing::instrument(level = "trace", skip(self, arena))]
    pub fn contacts(&mut self, actor: ActorId, position: Vec2, arena: &Arena) -> Vec<CollisionEvent> {
        let touching = self.touching(position, arena);
        let previous = self.overlaps.entry(actor).or_default();

        let entered = touching
            .iter()
            .filter(|event| !previous.contains(&event.other))
            .cloned()
            .collect();
        *previous = touching.iter().map(|event| event.other).collect();
        entered
    }

    /// Drops remembered overlaps, so anything the actor spawns on counts as
    /// a fresh contact.
    pub fn forget(&mut self, actor: ActorId) {
        self.overlaps.remove(&actor);
    }

    fn touching(&self, position: Vec2, arena: &Arena) -> Vec<CollisionEvent> {
        let reach = self.actor_radius;
        let mut events = Vec::new();

        for item in arena.items() {
            if item.is_goal() && item.is_available() && item.position.distance(&position) <= reach {
                events.push(CollisionEvent::goal(item.id));
            }
        }
        for node in arena.nodes() {
            if node.position.distance(&position) <= reach {
                events.push(CollisionEvent::shelf(node.id));
            }
        }
        for obstacle in arena.obstacles() {
            if obstacle.active && obstacle.position.distance(&position) <= reach + obstacle.radius {
                events.push(CollisionEvent::wall(obstacle.id));
            }
        }
        for zone in arena.zones() {
            if zone.position.distance(&position) <= zone.radius {
                events.push(CollisionEvent::new(
                    CollisionTag::for_zone(zone.instruction),
                    EntityRef::Zone(zone.instruction),
                ));
            }
        }
        events
    }
}
