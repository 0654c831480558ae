use std::collections::VecDeque;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::controller::{ActionCode, Command};
use crate::infra::{NavWalker, NodeId, Vec2};
use crate::planners::{DriverContext, IntentSource};
use crate::state::{ActorState, Arena};

/// Targets closer than this are treated as unchanged when deciding whether
/// to replan an errand.
const REPLAN_TOLERANCE: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RouteMode {
    /// Random walk over the waypoint graph; pickups and deliveries happen
    /// only through overlaps.
    Wander { start: NodeId },
    /// Route to whatever the task needs next and act on arrival.
    Errand,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Errand {
    target: Vec2,
    action: ActionCode,
}

pub struct ScriptedDriver {
    mode: RouteMode,
    arrival_threshold: f32,
    walker: Option<NavWalker>,
    route: VecDeque<Vec2>,
    errand: Option<Errand>,
}

impl ScriptedDriver {
    pub fn new(mode: RouteMode, arrival_threshold: f32) -> Self {
        let walker = match mode {
            RouteMode::Wander { start } => Some(NavWalker::new(start, arrival_threshold)),
            RouteMode::Errand => None,
        };
        Self {
            mode,
            arrival_threshold,
            walker,
            route: VecDeque::new(),
            errand: None,
        }
    }

    pub fn mode(&self) -> RouteMode {
        self.mode
    }

    pub fn walker(&self) -> Option<&NavWalker> {
        self.walker.as_ref()
    }

    /// Remaining waypoints of the current errand.
    pub fn route(&self) -> impl Iterator<Item = &Vec2> {
        self.route.iter()
    }

    fn wander(&mut self, ctx: &DriverContext<'_>, rng: &mut StdRng) -> Command {
        let (Some(walker), Some(graph)) = (self.walker.as_mut(), ctx.arena.nav()) else {
            return Command::idle();
        };
        let next = walker.step(graph, ctx.state.position, ctx.speed, ctx.dt, rng);
        Command::move_to(next, ActionCode::None)
    }

    fn run_errand(&mut self, ctx: &DriverContext<'_>) -> Command {
        let position = ctx.state.position;
        let Some(errand) = next_errand(ctx.state, ctx.arena) else {
            self.route.clear();
            self.errand = None;
            return Command::move_to(position, ActionCode::None);
        };

        let stale = self
            .errand
            .is_none_or(|current| current.target.distance(&errand.target) > REPLAN_TOLERANCE);
        if stale || self.route.is_empty() {
            self.route = match ctx.arena.nav() {
                Some(graph) => graph.waypoints_towards(position, errand.target).into(),
                None => VecDeque::from([errand.target]),
            };
            trace!("planned {} waypoints to {:?}", self.route.len(), errand.target);
            self.errand = Some(errand);
        }

        while let Some(next) = self.route.front() {
            if next.distance(&position) > self.arrival_threshold {
                break;
            }
            self.route.pop_front();
        }

        match self.route.front() {
            Some(next) => {
                let step = position.move_towards(*next, ctx.speed * ctx.dt);
                Command::move_to(step, ActionCode::None)
            }
            None => {
                debug!("errand complete at {:?}, issuing {:?}", position, errand.action);
                self.errand = None;
                Command::move_to(position, errand.action)
            }
        }
    }
}

/// Where the actor should go next: the matching zone while carrying,
/// otherwise the nearest free goal item or ready shelf.
fn next_errand(state: &ActorState, arena: &Arena) -> Option<Errand> {
    if state.carry.is_carrying() {
        return arena.zone(state.task.instruction()).map(|zone| Errand {
            target: zone.position,
            action: ActionCode::Place,
        });
    }
    arena
        .nearest_available_goal(state.position)
        .map(|item| item.position)
        .or_else(|| arena.nearest_ready_node(state.position).map(|n| n.position))
        .map(|target| Errand {
            target,
            action: ActionCode::Pick,
        })
}

impl IntentSource for ScriptedDriver {
    fn name(&self) -> &str {
        match self.mode {
            RouteMode::Wander { .. } => "scripted-wander",
            RouteMode::Errand => "scripted-errand",
        }
    }

    fn spawn_point(&self, arena: &Arena) -> Option<Vec2> {
        match self.mode {
            RouteMode::Wander { start } => arena.nav().and_then(|graph| graph.position(start)),
            RouteMode::Errand => None,
        }
    }

    fn on_episode_begin(&mut self, _state: &ActorState, arena: &Arena, rng: &mut StdRng) {
        self.route.clear();
        self.errand = None;
        if let (Some(walker), Some(graph)) = (self.walker.as_mut(), arena.nav()) {
            walker.reset(graph, rng);
        }
    }

    fn decide(&mut self, ctx: &DriverContext<'_>, rng: &mut StdRng) -> Command {
        match self.mode {
            RouteMode::Wander { .. } => self.wander(ctx, rng),
            RouteMode::Errand => self.run_errand(ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Movement;
    use crate::infra::{Bounds, NavGraph};
    use crate::state::{ActorId, Collect, Instruction, TaskAssignment};
    use rand::SeedableRng;
    use std::sync::Arc;

    fn arena_with_graph() -> Arena {
        let mut arena = Arena::new(Vec2::new(0.0, 1.0), Bounds::new(-1.0, 1.0, -1.0, 1.0));
        let graph = NavGraph::from_edges(
            &[Vec2::new(0.0, 0.0), Vec2::new(0.0, 2.0), Vec2::new(2.0, 2.0)],
            &[(0, 1), (1, 0), (1, 2), (2, 1)],
        )
        .unwrap();
        arena.set_nav_graph(Arc::new(graph));
        arena.add_zone(Instruction::Delivery, Vec2::new(2.0, 2.0), 0.5);
        arena
    }

    #[test]
    fn errand_routes_through_graph_and_places_on_arrival() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut arena = arena_with_graph();
        let node = arena
            .add_resource_node(Vec2::new(0.0, 0.0), 5.0, 5.0, true, &mut rng)
            .unwrap();
        let mut state = ActorState::new(ActorId(0), "errand", Vec2::ZERO, &mut rng);
        state.task = TaskAssignment::fixed(Instruction::Delivery);
        let Collect::Collected(item) =
            arena.collect_from_node(node, ActorId(0), Vec2::ZERO, &mut rng)
        else {
            panic!("expected collection");
        };
        state.carry.pick(item);

        let mut driver = ScriptedDriver::new(RouteMode::Errand, 0.05);
        driver.on_episode_begin(&state, &arena, &mut rng);

        let mut issued = ActionCode::None;
        for _ in 0..200 {
            let ctx = DriverContext {
                state: &state,
                arena: &arena,
                dt: 0.1,
                speed: 1.0,
            };
            let command = driver.decide(&ctx, &mut rng);
            if let Movement::Position(next) = command.movement {
                state.position = next;
            }
            if command.action != ActionCode::None {
                issued = command.action;
                break;
            }
        }
        assert_eq!(issued, ActionCode::Place);
        assert!(state.position.distance(&Vec2::new(2.0, 2.0)) <= 0.05);
    }

    #[test]
    fn wander_spawns_on_start_node() {
        let arena = arena_with_graph();
        let driver = ScriptedDriver::new(RouteMode::Wander { start: NodeId(2) }, 0.1);
        assert_eq!(driver.spawn_point(&arena), Some(Vec2::new(2.0, 2.0)));
    }
}
