use std::collections::{HashMap, HashSet, VecDeque};

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GraphError;
use crate::infra::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone)]
pub struct NavNode {
    pub position: Vec2,
    /// Outgoing edges. Traversal never assumes the reverse edge exists.
    pub neighbors: Vec<NodeId>,
}

/// Static waypoint graph shared read-only by scripted actors.
#[derive(Debug, Clone, Default)]
pub struct NavGraph {
    nodes: Vec<NavNode>,
}

impl NavGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, position: Vec2) -> NodeId {
        self.nodes.push(NavNode {
            position,
            neighbors: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Adds a directed edge `from -> to`.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.check(to)?;
        let node = self
            .nodes
            .get_mut(from.0)
            .ok_or(GraphError::UnknownNode(from))?;
        if !node.neighbors.contains(&to) {
            node.neighbors.push(to);
        }
        Ok(())
    }

    /// Adds edges in both directions.
    pub fn link(&mut self, a: NodeId, b: NodeId) -> Result<(), GraphError> {
        self.connect(a, b)?;
        self.connect(b, a)
    }

    /// Builds a graph from positions and a directed edge list.
    pub fn from_edges(positions: &[Vec2], edges: &[(usize, usize)]) -> Result<Self, GraphError> {
        let mut graph = NavGraph::new();
        for &p in positions {
            graph.add_node(p);
        }
        for &(from, to) in edges {
            graph.connect(NodeId(from), NodeId(to))?;
        }
        Ok(graph)
    }

    fn check(&self, id: NodeId) -> Result<(), GraphError> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(GraphError::UnknownNode(id))
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&NavNode> {
        self.nodes.get(id.0)
    }

    pub fn position(&self, id: NodeId) -> Option<Vec2> {
        self.nodes.get(id.0).map(|n| n.position)
    }

    pub fn neighbors(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.neighbors.as_slice())
            .unwrap_or(&[])
    }

    /// Uniformly random neighbor; `None` at a dead-end.
    pub fn random_neighbor<R: Rng + ?Sized>(&self, id: NodeId, rng: &mut R) -> Option<NodeId> {
        self.neighbors(id).choose(rng).copied()
    }

    pub fn nearest_node(&self, pos: Vec2) -> Option<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.position
                    .distance(&pos)
                    .total_cmp(&b.position.distance(&pos))
            })
            .map(|(i, _)| NodeId(i))
    }

    /// Fewest-hop path from `start` to `goal`, both included.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn route(&self, start: NodeId, goal: NodeId) -> Option<Vec<NodeId>> {
        self.check(start).ok()?;
        self.check(goal).ok()?;
        if start == goal {
            return Some(vec![start]);
        }

        let mut queue = VecDeque::new();
        let mut visited = HashSet::new();
        let mut came_from: HashMap<NodeId, NodeId> = HashMap::new();

        queue.push_back(start);
        visited.insert(start);

        while let Some(current) = queue.pop_front() {
            for &next in self.neighbors(current) {
                if !visited.insert(next) {
                    continue;
                }
                came_from.insert(next, current);
                if next == goal {
                    return Some(reconstruct(&came_from, goal));
                }
                queue.push_back(next);
            }
        }

        debug!("no route from {:?} to {:?}", start, goal);
        None
    }

    /// Waypoints for an errand: graph route between the nodes nearest to
    /// `from` and `target`, ending at `target` itself.
    pub fn waypoints_towards(&self, from: Vec2, target: Vec2) -> Vec<Vec2> {
        let route = self
            .nearest_node(from)
            .zip(self.nearest_node(target))
            .and_then(|(s, g)| self.route(s, g));

        let mut points: Vec<Vec2> = route
            .unwrap_or_default()
            .into_iter()
            .filter_map(|id| self.position(id))
            .collect();
        points.push(target);
        points
    }
}

fn reconstruct(came_from: &HashMap<NodeId, NodeId>, mut current: NodeId) -> Vec<NodeId> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

/// Random-walk traversal state for one scripted actor.
#[derive(Debug, Clone)]
pub struct NavWalker {
    start: NodeId,
    current: NodeId,
    target: Option<NodeId>,
    arrival_threshold: f32,
}

impl NavWalker {
    pub fn new(start: NodeId, arrival_threshold: f32) -> Self {
        Self {
            start,
            current: start,
            target: None,
            arrival_threshold,
        }
    }

    pub fn current(&self) -> NodeId {
        self.current
    }

    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    pub fn is_halted(&self) -> bool {
        self.target.is_none()
    }

    /// Returns to the start node and picks a fresh target.
    pub fn reset<R: Rng + ?Sized>(&mut self, graph: &NavGraph, rng: &mut R) {
        self.current = self.start;
        self.target = graph.random_neighbor(self.current, rng);
    }

    /// Advances `position` toward the target by `speed * dt` and re-targets on
    /// arrival. Returns the new position; a halted walker leaves it untouched.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        graph: &NavGraph,
        position: Vec2,
        speed: f32,
        dt: f32,
        rng: &mut R,
    ) -> Vec2 {
        let Some(target) = self.target else {
            return position;
        };
        let Some(target_pos) = graph.position(target) else {
            self.target = None;
            return position;
        };

        let next = position.move_towards(target_pos, speed * dt);
        if next.distance(&target_pos) < self.arrival_threshold {
            self.current = target;
            self.target = graph.random_neighbor(self.current, rng);
            if self.target.is_none() {
                debug!("reached dead-end node {:?}, halting", self.current);
            }
        }
        next
    }
}
