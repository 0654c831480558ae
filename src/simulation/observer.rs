use tracing::{debug, info};

use crate::controller::{ActorController, EpisodeOutcome};
use crate::infra::SimTime;
use crate::simulation::RunSummary;
use crate::state::{Arena, ArenaEvent};

/// Hooks for watching a simulation run. Every method defaults to a no-op.
pub trait SimObserver {
    /// Called once before the first tick
    fn on_run_start(&mut self, arena: &Arena, actors: &[ActorController]) {
        let _ = (arena, actors);
    }

    /// Called for every deferred arena event as it fires
    fn on_arena_event(&mut self, event: ArenaEvent, now: SimTime) {
        let _ = (event, now);
    }

    /// Called after an actor's episode closed, before it is reset
    fn on_episode_end(&mut self, actor: &ActorController, outcome: EpisodeOutcome, episode: u64) {
        let _ = (actor, outcome, episode);
    }

    /// Called when the run stops
    fn on_run_finished(&mut self, summary: &RunSummary) {
        let _ = summary;
    }
}

pub struct LoggingObserver;

impl SimObserver for LoggingObserver {
    fn on_run_start(&mut self, arena: &Arena, actors: &[ActorController]) {
        info!("Simulation started");
        info!("- zones: {}", arena.zones().len());
        info!("- shelf tiles: {}", arena.nodes().len());
        info!("- walls: {}", arena.obstacles().len());
        for actor in actors {
            info!("- actor {} ({})", actor.name(), actor.driver_name());
        }
    }

    fn on_arena_event(&mut self, event: ArenaEvent, now: SimTime) {
        debug!("t={:.2}: {:?}", now, event);
    }

    fn on_episode_end(&mut self, actor: &ActorController, outcome: EpisodeOutcome, episode: u64) {
        debug!(
            "{} finished episode {} with {:?}",
            actor.name(),
            episode,
            outcome
        );
    }

    fn on_run_finished(&mut self, summary: &RunSummary) {
        info!(
            "Simulation finished after {} ticks ({:.1}s simulated), {} episodes",
            summary.ticks, summary.sim_time, summary.episodes
        );
        let mut outcomes: Vec<_> = summary.outcomes.iter().collect();
        outcomes.sort_by_key(|(outcome, _)| format!("{:?}", outcome));
        for (outcome, count) in outcomes {
            info!("- {:?}: {}", outcome, count);
        }
    }
}

pub struct CompositeObserver {
    observers: Vec<Box<dyn SimObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Box<dyn SimObserver>>) -> Self {
        Self { observers }
    }
}

impl SimObserver for CompositeObserver {
    fn on_run_start(&mut self, arena: &Arena, actors: &[ActorController]) {
        for observer in &mut self.observers {
            observer.on_run_start(arena, actors);
        }
    }

    fn on_arena_event(&mut self, event: ArenaEvent, now: SimTime) {
        for observer in &mut self.observers {
            observer.on_arena_event(event, now);
        }
    }

    fn on_episode_end(&mut self, actor: &ActorController, outcome: EpisodeOutcome, episode: u64) {
        for observer in &mut self.observers {
            observer.on_episode_end(actor, outcome, episode);
        }
    }

    fn on_run_finished(&mut self, summary: &RunSummary) {
        for observer in &mut self.observers {
            observer.on_run_finished(summary);
        }
    }
}
