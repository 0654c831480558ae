//! Single-threaded harness that owns the arena and every controller.
//!
//! One tick is: fire due arena events, step each actor in order (movement,
//! actions, then overlap events from the probe), and finally close and
//! restart every episode that ended during the tick.

mod observer;
mod probe;

use std::collections::HashMap;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::controller::{ActorController, EpisodeOutcome, TickReport};
use crate::infra::SimTime;
use crate::state::{ActorId, Arena};

pub use observer::{CompositeObserver, LoggingObserver, SimObserver};
pub use probe::ProximityProbe;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessSettings {
    /// Simulated seconds per tick.
    pub dt: f64,
    /// Contact radius used by the proximity probe.
    pub actor_radius: f32,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            dt: 0.02,
            actor_radius: 0.5,
        }
    }
}

/// When a run should stop. Whichever limit is hit first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunLimits {
    pub max_ticks: Option<u64>,
    pub episodes: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub sim_time: SimTime,
    pub episodes: u64,
    pub outcomes: HashMap<EpisodeOutcome, u64>,
}

pub struct Simulation {
    arena: Arena,
    actors: Vec<ActorController>,
    probe: ProximityProbe,
    rng: StdRng,
    settings: HarnessSettings,
    observer: Box<dyn SimObserver>,
    ticks: u64,
    episodes: Vec<u64>,
    summary: RunSummary,
    started: bool,
}

impl Simulation {
    pub fn new(
        arena: Arena,
        actors: Vec<ActorController>,
        settings: HarnessSettings,
        rng: StdRng,
        observer: Box<dyn SimObserver>,
    ) -> Self {
        let episodes = vec![0; actors.len()];
        Self {
            arena,
            actors,
            probe: ProximityProbe::new(settings.actor_radius),
            rng,
            settings,
            observer,
            ticks: 0,
            episodes,
            summary: RunSummary::default(),
            started: false,
        }
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn actors(&self) -> &[ActorController] {
        &self.actors
    }

    pub fn actor(&self, id: ActorId) -> Option<&ActorController> {
        self.actors.iter().find(|a| a.id() == id)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Completed episodes per actor, in actor order.
    pub fn completed_episodes(&self) -> &[u64] {
        &self.episodes
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Begins the first episode of every actor. Idempotent.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        for actor in &mut self.actors {
            actor.begin_episode(&mut self.arena, &mut self.rng);
            self.probe.forget(actor.id());
        }
        self.observer.on_run_start(&self.arena, &self.actors);
    }

    /// Advances the world by one tick and returns each actor's report.
    #[tracing::instrument(level = "trace", skip(self), fields(tick = self.ticks))]
    pub fn step(&mut self) -> Vec<TickReport> {
        self.start();
        let dt = self.settings.dt;

        for event in self.arena.advance(dt, &mut self.rng) {
            self.observer.on_arena_event(event, self.arena.now());
        }

        let mut reports = Vec::with_capacity(self.actors.len());
        for actor in &mut self.actors {
            let mut report = actor.tick(&mut self.arena, dt, &mut self.rng);
            if !actor.is_done() {
                let contacts =
                    self.probe
                        .contacts(actor.id(), actor.state().position, &self.arena);
                for contact in &contacts {
                    trace!("{} touched {:?}", actor.name(), contact.tag);
                    report.merge(actor.on_collision(contact, &mut self.arena, &mut self.rng));
                }
            }
            reports.push(report);
        }

        // Resets happen only after every actor has been stepped
        for (index, actor) in self.actors.iter_mut().enumerate() {
            if !actor.is_done() {
                continue;
            }
            let outcome = actor.end_episode(&mut self.arena, &mut self.rng);
            self.episodes[index] += 1;
            self.summary.episodes += 1;
            *self.summary.outcomes.entry(outcome).or_insert(0) += 1;
            self.observer
                .on_episode_end(actor, outcome, self.episodes[index]);

            actor.begin_episode(&mut self.arena, &mut self.rng);
            self.probe.forget(actor.id());
        }

        self.ticks += 1;
        self.summary.ticks = self.ticks;
        self.summary.sim_time = self.arena.now();
        reports
    }

    /// Steps until a limit is reached. With no limits at all, runs a single
    /// tick rather than forever.
    pub fn run(&mut self, limits: RunLimits) -> RunSummary {
        self.start();
        loop {
            self.step();
            let ticks_done = limits.max_ticks.is_some_and(|max| self.ticks >= max);
            let episodes_done = limits
                .episodes
                .is_some_and(|target| self.summary.episodes >= target);
            if ticks_done || episodes_done || (limits.max_ticks.is_none() && limits.episodes.is_none()) {
                break;
            }
        }
        debug!("run stopped at tick {}", self.ticks);
        self.observer.on_run_finished(&self.summary);
        self.summary.clone()
    }
}
