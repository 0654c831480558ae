use std::collections::HashMap;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;

use warehouse_sim::controller::{
    ActorController, CollisionEvent, Command, ControllerSettings, EpisodeOutcome, RewardProfile,
};
use warehouse_sim::infra::{Bounds, RecordingSink, Telemetry, TelemetrySink, Vec2};
use warehouse_sim::planners::{DriverContext, IntentSource};
use warehouse_sim::simulation::{LoggingObserver, RunLimits};
use warehouse_sim::state::{ActorId, Arena, ArenaEvent, Collect, Instruction, Owner};
use warehouse_sim::SimConfig;

struct Idle;

impl IntentSource for Idle {
    fn name(&self) -> &str {
        "idle"
    }

    fn decide(&mut self, _ctx: &DriverContext<'_>, _rng: &mut StdRng) -> Command {
        Command::idle()
    }
}

fn warehouse() -> Arena {
    let mut arena = Arena::new(Vec2::new(0.0, 1.0), Bounds::new(-1.5, 1.5, -1.5, 1.5));
    arena.add_zone(Instruction::Sorting, Vec2::new(-4.0, 3.0), 1.0);
    arena.add_zone(Instruction::Stacking, Vec2::new(0.0, 4.0), 1.0);
    arena.add_zone(Instruction::Delivery, Vec2::new(4.0, 3.0), 1.0);
    arena
}

#[test]
fn deliveries_resample_every_instruction() {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut arena = warehouse();
    let goal = arena.add_goal_item(Vec2::new(3.0, 0.0), Bounds::new(3.0, 3.0, -1.5, 1.5));
    let mut actor = ActorController::new(
        ActorId(0),
        "sampler",
        Vec2::ZERO,
        RewardProfile::goal_task(),
        Box::new(Idle),
        Telemetry::disabled(),
        ControllerSettings::default(),
        &mut rng,
    );

    let episodes = 1200;
    let mut counts: HashMap<Instruction, usize> = HashMap::new();
    for _ in 0..episodes {
        actor.begin_episode(&mut arena, &mut rng);
        actor.on_collision(&CollisionEvent::goal(goal), &mut arena, &mut rng);
        assert!(actor.state().carry.is_carrying());
        assert_eq!(actor.state().carry.held_item(), Some(goal));

        let target = actor.state().task.instruction();
        let report = actor.on_collision(&CollisionEvent::zone(target), &mut arena, &mut rng);
        assert_eq!(report.outcome, Some(EpisodeOutcome::Delivered));
        assert!(!actor.state().carry.is_carrying());
        assert_eq!(actor.state().carry.held_item(), None);

        *counts.entry(actor.state().task.instruction()).or_default() += 1;
        actor.end_episode(&mut arena, &mut rng);
    }

    for instruction in Instruction::ALL {
        let share = counts.get(&instruction).copied().unwrap_or(0) as f64 / episodes as f64;
        assert!(
            (0.25..0.42).contains(&share),
            "{} drawn with share {:.3}",
            instruction,
            share
        );
    }
}

#[test]
fn shelves_regenerate_within_their_window() {
    let dt = 0.01;
    for seed in 0..40 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut arena = warehouse();
        let node = arena
            .add_resource_node(Vec2::new(0.0, -3.0), 6.0, 25.0, true, &mut rng)
            .unwrap();
        assert!(matches!(
            arena.collect_from_node(node, ActorId(0), Vec2::new(0.0, -3.0), &mut rng),
            Collect::Collected(_)
        ));

        let mut ready_at = None;
        while arena.now() <= 26.0 {
            let events = arena.advance(dt, &mut rng);
            let is_ready = arena.node(node).unwrap().is_ready();
            if arena.now() < 6.0 {
                assert!(!is_ready, "seed {} ready early at {}", seed, arena.now());
            }
            if is_ready {
                assert!(events.contains(&ArenaEvent::NodeReady(node)));
                ready_at = Some(arena.now());
                break;
            }
        }
        let ready_at = ready_at.expect("shelf never regenerated");
        assert!((6.0..=25.0 + dt).contains(&ready_at), "ready at {}", ready_at);
    }
}

#[test]
fn shelf_serves_first_collector_only() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut arena = warehouse();
    let node = arena
        .add_resource_node(Vec2::new(0.0, -3.0), 6.0, 25.0, true, &mut rng)
        .unwrap();
    let at = Vec2::new(0.0, -3.0);

    let first = arena.collect_from_node(node, ActorId(0), at, &mut rng);
    let second = arena.collect_from_node(node, ActorId(1), at, &mut rng);
    assert!(matches!(first, Collect::Collected(_)));
    assert_eq!(second, Collect::NotReady);
}

fn shelf_worker(id: usize, rng: &mut StdRng) -> ActorController {
    ActorController::new(
        ActorId(id),
        format!("worker-{}", id),
        Vec2::new(0.0, -3.0),
        RewardProfile::resource_task(1000),
        Box::new(Idle),
        Telemetry::disabled(),
        ControllerSettings::default(),
        rng,
    )
}

#[test]
fn regenerated_shelf_serves_a_second_carrier() {
    let mut rng = StdRng::seed_from_u64(31);
    let mut arena = warehouse();
    let node = arena
        .add_resource_node(Vec2::new(0.0, -3.0), 1.0, 1.0, true, &mut rng)
        .unwrap();
    let mut first = shelf_worker(0, &mut rng);
    let mut second = shelf_worker(1, &mut rng);
    first.set_instruction(Instruction::Sorting);
    second.set_instruction(Instruction::Delivery);

    first.on_collision(&CollisionEvent::shelf(node), &mut arena, &mut rng);
    arena.advance(2.0, &mut rng);
    assert!(arena.node(node).unwrap().is_ready());
    second.on_collision(&CollisionEvent::shelf(node), &mut arena, &mut rng);

    let a = first.state().carry.held_item().unwrap();
    let b = second.state().carry.held_item().unwrap();
    assert_ne!(a, b);
    assert_eq!(arena.item(a).unwrap().owner(), Owner::Actor(ActorId(0)));
    assert_eq!(arena.item(b).unwrap().owner(), Owner::Actor(ActorId(1)));

    let report = first.on_collision(&CollisionEvent::zone(Instruction::Sorting), &mut arena, &mut rng);
    assert_eq!(report.reward, 8.0);
    assert!(!first.state().carry.is_carrying());
    assert_eq!(arena.item(a).unwrap().owner(), Owner::Arena);
    assert_eq!(second.state().carry.held_item(), Some(b));
    assert_eq!(arena.item(b).unwrap().owner(), Owner::Actor(ActorId(1)));
}

const SMALL_RUN: &str = r#"
[simulation]
seed = 11
dt = 0.05

[shelves]
start_ready = true

[[actors]]
name = "runner"
kind = "scripted"
route = { mode = "errand" }
spawn = { x = 0.0, y = -1.0 }
controller = { speed = 2.0, max_episode_steps = 200 }

[[actors]]
name = "walker"
kind = "scripted"
route = { mode = "wander", start = 0 }
controller = { speed = 1.5, max_episode_steps = 150 }

[[actors]]
name = "learner"
kind = "learning"
controller = { max_episode_steps = 120 }
"#;

#[test]
fn configured_run_reports_every_episode() {
    let config = SimConfig::from_toml_str(SMALL_RUN).unwrap();
    let recorder = Arc::new(RecordingSink::new());
    let sink: Arc<dyn TelemetrySink> = recorder.clone();
    let mut sim = config
        .build_simulation(Some(sink), Box::new(LoggingObserver))
        .unwrap();

    let summary = sim.run(RunLimits {
        max_ticks: Some(5_000),
        episodes: Some(6),
    });

    assert!(summary.episodes >= 6);
    assert!(summary.ticks <= 5_000);
    assert_eq!(recorder.episode_ends().len() as u64, summary.episodes);
    assert_eq!(summary.outcomes.values().sum::<u64>(), summary.episodes);
    assert_eq!(
        sim.completed_episodes().iter().sum::<u64>(),
        summary.episodes
    );
}

#[test]
fn identical_seeds_replay_identically() {
    let config = SimConfig::from_toml_str(SMALL_RUN).unwrap();
    let limits = RunLimits {
        max_ticks: Some(1_500),
        episodes: None,
    };

    let run = |config: &SimConfig| {
        let mut sim = config
            .build_simulation(None, Box::new(LoggingObserver))
            .unwrap();
        let summary = sim.run(limits);
        let positions: Vec<Vec2> = sim.actors().iter().map(|a| a.state().position).collect();
        (summary, positions)
    };

    assert_eq!(run(&config), run(&config));
}
