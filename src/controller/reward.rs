use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::infra::Telemetry;
use crate::state::PenaltyTimers;

/// Default episode step budget used to normalize the long-horizon presets.
pub const DEFAULT_STEP_BUDGET: u64 = 200_000;

/// What happens when an actor tries to collect from a shelf that is not ready.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum PrematureAccess {
    Ignore { penalty: f32 },
    Terminal { penalty: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceShaping {
    pub divisor: f32,
    /// Flat bonus when the distance strictly shrank this tick.
    pub closer_bonus: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodicPenalty {
    pub interval: f64,
    pub penalty: f32,
}

/// Placing while carrying but outside the matching zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MisplaceRule {
    pub penalty: f32,
    pub ends_episode: bool,
    /// Let go of the item without ending the episode.
    pub drops_item: bool,
}

/// Reward constants for one actor variant. Normalization by the step budget
/// is already folded into the values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardProfile {
    pub pickup: f32,
    pub resource_pickup: f32,
    pub delivery: f32,
    pub delivery_ends_episode: bool,
    pub wrong_zone: f32,
    pub wrong_zone_ends_episode: bool,
    pub misplace: Option<MisplaceRule>,
    pub wall: f32,
    pub premature: PrematureAccess,
    pub timeout: f32,
    pub step: f32,
    pub motion: f32,
    pub distance: Option<DistanceShaping>,
    pub heading_scale: f32,
    pub hold: Option<PeriodicPenalty>,
    pub stationary: Option<PeriodicPenalty>,
    /// Report the reward accumulated since the last delivery on every
    /// delivery that does not end the episode, then start a new tally.
    pub report_deliveries: bool,
    /// Scatter the arena's fixed walls when an episode begins. The walls are
    /// shared, so this suits an arena with a single actor.
    pub randomize_obstacles_on_reset: bool,
}

impl RewardProfile {
    /// Single fixed goal object, delivered once per episode.
    pub fn goal_task() -> Self {
        Self {
            pickup: 1.0,
            resource_pickup: 1.0,
            delivery: 1.0,
            delivery_ends_episode: true,
            wrong_zone: -1.0,
            wrong_zone_ends_episode: true,
            misplace: Some(MisplaceRule {
                penalty: -0.5,
                ends_episode: true,
                drops_item: false,
            }),
            wall: -1.0,
            premature: PrematureAccess::Ignore { penalty: 0.0 },
            timeout: 0.0,
            step: 0.0,
            motion: 0.0,
            distance: Some(DistanceShaping {
                divisor: 100.0,
                closer_bonus: 0.1,
            }),
            heading_scale: 0.0,
            hold: None,
            stationary: None,
            report_deliveries: false,
            randomize_obstacles_on_reset: true,
        }
    }

    /// Learning actor collecting overlays from shelves indefinitely.
    pub fn resource_task(step_budget: u64) -> Self {
        let n = budget(step_budget);
        Self {
            pickup: 5.0,
            resource_pickup: 5.0,
            delivery: 8.0,
            delivery_ends_episode: false,
            wrong_zone: -2.0 / n,
            wrong_zone_ends_episode: false,
            misplace: None,
            wall: -2.0 / n,
            premature: PrematureAccess::Terminal { penalty: -1.5 / n },
            timeout: 0.0,
            step: -0.01 / n,
            motion: 0.0,
            distance: None,
            heading_scale: 0.1 / n,
            hold: Some(PeriodicPenalty {
                interval: 5.0,
                penalty: -0.5 / n,
            }),
            stationary: Some(PeriodicPenalty {
                interval: 10.0,
                penalty: -0.5 / n,
            }),
            report_deliveries: false,
            randomize_obstacles_on_reset: false,
        }
    }

    /// Scripted wanderer walking the waypoint graph.
    pub fn resource_patrol(step_budget: u64) -> Self {
        let n = budget(step_budget);
        Self {
            pickup: 5.0,
            resource_pickup: 5.0,
            delivery: 8.0,
            delivery_ends_episode: false,
            wrong_zone: 0.0,
            wrong_zone_ends_episode: false,
            misplace: None,
            wall: -2.0 / n,
            premature: PrematureAccess::Ignore { penalty: -0.2 / n },
            timeout: 0.0,
            step: 0.0,
            motion: 0.1,
            distance: None,
            heading_scale: 0.0,
            hold: Some(PeriodicPenalty {
                interval: 5.0,
                penalty: -0.5 / n,
            }),
            stationary: None,
            report_deliveries: true,
            randomize_obstacles_on_reset: false,
        }
    }

    /// Human-driven actor: no shaping, placing outside a zone drops the item.
    pub fn resource_player() -> Self {
        Self {
            pickup: 0.0,
            resource_pickup: 0.0,
            delivery: 0.0,
            delivery_ends_episode: false,
            wrong_zone: 0.0,
            wrong_zone_ends_episode: false,
            misplace: Some(MisplaceRule {
                penalty: 0.0,
                ends_episode: false,
                drops_item: true,
            }),
            wall: 0.0,
            premature: PrematureAccess::Ignore { penalty: 0.0 },
            timeout: 0.0,
            step: 0.0,
            motion: 0.0,
            distance: None,
            heading_scale: 0.0,
            hold: None,
            stationary: None,
            report_deliveries: false,
            randomize_obstacles_on_reset: false,
        }
    }
}

fn budget(step_budget: u64) -> f32 {
    step_budget.max(1) as f32
}

/// Named preset, as referenced from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardPreset {
    GoalTask,
    ResourceTask,
    ResourcePatrol,
    ResourcePlayer,
}

impl RewardPreset {
    pub fn profile(&self, step_budget: u64) -> RewardProfile {
        match self {
            RewardPreset::GoalTask => RewardProfile::goal_task(),
            RewardPreset::ResourceTask => RewardProfile::resource_task(step_budget),
            RewardPreset::ResourcePatrol => RewardProfile::resource_patrol(step_budget),
            RewardPreset::ResourcePlayer => RewardProfile::resource_player(),
        }
    }
}

/// Per-tick facts the shaping terms depend on.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ShapingInput {
    pub carrying: bool,
    pub moved: bool,
    pub dt: f64,
    /// Distance to the seek target before and after this tick's movement.
    pub distance: Option<(f32, f32)>,
    /// Dot product of the intent direction and the direction to the
    /// matching zone, when carrying.
    pub heading: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RewardBreakdown {
    pub step: f32,
    pub motion: f32,
    pub distance: f32,
    pub closer: f32,
    pub heading: f32,
    pub hold: f32,
    pub stationary: f32,
}

impl RewardBreakdown {
    pub fn total(&self) -> f32 {
        self.step
            + self.motion
            + self.distance
            + self.closer
            + self.heading
            + self.hold
            + self.stationary
    }
}

/// Discrete reward triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardEvent {
    Pickup { from_resource: bool },
    Delivery,
    WrongZone,
    Misplace,
    Wall,
    PrematureAccess,
    Timeout,
}

/// Continuous shaping for one tick. Returns the breakdown and the updated
/// penalty timers.
pub fn shape_tick(
    profile: &RewardProfile,
    timers: PenaltyTimers,
    input: &ShapingInput,
) -> (RewardBreakdown, PenaltyTimers) {
    let mut out = RewardBreakdown {
        step: profile.step,
        ..Default::default()
    };
    let mut timers = timers;

    if input.moved {
        out.motion = profile.motion;
    }

    if !input.carrying {
        if let (Some(shaping), Some((before, after))) = (profile.distance, input.distance) {
            out.distance = -after / shaping.divisor;
            if after < before {
                out.closer = shaping.closer_bonus;
            }
        }
    } else if let Some(dot) = input.heading {
        out.heading = dot * profile.heading_scale;
    }

    if input.carrying {
        if let Some(hold) = profile.hold {
            timers.hold += input.dt;
            if timers.hold >= hold.interval {
                out.hold = hold.penalty;
                timers.hold = 0.0;
                trace!("hold penalty applied");
            }
        }
    }

    if !input.carrying && !input.moved {
        if let Some(stationary) = profile.stationary {
            timers.stationary += input.dt;
            if timers.stationary >= stationary.interval {
                out.stationary = stationary.penalty;
                timers.stationary = 0.0;
                trace!("stationary penalty applied");
            }
        }
    } else {
        timers.stationary = 0.0;
    }

    (out, timers)
}

pub fn terminal_reward(profile: &RewardProfile, event: RewardEvent) -> f32 {
    match event {
        RewardEvent::Pickup { from_resource: true } => profile.resource_pickup,
        RewardEvent::Pickup { from_resource: false } => profile.pickup,
        RewardEvent::Delivery => profile.delivery,
        RewardEvent::WrongZone => profile.wrong_zone,
        RewardEvent::Misplace => profile.misplace.map(|m| m.penalty).unwrap_or(0.0),
        RewardEvent::Wall => profile.wall,
        RewardEvent::PrematureAccess => match profile.premature {
            PrematureAccess::Ignore { penalty } | PrematureAccess::Terminal { penalty } => penalty,
        },
        RewardEvent::Timeout => profile.timeout,
    }
}

/// Reward functions bound to a profile, plus the telemetry hook.
#[derive(Clone)]
pub struct RewardShaper {
    profile: RewardProfile,
    telemetry: Telemetry,
}

impl RewardShaper {
    pub fn new(profile: RewardProfile, telemetry: Telemetry) -> Self {
        Self { profile, telemetry }
    }

    pub fn profile(&self) -> &RewardProfile {
        &self.profile
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn shape(&self, timers: PenaltyTimers, input: &ShapingInput) -> (RewardBreakdown, PenaltyTimers) {
        shape_tick(&self.profile, timers, input)
    }

    pub fn terminal(&self, event: RewardEvent) -> f32 {
        terminal_reward(&self.profile, event)
    }

    /// Forwards a nonzero contribution to the telemetry sink.
    pub fn emit(&self, reward: f32, actor: &str) {
        if reward != 0.0 {
            self.telemetry.reward(reward, actor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::RecordingSink;
    use std::sync::Arc;

    #[test]
    fn closer_bonus_and_distance_penalty_combine() {
        let profile = RewardProfile::goal_task();
        let input = ShapingInput {
            carrying: false,
            moved: true,
            dt: 0.02,
            distance: Some((5.0, 4.5)),
            heading: None,
        };
        let (out, _) = shape_tick(&profile, PenaltyTimers::default(), &input);
        assert!((out.distance + 0.045).abs() < 1e-6);
        assert!((out.closer - 0.1).abs() < 1e-6);
        assert!((out.total() - 0.055).abs() < 1e-6);
    }

    #[test]
    fn no_bonus_when_distance_grows() {
        let profile = RewardProfile::goal_task();
        let input = ShapingInput {
            distance: Some((4.0, 4.2)),
            moved: true,
            ..Default::default()
        };
        let (out, _) = shape_tick(&profile, PenaltyTimers::default(), &input);
        assert_eq!(out.closer, 0.0);
        assert!(out.total() < 0.0);
    }

    #[test]
    fn heading_term_scales_with_alignment_while_carrying() {
        let profile = RewardProfile::resource_task(1000);
        let carrying = |heading| ShapingInput {
            carrying: true,
            moved: true,
            dt: 0.02,
            distance: None,
            heading: Some(heading),
        };

        let (toward, _) = shape_tick(&profile, PenaltyTimers::default(), &carrying(1.0));
        let (sideways, _) = shape_tick(&profile, PenaltyTimers::default(), &carrying(0.0));
        let (away, _) = shape_tick(&profile, PenaltyTimers::default(), &carrying(-0.5));
        assert!((toward.heading - 0.0001).abs() < 1e-10);
        assert_eq!(sideways.heading, 0.0);
        assert!((away.heading + 0.00005).abs() < 1e-10);
        assert!((toward.total() - (0.0001 - 0.00001)).abs() < 1e-10);

        // Ignored while seeking
        let seeking = ShapingInput {
            carrying: false,
            ..carrying(1.0)
        };
        let (out, _) = shape_tick(&profile, PenaltyTimers::default(), &seeking);
        assert_eq!(out.heading, 0.0);
    }

    #[test]
    fn hold_penalty_fires_every_interval() {
        let profile = RewardProfile::resource_task(DEFAULT_STEP_BUDGET);
        let input = ShapingInput {
            carrying: true,
            moved: true,
            dt: 1.0,
            ..Default::default()
        };
        let mut timers = PenaltyTimers::default();
        let mut fired = 0;
        for _ in 0..12 {
            let (out, next) = shape_tick(&profile, timers, &input);
            timers = next;
            if out.hold != 0.0 {
                fired += 1;
            }
        }
        assert_eq!(fired, 2);
        assert_eq!(timers.hold, 2.0);
    }

    #[test]
    fn movement_resets_stationary_timer() {
        let profile = RewardProfile::resource_task(DEFAULT_STEP_BUDGET);
        let idle = ShapingInput {
            dt: 4.0,
            ..Default::default()
        };
        let moving = ShapingInput {
            moved: true,
            dt: 4.0,
            ..Default::default()
        };

        let (_, timers) = shape_tick(&profile, PenaltyTimers::default(), &idle);
        let (_, timers) = shape_tick(&profile, timers, &idle);
        assert_eq!(timers.stationary, 8.0);
        let (_, timers) = shape_tick(&profile, timers, &moving);
        assert_eq!(timers.stationary, 0.0);

        let (_, timers) = shape_tick(&profile, timers, &idle);
        let (_, timers) = shape_tick(&profile, timers, &idle);
        let (out, timers) = shape_tick(&profile, timers, &idle);
        assert!((out.stationary + 0.5 / 200_000.0).abs() < 1e-12);
        assert_eq!(timers.stationary, 0.0);
    }

    #[test]
    fn presets_fold_normalization_per_variant() {
        let task = RewardProfile::resource_task(1000);
        assert!((task.wall + 0.002).abs() < 1e-9);
        assert_eq!(task.delivery, 8.0);
        assert_eq!(
            task.premature,
            PrematureAccess::Terminal { penalty: -0.0015 }
        );

        let patrol = RewardProfile::resource_patrol(1000);
        assert_eq!(patrol.wrong_zone, 0.0);
        assert!(matches!(patrol.premature, PrematureAccess::Ignore { .. }));

        assert_eq!(
            terminal_reward(&RewardProfile::goal_task(), RewardEvent::WrongZone),
            -1.0
        );
        assert_eq!(RewardPreset::ResourcePlayer.profile(10), RewardProfile::resource_player());
        assert!(patrol.report_deliveries);
        assert!(!task.report_deliveries);
        assert!((terminal_reward(&patrol, RewardEvent::PrematureAccess) + 0.0002).abs() < 1e-9);
        assert_eq!(terminal_reward(&task, RewardEvent::Misplace), 0.0);
    }

    #[test]
    fn emit_skips_zero_contributions() {
        let sink = Arc::new(RecordingSink::new());
        let shaper = RewardShaper::new(RewardProfile::goal_task(), Telemetry::new(sink.clone()));
        shaper.emit(0.0, "agent");
        shaper.emit(-0.25, "agent");
        assert_eq!(sink.rewards_for("agent"), vec![-0.25]);
    }
}
