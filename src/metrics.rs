//! Episode statistics aggregated from reward telemetry

use std::collections::{BTreeMap, VecDeque};

use crate::controller::EpisodeOutcome;

/// Moving average calculator
#[derive(Debug, Clone)]
pub struct MovingAverage {
    values: VecDeque<f32>,
    window_size: usize,
    sum: f32,
}

impl MovingAverage {
    pub fn new(window_size: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(window_size),
            window_size: window_size.max(1),
            sum: 0.0,
        }
    }

    pub fn push(&mut self, value: f32) {
        if self.values.len() >= self.window_size {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
            }
        }
        self.values.push_back(value);
        self.sum += value;
    }

    pub fn average(&self) -> f32 {
        if self.values.is_empty() {
            0.0
        } else {
            self.sum / self.values.len() as f32
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Per-actor episode statistics
#[derive(Debug, Clone)]
pub struct ActorMetrics {
    pub episode_rewards: MovingAverage,
    pub episode_lengths: MovingAverage,
    pub success_rate: MovingAverage,
    /// Reward tallies reported at deliveries that kept the episode going
    pub delivery_rewards: MovingAverage,
    pub episodes: usize,
    pub deliveries: usize,
    pub wall_hits: usize,
    pub wrong_zone: usize,
    pub timeouts: usize,
    /// Sum of per-tick reward events seen since the last episode end
    pub pending_reward: f32,
}

impl ActorMetrics {
    pub fn new(window_size: usize) -> Self {
        Self {
            episode_rewards: MovingAverage::new(window_size),
            episode_lengths: MovingAverage::new(window_size),
            success_rate: MovingAverage::new(window_size),
            delivery_rewards: MovingAverage::new(window_size),
            episodes: 0,
            deliveries: 0,
            wall_hits: 0,
            wrong_zone: 0,
            timeouts: 0,
            pending_reward: 0.0,
        }
    }
}

/// Aggregated statistics for every actor that reported telemetry
#[derive(Debug, Clone)]
pub struct EpisodeMetrics {
    window_size: usize,
    actors: BTreeMap<String, ActorMetrics>,
}

impl EpisodeMetrics {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            actors: BTreeMap::new(),
        }
    }

    fn entry(&mut self, actor: &str) -> &mut ActorMetrics {
        let window = self.window_size;
        self.actors
            .entry(actor.to_string())
            .or_insert_with(|| ActorMetrics::new(window))
    }

    pub fn record_reward(&mut self, actor: &str, reward: f32) {
        self.entry(actor).pending_reward += reward;
    }

    /// Record episode completion
    pub fn record_episode(
        &mut self,
        actor: &str,
        cumulative_reward: f32,
        steps: u64,
        outcome: EpisodeOutcome,
    ) {
        let metrics = self.entry(actor);
        metrics.episodes += 1;
        metrics.pending_reward = 0.0;
        metrics.episode_rewards.push(cumulative_reward);
        metrics.episode_lengths.push(steps as f32);
        metrics
            .success_rate
            .push(if outcome == EpisodeOutcome::Delivered { 1.0 } else { 0.0 });
        match outcome {
            EpisodeOutcome::Delivered => metrics.deliveries += 1,
            EpisodeOutcome::HitWall => metrics.wall_hits += 1,
            EpisodeOutcome::WrongZone | EpisodeOutcome::Misplaced => metrics.wrong_zone += 1,
            EpisodeOutcome::Timeout => metrics.timeouts += 1,
            EpisodeOutcome::PrematureAccess => {}
        }
    }

    /// Record a delivery inside a continuing episode
    pub fn record_delivery(&mut self, actor: &str, cumulative_reward: f32) {
        let metrics = self.entry(actor);
        metrics.deliveries += 1;
        metrics.pending_reward = 0.0;
        metrics.delivery_rewards.push(cumulative_reward);
    }

    pub fn actor(&self, actor: &str) -> Option<&ActorMetrics> {
        self.actors.get(actor)
    }

    pub fn actors(&self) -> impl Iterator<Item = (&String, &ActorMetrics)> {
        self.actors.iter()
    }

    pub fn total_episodes(&self) -> usize {
        self.actors.values().map(|m| m.episodes).sum()
    }

    /// Log a summary table
    pub fn log_summary(&self) {
        tracing::info!("=== Episode summary ===");
        for (name, m) in &self.actors {
            tracing::info!(
                "{:<12} episodes {:>5} | reward avg {:>9.4} | len avg {:>8.1} | success {:>5.1}% | deliveries {} | walls {} | wrong zone {} | timeouts {}",
                name,
                m.episodes,
                m.episode_rewards.average(),
                m.episode_lengths.average(),
                m.success_rate.average() * 100.0,
                m.deliveries,
                m.wall_hits,
                m.wrong_zone,
                m.timeouts,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moving_average() {
        let mut ma = MovingAverage::new(3);
        ma.push(1.0);
        ma.push(2.0);
        ma.push(3.0);
        assert!((ma.average() - 2.0).abs() < 1e-6);

        ma.push(4.0);
        assert!((ma.average() - 3.0).abs() < 1e-6);
        assert_eq!(ma.len(), 3);
    }

    #[test]
    fn test_episode_metrics_counts_outcomes() {
        let mut metrics = EpisodeMetrics::new(10);
        metrics.record_reward("peanut", 5.0);
        metrics.record_episode("peanut", 13.0, 40, EpisodeOutcome::Delivered);
        metrics.record_episode("peanut", -1.0, 12, EpisodeOutcome::HitWall);

        let m = metrics.actor("peanut").unwrap();
        assert_eq!(m.episodes, 2);
        assert_eq!(m.deliveries, 1);
        assert_eq!(m.wall_hits, 1);
        assert_eq!(m.pending_reward, 0.0);
        assert!((m.success_rate.average() - 0.5).abs() < 1e-6);
        assert_eq!(metrics.total_episodes(), 2);
    }

    #[test]
    fn test_delivery_reports_do_not_count_as_episodes() {
        let mut metrics = EpisodeMetrics::new(10);
        metrics.record_reward("pickle", 5.0);
        metrics.record_delivery("pickle", 13.0);
        metrics.record_delivery("pickle", 11.0);

        let m = metrics.actor("pickle").unwrap();
        assert_eq!(m.deliveries, 2);
        assert_eq!(m.episodes, 0);
        assert_eq!(m.pending_reward, 0.0);
        assert!((m.delivery_rewards.average() - 12.0).abs() < 1e-6);
    }
}
