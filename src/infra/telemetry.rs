use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info};

use crate::controller::EpisodeOutcome;

/// Scalar events emitted by actors. Serialized one-per-line by the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelemetryEvent {
    Reward {
        actor: String,
        reward: f32,
    },
    EpisodeEnd {
        actor: String,
        cumulative_reward: f32,
        outcome: EpisodeOutcome,
        steps: u64,
    },
    /// Reward tally closed by a delivery that did not end the episode.
    DeliveryReport {
        actor: String,
        cumulative_reward: f32,
        steps: u64,
    },
}

/// Receiver of reward telemetry. Calls must return promptly and never fail.
pub trait TelemetrySink: Send + Sync {
    fn record_reward(&self, reward: f32, actor: &str);

    fn record_episode_end(
        &self,
        cumulative_reward: f32,
        actor: &str,
        outcome: EpisodeOutcome,
        steps: u64,
    );

    fn record_delivery(&self, cumulative_reward: f32, actor: &str, steps: u64);
}

/// Logs every event through `tracing`.
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record_reward(&self, reward: f32, actor: &str) {
        debug!("{}/Reward {:+.6}", actor, reward);
    }

    fn record_episode_end(
        &self,
        cumulative_reward: f32,
        actor: &str,
        outcome: EpisodeOutcome,
        steps: u64,
    ) {
        info!(
            "{}/CumulativeReward {:+.4} after {} steps ({:?})",
            actor, cumulative_reward, steps, outcome
        );
    }

    fn record_delivery(&self, cumulative_reward: f32, actor: &str, steps: u64) {
        info!(
            "{}/CumulativeReward {:+.4} at delivery, step {}",
            actor, cumulative_reward, steps
        );
    }
}

/// Forwards events to a collector task without blocking the tick.
#[derive(Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<TelemetryEvent>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<TelemetryEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: TelemetryEvent) {
        // A closed collector only loses telemetry.
        let _ = self.tx.send(event);
    }
}

impl TelemetrySink for ChannelSink {
    fn record_reward(&self, reward: f32, actor: &str) {
        self.send(TelemetryEvent::Reward {
            actor: actor.to_string(),
            reward,
        });
    }

    fn record_episode_end(
        &self,
        cumulative_reward: f32,
        actor: &str,
        outcome: EpisodeOutcome,
        steps: u64,
    ) {
        self.send(TelemetryEvent::EpisodeEnd {
            actor: actor.to_string(),
            cumulative_reward,
            outcome,
            steps,
        });
    }

    fn record_delivery(&self, cumulative_reward: f32, actor: &str, steps: u64) {
        self.send(TelemetryEvent::DeliveryReport {
            actor: actor.to_string(),
            cumulative_reward,
            steps,
        });
    }
}

pub struct CompositeSink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl CompositeSink {
    pub fn new(sinks: Vec<Arc<dyn TelemetrySink>>) -> Self {
        Self { sinks }
    }
}

impl TelemetrySink for CompositeSink {
    fn record_reward(&self, reward: f32, actor: &str) {
        for sink in &self.sinks {
            sink.record_reward(reward, actor);
        }
    }

    fn record_episode_end(
        &self,
        cumulative_reward: f32,
        actor: &str,
        outcome: EpisodeOutcome,
        steps: u64,
    ) {
        for sink in &self.sinks {
            sink.record_episode_end(cumulative_reward, actor, outcome, steps);
        }
    }

    fn record_delivery(&self, cumulative_reward: f32, actor: &str, steps: u64) {
        for sink in &self.sinks {
            sink.record_delivery(cumulative_reward, actor, steps);
        }
    }
}

/// Keeps every event in memory; used by tests and the gym wrapper.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn rewards_for(&self, actor: &str) -> Vec<f32> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TelemetryEvent::Reward { actor: a, reward } if a == actor => Some(reward),
                _ => None,
            })
            .collect()
    }

    pub fn episode_ends(&self) -> Vec<(String, f32, EpisodeOutcome)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TelemetryEvent::EpisodeEnd {
                    actor,
                    cumulative_reward,
                    outcome,
                    ..
                } => Some((actor, cumulative_reward, outcome)),
                _ => None,
            })
            .collect()
    }

    pub fn delivery_reports(&self) -> Vec<(String, f32)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TelemetryEvent::DeliveryReport {
                    actor,
                    cumulative_reward,
                    ..
                } => Some((actor, cumulative_reward)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: TelemetryEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl TelemetrySink for RecordingSink {
    fn record_reward(&self, reward: f32, actor: &str) {
        self.push(TelemetryEvent::Reward {
            actor: actor.to_string(),
            reward,
        });
    }

    fn record_episode_end(
        &self,
        cumulative_reward: f32,
        actor: &str,
        outcome: EpisodeOutcome,
        steps: u64,
    ) {
        self.push(TelemetryEvent::EpisodeEnd {
            actor: actor.to_string(),
            cumulative_reward,
            outcome,
            steps,
        });
    }

    fn record_delivery(&self, cumulative_reward: f32, actor: &str, steps: u64) {
        self.push(TelemetryEvent::DeliveryReport {
            actor: actor.to_string(),
            cumulative_reward,
            steps,
        });
    }
}

/// Injected telemetry handle. A missing sink is reported once at
/// construction; afterwards every call is a no-op.
#[derive(Clone, Default)]
pub struct Telemetry {
    sink: Option<Arc<dyn TelemetrySink>>,
}

impl Telemetry {
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self { sink: Some(sink) }
    }

    pub fn from_option(sink: Option<Arc<dyn TelemetrySink>>, owner: &str) -> Self {
        if sink.is_none() {
            error!(
                "{}: no telemetry sink configured, reward telemetry is disabled",
                owner
            );
        }
        Self { sink }
    }

    /// Explicitly silent handle (no configuration error is logged).
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn reward(&self, reward: f32, actor: &str) {
        if let Some(sink) = &self.sink {
            sink.record_reward(reward, actor);
        }
    }

    pub fn episode_end(
        &self,
        cumulative_reward: f32,
        actor: &str,
        outcome: EpisodeOutcome,
        steps: u64,
    ) {
        if let Some(sink) = &self.sink {
            sink.record_episode_end(cumulative_reward, actor, outcome, steps);
        }
    }

    pub fn delivery(&self, cumulative_reward: f32, actor: &str, steps: u64) {
        if let Some(sink) = &self.sink {
            sink.record_delivery(cumulative_reward, actor, steps);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_fans_out_to_every_sink() {
        let a = Arc::new(RecordingSink::new());
        let b = Arc::new(RecordingSink::new());
        let sinks: Vec<Arc<dyn TelemetrySink>> = vec![a.clone(), b.clone()];
        let composite = CompositeSink::new(sinks);

        composite.record_reward(0.5, "picker");
        composite.record_episode_end(1.5, "picker", EpisodeOutcome::Delivered, 12);
        composite.record_delivery(8.0, "picker", 20);

        for sink in [&a, &b] {
            assert_eq!(sink.rewards_for("picker"), vec![0.5]);
            assert_eq!(
                sink.episode_ends(),
                vec![("picker".to_string(), 1.5, EpisodeOutcome::Delivered)]
            );
            assert_eq!(sink.delivery_reports(), vec![("picker".to_string(), 8.0)]);
        }
    }

    #[test]
    fn missing_sink_degrades_to_noop() {
        let telemetry = Telemetry::from_option(None, "test");
        assert!(!telemetry.is_enabled());
        telemetry.reward(1.0, "nobody");
        telemetry.episode_end(1.0, "nobody", EpisodeOutcome::HitWall, 1);
    }

    #[test]
    fn channel_sink_does_not_block_when_receiver_dropped() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = ChannelSink::new(tx);
        drop(rx);
        sink.record_reward(1.0, "picker");
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = TelemetryEvent::Reward {
            actor: "picker".into(),
            reward: 1.0,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"reward\""));
    }
}
