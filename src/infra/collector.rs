use std::path::{Path, PathBuf};

use time::{OffsetDateTime, format_description};
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use crate::error::SimError;
use crate::infra::TelemetryEvent;
use crate::metrics::EpisodeMetrics;

/// Drains the telemetry channel on its own task: aggregates metrics and
/// optionally appends every event as a JSON line.
pub struct TelemetryCollector {
    metrics: EpisodeMetrics,
    writer: Option<BufWriter<File>>,
    event_count: u64,
}

impl TelemetryCollector {
    pub fn new(window_size: usize) -> Self {
        Self {
            metrics: EpisodeMetrics::new(window_size),
            writer: None,
            event_count: 0,
        }
    }

    /// Opens `<dir>/<run>-<timestamp>.jsonl` for event output.
    pub async fn with_output_dir(mut self, dir: &Path, run_name: &str) -> Result<Self, SimError> {
        if !dir.exists() {
            fs::create_dir_all(dir).await?;
        }
        let path = dir.join(telemetry_file_name(run_name));
        let file = File::create(&path).await?;
        info!("Writing telemetry to {}", path.display());
        self.writer = Some(BufWriter::new(file));
        Ok(self)
    }

    pub fn metrics(&self) -> &EpisodeMetrics {
        &self.metrics
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn handle(&mut self, event: &TelemetryEvent) {
        self.event_count += 1;
        match event {
            TelemetryEvent::Reward { actor, reward } => {
                self.metrics.record_reward(actor, *reward);
            }
            TelemetryEvent::EpisodeEnd {
                actor,
                cumulative_reward,
                outcome,
                steps,
            } => {
                self.metrics
                    .record_episode(actor, *cumulative_reward, *steps, *outcome);
            }
            TelemetryEvent::DeliveryReport {
                actor,
                cumulative_reward,
                ..
            } => {
                self.metrics.record_delivery(actor, *cumulative_reward);
            }
        }
    }

    async fn write(&mut self, event: &TelemetryEvent) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to serialize telemetry event: {}", e);
                return;
            }
        };
        let result = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await
        }
        .await;
        if let Err(e) = result {
            warn!("Failed to write telemetry, disabling file output: {}", e);
            self.writer = None;
        }
    }

    /// Runs until every sender is dropped, then flushes and returns the
    /// collector with its final metrics.
    pub async fn run(mut self, mut rx: UnboundedReceiver<TelemetryEvent>) -> Self {
        while let Some(event) = rx.recv().await {
            self.handle(&event);
            self.write(&event).await;
        }
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush().await {
                warn!("Failed to flush telemetry file: {}", e);
            }
        }
        self
    }
}

fn telemetry_file_name(run_name: &str) -> PathBuf {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let stamp = format_description::parse("[year][month][day]-[hour][minute][second]")
        .ok()
        .and_then(|fmt| now.format(&fmt).ok())
        .unwrap_or_else(|| now.unix_timestamp().to_string());
    PathBuf::from(format!("{} - {}.jsonl", run_name, stamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::EpisodeOutcome;

    #[test]
    fn file_name_carries_run_name() {
        let name = telemetry_file_name("warehouse");
        let name = name.to_string_lossy();
        assert!(name.starts_with("warehouse - "));
        assert!(name.ends_with(".jsonl"));
    }

    #[tokio::test]
    async fn collector_aggregates_until_channel_closes() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let task = tokio::spawn(TelemetryCollector::new(16).run(rx));

        tx.send(TelemetryEvent::Reward {
            actor: "pickle".into(),
            reward: 5.0,
        })
        .unwrap();
        tx.send(TelemetryEvent::EpisodeEnd {
            actor: "pickle".into(),
            cumulative_reward: 13.0,
            outcome: EpisodeOutcome::Delivered,
            steps: 100,
        })
        .unwrap();
        tx.send(TelemetryEvent::DeliveryReport {
            actor: "pickle".into(),
            cumulative_reward: 7.5,
            steps: 180,
        })
        .unwrap();
        drop(tx);

        let collector = task.await.unwrap();
        assert_eq!(collector.event_count(), 3);
        let m = collector.metrics().actor("pickle").unwrap();
        assert_eq!(m.deliveries, 2);
        assert_eq!(m.episodes, 1);
        assert_eq!(m.delivery_rewards.average(), 7.5);
    }

    #[tokio::test]
    async fn collector_writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let collector = TelemetryCollector::new(4)
            .with_output_dir(dir.path(), "test")
            .await
            .unwrap();
        let task = tokio::spawn(collector.run(rx));
        tx.send(TelemetryEvent::Reward {
            actor: "a".into(),
            reward: 1.0,
        })
        .unwrap();
        drop(tx);
        task.await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let path = entries[0].as_ref().unwrap().path();
        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }
}
