//! Per-episode reports and where they go

use chrono::{DateTime, Utc};
use metrics::{gauge, histogram, increment_counter};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::info;

/// Whether an episode was learned from or only played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeMode {
    /// Exploration and updates enabled
    Train,
    /// Greedy, no updates
    Play,
}

impl EpisodeMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Play => "play",
        }
    }
}

/// Summary of a finished episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeReport {
    /// Episode counter of the agent when the episode started
    pub episode_id: u64,
    /// Train or play
    pub mode: EpisodeMode,
    /// Undiscounted sum of rewards
    pub score: f64,
    /// Mean of the signed losses of every update (0 when playing)
    pub loss: f64,
    /// Environment steps taken
    pub steps: usize,
    /// Ended by truncation rather than a terminal state
    pub truncated: bool,
    /// Wall-clock end of the episode
    pub finished_at: DateTime<Utc>,
}

/// Receives one report per episode
pub trait MetricsSink: Send {
    /// Record a finished episode
    fn record(&mut self, report: &EpisodeReport);
}

/// Emits a tracing event and updates `metrics` gauges and histograms
#[derive(Debug, Clone)]
pub struct TracingSink {
    agent: &'static str,
}

impl TracingSink {
    /// Sink labelling everything with `agent`
    #[must_use]
    pub fn new(agent: &'static str) -> Self {
        Self { agent }
    }
}

impl MetricsSink for TracingSink {
    fn record(&mut self, report: &EpisodeReport) {
        info!(
            agent = self.agent,
            mode = report.mode.as_str(),
            episode = report.episode_id,
            score = report.score,
            loss = report.loss,
            steps = report.steps,
            truncated = report.truncated,
            "episode finished"
        );

        let mode = report.mode.as_str();
        increment_counter!("tdlab_episodes_total", "agent" => self.agent, "mode" => mode);
        gauge!("tdlab_episode_score", report.score, "agent" => self.agent, "mode" => mode);
        histogram!("tdlab_episode_steps", report.steps as f64, "agent" => self.agent);
        if report.mode == EpisodeMode::Train {
            histogram!("tdlab_episode_loss", report.loss, "agent" => self.agent);
        }
    }
}

/// Keeps every report in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    reports: Vec<EpisodeReport>,
}

impl MemorySink {
    /// Empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded reports in order
    #[must_use]
    pub fn reports(&self) -> &[EpisodeReport] {
        &self.reports
    }

    /// Scores in order
    #[must_use]
    pub fn scores(&self) -> Vec<f64> {
        self.reports.iter().map(|r| r.score).collect()
    }

    /// Mean and standard deviation of the last `window` scores
    #[must_use]
    pub fn score_summary(&self, window: usize) -> Option<(f64, f64)> {
        let tail = &self.reports[self.reports.len().saturating_sub(window)..];
        if tail.is_empty() {
            return None;
        }
        let scores: Vec<f64> = tail.iter().map(|r| r.score).collect();
        let std = if scores.len() > 1 { scores.iter().std_dev() } else { 0.0 };
        Some((scores.iter().mean(), std))
    }
}

impl MetricsSink for MemorySink {
    fn record(&mut self, report: &EpisodeReport) {
        self.reports.push(report.clone());
    }
}

/// Forwards every report to two sinks
pub struct Tee<'a> {
    first: &'a mut dyn MetricsSink,
    second: &'a mut dyn MetricsSink,
}

impl<'a> Tee<'a> {
    /// Combine two sinks
    pub fn new(first: &'a mut dyn MetricsSink, second: &'a mut dyn MetricsSink) -> Self {
        Self { first, second }
    }
}

impl MetricsSink for Tee<'_> {
    fn record(&mut self, report: &EpisodeReport) {
        self.first.record(report);
        self.second.record(report);
    }
}
