//! Process-wide metrics
//!
//! Atomic counters for the high-frequency events, mutex-protected samples for
//! durations. Snapshots are served as JSON at `/metrics`.

use crate::research::PipelineState;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Samples kept per duration series
const MAX_SAMPLES: usize = 1000;

pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

pub struct MetricsCollector {
    runs_started: AtomicU64,
    runs_in_flight: AtomicU64,
    runs_completed: AtomicU64,
    runs_failed: AtomicU64,

    searches_succeeded: AtomicU64,
    searches_failed: AtomicU64,
    emails_sent: AtomicU64,

    run_times: Mutex<Vec<u64>>,
    stage_times: Mutex<HashMap<PipelineState, Vec<u64>>>,
    failures_by_stage: Mutex<HashMap<PipelineState, u64>>,
    tool_stats: Mutex<HashMap<String, ToolStats>>,

    uptime_start: AtomicU64,
}

#[derive(Debug, Default)]
struct ToolStats {
    executions: u64,
    failures: u64,
    execution_times: Vec<u64>,
}

fn push_sample(samples: &mut Vec<u64>, duration: Duration) {
    samples.push(duration.as_millis() as u64);
    if samples.len() > MAX_SAMPLES {
        samples.remove(0);
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            runs_in_flight: AtomicU64::new(0),
            runs_completed: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            searches_succeeded: AtomicU64::new(0),
            searches_failed: AtomicU64::new(0),
            emails_sent: AtomicU64::new(0),
            run_times: Mutex::new(Vec::new()),
            stage_times: Mutex::new(HashMap::new()),
            failures_by_stage: Mutex::new(HashMap::new()),
            tool_stats: Mutex::new(HashMap::new()),
            uptime_start: AtomicU64::new(current_timestamp()),
        }
    }

    pub fn run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
        self.runs_in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub fn run_completed(&self, duration: Duration) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        self.finish_run(duration);
    }

    pub fn run_failed(&self, stage: Option<PipelineState>, duration: Duration) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
        if let Some(stage) = stage {
            if let Ok(mut failures) = self.failures_by_stage.lock() {
                *failures.entry(stage).or_insert(0) += 1;
            }
        }
        self.finish_run(duration);
    }

    fn finish_run(&self, duration: Duration) {
        // Saturating: reset() may race with a run in flight
        let _ = self
            .runs_in_flight
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_sub(1)));
        if let Ok(mut times) = self.run_times.lock() {
            push_sample(&mut times, duration);
        }
    }

    pub fn stage_completed(&self, stage: PipelineState, duration: Duration) {
        if let Ok(mut stages) = self.stage_times.lock() {
            push_sample(stages.entry(stage).or_default(), duration);
        }
    }

    pub fn search_unit_finished(&self, success: bool) {
        if success {
            self.searches_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.searches_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn email_sent(&self) {
        self.emails_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tool_executed(&self, tool_name: &str, duration: Duration, success: bool) {
        if let Ok(mut stats) = self.tool_stats.lock() {
            let entry = stats.entry(tool_name.to_string()).or_default();
            entry.executions += 1;
            if !success {
                entry.failures += 1;
            }
            push_sample(&mut entry.execution_times, duration);
        }
    }

    /// Reset everything (tests)
    pub fn reset(&self) {
        for counter in [
            &self.runs_started,
            &self.runs_in_flight,
            &self.runs_completed,
            &self.runs_failed,
            &self.searches_succeeded,
            &self.searches_failed,
            &self.emails_sent,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        if let Ok(mut times) = self.run_times.lock() {
            times.clear();
        }
        if let Ok(mut stages) = self.stage_times.lock() {
            stages.clear();
        }
        if let Ok(mut failures) = self.failures_by_stage.lock() {
            failures.clear();
        }
        if let Ok(mut tools) = self.tool_stats.lock() {
            tools.clear();
        }
        self.uptime_start.store(current_timestamp(), Ordering::Relaxed);
    }

    fn stage_snapshots(&self) -> HashMap<String, DurationStats> {
        self.stage_times
            .lock()
            .map(|stages| {
                stages
                    .iter()
                    .map(|(stage, samples)| (stage.to_string(), DurationStats::from_samples(samples)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn failure_snapshot(&self) -> HashMap<String, u64> {
        self.failures_by_stage
            .lock()
            .map(|failures| {
                failures
                    .iter()
                    .map(|(stage, count)| (stage.to_string(), *count))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn tool_snapshots(&self) -> HashMap<String, ToolStatsSnapshot> {
        self.tool_stats
            .lock()
            .map(|tools| {
                tools
                    .iter()
                    .map(|(name, stats)| {
                        let success_rate = if stats.executions == 0 {
                            0.0
                        } else {
                            (stats.executions - stats.failures) as f64 / stats.executions as f64
                        };
                        (
                            name.clone(),
                            ToolStatsSnapshot {
                                executions: stats.executions,
                                failures: stats.failures,
                                success_rate,
                                durations: DurationStats::from_samples(&stats.execution_times),
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        let now = current_timestamp();
        let run_durations = self
            .run_times
            .lock()
            .map(|times| DurationStats::from_samples(&times))
            .unwrap_or_default();

        MetricsSnapshot {
            runs: RunMetrics {
                started: self.runs_started.load(Ordering::Relaxed),
                in_flight: self.runs_in_flight.load(Ordering::Relaxed),
                completed: self.runs_completed.load(Ordering::Relaxed),
                failed: self.runs_failed.load(Ordering::Relaxed),
                failures_by_stage: self.failure_snapshot(),
                durations: run_durations,
            },
            searches: SearchMetrics {
                succeeded: self.searches_succeeded.load(Ordering::Relaxed),
                failed: self.searches_failed.load(Ordering::Relaxed),
            },
            emails_sent: self.emails_sent.load(Ordering::Relaxed),
            stages: self.stage_snapshots(),
            tools: self.tool_snapshots(),
            uptime_seconds: now.saturating_sub(self.uptime_start.load(Ordering::Relaxed)),
            timestamp: now,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub runs: RunMetrics,
    pub searches: SearchMetrics,
    pub emails_sent: u64,
    /// Keyed by stage name
    pub stages: HashMap<String, DurationStats>,
    pub tools: HashMap<String, ToolStatsSnapshot>,
    pub uptime_seconds: u64,
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct RunMetrics {
    pub started: u64,
    pub in_flight: u64,
    pub completed: u64,
    pub failed: u64,
    pub failures_by_stage: HashMap<String, u64>,
    pub durations: DurationStats,
}

#[derive(Debug, Serialize)]
pub struct SearchMetrics {
    pub succeeded: u64,
    pub failed: u64,
}

#[derive(Debug, Serialize)]
pub struct ToolStatsSnapshot {
    pub executions: u64,
    pub failures: u64,
    pub success_rate: f64,
    pub durations: DurationStats,
}

/// Millisecond summary of a duration series
#[derive(Debug, Default, Serialize, PartialEq)]
pub struct DurationStats {
    pub count: usize,
    pub avg_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

impl DurationStats {
    fn from_samples(samples: &[u64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        Self {
            count: sorted.len(),
            avg_ms: sorted.iter().sum::<u64>() as f64 / sorted.len() as f64,
            p50_ms: percentile(&sorted, 50.0),
            p95_ms: percentile(&sorted, 95.0),
            p99_ms: percentile(&sorted, 99.0),
        }
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn percentile(sorted_data: &[u64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let index = (percentile / 100.0) * (sorted_data.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;
    if lower == upper {
        return sorted_data[lower] as f64;
    }

    let weight = index - lower as f64;
    sorted_data[lower] as f64 * (1.0 - weight) + sorted_data[upper] as f64 * weight
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_lifecycle_counters() {
        let collector = MetricsCollector::new();
        collector.run_started();
        collector.run_started();
        collector.run_completed(Duration::from_millis(120));
        collector.run_failed(Some(PipelineState::Planning), Duration::from_millis(10));

        let snapshot = collector.get_metrics();
        assert_eq!(snapshot.runs.started, 2);
        assert_eq!(snapshot.runs.in_flight, 0);
        assert_eq!(snapshot.runs.completed, 1);
        assert_eq!(snapshot.runs.failed, 1);
        assert_eq!(snapshot.runs.failures_by_stage.get("planning"), Some(&1));
        assert_eq!(snapshot.runs.durations.count, 2);
    }

    #[test]
    fn test_in_flight_never_underflows() {
        let collector = MetricsCollector::new();
        collector.run_completed(Duration::from_millis(1));
        assert_eq!(collector.get_metrics().runs.in_flight, 0);
    }

    #[test]
    fn test_search_and_email_counters() {
        let collector = MetricsCollector::new();
        collector.search_unit_finished(true);
        collector.search_unit_finished(true);
        collector.search_unit_finished(false);
        collector.email_sent();

        let snapshot = collector.get_metrics();
        assert_eq!(snapshot.searches.succeeded, 2);
        assert_eq!(snapshot.searches.failed, 1);
        assert_eq!(snapshot.emails_sent, 1);
    }

    #[test]
    fn test_stage_and_tool_durations() {
        let collector = MetricsCollector::new();
        collector.stage_completed(PipelineState::Searching, Duration::from_millis(100));
        collector.stage_completed(PipelineState::Searching, Duration::from_millis(300));
        collector.tool_executed("web_search", Duration::from_millis(50), true);
        collector.tool_executed("web_search", Duration::from_millis(70), false);

        let snapshot = collector.get_metrics();
        let searching = &snapshot.stages["searching"];
        assert_eq!(searching.count, 2);
        assert_eq!(searching.avg_ms, 200.0);

        let tool = &snapshot.tools["web_search"];
        assert_eq!(tool.executions, 2);
        assert_eq!(tool.success_rate, 0.5);
    }

    #[test]
    fn test_reset() {
        let collector = MetricsCollector::new();
        collector.run_started();
        collector.email_sent();
        collector.reset();

        let snapshot = collector.get_metrics();
        assert_eq!(snapshot.runs.started, 0);
        assert_eq!(snapshot.emails_sent, 0);
        assert!(snapshot.stages.is_empty());
    }

    #[test]
    fn test_percentile() {
        assert_eq!(percentile(&[], 50.0), 0.0);
        assert_eq!(percentile(&[10], 99.0), 10.0);
        assert_eq!(percentile(&[10, 20, 30], 50.0), 20.0);
        assert_eq!(percentile(&[10, 20], 50.0), 15.0);
    }

    #[test]
    fn test_sample_window_is_bounded() {
        let mut samples = Vec::new();
        for _ in 0..(MAX_SAMPLES + 10) {
            push_sample(&mut samples, Duration::from_millis(1));
        }
        assert_eq!(samples.len(), MAX_SAMPLES);
    }
}
