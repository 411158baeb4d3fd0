use crate::stage::Stage;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::info;

/// Outcome of one stage run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub articles: usize,
    pub filled: usize,
    pub missing: usize,
    /// Files, articles or pages the stage dropped
    pub skipped: usize,
    pub elapsed_ms: u64,
}

impl StageReport {
    pub fn new(stage: Stage, articles: usize) -> Self {
        Self {
            stage,
            articles,
            filled: 0,
            missing: 0,
            skipped: 0,
            elapsed_ms: 0,
        }
    }

    pub fn slots(mut self, (filled, missing): (usize, usize)) -> Self {
        self.filled = filled;
        self.missing = missing;
        self
    }

    pub fn skipped(mut self, skipped: usize) -> Self {
        self.skipped = skipped;
        self
    }
}

/// Counters shared across every stage of one invocation
pub struct RunStats {
    stages_run: AtomicUsize,
    slots_filled: AtomicUsize,
    slots_missing: AtomicUsize,
    items_skipped: AtomicUsize,
    total_time_us: AtomicU64,
    reports: Mutex<Vec<StageReport>>,
}

impl RunStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            stages_run: AtomicUsize::new(0),
            slots_filled: AtomicUsize::new(0),
            slots_missing: AtomicUsize::new(0),
            items_skipped: AtomicUsize::new(0),
            total_time_us: AtomicU64::new(0),
            reports: Mutex::new(Vec::new()),
        })
    }

    pub fn record(&self, mut report: StageReport, elapsed: Duration) {
        report.elapsed_ms = elapsed.as_millis() as u64;

        self.stages_run.fetch_add(1, Ordering::Relaxed);
        self.slots_filled.fetch_add(report.filled, Ordering::Relaxed);
        self.slots_missing.fetch_add(report.missing, Ordering::Relaxed);
        self.items_skipped.fetch_add(report.skipped, Ordering::Relaxed);
        self.total_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);

        info!(
            stage = %report.stage,
            articles = report.articles,
            filled = report.filled,
            missing = report.missing,
            skipped = report.skipped,
            elapsed_ms = report.elapsed_ms,
            "Stage finished"
        );

        self.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(report);
    }

    /// True when some slot is empty or some input was dropped
    pub fn is_partial(&self) -> bool {
        self.slots_missing.load(Ordering::Relaxed) > 0
            || self.items_skipped.load(Ordering::Relaxed) > 0
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            stages_run: self.stages_run.load(Ordering::Relaxed),
            slots_filled: self.slots_filled.load(Ordering::Relaxed),
            slots_missing: self.slots_missing.load(Ordering::Relaxed),
            items_skipped: self.items_skipped.load(Ordering::Relaxed),
            total_time_ms: self.total_time_us.load(Ordering::Relaxed) / 1000,
            stages: self
                .reports
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSnapshot {
    pub stages_run: usize,
    pub slots_filled: usize,
    pub slots_missing: usize,
    pub items_skipped: usize,
    pub total_time_ms: u64,
    pub stages: Vec<StageReport>,
}

impl RunSnapshot {
    /// Plain-text table, one row per stage
    pub fn table(&self) -> String {
        let mut out = format!(
            "{:<16} {:>8} {:>8} {:>8} {:>8} {:>10}\n",
            "stage", "articles", "filled", "missing", "skipped", "ms"
        );
        for r in &self.stages {
            out.push_str(&format!(
                "{:<16} {:>8} {:>8} {:>8} {:>8} {:>10}\n",
                r.stage.to_string(),
                r.articles,
                r.filled,
                r.missing,
                r.skipped,
                r.elapsed_ms
            ));
        }
        out
    }
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
