//! Runtime counters for slicing and export.
//!
//! The session records one sample per slicing run and per export; the shell logs a
//! [`PerfSnapshot`] when it exits.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::warn;

use crate::types::ExportFormat;

const DEFAULT_SAMPLE_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct SampleWindow {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl SampleWindow {
    fn new(capacity: usize) -> Self {
        Self { samples: VecDeque::with_capacity(capacity), capacity }
    }

    fn push(&mut self, value: f32) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    fn percentile(&self, percentile: f32) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }

        let mut sorted: Vec<f32> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

        let rank = percentile.clamp(0.0, 1.0) * (sorted.len() - 1) as f32;
        sorted.get(rank.round() as usize).copied().unwrap_or(0.0)
    }
}

#[derive(Debug)]
struct StatsInner {
    started_at: Instant,
    slice_times_ms: SampleWindow,
    export_times_ms: SampleWindow,
    slicing_runs: u64,
    slicing_failures: u64,
    slices_produced: u64,
    zip_exports: u64,
    pdf_exports: u64,
    export_failures: u64,
    bytes_exported: u64,
}

impl Default for StatsInner {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            slice_times_ms: SampleWindow::new(DEFAULT_SAMPLE_CAPACITY),
            export_times_ms: SampleWindow::new(DEFAULT_SAMPLE_CAPACITY),
            slicing_runs: 0,
            slicing_failures: 0,
            slices_produced: 0,
            zip_exports: 0,
            pdf_exports: 0,
            export_failures: 0,
            bytes_exported: 0,
        }
    }
}

/// Thread-safe counter collection shared between the session and the shell.
#[derive(Debug, Default)]
pub struct StatsCollector {
    inner: parking_lot::Mutex<StatsInner>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished slicing run; `slices` is `None` when the run failed.
    pub fn record_slicing(&self, duration: Duration, slices: Option<usize>) {
        let mut guard = self.inner.lock();
        guard.slicing_runs = guard.slicing_runs.saturating_add(1);
        guard.slice_times_ms.push(duration.as_secs_f64() as f32 * 1_000.0);
        match slices {
            Some(count) => guard.slices_produced = guard.slices_produced.saturating_add(count as u64),
            None => guard.slicing_failures = guard.slicing_failures.saturating_add(1),
        }
    }

    /// Record an export attempt; `bytes` is `None` when assembly failed.
    pub fn record_export(&self, format: ExportFormat, duration: Duration, bytes: Option<usize>) {
        let mut guard = self.inner.lock();
        guard.export_times_ms.push(duration.as_secs_f64() as f32 * 1_000.0);
        let Some(bytes) = bytes else {
            guard.export_failures = guard.export_failures.saturating_add(1);
            return;
        };
        match format {
            ExportFormat::Zip => guard.zip_exports = guard.zip_exports.saturating_add(1),
            ExportFormat::Pdf => guard.pdf_exports = guard.pdf_exports.saturating_add(1),
        }
        guard.bytes_exported = guard.bytes_exported.saturating_add(bytes as u64);
    }

    pub fn snapshot(&self) -> PerfSnapshot {
        let guard = self.inner.lock();

        PerfSnapshot {
            timestamp_ms: now_ms(),
            uptime_ms: guard.started_at.elapsed().as_millis() as u64,
            slice_time_ms_p50: guard.slice_times_ms.percentile(0.50),
            slice_time_ms_p95: guard.slice_times_ms.percentile(0.95),
            export_time_ms_p50: guard.export_times_ms.percentile(0.50),
            export_time_ms_p95: guard.export_times_ms.percentile(0.95),
            slicing_runs: guard.slicing_runs,
            slicing_failures: guard.slicing_failures,
            slices_produced: guard.slices_produced,
            zip_exports: guard.zip_exports,
            pdf_exports: guard.pdf_exports,
            export_failures: guard.export_failures,
            bytes_exported: guard.bytes_exported,
        }
    }
}

fn now_ms() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(delta) => delta.as_millis() as u64,
        Err(err) => {
            warn!("system clock error: {err}");
            0
        }
    }
}

/// Immutable snapshot of the counters.
#[derive(Debug, Clone, Serialize)]
pub struct PerfSnapshot {
    pub timestamp_ms: u64,
    pub uptime_ms: u64,
    pub slice_time_ms_p50: f32,
    pub slice_time_ms_p95: f32,
    pub export_time_ms_p50: f32,
    pub export_time_ms_p95: f32,
    pub slicing_runs: u64,
    pub slicing_failures: u64,
    pub slices_produced: u64,
    pub zip_exports: u64,
    pub pdf_exports: u64,
    pub export_failures: u64,
    pub bytes_exported: u64,
}
