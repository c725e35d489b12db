//! Playback statistics
//!
//! Counters collected by the pipeline on every step and logged once playback
//! ends.

use std::collections::VecDeque;
use std::time::Duration;

use crate::video::{PaceOutcome, UploadOutcome};

/// Number of lateness samples kept for percentiles
const MAX_LATENESS_SAMPLES: usize = 600;

/// Lateness distribution over the most recent frames
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatenessStats {
    /// Average lateness in milliseconds
    pub avg_ms: f64,
    /// Maximum lateness in milliseconds
    pub max_ms: f64,
    /// 95th percentile lateness
    pub p95_ms: f64,
    /// Number of samples in the statistics
    pub sample_count: usize,
}

/// Counters for one playback run
#[derive(Debug, Clone, Default)]
pub struct PlaybackStats {
    /// Frames uploaded and drawn
    pub frames_presented: u64,
    /// Frames skipped by the late-frame policy
    pub frames_dropped: u64,
    /// Presented frames that were already past their due time
    pub frames_late: u64,
    /// Uploads that reallocated the plane textures
    pub texture_reallocations: u64,
    /// Uploads that wrote into the existing textures
    pub partial_updates: u64,
    /// Times the display quad was rewritten
    pub geometry_updates: u64,
    /// Total time spent sleeping in the pacer
    pub total_wait: Duration,
    lateness_samples: VecDeque<Duration>,
}

impl PlaybackStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one presented frame
    pub fn record_presented(&mut self, upload: &UploadOutcome, pace: &PaceOutcome) {
        self.frames_presented += 1;
        if upload.reallocated {
            self.texture_reallocations += 1;
        } else {
            self.partial_updates += 1;
        }
        if upload.geometry_changed {
            self.geometry_updates += 1;
        }
        self.total_wait += pace.waited;

        if pace.lateness > Duration::ZERO {
            self.frames_late += 1;
        }
        self.push_lateness(pace.lateness);
    }

    /// Account for one frame skipped because it was too late
    pub fn record_dropped(&mut self, lateness: Duration) {
        self.frames_dropped += 1;
        self.push_lateness(lateness);
    }

    fn push_lateness(&mut self, lateness: Duration) {
        self.lateness_samples.push_back(lateness);
        if self.lateness_samples.len() > MAX_LATENESS_SAMPLES {
            self.lateness_samples.pop_front();
        }
    }

    /// Frames taken from the source, presented or dropped
    pub fn frames_total(&self) -> u64 {
        self.frames_presented + self.frames_dropped
    }

    pub fn lateness(&self) -> LatenessStats {
        if self.lateness_samples.is_empty() {
            return LatenessStats::default();
        }

        let mut times: Vec<f64> = self
            .lateness_samples
            .iter()
            .map(|d| d.as_secs_f64() * 1000.0)
            .collect();
        times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let sum: f64 = times.iter().sum();
        LatenessStats {
            avg_ms: sum / times.len() as f64,
            max_ms: times.last().copied().unwrap_or(0.0),
            p95_ms: percentile(&times, 0.95),
            sample_count: times.len(),
        }
    }

    /// Write the end-of-playback summary to the log
    pub fn log_summary(&self) {
        let lateness = self.lateness();
        tracing::info!(
            presented = self.frames_presented,
            dropped = self.frames_dropped,
            late = self.frames_late,
            reallocations = self.texture_reallocations,
            partial_updates = self.partial_updates,
            geometry_updates = self.geometry_updates,
            waited_ms = self.total_wait.as_millis() as u64,
            lateness_p95_ms = lateness.p95_ms,
            lateness_max_ms = lateness.max_ms,
            "Playback finished"
        );
    }
}

/// Calculate percentile from sorted array
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * p) as usize;
    sorted[idx]
}
