//! Progress reporting for long passes over a video

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Thread-safe progress counter that logs every `report_interval` items.
///
/// The total may be unknown (e.g. a raw stream that is not a file), in which
/// case only counts and elapsed time are reported.
pub struct ProgressTracker {
    label: &'static str,
    total: Option<u64>,
    report_interval: u64,
    processed: AtomicU64,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn new(label: &'static str, total: Option<u64>, report_interval: u64) -> Self {
        Self {
            label,
            total,
            report_interval: report_interval.max(1),
            processed: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Counts one processed item, logging on interval boundaries and at the total
    pub fn increment(&self) {
        let current = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        if current % self.report_interval == 0 || Some(current) == self.total {
            self.report(current);
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Logs the final count and elapsed time
    pub fn finish(&self) {
        info!(
            "{}: {} done in {}",
            self.label,
            self.processed(),
            format_duration(self.start_time.elapsed().as_secs_f64())
        );
    }

    fn report(&self, current: u64) {
        let elapsed = self.start_time.elapsed().as_secs_f64();

        match self.total {
            Some(total) if current < total && elapsed > 0.0 => {
                let rate = current as f64 / elapsed;
                let remaining = (total - current) as f64 / rate;
                info!(
                    "{}: {}/{} ({:.1}%) - elapsed: {} - ETA: {}",
                    self.label,
                    current,
                    total,
                    current as f64 / total as f64 * 100.0,
                    format_duration(elapsed),
                    format_duration(remaining),
                );
            }
            Some(total) if current < total => {
                info!("{}: {}/{}", self.label, current, total);
            }
            Some(_) => {}
            None => {
                info!("{}: {} - elapsed: {}", self.label, current, format_duration(elapsed));
            }
        }
    }
}

/// Formats seconds into a human-readable duration string
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor() as u64;
        format!("{}m {:.0}s", mins, secs - mins as f64 * 60.0)
    } else {
        let hours = (secs / 3600.0).floor() as u64;
        let rest = secs - hours as f64 * 3600.0;
        let mins = (rest / 60.0).floor() as u64;
        format!("{}h {}m {:.0}s", hours, mins, rest - mins as f64 * 60.0)
    }
}
