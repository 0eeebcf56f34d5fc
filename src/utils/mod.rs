use std::time::{Duration, Instant};
use tracing::info;

/// Wall-clock guard around one pipeline command. Logs the record count and
/// throughput when dropped, once [`StageTimer::records`] has been told how
/// many records the command handled.
pub struct StageTimer {
    label: &'static str,
    start: Instant,
    records: Option<usize>,
}

impl StageTimer {
    pub fn start(label: &'static str) -> Self {
        info!("Starting: {}", label);
        Self { label, start: Instant::now(), records: None }
    }

    pub fn records(&mut self, count: usize) {
        self.records = Some(count);
    }
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        match self.records {
            Some(count) => info!(
                "Finished: {} ({} records in {:.2?}, {:.1}/s)",
                self.label,
                count,
                elapsed,
                per_second(count, elapsed)
            ),
            None => info!("Finished: {} (took {:.2?})", self.label, elapsed),
        }
    }
}

/// Records per second; zero when no time has passed.
pub fn per_second(count: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { count as f64 / secs } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_over_elapsed_seconds() {
        assert_eq!(per_second(821, Duration::from_secs(2)), 410.5);
        assert_eq!(per_second(0, Duration::from_secs(5)), 0.0);
    }

    #[test]
    fn zero_elapsed_has_no_rate() {
        assert_eq!(per_second(10, Duration::ZERO), 0.0);
    }

    #[test]
    fn timer_keeps_record_count() {
        let mut timer = StageTimer::start("Detail parse");
        assert_eq!(timer.records, None);
        timer.records(3);
        assert_eq!(timer.records, Some(3));
    }
}
