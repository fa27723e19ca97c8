// src/stopwatch.rs
//! Wall-clock stopwatch for the displayed run duration

use std::time::Duration;
use tokio::time::Instant;

/// Accumulates running time across start/stop pauses until reset.
///
/// Backed by `tokio::time::Instant`, so it follows a paused test clock.
#[derive(Debug, Clone, Default)]
pub struct Stopwatch {
    accumulated: Duration,
    started_at: Option<Instant>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or resume) timing. No-op if already running.
    pub fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    /// Pause timing, keeping the accumulated value.
    pub fn stop(&mut self) {
        if let Some(started) = self.started_at.take() {
            self.accumulated += started.elapsed();
        }
    }

    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
        self.started_at = None;
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn elapsed_duration(&self) -> Duration {
        match self.started_at {
            Some(started) => self.accumulated + started.elapsed(),
            None => self.accumulated,
        }
    }

    /// Elapsed time in milliseconds
    pub fn elapsed(&self) -> u64 {
        self.elapsed_duration().as_millis() as u64
    }
}

/// Format a duration the way run records show it: `1h 2m 3s`, `2m 3s` or `3s`.
pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_accumulates_across_pauses() {
        let mut sw = Stopwatch::new();
        sw.start();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        sw.stop();

        // Time spent stopped does not count
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(sw.elapsed(), 1500);

        sw.start();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(sw.elapsed(), 2000);
        assert!(sw.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears() {
        let mut sw = Stopwatch::new();
        sw.start();
        tokio::time::sleep(Duration::from_secs(3)).await;
        sw.reset();
        assert_eq!(sw.elapsed(), 0);
        assert!(!sw.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_keeps_origin() {
        let mut sw = Stopwatch::new();
        sw.start();
        tokio::time::sleep(Duration::from_secs(1)).await;
        sw.start();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(sw.elapsed(), 2000);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(59), "59s");
        assert_eq!(format_duration(123), "2m 3s");
        assert_eq!(format_duration(3723), "1h 2m 3s");
    }
}
