// src/location/feed.rs
//! Background line reader that keeps a streaming receiver's latest fix current

use super::{fix::LatestFix, AccuracyTier};
use crate::{
    error::{Result, TrackerError},
    geo::Coordinate,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError, RwLock,
};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    task::JoinHandle,
};
use tracing::{debug, warn};

/// Parses one line of receiver output into the fix cell
pub type LineParser = fn(&mut LatestFix, &str) -> Result<()>;

/// Owns the reader task of a streaming receiver (gpsd, serial NMEA).
///
/// Fixes arrive at the receiver's pace; `current_fix` answers from the most
/// recent report instead of waiting for the next one.
pub struct Feed {
    latest: Arc<RwLock<LatestFix>>,
    running: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
    max_fix_age_secs: u64,
}

impl Feed {
    pub fn new(max_fix_age_secs: u64) -> Self {
        Self {
            latest: Arc::new(RwLock::new(LatestFix::new())),
            running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
            max_fix_age_secs,
        }
    }

    /// Whether a reader task is attached and still reading
    pub fn is_attached(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(false, |task| !task.is_finished())
    }

    /// Start reading lines from `reader`, replacing any previous reader
    pub fn attach<R>(&self, mut reader: R, source: &'static str, parse: LineParser)
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        self.detach();

        let latest = Arc::clone(&self.latest);
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::Relaxed);

        let task = tokio::spawn(async move {
            let mut line = String::new();

            while running.load(Ordering::Relaxed) {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        warn!("{} closed the connection", source);
                        break;
                    }
                    Ok(_) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        let mut fix = latest.write().unwrap_or_else(PoisonError::into_inner);
                        if let Err(e) = parse(&mut fix, line) {
                            debug!("Skipping {} line: {}", source, e);
                            continue;
                        }
                        fix.set_source(source);
                    }
                    Err(e) => {
                        warn!("Error reading from {}: {}", source, e);
                        break;
                    }
                }
            }
        });

        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    /// Stop the reader task
    pub fn detach(&self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(task) = self.task.lock().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
        }
    }

    /// Copy of the latest receiver report
    pub fn latest(&self) -> LatestFix {
        self.latest.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn current_fix(&self, accuracy: AccuracyTier) -> Result<Coordinate> {
        self.latest()
            .to_fix(accuracy, self.max_fix_age_secs)
            .map_err(TrackerError::LocationUnavailable)
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::nmea;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_feed_tracks_latest_sentence() {
        let input: &[u8] = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\n\
                             $GPGGA,123520,4807.100,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\n";
        let feed = Feed::new(10);
        feed.attach(BufReader::new(input), "test", nmea::parse_nmea_sentence);

        // Reader hits EOF after the two sentences
        while feed.is_attached() {
            tokio::task::yield_now().await;
        }

        let fix = feed.current_fix(AccuracyTier::BestForNavigation).unwrap();
        assert!((fix.latitude - (48.0 + 7.1 / 60.0)).abs() < 1e-9);
        assert_eq!(feed.latest().source.as_deref(), Some("test"));
    }

    #[tokio::test]
    async fn test_no_data_is_unavailable() {
        let feed = Feed::new(10);
        let err = feed.current_fix(AccuracyTier::Low).unwrap_err();
        assert!(matches!(err, TrackerError::LocationUnavailable(_)));
    }
}
