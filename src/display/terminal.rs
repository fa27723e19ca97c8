// src/display/terminal.rs
//! Terminal view of a live run

use crate::{
    error::{Result, TrackerError},
    recorder::average_speed_kmh,
    stopwatch::format_duration,
    tracker::{SessionStatus, Snapshot},
};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType, DisableLineWrap, EnableLineWrap},
};
use std::{
    future::Future,
    io::{self, Write},
};
use tokio::sync::watch;

pub struct TerminalDisplay {
    source: String,
    runner: String,
}

impl TerminalDisplay {
    pub fn new(source: impl Into<String>, runner: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            runner: runner.into(),
        }
    }

    /// Redraw on every snapshot until `until` resolves
    pub async fn run<F>(&self, mut updates: watch::Receiver<Snapshot>, until: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut stdout = io::stdout();
        execute!(stdout, Hide, DisableLineWrap)?;

        tokio::pin!(until);
        let outcome = loop {
            let snapshot = updates.borrow_and_update().clone();
            if let Err(e) = self.redraw(&mut stdout, &snapshot) {
                break Err(e);
            }

            tokio::select! {
                _ = &mut until => break Ok(()),
                changed = updates.changed() => {
                    if changed.is_err() {
                        break Ok(());
                    }
                }
            }
        };

        execute!(stdout, Show, EnableLineWrap)?;
        outcome
    }

    fn redraw(&self, stdout: &mut impl Write, snapshot: &Snapshot) -> Result<()> {
        execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;
        self.render_display(stdout, snapshot)?;
        stdout.flush().map_err(TrackerError::Io)
    }

    /// Render the snapshot to the terminal
    pub fn render_display(&self, stdout: &mut impl Write, snapshot: &Snapshot) -> Result<()> {
        // Header
        execute!(
            stdout,
            SetForegroundColor(Color::Green),
            Print("=".repeat(60)),
            Print("\n"),
            Print(format!("Run Tracker - {} ({})", self.runner, self.source)),
            Print("\n"),
            Print("=".repeat(60)),
            Print("\n"),
            ResetColor
        )?;

        let (label, color) = match snapshot.status {
            SessionStatus::Idle => ("IDLE", Color::DarkGrey),
            SessionStatus::Running => ("RECORDING", Color::Red),
            SessionStatus::Stopping => ("STOP REQUESTED", Color::Yellow),
        };
        execute!(
            stdout,
            Print("Status: "),
            SetForegroundColor(color),
            Print(format!("{}\n\n", label)),
            ResetColor
        )?;

        self.render_run_section(stdout, snapshot)?;
        self.render_position_section(stdout, snapshot)?;

        // Footer
        execute!(
            stdout,
            SetForegroundColor(Color::Green),
            Print("=".repeat(60)),
            Print("\n"),
            Print("Press Ctrl+C to stop"),
            Print("\n"),
            ResetColor
        )?;

        Ok(())
    }

    fn render_run_section(&self, stdout: &mut impl Write, snapshot: &Snapshot) -> Result<()> {
        let seconds = snapshot.elapsed_ms as f64 / 1000.0;

        execute!(
            stdout,
            SetForegroundColor(Color::Cyan),
            Print("RUN:\n"),
            ResetColor,
            Print(format!("  Distance:  {:>12.2} km\n", snapshot.cumulative_distance_km)),
            Print(format!("  Duration:  {:>12}\n", format_duration(snapshot.elapsed_ms / 1000))),
            Print(format!(
                "  Avg speed: {:>12.2} km/h\n\n",
                average_speed_kmh(snapshot.cumulative_distance_km, seconds)
            ))
        )?;

        Ok(())
    }

    fn render_position_section(&self, stdout: &mut impl Write, snapshot: &Snapshot) -> Result<()> {
        execute!(
            stdout,
            SetForegroundColor(Color::Yellow),
            Print("POSITION:\n"),
            ResetColor
        )?;

        match snapshot.path.last() {
            Some(last) => execute!(
                stdout,
                Print(format!("  Latitude:  {:>12.6}°\n", last.latitude)),
                Print(format!("  Longitude: {:>12.6}°\n", last.longitude))
            )?,
            None => execute!(stdout, Print("  Waiting for first fix\n"))?,
        }

        execute!(
            stdout,
            Print(format!(
                "  Points:    {:>12} ({} drawn)\n\n",
                snapshot.path.len(),
                snapshot.smoothed_path.len()
            ))
        )?;

        Ok(())
    }
}
