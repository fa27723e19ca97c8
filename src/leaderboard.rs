// src/leaderboard.rs
//! Run history and cross-user totals

use crate::recorder::{round2, RunRecord};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub username: String,
    pub total_distance_km: f64,
    pub runs: usize,
}

/// Runs of one user, newest first
pub fn history(runs: &[RunRecord], user_id: &str) -> Vec<RunRecord> {
    let mut mine: Vec<RunRecord> = runs.iter().filter(|r| r.user_id == user_id).cloned().collect();
    mine.sort_by(|a, b| b.date.cmp(&a.date));
    mine
}

/// Total distance per username, longest first
pub fn leaderboard(runs: &[RunRecord]) -> Vec<LeaderboardEntry> {
    let mut totals: HashMap<&str, (f64, usize)> = HashMap::new();
    for run in runs {
        let entry = totals.entry(run.username.as_str()).or_insert((0.0, 0));
        entry.0 += run.distance_km;
        entry.1 += 1;
    }

    let mut board: Vec<LeaderboardEntry> = totals
        .into_iter()
        .map(|(username, (distance, count))| LeaderboardEntry {
            username: username.to_string(),
            total_distance_km: round2(distance),
            runs: count,
        })
        .collect();

    board.sort_by(|a, b| {
        b.total_distance_km
            .total_cmp(&a.total_distance_km)
            .then_with(|| a.username.cmp(&b.username))
    });
    board
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn run(user_id: &str, username: &str, distance_km: f64, hours_ago: i64) -> RunRecord {
        RunRecord {
            user_id: user_id.to_string(),
            username: username.to_string(),
            date: Utc::now() - Duration::hours(hours_ago),
            distance_km,
            duration: "30m 0s".to_string(),
            elapsed_seconds: 1800,
            average_speed_kmh: distance_km * 2.0,
        }
    }

    #[test]
    fn test_empty_board() {
        assert!(leaderboard(&[]).is_empty());
    }

    #[test]
    fn test_totals_sorted_descending() {
        let runs = vec![
            run("u1", "alice", 5.0, 3),
            run("u2", "bob", 7.25, 2),
            run("u1", "alice", 3.1, 1),
            run("u3", "carol", 7.25, 1),
        ];

        let board = leaderboard(&runs);

        assert_eq!(board.len(), 3);
        assert_eq!(board[0].username, "alice");
        assert_eq!(board[0].total_distance_km, 8.1);
        assert_eq!(board[0].runs, 2);
        // Tie broken by name
        assert_eq!(board[1].username, "bob");
        assert_eq!(board[2].username, "carol");
    }

    #[test]
    fn test_history_newest_first() {
        let runs = vec![
            run("u1", "alice", 1.0, 5),
            run("u2", "bob", 2.0, 4),
            run("u1", "alice", 3.0, 1),
        ];

        let mine = history(&runs, "u1");

        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].distance_km, 3.0);
        assert_eq!(mine[1].distance_km, 1.0);
    }
}
