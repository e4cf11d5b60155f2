//! Operator-facing display of the game state
//!
//! The game task drives an [`Hmi`] with three signals: idle, countdown
//! started and result. [`TracingHmi`] renders them as log lines; a panel
//! driver would implement the same trait.

use crate::game::{GameResult, GameStats};
use chrono::{DateTime, Local};
use tokio::time::{Duration, Instant};
use tracing::{info, warn};

pub trait Hmi: Send {
    /// No session; waiting for a start.
    fn show_idle(&mut self);

    /// A session began and ends at `end_time`. Below `critical` remaining the
    /// countdown switches to its warning style.
    fn start_countdown(&mut self, end_time: Instant, duration: Duration, critical: Duration);

    fn show_result(&mut self, stats: GameStats);

    /// Called once per game tick so time-based output can refresh.
    fn refresh(&mut self) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayMode {
    NoGame,
    Countdown {
        end_time: Instant,
        duration: Duration,
        critical: Duration,
    },
    GameOver {
        stats: GameStats,
        finished_at: DateTime<Local>,
    },
}

/// Log-backed display
pub struct TracingHmi {
    mode: DisplayMode,
    // Whole seconds last announced during a countdown
    last_announced: Option<u64>,
}

impl Default for TracingHmi {
    fn default() -> Self {
        Self::new()
    }
}

impl TracingHmi {
    pub fn new() -> Self {
        Self {
            mode: DisplayMode::NoGame,
            last_announced: None,
        }
    }

    pub fn mode(&self) -> &DisplayMode {
        &self.mode
    }
}

impl Hmi for TracingHmi {
    fn show_idle(&mut self) {
        self.mode = DisplayMode::NoGame;
        self.last_announced = None;
        info!("Ready. Press the controller button to start");
    }

    fn start_countdown(&mut self, end_time: Instant, duration: Duration, critical: Duration) {
        self.mode = DisplayMode::Countdown {
            end_time,
            duration,
            critical,
        };
        self.last_announced = None;
        info!("Countdown started: {}s", duration.as_secs());
    }

    fn show_result(&mut self, stats: GameStats) {
        let finished_at = Local::now();
        let seconds = f64::from(stats.completion_ms) / 1000.0;
        match stats.result {
            GameResult::Won => info!(
                "{} level won in {:.2}s at {}",
                stats.level,
                seconds,
                finished_at.format("%H:%M:%S")
            ),
            GameResult::Lost => info!(
                "{} level lost after {:.2}s at {}",
                stats.level,
                seconds,
                finished_at.format("%H:%M:%S")
            ),
            GameResult::None => info!("{} level ended without a result", stats.level),
        }
        self.mode = DisplayMode::GameOver { stats, finished_at };
        self.last_announced = None;
    }

    fn refresh(&mut self) {
        let DisplayMode::Countdown {
            end_time, critical, ..
        } = self.mode
        else {
            return;
        };

        let remaining = end_time.saturating_duration_since(Instant::now());
        let seconds = remaining.as_secs();
        if self.last_announced == Some(seconds) {
            return;
        }
        self.last_announced = Some(seconds);

        if remaining <= critical {
            warn!("{}s left", seconds);
        } else if seconds % 10 == 0 {
            info!("{}s left", seconds);
        }
    }
}
