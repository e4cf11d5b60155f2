//! Maze game lifecycle
//!
//! - [`game`] - The session state machine driving both tilt servos
//! - [`game_handle`] - Periodic game task, command channel and snapshots
//! - [`button_watch`] - Stop-button polling task
//!
//! # State Machine
//!
//! ```text
//!              start(level)
//! NotRunning ───────────────► Running ──── timeout ────► NotRunning (Lost)
//!     ▲                          │  │
//!     │          stop()          │  └──── ball drop ───► DroppingBall (Won)
//!     └──────────────────────────┘                           │
//!     ▲                                                      │
//!     └─────────────── hold elapsed / stop() ────────────────┘
//! ```

pub mod button_watch;
pub mod game;
pub mod game_handle;

pub use button_watch::spawn_button_watch;
pub use game::{Game, GameEvent, GameStats};
pub use game_handle::{GameCommand, GameError, GameHandle, GameSnapshot};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Digital ball-drop detector at the maze exit
pub trait BallDropSensor: Send {
    fn is_triggered(&mut self) -> bool;
}

/// Physical button that aborts a running session
pub trait StopButton: Send {
    fn is_pressed(&mut self) -> bool;
}

/// Difficulty, selecting one of the per-level time limits
///
/// Config files may name a level (`"hard"`) or give its index (`2`).
/// Anything unrecognised loads as [`GameLevel::Easy`] with a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "LevelSetting")]
pub enum GameLevel {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl GameLevel {
    /// Unknown indices fall back to [`GameLevel::Easy`].
    pub fn from_index(index: u8) -> Self {
        match index {
            0 => GameLevel::Easy,
            1 => GameLevel::Medium,
            2 => GameLevel::Hard,
            other => {
                warn!("Unknown game level {}, defaulting to easy", other);
                GameLevel::Easy
            }
        }
    }
}

impl FromStr for GameLevel {
    type Err = std::convert::Infallible;

    /// Case-insensitive name or index; anything else is [`GameLevel::Easy`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.trim().to_ascii_lowercase().as_str() {
            "easy" => GameLevel::Easy,
            "medium" => GameLevel::Medium,
            "hard" => GameLevel::Hard,
            other => match other.parse::<u8>() {
                Ok(index) => GameLevel::from_index(index),
                Err(_) => {
                    warn!("Unknown game level {:?}, defaulting to easy", s);
                    GameLevel::Easy
                }
            },
        };
        Ok(level)
    }
}

// Raw config value before the fallback is applied
#[derive(Deserialize)]
#[serde(untagged)]
enum LevelSetting {
    Index(u8),
    Name(String),
}

impl From<LevelSetting> for GameLevel {
    fn from(setting: LevelSetting) -> Self {
        match setting {
            LevelSetting::Index(index) => GameLevel::from_index(index),
            LevelSetting::Name(name) => match name.parse() {
                Ok(level) => level,
                Err(never) => match never {},
            },
        }
    }
}

impl fmt::Display for GameLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameLevel::Easy => write!(f, "Easy"),
            GameLevel::Medium => write!(f, "Medium"),
            GameLevel::Hard => write!(f, "Hard"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameResult {
    /// No outcome yet, or the last session was stopped early
    #[default]
    None,
    Won,
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameStatus {
    #[default]
    NotRunning,
    Running,
    /// Maze tilted to release the ball after a win
    DroppingBall,
}

/// Session tuning, loaded from the `[game]` config section
///
/// Every field has a default, so a config file only lists what it changes.
/// The values are applied by [`Game::begin`]; changing them mid-session
/// through [`GameCommand::Configure`] resets the session.
///
/// # Performance Impact
///
/// - `max_servo_pulse_rate`: Higher rates make the maze follow the controller
///   more closely but jerk the ball; below ~100us/s the maze feels sluggish
/// - `tick_ms`: The game task period; lower values smooth servo motion at the
///   cost of more wakeups
///
/// # Examples
///
/// ```rust
/// use mazetilt::game::{GameConfig, GameLevel};
///
/// // Short sessions for a demo table
/// let demo = GameConfig {
///     easy_time_limit_ms: 30_000,
///     medium_time_limit_ms: 20_000,
///     hard_time_limit_ms: 10_000,
///     default_level: GameLevel::Medium,
///     ..GameConfig::default()
/// };
/// ```
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    /// Time limit for [`GameLevel::Easy`]; 0 disables the timeout
    pub easy_time_limit_ms: u32,

    /// Time limit for [`GameLevel::Medium`]; 0 disables the timeout
    pub medium_time_limit_ms: u32,

    /// Time limit for [`GameLevel::Hard`]; 0 disables the timeout
    pub hard_time_limit_ms: u32,

    /// Servo slew rate in microseconds of pulse width per second
    ///
    /// Both axes share it. The ball-drop pose and re-centering after a stop
    /// move at the same rate.
    pub max_servo_pulse_rate: f32,

    /// Full pulse span used for tilting, e.g. 1000 for 1000-2000us
    ///
    /// A controller axis at +/-1 maps to center +/- half of this span.
    pub servo_pulse_range: u16,

    /// X pulse width held while the ball drops out after a win
    pub ball_drop_x_pulse_us: u16,

    /// Y pulse width held while the ball drops out after a win
    pub ball_drop_y_pulse_us: u16,

    /// How long the maze stays in the ball-drop pose before levelling
    pub ball_drop_hold_ms: u32,

    /// Countdown threshold below which the display switches to its warning style
    pub countdown_critical_ms: u32,

    /// Level started by the controller button
    pub default_level: GameLevel,

    /// Game task period
    pub tick_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            easy_time_limit_ms: 60_000,
            medium_time_limit_ms: 45_000,
            hard_time_limit_ms: 30_000,
            max_servo_pulse_rate: 200.0, // Slow enough to keep the ball on track
            servo_pulse_range: 1000,     // 1000-2000us hobby servo
            ball_drop_x_pulse_us: 1500,
            ball_drop_y_pulse_us: 2000,
            ball_drop_hold_ms: 3000,
            countdown_critical_ms: 5000,
            default_level: GameLevel::Easy,
            tick_ms: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_levels_default_to_easy() {
        assert_eq!(GameLevel::from_index(1), GameLevel::Medium);
        assert_eq!(GameLevel::from_index(9), GameLevel::Easy);
        assert_eq!("HARD".parse::<GameLevel>(), Ok(GameLevel::Hard));
        assert_eq!("2".parse::<GameLevel>(), Ok(GameLevel::Hard));
        assert_eq!("expert".parse::<GameLevel>(), Ok(GameLevel::Easy));
    }

    #[test]
    fn config_fills_missing_fields() {
        let config: GameConfig = toml::from_str("easy_time_limit_ms = 1000\ndefault_level = \"medium\"").unwrap();
        assert_eq!(config.easy_time_limit_ms, 1000);
        assert_eq!(config.default_level, GameLevel::Medium);
        assert_eq!(config.hard_time_limit_ms, GameConfig::default().hard_time_limit_ms);
    }

    #[test]
    fn config_level_falls_back_to_easy() {
        let config: GameConfig = toml::from_str("default_level = \"expert\"").unwrap();
        assert_eq!(config.default_level, GameLevel::Easy);

        let config: GameConfig = toml::from_str("default_level = 2").unwrap();
        assert_eq!(config.default_level, GameLevel::Hard);

        let config: GameConfig = toml::from_str("default_level = 7").unwrap();
        assert_eq!(config.default_level, GameLevel::Easy);

        let config: GameConfig = toml::from_str("default_level = \"Medium\"").unwrap();
        assert_eq!(config.default_level, GameLevel::Medium);
    }
}
