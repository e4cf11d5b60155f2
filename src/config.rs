use crate::controller::LinkParams;
use crate::game::GameConfig;
use crate::serial::channel::DEFAULT_MAX_LINE_BYTES;
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn, Level};

const CONFIG_DIR: &str = "mazetilt";
const CONFIG_FILE: &str = "config.toml";

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub controller: ControllerConfig,
    pub game: GameConfig,
    pub serial: SerialConfig,
    pub hardware: HardwareConfig,
    pub logging: LoggingConfig,
}

/// Parameters pushed to the hand controller
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    pub max_angle: f32,
    pub update_rate_ms: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        let params = LinkParams::default();
        Self {
            max_angle: params.max_angle,
            update_rate_ms: params.update_rate_ms,
        }
    }
}

impl ControllerConfig {
    pub fn link_params(&self) -> LinkParams {
        LinkParams {
            max_angle: self.max_angle,
            update_rate_ms: self.update_rate_ms,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SerialConfig {
    pub device: String,
    pub baud_rate: u32,
    pub max_line_bytes: usize,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: "/dev/serial0".to_string(),
            baud_rate: 115_200,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

/// Pin and channel assignment on the board
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct HardwareConfig {
    /// BCM pin number
    pub ball_drop_pin: u8,
    pub ball_drop_active_low: bool,
    /// BCM pin number
    pub stop_button_pin: u8,
    pub x_pwm_channel: u8,
    pub y_pwm_channel: u8,
    pub min_pulse_us: u16,
    pub max_pulse_us: u16,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            ball_drop_pin: 17,
            ball_drop_active_low: true,
            stop_button_pin: 27,
            x_pwm_channel: 0,
            y_pwm_channel: 1,
            min_pulse_us: 1000,
            max_pulse_us: 2000,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Unknown names fall back to INFO.
    pub fn max_level(&self) -> Level {
        Level::from_str(self.level.trim()).unwrap_or(Level::INFO)
    }
}

impl AppConfig {
    /// Config file location for this host.
    ///
    /// See [`resolve_path`](Self::resolve_path); the platform config
    /// directory comes from `dirs`.
    pub fn locate(explicit: Option<PathBuf>) -> (PathBuf, bool) {
        Self::resolve_path(explicit, dirs::config_dir())
    }

    /// Picks the config file: `explicit` when given, else
    /// `<config_dir>/mazetilt/config.toml`, else the same path relative to
    /// the working directory.
    ///
    /// The flag is `true` for the working-directory fallback. Nothing is
    /// logged here because this runs before the subscriber is installed; the
    /// caller reports the fallback once logging is up.
    pub fn resolve_path(explicit: Option<PathBuf>, config_dir: Option<PathBuf>) -> (PathBuf, bool) {
        if let Some(path) = explicit {
            return (path, false);
        }
        match config_dir {
            Some(dir) => (dir.join(CONFIG_DIR).join(CONFIG_FILE), false),
            None => (PathBuf::from(".").join(CONFIG_DIR).join(CONFIG_FILE), true),
        }
    }

    /// Contents of `path`, or `Ok(None)` when the file does not exist.
    pub async fn read(path: &Path) -> Result<Option<String>> {
        if !tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        Ok(Some(content))
    }

    /// Parses file contents read from `path`.
    ///
    /// Fallbacks applied while parsing (such as an unknown
    /// `game.default_level`) log warnings, so call this after logging is set
    /// up.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
    }

    /// The `[logging] level` of a config file, looked up before the rest is
    /// parsed. Unreadable files and unknown levels give INFO.
    pub fn peek_log_level(content: &str) -> Level {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct LoggingOnly {
            logging: LoggingConfig,
        }

        toml::from_str::<LoggingOnly>(content)
            .map(|section| section.logging.max_level())
            .unwrap_or(Level::INFO)
    }

    /// Clamps soft limits and rejects settings the system cannot run with.
    pub fn validated(mut self) -> Result<Self> {
        if self.controller.max_angle.is_nan() {
            return Err(eyre!("controller.max_angle must be a number"));
        }
        let max_angle = self.controller.max_angle.clamp(0.0, 1.0);
        if max_angle != self.controller.max_angle {
            warn!(
                "controller.max_angle {} clamped to {}",
                self.controller.max_angle, max_angle
            );
            self.controller.max_angle = max_angle;
        }

        if self.controller.update_rate_ms == 0 {
            return Err(eyre!("controller.update_rate_ms must be non-zero"));
        }
        if self.hardware.min_pulse_us >= self.hardware.max_pulse_us {
            return Err(eyre!(
                "hardware.min_pulse_us ({}) must be below hardware.max_pulse_us ({})",
                self.hardware.min_pulse_us,
                self.hardware.max_pulse_us
            ));
        }
        if self.game.tick_ms == 0 {
            return Err(eyre!("game.tick_ms must be non-zero"));
        }
        if self.serial.max_line_bytes == 0 {
            return Err(eyre!("serial.max_line_bytes must be non-zero"));
        }
        let rate = self.game.max_servo_pulse_rate;
        if rate.is_nan() || rate < 0.0 {
            return Err(eyre!(
                "game.max_servo_pulse_rate must be non-negative, got {}",
                rate
            ));
        }

        debug!("Configuration validated: {:?}", self);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameLevel;

    const SAMPLE: &str = r#"
[controller]
max_angle = 0.8
update_rate_ms = 50

[game]
hard_time_limit_ms = 20000
default_level = "hard"

[serial]
device = "/dev/ttyAMA0"

[hardware]
min_pulse_us = 1100
max_pulse_us = 1900

[logging]
level = "debug"
"#;

    #[test]
    fn parses_partial_file() {
        let config: AppConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(
            config.controller.link_params(),
            LinkParams {
                max_angle: 0.8,
                update_rate_ms: 50
            }
        );
        assert_eq!(config.game.hard_time_limit_ms, 20_000);
        assert_eq!(config.game.default_level, GameLevel::Hard);
        assert_eq!(config.game.tick_ms, 10);
        assert_eq!(config.serial.device, "/dev/ttyAMA0");
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.hardware.max_pulse_us, 1900);
        assert_eq!(config.logging.max_level(), Level::DEBUG);
    }

    #[test]
    fn empty_file_is_default() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.controller.link_params(), LinkParams::default());
        assert!(config.validated().is_ok());
    }

    #[test]
    fn validation_clamps_and_rejects() {
        let mut config = AppConfig::default();
        config.controller.max_angle = 3.0;
        assert_eq!(config.validated().unwrap().controller.max_angle, 1.0);

        let mut config = AppConfig::default();
        config.controller.update_rate_ms = 0;
        assert!(config.validated().is_err());

        let mut config = AppConfig::default();
        config.hardware.min_pulse_us = 2000;
        assert!(config.validated().is_err());

        let mut config = AppConfig::default();
        config.game.max_servo_pulse_rate = f32::NAN;
        assert!(config.validated().is_err());
    }

    #[test]
    fn unknown_default_level_loads_as_easy() {
        let config: AppConfig = toml::from_str("[game]\ndefault_level = \"expert\"").unwrap();
        assert_eq!(config.game.default_level, GameLevel::Easy);
        assert!(config.validated().is_ok());
    }

    #[test]
    fn log_level_is_read_ahead_of_full_parse() {
        assert_eq!(AppConfig::peek_log_level(SAMPLE), Level::DEBUG);
        assert_eq!(AppConfig::peek_log_level(""), Level::INFO);

        // the rest of the file need not be valid
        let content = "[logging]\nlevel = \"warn\"\n[controller]\nmax_angle = \"steep\"";
        assert_eq!(AppConfig::peek_log_level(content), Level::WARN);
        assert_eq!(AppConfig::peek_log_level("[logging"), Level::INFO);
    }

    #[test]
    fn unknown_log_level_is_info() {
        let logging = LoggingConfig {
            level: "chatty".to_string(),
        };
        assert_eq!(logging.max_level(), Level::INFO);
    }

    #[tokio::test]
    async fn read_from_disk() {
        let dir = std::env::temp_dir().join(format!("mazetilt-config-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();

        let missing = dir.join("missing.toml");
        assert!(AppConfig::read(&missing).await.unwrap().is_none());

        let path = dir.join(CONFIG_FILE);
        tokio::fs::write(&path, SAMPLE).await.unwrap();
        let content = AppConfig::read(&path).await.unwrap().unwrap();
        let config = AppConfig::parse(&content, &path).unwrap();
        assert_eq!(config.controller.update_rate_ms, 50);

        let broken = "[controller]\nmax_angle = \"steep\"";
        assert!(AppConfig::parse(broken, &path).is_err());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[test]
    fn path_resolution_order() {
        let explicit = PathBuf::from("/tmp/maze.toml");
        assert_eq!(
            AppConfig::resolve_path(Some(explicit.clone()), Some(PathBuf::from("/etc/xdg"))),
            (explicit, false)
        );

        let (path, fallback) = AppConfig::resolve_path(None, Some(PathBuf::from("/etc/xdg")));
        assert_eq!(path, PathBuf::from("/etc/xdg/mazetilt/config.toml"));
        assert!(!fallback);

        let (path, fallback) = AppConfig::resolve_path(None, None);
        assert!(path.ends_with("mazetilt/config.toml"));
        assert!(path.is_relative());
        assert!(fallback);
    }
}
