use super::{BallDropSensor, GameConfig, GameLevel, GameResult, GameStatus};
use crate::motion::{RateLimitedValue, Servo, CENTER_PULSE_US};
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Outcome-bearing transitions reported by [`Game::update`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameEvent {
    Finished(GameStats),
    /// The ball-drop pose has been held long enough; the maze is levelling
    BallDropComplete,
}

/// Result record of the most recent session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GameStats {
    pub level: GameLevel,
    pub result: GameResult,
    pub completion_ms: u32,
}

/// Game session state machine
///
/// Owns both servo ramps and the ball-drop sensor. [`update`](Game::update)
/// is expected roughly every 10ms; it always advances the ramps, so targets
/// set by [`stop`](Game::stop) are still reached after the session ends.
pub struct Game {
    x_servo: Box<dyn Servo>,
    y_servo: Box<dyn Servo>,
    ball_drop: Box<dyn BallDropSensor>,

    config: GameConfig,
    x_ramp: RateLimitedValue<f32>,
    y_ramp: RateLimitedValue<f32>,

    status: GameStatus,
    current_level: GameLevel,
    current_time_limit: Duration,
    start_time: Instant,
    drop_time: Instant,
    last_update: Instant,

    last_stats: GameStats,
}

impl Game {
    pub fn new(
        config: GameConfig,
        x_servo: Box<dyn Servo>,
        y_servo: Box<dyn Servo>,
        ball_drop: Box<dyn BallDropSensor>,
    ) -> Self {
        let now = Instant::now();
        let center = f32::from(CENTER_PULSE_US);
        let mut game = Self {
            x_servo,
            y_servo,
            ball_drop,
            x_ramp: RateLimitedValue::new(center, config.max_servo_pulse_rate),
            y_ramp: RateLimitedValue::new(center, config.max_servo_pulse_rate),
            config: config.clone(),
            status: GameStatus::NotRunning,
            current_level: GameLevel::Easy,
            current_time_limit: Duration::ZERO,
            start_time: now,
            drop_time: now,
            last_update: now,
            last_stats: GameStats::default(),
        };
        game.begin(config);
        game
    }

    /// Resets the session and applies `config`. Servos snap to center.
    pub fn begin(&mut self, config: GameConfig) {
        info!("Game configured: {:?}", config);
        let center = f32::from(CENTER_PULSE_US);
        for ramp in [&mut self.x_ramp, &mut self.y_ramp] {
            ramp.set_max_rate(config.max_servo_pulse_rate);
            ramp.reset(center);
        }
        self.config = config;

        let now = Instant::now();
        self.status = GameStatus::NotRunning;
        self.current_time_limit = Duration::ZERO;
        self.start_time = now;
        self.drop_time = now;
        self.last_update = now;
        self.last_stats = GameStats::default();
    }

    /// Starts a session at `level`. Ignored unless [`is_ready_to_start`](Self::is_ready_to_start).
    pub fn start(&mut self, level: GameLevel) -> bool {
        if !self.is_ready_to_start() {
            debug!("Ignoring start while {:?}", self.status);
            return false;
        }

        self.current_level = level;
        self.current_time_limit = self.time_limit(level);
        self.start_time = Instant::now();
        self.status = GameStatus::Running;
        self.center_targets();

        info!(
            "Game started at {} level ({}ms limit)",
            level,
            self.current_time_limit.as_millis()
        );
        true
    }

    /// Aborts a running session and clears the last result. During the
    /// ball-drop pose it only levels the maze; the win is kept.
    pub fn stop(&mut self) -> bool {
        match self.status {
            GameStatus::Running => {
                self.status = GameStatus::NotRunning;
                self.center_targets();
                self.last_stats.result = GameResult::None;
                self.last_stats.completion_ms = 0;
                info!("Game stopped");
                true
            }
            GameStatus::DroppingBall => {
                self.status = GameStatus::NotRunning;
                self.center_targets();
                info!("Ball drop ended early");
                true
            }
            GameStatus::NotRunning => false,
        }
    }

    /// Advances the session with the latest controller axes.
    pub fn update(&mut self, controller_x: f32, controller_y: f32) -> Option<GameEvent> {
        let now = Instant::now();

        let event = match self.status {
            GameStatus::Running => self.update_running(now, controller_x, controller_y),
            GameStatus::DroppingBall => self.update_dropping(now),
            GameStatus::NotRunning => None,
        };

        // Whole milliseconds only; the remainder carries into the next call
        let delta_ms = u32::try_from(now.saturating_duration_since(self.last_update).as_millis())
            .unwrap_or(u32::MAX);
        self.last_update += Duration::from_millis(u64::from(delta_ms));
        self.x_ramp.update(delta_ms);
        self.y_ramp.update(delta_ms);

        let (x_pulse, y_pulse) = self.servo_pulses();
        if let Err(e) = self.x_servo.set_pulse_width(x_pulse) {
            warn!("Failed to drive X servo: {}", e);
        }
        if let Err(e) = self.y_servo.set_pulse_width(y_pulse) {
            warn!("Failed to drive Y servo: {}", e);
        }

        event
    }

    fn update_running(&mut self, now: Instant, controller_x: f32, controller_y: f32) -> Option<GameEvent> {
        let elapsed = now.saturating_duration_since(self.start_time);

        // A zero limit disables the timeout
        if !self.current_time_limit.is_zero() && elapsed >= self.current_time_limit {
            self.status = GameStatus::NotRunning;
            self.center_targets();
            let stats = self.record(GameResult::Lost, self.current_time_limit);
            info!("Game lost: time limit of {}ms reached", stats.completion_ms);
            return Some(GameEvent::Finished(stats));
        }

        if self.ball_drop.is_triggered() {
            self.status = GameStatus::DroppingBall;
            self.drop_time = now;
            self.x_ramp
                .set_target(f32::from(self.config.ball_drop_x_pulse_us));
            self.y_ramp
                .set_target(f32::from(self.config.ball_drop_y_pulse_us));
            let stats = self.record(GameResult::Won, elapsed);
            info!("Game won in {}ms", stats.completion_ms);
            return Some(GameEvent::Finished(stats));
        }

        let half_range = f32::from(self.config.servo_pulse_range) * 0.5;
        let center = f32::from(CENTER_PULSE_US);
        self.x_ramp
            .set_target(center + clamp_axis(controller_x) * half_range);
        self.y_ramp
            .set_target(center + clamp_axis(controller_y) * half_range);
        None
    }

    fn update_dropping(&mut self, now: Instant) -> Option<GameEvent> {
        let hold = Duration::from_millis(u64::from(self.config.ball_drop_hold_ms));
        if now.saturating_duration_since(self.drop_time) < hold {
            return None;
        }
        self.status = GameStatus::NotRunning;
        self.center_targets();
        debug!("Ball drop pose released");
        Some(GameEvent::BallDropComplete)
    }

    fn record(&mut self, result: GameResult, completion: Duration) -> GameStats {
        self.last_stats = GameStats {
            level: self.current_level,
            result,
            completion_ms: u32::try_from(completion.as_millis()).unwrap_or(u32::MAX),
        };
        self.last_stats
    }

    fn center_targets(&mut self) {
        let center = f32::from(CENTER_PULSE_US);
        self.x_ramp.set_target(center);
        self.y_ramp.set_target(center);
    }

    /// Per-level limit from the config table.
    fn time_limit(&self, level: GameLevel) -> Duration {
        let ms = match level {
            GameLevel::Easy => self.config.easy_time_limit_ms,
            GameLevel::Medium => self.config.medium_time_limit_ms,
            GameLevel::Hard => self.config.hard_time_limit_ms,
        };
        Duration::from_millis(u64::from(ms))
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    /// False during the ball-drop pose as well.
    pub fn is_running(&self) -> bool {
        self.status == GameStatus::Running
    }

    pub fn is_ready_to_start(&self) -> bool {
        self.status == GameStatus::NotRunning
    }

    pub fn current_level(&self) -> GameLevel {
        self.current_level
    }

    pub fn last_game_stats(&self) -> GameStats {
        self.last_stats
    }

    /// Deadline of the running session.
    pub fn current_game_end_time(&self) -> Option<Instant> {
        self.is_running()
            .then(|| self.start_time + self.current_time_limit)
    }

    pub fn current_game_time_limit(&self) -> Option<Duration> {
        self.is_running().then_some(self.current_time_limit)
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Current (ramped) pulse widths as sent to the servos.
    pub fn servo_pulses(&self) -> (u16, u16) {
        (to_pulse(self.x_ramp.current()), to_pulse(self.y_ramp.current()))
    }

    pub fn servo_targets(&self) -> (f32, f32) {
        (self.x_ramp.target(), self.y_ramp.target())
    }
}

fn clamp_axis(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(-1.0, 1.0)
    }
}

fn to_pulse(value: f32) -> u16 {
    value.round().clamp(0.0, f32::from(u16::MAX)) as u16
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::motion::testing::RecordingServo;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    pub(crate) struct FakeSensor(Arc<AtomicBool>);

    impl FakeSensor {
        pub(crate) fn set(&self, triggered: bool) {
            self.0.store(triggered, Ordering::SeqCst);
        }
    }

    impl BallDropSensor for FakeSensor {
        fn is_triggered(&mut self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    pub(crate) fn test_config() -> GameConfig {
        GameConfig {
            easy_time_limit_ms: 1000,
            medium_time_limit_ms: 2000,
            hard_time_limit_ms: 500,
            ..GameConfig::default()
        }
    }

    fn game() -> (Game, RecordingServo, RecordingServo, FakeSensor) {
        let x = RecordingServo::default();
        let y = RecordingServo::default();
        let sensor = FakeSensor::default();
        let game = Game::new(
            test_config(),
            Box::new(x.clone()),
            Box::new(y.clone()),
            Box::new(sensor.clone()),
        );
        (game, x, y, sensor)
    }

    async fn tick(game: &mut Game, ms: u64, x: f32, y: f32) -> Option<GameEvent> {
        tokio::time::advance(Duration::from_millis(ms)).await;
        game.update(x, y)
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_as_lost() {
        let (mut game, _, _, _) = game();
        assert!(game.start(GameLevel::Easy));
        assert_eq!(game.current_game_time_limit(), Some(Duration::from_millis(1000)));

        let mut events = Vec::new();
        for _ in 0..100 {
            if let Some(event) = tick(&mut game, 10, 0.2, 0.2).await {
                events.push(event);
            }
        }

        assert_eq!(game.status(), GameStatus::NotRunning);
        let expected = GameStats {
            level: GameLevel::Easy,
            result: GameResult::Lost,
            completion_ms: 1000,
        };
        assert_eq!(game.last_game_stats(), expected);
        assert_eq!(events, vec![GameEvent::Finished(expected)]);
        assert_eq!(game.servo_targets(), (1500.0, 1500.0));
        assert!(game.current_game_end_time().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn ball_drop_wins() {
        let (mut game, _, _, sensor) = game();
        game.start(GameLevel::Medium);

        for _ in 0..123 {
            assert!(tick(&mut game, 10, 0.0, 0.0).await.is_none());
        }
        sensor.set(true);
        let event = tick(&mut game, 4, 0.0, 0.0).await;

        let expected = GameStats {
            level: GameLevel::Medium,
            result: GameResult::Won,
            completion_ms: 1234,
        };
        assert_eq!(event, Some(GameEvent::Finished(expected)));
        assert_eq!(game.status(), GameStatus::DroppingBall);
        assert!(!game.is_running());
        assert!(!game.is_ready_to_start());
        assert_eq!(game.servo_targets(), (1500.0, 2000.0));
    }

    #[tokio::test(start_paused = true)]
    async fn ball_drop_pose_releases_after_hold() {
        let (mut game, _, _, sensor) = game();
        game.start(GameLevel::Easy);
        sensor.set(true);
        tick(&mut game, 10, 0.0, 0.0).await;
        sensor.set(false);

        assert!(tick(&mut game, 2999, 0.0, 0.0).await.is_none());
        assert_eq!(
            tick(&mut game, 1, 0.0, 0.0).await,
            Some(GameEvent::BallDropComplete)
        );
        assert!(game.is_ready_to_start());
        assert_eq!(game.last_game_stats().result, GameResult::Won);
        assert_eq!(game.servo_targets(), (1500.0, 1500.0));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_beats_simultaneous_drop() {
        let (mut game, _, _, sensor) = game();
        game.start(GameLevel::Hard);
        sensor.set(true);

        let event = tick(&mut game, 500, 0.0, 0.0).await;
        assert!(matches!(
            event,
            Some(GameEvent::Finished(GameStats {
                result: GameResult::Lost,
                completion_ms: 500,
                ..
            }))
        ));
        assert_eq!(game.status(), GameStatus::NotRunning);
    }

    #[tokio::test(start_paused = true)]
    async fn axes_map_to_pulse_targets() {
        let (mut game, _, _, _) = game();
        game.start(GameLevel::Easy);

        tick(&mut game, 10, 2.0, -0.5).await;
        assert_eq!(game.servo_targets(), (2000.0, 1250.0));

        tick(&mut game, 10, f32::NAN, -3.0).await;
        assert_eq!(game.servo_targets(), (1500.0, 1000.0));
    }

    #[tokio::test(start_paused = true)]
    async fn ramps_limit_servo_motion() {
        let (mut game, x, y, _) = game();
        game.start(GameLevel::Easy);

        // 200us/s over 10ms
        tick(&mut game, 10, 1.0, -1.0).await;
        assert_eq!(x.last(), Some(1502));
        assert_eq!(y.last(), Some(1498));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_recenters_even_when_idle() {
        let (mut game, x, _, _) = game();
        game.start(GameLevel::Easy);
        for _ in 0..50 {
            tick(&mut game, 10, 1.0, 0.0).await;
        }
        assert_eq!(x.last(), Some(1600));

        assert!(game.stop());
        assert_eq!(game.last_game_stats().result, GameResult::None);
        assert!(!game.stop());

        for _ in 0..50 {
            tick(&mut game, 10, 1.0, 0.0).await;
        }
        assert_eq!(x.last(), Some(1500));
        assert_eq!(x.count(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_clears_previous_outcome() {
        let (mut game, _, _, _) = game();
        game.start(GameLevel::Hard);
        tick(&mut game, 600, 0.0, 0.0).await;
        assert_eq!(game.last_game_stats().result, GameResult::Lost);

        game.start(GameLevel::Easy);
        assert_eq!(game.last_game_stats().result, GameResult::Lost);
        game.stop();
        assert_eq!(game.last_game_stats().result, GameResult::None);
        assert_eq!(game.last_game_stats().completion_ms, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn start_ignored_unless_ready() {
        let (mut game, _, _, _) = game();
        assert!(game.start(GameLevel::Easy));
        let deadline = game.current_game_end_time();

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(!game.start(GameLevel::Hard));
        assert_eq!(game.current_level(), GameLevel::Easy);
        assert_eq!(game.current_game_end_time(), deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_limit_never_times_out() {
        let (mut game, _, _, _) = game();
        game.begin(GameConfig {
            easy_time_limit_ms: 0,
            ..test_config()
        });
        game.start(GameLevel::Easy);
        tick(&mut game, 100_000, 0.0, 0.0).await;
        assert!(game.is_running());
    }
}
