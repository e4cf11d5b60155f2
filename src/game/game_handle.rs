//! Game task and its handle
//!
//! The [`Game`] is owned by a single tokio task that ticks every
//! `tick_ms`. Other tasks talk to it through [`GameCommand`]s and observe it
//! through [`GameSnapshot`]s published on a `watch` channel.

use super::game::{Game, GameEvent, GameStats};
use super::{GameConfig, GameLevel, GameStatus};
use crate::controller::InputSource;
use crate::hmi::Hmi;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

const COMMAND_QUEUE: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum GameCommand {
    Start(GameLevel),
    Stop,
    /// Re-applies a config; resets the session
    Configure(GameConfig),
}

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Game task is no longer running")]
    Closed,
}

/// Game state as of the most recent tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GameSnapshot {
    pub status: GameStatus,

    /// Level of the current or most recent session
    pub level: GameLevel,

    /// Deadline of the running session; `None` unless running
    pub end_time: Option<Instant>,

    /// Limit of the running session; `None` unless running
    pub time_limit: Option<Duration>,

    pub last_stats: GameStats,

    /// (x, y) pulse widths last sent to the servos
    pub servo_pulses: (u16, u16),

    /// (x, y) pulse widths the ramps are heading for
    pub servo_targets: (f32, f32),
}

impl GameSnapshot {
    fn capture(game: &Game) -> Self {
        Self {
            status: game.status(),
            level: game.current_level(),
            end_time: game.current_game_end_time(),
            time_limit: game.current_game_time_limit(),
            last_stats: game.last_game_stats(),
            servo_pulses: game.servo_pulses(),
            servo_targets: game.servo_targets(),
        }
    }
}

/// Cloneable access to the running game task
///
/// Commands are queued (up to 16) and applied at the start of the next tick,
/// so a command's effect shows in [`snapshot`](Self::snapshot) one tick
/// period later at the earliest. Snapshots are replaced wholesale after
/// every tick; a reader never sees fields from two different ticks.
///
/// # Examples
///
/// ```rust
/// use mazetilt::game::{GameHandle, GameLevel, GameStatus};
///
/// async fn play(handle: &GameHandle) -> Result<(), mazetilt::game::GameError> {
///     handle.start(GameLevel::Hard).await?;
///     let mut updates = handle.subscribe();
///     while updates.changed().await.is_ok() {
///         if updates.borrow().status != GameStatus::Running {
///             break;
///         }
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct GameHandle {
    commands: mpsc::Sender<GameCommand>,
    snapshot: watch::Receiver<GameSnapshot>,
    task: Arc<JoinHandle<()>>,
}

impl GameHandle {
    /// Moves `game` into a new task that reads input from `input` and
    /// reports to `hmi`.
    pub fn spawn<I: InputSource>(game: Game, input: I, hmi: Box<dyn Hmi>) -> Self {
        let (command_sender, command_receiver) = mpsc::channel(COMMAND_QUEUE);
        let (snapshot_sender, snapshot_receiver) = watch::channel(GameSnapshot::capture(&game));

        let task = tokio::spawn(async move {
            let mut game_loop = GameLoop {
                game,
                input,
                hmi,
                commands: command_receiver,
                snapshots: snapshot_sender,
                last_axes: (0.0, 0.0),
                button_was_pressed: false,
            };
            game_loop.run().await;
        });
        debug!("Game task spawned: {:?}", task);

        Self {
            commands: command_sender,
            snapshot: snapshot_receiver,
            task: Arc::new(task),
        }
    }

    /// Queues `command` for the next tick.
    ///
    /// Waits only when the queue is full.
    ///
    /// # Errors
    ///
    /// [`GameError::Closed`] when the game task has ended.
    pub async fn send(&self, command: GameCommand) -> Result<(), GameError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| GameError::Closed)
    }

    /// Requests a session at `level`. Ignored by the game unless it is ready
    /// to start; watch the snapshot to see whether it took.
    pub async fn start(&self, level: GameLevel) -> Result<(), GameError> {
        self.send(GameCommand::Start(level)).await
    }

    /// Aborts a running session or ends the ball-drop pose early.
    pub async fn stop(&self) -> Result<(), GameError> {
        self.send(GameCommand::Stop).await
    }

    /// Applies `config` and resets the session, including the last result.
    pub async fn configure(&self, config: GameConfig) -> Result<(), GameError> {
        self.send(GameCommand::Configure(config)).await
    }

    /// State as of the most recent tick.
    pub fn snapshot(&self) -> GameSnapshot {
        *self.snapshot.borrow()
    }

    /// Receiver that wakes after every tick.
    pub fn subscribe(&self) -> watch::Receiver<GameSnapshot> {
        self.snapshot.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

struct GameLoop<I> {
    game: Game,
    input: I,
    hmi: Box<dyn Hmi>,
    commands: mpsc::Receiver<GameCommand>,
    snapshots: watch::Sender<GameSnapshot>,
    // Axes of the last fresh report; held while the controller is stale
    last_axes: (f32, f32),
    button_was_pressed: bool,
}

impl<I: InputSource> GameLoop<I> {
    async fn run(&mut self) {
        info!("Game task started");
        self.hmi.show_idle();
        let mut ticker = Self::ticker(self.game.config().tick_ms);

        loop {
            ticker.tick().await;
            let tick_ms = self.game.config().tick_ms;

            self.tick();

            if self.game.config().tick_ms != tick_ms {
                ticker = Self::ticker(self.game.config().tick_ms);
            }
        }
    }

    fn ticker(tick_ms: u64) -> Interval {
        let mut ticker = interval(Duration::from_millis(tick_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    fn tick(&mut self) {
        let status = self.input.status();
        if let Some(status) = status {
            self.last_axes = (status.x, status.y);
        }

        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
        }

        let pressed = status.is_some_and(|s| s.button_pressed);
        if pressed && !self.button_was_pressed && self.game.is_ready_to_start() {
            let level = self.game.config().default_level;
            info!("Controller button pressed, starting {} game", level);
            self.start(level);
        }
        self.button_was_pressed = pressed;

        let (x, y) = self.last_axes;
        match self.game.update(x, y) {
            Some(GameEvent::Finished(stats)) => self.hmi.show_result(stats),
            Some(GameEvent::BallDropComplete) => debug!("Maze levelled after ball drop"),
            None => {}
        }
        self.hmi.refresh();

        self.snapshots.send_replace(GameSnapshot::capture(&self.game));
    }

    fn apply(&mut self, command: GameCommand) {
        debug!("Game command: {:?}", command);
        match command {
            GameCommand::Start(level) => self.start(level),
            GameCommand::Stop => {
                if self.game.stop() {
                    self.hmi.show_idle();
                }
            }
            GameCommand::Configure(config) => {
                self.game.begin(config);
                self.hmi.show_idle();
            }
        }
    }

    fn start(&mut self, level: GameLevel) {
        if !self.game.start(level) {
            warn!("Game not ready, start of {} game ignored", level);
            return;
        }
        if let (Some(end_time), Some(limit)) = (
            self.game.current_game_end_time(),
            self.game.current_game_time_limit(),
        ) {
            let critical = Duration::from_millis(u64::from(self.game.config().countdown_critical_ms));
            self.hmi.start_countdown(end_time, limit, critical);
        }
    }
}
