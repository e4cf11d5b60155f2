use super::{GameHandle, StopButton};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};

pub const BUTTON_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Polls `button` and sends a stop to the game on every press. Ends when
/// the game task is gone.
pub fn spawn_button_watch(mut button: Box<dyn StopButton>, game: GameHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(BUTTON_POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut was_pressed = false;

        loop {
            ticker.tick().await;
            let pressed = button.is_pressed();
            if pressed && !was_pressed {
                info!("Stop button pressed");
                if let Err(e) = game.stop().await {
                    warn!("Stop button watch ending: {}", e);
                    break;
                }
            }
            was_pressed = pressed;
        }
    })
}
