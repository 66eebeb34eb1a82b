pub mod overlay;
pub mod rules;
pub mod sequencer;
pub mod timeframe;

use crate::config::SharedConfig;
use crate::events::{EngineEvent, EventSender};
use crate::sound::{AudioSink, SoundBank};
use self::overlay::{ForegroundWindow, OverlayController, OverlayOverrides, OverlaySurface};
use self::sequencer::{ClockAction, ClockSequencer};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// 4 Hz keeps the 55-58s tick window reliable even under timer jitter.
pub const CLOCK_POLL_INTERVAL_MS: u64 = 250;
/// The overlay clock text refreshes faster than the alert logic runs.
pub const OVERLAY_TIME_REFRESH_MS: u64 = 100;

pub struct ClockHandle {
    pub cancellation_token: CancellationToken,
    pub join_handle: tokio::task::JoinHandle<()>,
}

impl ClockHandle {
    pub async fn shutdown(self) {
        self.cancellation_token.cancel();
        let _ = self.join_handle.await;
    }
}

/// Spawns the clock driver: a single lightweight task owning the sequencer
/// and the overlay controller, polling wall-clock time and mapping actions
/// onto the audio sink and the event channel. Sound paths are pre-resolved;
/// nothing here blocks.
pub fn spawn_clock<S, F>(
    config: SharedConfig,
    events: EventSender,
    audio: Arc<dyn AudioSink>,
    sound_bank: Arc<SoundBank>,
    surface: S,
    foreground: F,
) -> ClockHandle
where
    S: OverlaySurface + 'static,
    F: ForegroundWindow + 'static,
{
    let cancellation_token = CancellationToken::new();
    let task_token = cancellation_token.clone();

    let join_handle = tokio::spawn(async move {
        let mut sequencer = ClockSequencer::new();
        let mut controller = OverlayController::new(surface);

        let mut logic_ticker =
            tokio::time::interval(Duration::from_millis(CLOCK_POLL_INTERVAL_MS));
        logic_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut overlay_ticker =
            tokio::time::interval(Duration::from_millis(OVERLAY_TIME_REFRESH_MS));
        overlay_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = task_token.cancelled() => break,
                _ = overlay_ticker.tick() => {
                    controller.set_time(chrono::Local::now());
                }
                _ = logic_ticker.tick() => {
                    let snapshot = config.read().clone();
                    let actions = sequencer.tick(chrono::Utc::now(), &snapshot);
                    for action in actions {
                        match action {
                            ClockAction::Play { timeframe, kind } => {
                                if snapshot.volume == 0 {
                                    continue;
                                }
                                let filename = snapshot.sound_file(timeframe, kind);
                                match sound_bank.resolve(kind, &filename) {
                                    Some(path) => audio.play(path, kind, snapshot.volume),
                                    None => debug!(%filename, ?kind, "sound not in cache"),
                                }
                            }
                            ClockAction::Notify(text) => {
                                if events.send(EngineEvent::CandleClose(text)).is_err() {
                                    return;
                                }
                            }
                        }
                    }
                    controller.refresh(
                        &snapshot.overlay,
                        &foreground,
                        OverlayOverrides::default(),
                    );
                }
            }
        }
    });

    ClockHandle {
        cancellation_token,
        join_handle,
    }
}
