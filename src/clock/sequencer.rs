use crate::clock::rules::{close_message, closing_soon_message, closing_timeframe};
use crate::clock::timeframe::{SoundKind, TimeframeKey};
use crate::config::AlerterConfig;
use chrono::{DateTime, Duration, Timelike, Utc};

pub const TICK_WINDOW_START_SEC: u32 = 55;
pub const TICK_WINDOW_END_SEC: u32 = 58;
pub const TRANSITION_SEC: u32 = 59;

/// Side effects requested by one sequencer step. The driver maps `Play` onto
/// the audio sink and `Notify` onto the event channel; the sequencer itself
/// stays pure and synchronous.
#[derive(Debug, Clone, PartialEq)]
pub enum ClockAction {
    Play {
        timeframe: TimeframeKey,
        kind: SoundKind,
    },
    Notify(String),
}

/// Per-second state machine behind the candle-close audio sequence:
/// lead voice at `60 - lead_time`, tick countdown at 55-58, transition at 59,
/// silent close notification at 0.
#[derive(Debug)]
pub struct ClockSequencer {
    // Absolute second-of-day (UTC) guards. The poll cadence is faster than
    // 1 Hz, so both must survive repeated calls within the same second.
    last_played_second: i64,
    last_tick_second: i64,
}

impl Default for ClockSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSequencer {
    pub fn new() -> Self {
        Self {
            last_played_second: -1,
            last_tick_second: -1,
        }
    }

    /// Evaluates one poll instant. Returns an empty action list for every
    /// repeat call within the same absolute second.
    pub fn tick(&mut self, now_utc: DateTime<Utc>, config: &AlerterConfig) -> Vec<ClockAction> {
        let mut actions = Vec::new();
        let second_of_day = i64::from(now_utc.num_seconds_from_midnight());
        if second_of_day == self.last_played_second {
            return actions;
        }
        self.last_played_second = second_of_day;
        let sec = now_utc.second();

        // The close we are counting down to is the upcoming minute boundary.
        let next_minute = now_utc + Duration::seconds(i64::from(60 - sec));
        if let Some(closing) = closing_timeframe(next_minute, &config.timeframes) {
            if sec == 60 - config.lead_time_secs {
                if config.sounds.voice {
                    actions.push(ClockAction::Play {
                        timeframe: closing,
                        kind: SoundKind::Voice,
                    });
                }
                actions.push(ClockAction::Notify(closing_soon_message(
                    closing,
                    config.lead_time_secs,
                )));
            } else if (TICK_WINDOW_START_SEC..=TICK_WINDOW_END_SEC).contains(&sec) {
                // The tick guard is independent of the new-second gate so the
                // countdown stays single-fire even with multiple dispatch
                // paths into this second.
                if second_of_day != self.last_tick_second {
                    self.last_tick_second = second_of_day;
                    if config.sounds.tick {
                        actions.push(ClockAction::Play {
                            timeframe: closing,
                            kind: SoundKind::Tick,
                        });
                    }
                }
            } else if sec == TRANSITION_SEC && config.sounds.transition {
                actions.push(ClockAction::Play {
                    timeframe: closing,
                    kind: SoundKind::Transition,
                });
            }
        }

        // The close instant itself: notification only, the sound already
        // played at the lead mark.
        if sec == 0 {
            if let Some(closed) = closing_timeframe(now_utc, &config.timeframes) {
                actions.push(ClockAction::Notify(close_message(closed)));
            }
        }

        actions
    }
}
