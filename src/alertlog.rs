use crate::funding::types::FundingAlertPayload;

pub const UPCOMING_CAP: usize = 200;
pub const TRIGGERED_CAP: usize = 10;
/// How long a passed funding time stays in the upcoming list before moving
/// to the triggered history.
pub const TRIGGER_GRACE_MS: i64 = 60_000;

const MESSAGE_ONLY_MINUTES: u64 = 999_999;

/// One rendered row of the funding alert log.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertLogEntry {
    pub index: u64,
    pub ts: String,
    pub exchange: String,
    pub symbol: String,
    pub minutes_to: u64,
    pub signed_rate_pct: f64,
    pub next_funding_time_ms: i64,
    pub message: String,
}

/// Consumer-side alert log model: a numbered upcoming list sorted by
/// minutes-to-event, and a small triggered history for events whose funding
/// time has passed. Owned by the consumer loop, never touched by workers.
#[derive(Debug, Default)]
pub struct AlertLog {
    counter: u64,
    upcoming: Vec<AlertLogEntry>,
    triggered: Vec<AlertLogEntry>,
}

impl AlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, payload: &FundingAlertPayload, ts: String) {
        self.counter += 1;
        let entry = AlertLogEntry {
            index: self.counter,
            ts,
            exchange: payload.exchange.display_name().to_string(),
            symbol: payload.symbol.clone(),
            minutes_to: payload.minutes_to,
            signed_rate_pct: payload.signed_rate_pct,
            next_funding_time_ms: payload.next_funding_time_ms,
            message: payload.message(),
        };
        self.push(entry);
    }

    /// Free-text rows (cycle errors and the like) sort to the bottom.
    pub fn record_message(&mut self, message: String, ts: String) {
        self.counter += 1;
        let entry = AlertLogEntry {
            index: self.counter,
            ts,
            exchange: String::new(),
            symbol: String::new(),
            minutes_to: MESSAGE_ONLY_MINUTES,
            signed_rate_pct: 0.0,
            next_funding_time_ms: 0,
            message,
        };
        self.push(entry);
    }

    fn push(&mut self, entry: AlertLogEntry) {
        self.upcoming.push(entry);
        self.upcoming
            .sort_by_key(|entry| (entry.minutes_to, entry.index));
        self.upcoming.truncate(UPCOMING_CAP);
    }

    /// Moves entries whose funding time passed more than the grace period
    /// ago into the bounded triggered history, newest first.
    pub fn refresh(&mut self, now_ms: i64) {
        let mut index = 0;
        while index < self.upcoming.len() {
            let entry = &self.upcoming[index];
            let has_funding_time = entry.next_funding_time_ms > 0;
            if has_funding_time && entry.next_funding_time_ms + TRIGGER_GRACE_MS <= now_ms {
                let entry = self.upcoming.remove(index);
                self.triggered.insert(0, entry);
            } else {
                index += 1;
            }
        }
        self.triggered.truncate(TRIGGERED_CAP);
    }

    pub fn clear(&mut self) {
        self.counter = 0;
        self.upcoming.clear();
        self.triggered.clear();
    }

    pub fn upcoming(&self) -> &[AlertLogEntry] {
        &self.upcoming
    }

    pub fn triggered(&self) -> &[AlertLogEntry] {
        &self.triggered
    }
}
