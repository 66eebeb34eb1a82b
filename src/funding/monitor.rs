use crate::config::{AlerterConfig, SharedConfig};
use crate::error::AppError;
use crate::events::{EngineEvent, EventSender};
use crate::funding::cache::AlertCache;
use crate::funding::exchanges;
use crate::funding::parse::{parse_minute_list, parse_threshold, passes_threshold};
use crate::funding::types::{
    ExchangeFetch, ExchangeId, ExchangeStatus, FundingAlertKind, FundingAlertPayload,
    FundingStatusSnapshot,
};
use chrono::Utc;
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const INITIAL_POLL_DELAY_MS: u64 = 1_000;
/// Delay when any funding event is within the near window.
pub const NEAR_POLL_DELAY_MS: u64 = 60_000;
pub const FAR_POLL_DELAY_MS: u64 = 300_000;
/// Fixed reschedule after a cycle-level failure.
pub const FALLBACK_POLL_DELAY_MS: u64 = 60_000;
pub const NEAR_WINDOW_MINUTES: u64 = 60;

/// Immutable per-cycle view of the funding configuration. Parsed once at
/// cycle start so mid-cycle UI edits cannot produce a torn read.
#[derive(Debug, Clone, PartialEq)]
pub struct FundingSettings {
    pub exchanges: Vec<ExchangeId>,
    pub minute_targets: Vec<u32>,
    pub threshold_pos: Option<f64>,
    pub threshold_neg: Option<f64>,
}

impl FundingSettings {
    pub fn from_config(config: &AlerterConfig) -> Self {
        Self {
            // BTreeSet iteration keeps the signature sorted.
            exchanges: config.exchanges.iter().copied().collect(),
            minute_targets: parse_minute_list(&config.funding_minutes_text),
            threshold_pos: parse_threshold(&config.funding_threshold_pos_text),
            threshold_neg: parse_threshold(&config.funding_threshold_neg_text),
        }
    }
}

struct MonitorControls {
    poll_now: Notify,
    in_flight: AtomicBool,
}

pub struct FundingMonitorHandle {
    pub cancellation_token: CancellationToken,
    pub join_handle: tokio::task::JoinHandle<()>,
    controls: Arc<MonitorControls>,
}

impl FundingMonitorHandle {
    /// Asks the monitor to poll as soon as possible. While a cycle is in
    /// flight the request is deferred to right after it completes; it is
    /// never dropped and never overlaps a running cycle.
    pub fn request_poll(&self) {
        if self.controls.in_flight.load(Ordering::SeqCst) {
            debug!("poll requested while a cycle is in flight, deferring");
        }
        self.controls.poll_now.notify_one();
    }

    pub async fn shutdown(self) {
        self.cancellation_token.cancel();
        let _ = self.join_handle.await;
    }
}

pub struct FundingMonitor {
    config: SharedConfig,
    events: EventSender,
    status_store: Arc<RwLock<FundingStatusSnapshot>>,
    client: reqwest::Client,
    cache: AlertCache,
    last_signature: Option<Vec<ExchangeId>>,
}

impl FundingMonitor {
    pub fn spawn(
        config: SharedConfig,
        events: EventSender,
        status_store: Arc<RwLock<FundingStatusSnapshot>>,
    ) -> Result<FundingMonitorHandle, AppError> {
        let monitor = Self {
            config,
            events,
            status_store,
            client: exchanges::build_client()?,
            cache: AlertCache::default(),
            last_signature: None,
        };

        let cancellation_token = CancellationToken::new();
        let task_token = cancellation_token.clone();
        let controls = Arc::new(MonitorControls {
            poll_now: Notify::new(),
            in_flight: AtomicBool::new(false),
        });
        let task_controls = Arc::clone(&controls);
        let join_handle = tokio::spawn(async move {
            monitor.run(task_token, task_controls).await;
        });

        Ok(FundingMonitorHandle {
            cancellation_token,
            join_handle,
            controls,
        })
    }

    async fn run(mut self, cancel_token: CancellationToken, controls: Arc<MonitorControls>) {
        let mut delay_ms = INITIAL_POLL_DELAY_MS;
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
                _ = controls.poll_now.notified() => {}
            }

            controls.in_flight.store(true, Ordering::SeqCst);
            delay_ms = match self.run_cycle().await {
                Ok(next_delay_ms) => next_delay_ms,
                Err(error) => {
                    warn!(%error, "funding poll cycle failed");
                    FALLBACK_POLL_DELAY_MS
                }
            };
            controls.in_flight.store(false, Ordering::SeqCst);
        }
    }

    async fn run_cycle(&mut self) -> Result<u64, AppError> {
        let settings = FundingSettings::from_config(&self.config.read());

        if signature_changed(&mut self.last_signature, &settings.exchanges) {
            debug!("exchange selection changed, clearing alert cache");
            self.cache.clear();
        }

        let fetches = join_all(
            settings
                .exchanges
                .iter()
                .map(|&exchange| exchanges::fetch_exchange(&self.client, exchange)),
        )
        .await;

        for fetch in &fetches {
            if let Some(error_text) = &fetch.error_text {
                warn!(
                    exchange = fetch.exchange.as_str(),
                    error = %error_text,
                    "funding fetch failed"
                );
            }
        }

        let now_ms = Utc::now().timestamp_millis();
        let outcome = evaluate_cycle(&fetches, &settings, now_ms, &mut self.cache);
        for event in outcome.events {
            self.events.send(event).map_err(|_| AppError::ChannelClosed)?;
        }

        let status = build_status(&fetches, &outcome.passed_counts, &settings, now_ms);
        {
            let mut writable = self.status_store.write().await;
            *writable = status.clone();
        }
        self.events
            .send(EngineEvent::FundingStatus(status))
            .map_err(|_| AppError::ChannelClosed)?;

        Ok(next_poll_delay_ms(outcome.min_minutes))
    }
}

/// Updates the stored exchange signature; true means the enabled set changed
/// and stale dedup entries must not suppress re-enabled exchanges.
fn signature_changed(last: &mut Option<Vec<ExchangeId>>, current: &[ExchangeId]) -> bool {
    let changed = last.as_deref() != Some(current);
    if changed {
        *last = Some(current.to_vec());
    }
    changed
}

fn threshold_tag(threshold: Option<f64>) -> String {
    match threshold {
        Some(value) => value.to_string(),
        None => "none".to_string(),
    }
}

pub(crate) struct CycleOutcome {
    pub events: Vec<EngineEvent>,
    pub min_minutes: Option<u64>,
    pub passed_counts: BTreeMap<ExchangeId, usize>,
}

/// The pure heart of the poll cycle: threshold evaluation, minute matching
/// and cache-backed deduplication over one batch of fetch results.
pub(crate) fn evaluate_cycle(
    fetches: &[ExchangeFetch],
    settings: &FundingSettings,
    now_ms: i64,
    cache: &mut AlertCache,
) -> CycleOutcome {
    let mut events = Vec::new();
    let mut min_minutes: Option<u64> = None;
    let mut passed_counts: BTreeMap<ExchangeId, usize> = BTreeMap::new();
    // The minute list doubles as the log visibility window: only records
    // inside the largest configured target are logged.
    let log_window = settings.minute_targets.last().copied();
    let thresholds_tag = format!(
        "{}:{}",
        threshold_tag(settings.threshold_pos),
        threshold_tag(settings.threshold_neg)
    );

    for fetch in fetches {
        for record in &fetch.records {
            if record.next_funding_time_ms <= 0 {
                continue;
            }
            let minutes_to =
                ((record.next_funding_time_ms - now_ms).max(0) / 60_000) as u64;
            let signed_rate_pct = record.rate * 100.0;
            min_minutes = Some(min_minutes.map_or(minutes_to, |current| current.min(minutes_to)));

            if !passes_threshold(signed_rate_pct, settings.threshold_pos, settings.threshold_neg) {
                continue;
            }
            *passed_counts.entry(fetch.exchange).or_insert(0) += 1;

            if let Some(window) = log_window {
                if minutes_to <= u64::from(window) {
                    let key = AlertCache::key(
                        "log",
                        fetch.exchange.as_str(),
                        &record.symbol,
                        record.next_funding_time_ms,
                        &thresholds_tag,
                    );
                    if cache.insert(key) {
                        events.push(EngineEvent::FundingLog(FundingAlertPayload {
                            exchange: fetch.exchange,
                            symbol: record.symbol.clone(),
                            signed_rate_pct,
                            minutes_to,
                            next_funding_time_ms: record.next_funding_time_ms,
                            kind: FundingAlertKind::Log,
                        }));
                    }
                }
            }

            for &target in &settings.minute_targets {
                if minutes_to == u64::from(target) {
                    let key = AlertCache::key(
                        "alert",
                        fetch.exchange.as_str(),
                        &record.symbol,
                        record.next_funding_time_ms,
                        &format!("{target}:{thresholds_tag}"),
                    );
                    if cache.insert(key) {
                        events.push(EngineEvent::FundingAlert(FundingAlertPayload {
                            exchange: fetch.exchange,
                            symbol: record.symbol.clone(),
                            signed_rate_pct,
                            minutes_to,
                            next_funding_time_ms: record.next_funding_time_ms,
                            kind: FundingAlertKind::Alert,
                        }));
                    }
                }
            }
        }
    }

    CycleOutcome {
        events,
        min_minutes,
        passed_counts,
    }
}

pub(crate) fn build_status(
    fetches: &[ExchangeFetch],
    passed_counts: &BTreeMap<ExchangeId, usize>,
    settings: &FundingSettings,
    now_ms: i64,
) -> FundingStatusSnapshot {
    let exchanges = ExchangeId::ALL
        .into_iter()
        .map(|exchange| {
            let fetch = fetches.iter().find(|fetch| fetch.exchange == exchange);
            (
                exchange,
                ExchangeStatus {
                    name: exchange.display_name(),
                    enabled: settings.exchanges.contains(&exchange),
                    fetched_count: fetch.map_or(0, |fetch| fetch.records.len()),
                    passed_count: passed_counts.get(&exchange).copied().unwrap_or(0),
                    error_text: fetch.and_then(|fetch| fetch.error_text.clone()),
                },
            )
        })
        .collect();

    FundingStatusSnapshot {
        updated_at_ms: now_ms,
        exchanges,
    }
}

pub(crate) fn next_poll_delay_ms(min_minutes: Option<u64>) -> u64 {
    match min_minutes {
        Some(minutes) if minutes <= NEAR_WINDOW_MINUTES => NEAR_POLL_DELAY_MS,
        _ => FAR_POLL_DELAY_MS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funding::types::FundingRecord;

    const NOW_MS: i64 = 1_700_000_000_000;

    fn settings(exchanges: &[ExchangeId], minutes: &str, pos: &str, neg: &str) -> FundingSettings {
        FundingSettings {
            exchanges: exchanges.to_vec(),
            minute_targets: parse_minute_list(minutes),
            threshold_pos: parse_threshold(pos),
            threshold_neg: parse_threshold(neg),
        }
    }

    fn record(exchange: ExchangeId, symbol: &str, rate: f64, minutes_out: i64) -> FundingRecord {
        FundingRecord {
            exchange,
            symbol: symbol.to_string(),
            rate,
            next_funding_time_ms: NOW_MS + minutes_out * 60_000,
        }
    }

    fn alerts(events: &[EngineEvent]) -> Vec<&FundingAlertPayload> {
        events
            .iter()
            .filter_map(|event| match event {
                EngineEvent::FundingAlert(payload) => Some(payload),
                _ => None,
            })
            .collect()
    }

    fn logs(events: &[EngineEvent]) -> Vec<&FundingAlertPayload> {
        events
            .iter()
            .filter_map(|event| match event {
                EngineEvent::FundingLog(payload) => Some(payload),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn exact_minute_match_fires_one_alert() {
        // Binance only, minutes "15,5", +1.0% threshold, negative disabled.
        let settings = settings(&[ExchangeId::Binance], "15,5", "1.0", "0");
        let fetches = vec![ExchangeFetch::ok(
            ExchangeId::Binance,
            vec![record(ExchangeId::Binance, "BTCUSDT", 0.012, 15)],
        )];
        let mut cache = AlertCache::default();

        let outcome = evaluate_cycle(&fetches, &settings, NOW_MS, &mut cache);
        let alerts = alerts(&outcome.events);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, FundingAlertKind::Alert);
        assert_eq!(alerts[0].minutes_to, 15);
        assert!((alerts[0].signed_rate_pct - 1.2).abs() < 1e-9);
    }

    #[test]
    fn repeated_cycles_emit_each_event_once() {
        let settings = settings(&[ExchangeId::Binance], "15,5", "1.0", "0");
        let fetches = vec![ExchangeFetch::ok(
            ExchangeId::Binance,
            vec![record(ExchangeId::Binance, "BTCUSDT", 0.02, 15)],
        )];
        let mut cache = AlertCache::default();

        let mut total_alerts = 0;
        let mut total_logs = 0;
        for _ in 0..5 {
            let outcome = evaluate_cycle(&fetches, &settings, NOW_MS, &mut cache);
            total_alerts += alerts(&outcome.events).len();
            total_logs += logs(&outcome.events).len();
        }
        assert_eq!(total_alerts, 1);
        assert_eq!(total_logs, 1);
    }

    #[test]
    fn each_minute_target_fires_separately_as_time_passes() {
        let settings = settings(&[ExchangeId::Binance], "15,5", "1.0", "0");
        let funding_time = NOW_MS + 15 * 60_000;
        let record = FundingRecord {
            exchange: ExchangeId::Binance,
            symbol: "BTCUSDT".to_string(),
            rate: 0.02,
            next_funding_time_ms: funding_time,
        };
        let fetches = vec![ExchangeFetch::ok(ExchangeId::Binance, vec![record])];
        let mut cache = AlertCache::default();

        let at_15 = evaluate_cycle(&fetches, &settings, NOW_MS, &mut cache);
        assert_eq!(alerts(&at_15.events).len(), 1);

        // Ten minutes later the same record sits on the 5-minute target.
        let at_5 = evaluate_cycle(&fetches, &settings, NOW_MS + 10 * 60_000, &mut cache);
        let five_alerts = alerts(&at_5.events);
        assert_eq!(five_alerts.len(), 1);
        assert_eq!(five_alerts[0].minutes_to, 5);
    }

    #[test]
    fn log_window_is_bounded_by_largest_minute_target() {
        let settings = settings(&[ExchangeId::Binance], "15,5", "1.0", "0");
        let fetches = vec![ExchangeFetch::ok(
            ExchangeId::Binance,
            vec![record(ExchangeId::Binance, "BTCUSDT", 0.02, 45)],
        )];
        let mut cache = AlertCache::default();

        let outcome = evaluate_cycle(&fetches, &settings, NOW_MS, &mut cache);
        assert!(outcome.events.is_empty());
        // Still counted as a threshold pass for diagnostics.
        assert_eq!(outcome.passed_counts.get(&ExchangeId::Binance), Some(&1));
    }

    #[test]
    fn below_threshold_records_emit_nothing() {
        let settings = settings(&[ExchangeId::Binance], "15,5", "1.0", "1.0");
        let fetches = vec![ExchangeFetch::ok(
            ExchangeId::Binance,
            vec![record(ExchangeId::Binance, "BTCUSDT", 0.005, 15)],
        )];
        let mut cache = AlertCache::default();

        let outcome = evaluate_cycle(&fetches, &settings, NOW_MS, &mut cache);
        assert!(outcome.events.is_empty());
        assert!(outcome.passed_counts.is_empty());
        // Threshold misses still inform the adaptive schedule.
        assert_eq!(outcome.min_minutes, Some(15));
    }

    #[test]
    fn failed_exchange_does_not_suppress_healthy_ones() {
        let settings = settings(&[ExchangeId::Binance, ExchangeId::Bybit], "15,5", "1.0", "0");
        let fetches = vec![
            ExchangeFetch::failed(ExchangeId::Binance, "request error: timeout".to_string()),
            ExchangeFetch::ok(
                ExchangeId::Bybit,
                vec![record(ExchangeId::Bybit, "ETHUSDT", 0.03, 5)],
            ),
        ];
        let mut cache = AlertCache::default();

        let outcome = evaluate_cycle(&fetches, &settings, NOW_MS, &mut cache);
        let alerts = alerts(&outcome.events);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].exchange, ExchangeId::Bybit);

        let status = build_status(&fetches, &outcome.passed_counts, &settings, NOW_MS);
        let binance = &status.exchanges[&ExchangeId::Binance];
        let bybit = &status.exchanges[&ExchangeId::Bybit];
        assert!(binance.error_text.is_some());
        assert_eq!(binance.fetched_count, 0);
        assert!(bybit.error_text.is_none());
        assert_eq!(bybit.fetched_count, 1);
        assert_eq!(bybit.passed_count, 1);
    }

    #[test]
    fn status_covers_disabled_exchanges_too() {
        let settings = settings(&[ExchangeId::Binance], "15,5", "1.0", "0");
        let fetches = vec![ExchangeFetch::ok(ExchangeId::Binance, Vec::new())];
        let status = build_status(&fetches, &BTreeMap::new(), &settings, NOW_MS);

        assert_eq!(status.exchanges.len(), ExchangeId::ALL.len());
        assert!(status.exchanges[&ExchangeId::Binance].enabled);
        assert!(!status.exchanges[&ExchangeId::Gate].enabled);
        assert_eq!(status.updated_at_ms, NOW_MS);
    }

    #[test]
    fn near_events_tighten_the_poll_schedule() {
        let settings = settings(&[ExchangeId::Binance], "15,5", "1.0", "0");
        let mut cache = AlertCache::default();

        let near = vec![ExchangeFetch::ok(
            ExchangeId::Binance,
            vec![record(ExchangeId::Binance, "BTCUSDT", 0.0001, 45)],
        )];
        let outcome = evaluate_cycle(&near, &settings, NOW_MS, &mut cache);
        assert_eq!(next_poll_delay_ms(outcome.min_minutes), NEAR_POLL_DELAY_MS);

        let far = vec![ExchangeFetch::ok(
            ExchangeId::Binance,
            vec![record(ExchangeId::Binance, "BTCUSDT", 0.0001, 300)],
        )];
        let outcome = evaluate_cycle(&far, &settings, NOW_MS, &mut cache);
        assert_eq!(next_poll_delay_ms(outcome.min_minutes), FAR_POLL_DELAY_MS);

        assert_eq!(next_poll_delay_ms(None), FAR_POLL_DELAY_MS);
    }

    #[test]
    fn minutes_to_clamps_past_events_to_zero() {
        let settings = settings(&[ExchangeId::Binance], "15,5,0", "1.0", "0");
        let fetches = vec![ExchangeFetch::ok(
            ExchangeId::Binance,
            vec![record(ExchangeId::Binance, "BTCUSDT", 0.02, -3)],
        )];
        let mut cache = AlertCache::default();

        let outcome = evaluate_cycle(&fetches, &settings, NOW_MS, &mut cache);
        assert_eq!(outcome.min_minutes, Some(0));
        let alerts = alerts(&outcome.events);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].minutes_to, 0);
    }

    #[test]
    fn signature_change_is_detected_once() {
        let mut last = None;
        assert!(signature_changed(&mut last, &[ExchangeId::Binance]));
        assert!(!signature_changed(&mut last, &[ExchangeId::Binance]));
        assert!(signature_changed(
            &mut last,
            &[ExchangeId::Binance, ExchangeId::Okx]
        ));
    }

    #[test]
    fn disabled_thresholds_pass_everything_through() {
        let settings = settings(&[ExchangeId::Binance], "15", "0", "abc");
        let fetches = vec![ExchangeFetch::ok(
            ExchangeId::Binance,
            vec![record(ExchangeId::Binance, "BTCUSDT", 0.0000001, 15)],
        )];
        let mut cache = AlertCache::default();

        let outcome = evaluate_cycle(&fetches, &settings, NOW_MS, &mut cache);
        assert_eq!(alerts(&outcome.events).len(), 1);
    }
}
