use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Exchanges the funding monitor knows how to poll.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeId {
    Binance,
    Bybit,
    Okx,
    Gate,
    Bitget,
}

impl ExchangeId {
    pub const ALL: [ExchangeId; 5] = [
        Self::Binance,
        Self::Bybit,
        Self::Okx,
        Self::Gate,
        Self::Bitget,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::Bybit => "bybit",
            Self::Okx => "okx",
            Self::Gate => "gate",
            Self::Bitget => "bitget",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Binance => "Binance",
            Self::Bybit => "Bybit",
            Self::Okx => "OKX",
            Self::Gate => "Gate",
            Self::Bitget => "Bitget",
        }
    }
}

/// One normalized funding entry, rebuilt fresh every poll cycle.
/// `rate` is a fraction (0.01 = 1%); `next_funding_time_ms` is epoch millis.
#[derive(Debug, Clone, PartialEq)]
pub struct FundingRecord {
    pub exchange: ExchangeId,
    pub symbol: String,
    pub rate: f64,
    pub next_funding_time_ms: i64,
}

/// Result of one exchange fetch. Fetchers never fail past this boundary:
/// a total failure is an empty record list plus `error_text`.
#[derive(Debug, Clone)]
pub struct ExchangeFetch {
    pub exchange: ExchangeId,
    pub records: Vec<FundingRecord>,
    pub error_text: Option<String>,
}

impl ExchangeFetch {
    pub fn ok(exchange: ExchangeId, records: Vec<FundingRecord>) -> Self {
        Self {
            exchange,
            records,
            error_text: None,
        }
    }

    pub fn failed(exchange: ExchangeId, error_text: String) -> Self {
        Self {
            exchange,
            records: Vec::new(),
            error_text: Some(error_text),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FundingAlertKind {
    /// Exact minute-target match, alert-grade.
    Alert,
    /// Threshold pass inside the log window, informational.
    Log,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FundingAlertPayload {
    pub exchange: ExchangeId,
    pub symbol: String,
    pub signed_rate_pct: f64,
    pub minutes_to: u64,
    pub next_funding_time_ms: i64,
    pub kind: FundingAlertKind,
}

impl FundingAlertPayload {
    pub fn message(&self) -> String {
        format!(
            "{} {} — funding {:+.3}% — {} min to funding",
            self.exchange.display_name(),
            self.symbol,
            self.signed_rate_pct,
            self.minutes_to
        )
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeStatus {
    pub name: &'static str,
    pub enabled: bool,
    pub fetched_count: usize,
    pub passed_count: usize,
    pub error_text: Option<String>,
}

/// Per-cycle diagnostics summary, one entry per known exchange.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FundingStatusSnapshot {
    pub updated_at_ms: i64,
    pub exchanges: BTreeMap<ExchangeId, ExchangeStatus>,
}

impl FundingStatusSnapshot {
    /// Initial store contents before any cycle has run.
    pub fn idle() -> Self {
        let exchanges = ExchangeId::ALL
            .into_iter()
            .map(|exchange| {
                (
                    exchange,
                    ExchangeStatus {
                        name: exchange.display_name(),
                        enabled: false,
                        fetched_count: 0,
                        passed_count: 0,
                        error_text: None,
                    },
                )
            })
            .collect();
        Self {
            updated_at_ms: 0,
            exchanges,
        }
    }
}
