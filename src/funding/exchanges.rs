use crate::error::AppError;
use crate::funding::types::{ExchangeFetch, ExchangeId, FundingRecord};
use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const REQUEST_TIMEOUT_SECS: u64 = 10;
/// Bounded fan-out for OKX's per-instrument funding calls.
pub const OKX_FETCH_CONCURRENCY: usize = 6;

const BINANCE_PREMIUM_INDEX_URL: &str = "https://fapi.binance.com/fapi/v1/premiumIndex";
const BYBIT_TICKERS_URL: &str = "https://api.bybit.com/v5/market/tickers?category=linear";
const OKX_INSTRUMENTS_URL: &str = "https://www.okx.com/api/v5/public/instruments?instType=SWAP";
const OKX_FUNDING_RATE_BASE_URL: &str = "https://www.okx.com/api/v5/public/funding-rate";
const GATE_CONTRACTS_URL: &str = "https://api.gateio.ws/api/v4/futures/usdt/contracts";
const BITGET_TICKERS_URL: &str =
    "https://api.bitget.com/api/v2/mix/market/tickers?productType=USDT-FUTURES";

// Epoch values below this are seconds, not milliseconds.
const EPOCH_MS_FLOOR: i64 = 100_000_000_000;

pub fn build_client() -> Result<Client, AppError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .user_agent("TF-Alerter")
        .build()?;
    Ok(client)
}

/// Scales second-granularity epochs (Gate, and occasionally OKX/Bitget
/// mirrors) up to milliseconds; millisecond inputs pass through unchanged.
fn normalize_epoch_ms(value: i64) -> i64 {
    if value > 0 && value < EPOCH_MS_FLOOR {
        value * 1_000
    } else {
        value
    }
}

fn okx_funding_endpoint(inst_id: &str) -> String {
    format!("{OKX_FUNDING_RATE_BASE_URL}?instId={inst_id}")
}

/// Fetches one exchange, honoring the isolation contract: errors never
/// escape, a total failure becomes an empty record list plus error text.
pub async fn fetch_exchange(client: &Client, exchange: ExchangeId) -> ExchangeFetch {
    let result = match exchange {
        ExchangeId::Binance => fetch_binance(client).await,
        ExchangeId::Bybit => fetch_bybit(client).await,
        ExchangeId::Okx => fetch_okx(client).await,
        ExchangeId::Gate => fetch_gate(client).await,
        ExchangeId::Bitget => fetch_bitget(client).await,
    };
    match result {
        Ok(records) => {
            debug!(
                exchange = exchange.as_str(),
                records = records.len(),
                "funding fetch complete"
            );
            ExchangeFetch::ok(exchange, records)
        }
        Err(error) => ExchangeFetch::failed(exchange, error.to_string()),
    }
}

fn parse_rate(raw: &str) -> Option<f64> {
    let rate = raw.trim().parse::<f64>().ok()?;
    if !rate.is_finite() {
        return None;
    }
    Some(rate)
}

fn parse_epoch_ms(raw: &str) -> Option<i64> {
    let value = raw.trim().parse::<i64>().ok()?;
    if value <= 0 {
        return None;
    }
    Some(normalize_epoch_ms(value))
}

#[derive(Debug, Deserialize)]
struct BinancePremiumIndexWire {
    symbol: String,
    #[serde(rename = "lastFundingRate", default)]
    last_funding_rate: String,
    #[serde(rename = "nextFundingTime", default)]
    next_funding_time: i64,
}

impl BinancePremiumIndexWire {
    fn normalize(self) -> Option<FundingRecord> {
        let rate = parse_rate(&self.last_funding_rate)?;
        if self.symbol.is_empty() || self.next_funding_time <= 0 {
            return None;
        }
        Some(FundingRecord {
            exchange: ExchangeId::Binance,
            symbol: self.symbol,
            rate,
            next_funding_time_ms: self.next_funding_time,
        })
    }
}

async fn fetch_binance(client: &Client) -> Result<Vec<FundingRecord>, AppError> {
    let response = client
        .get(BINANCE_PREMIUM_INDEX_URL)
        .send()
        .await?
        .error_for_status()?;
    let payload = response.json::<Vec<BinancePremiumIndexWire>>().await?;
    Ok(payload
        .into_iter()
        .filter_map(BinancePremiumIndexWire::normalize)
        .collect())
}

#[derive(Debug, Deserialize)]
struct BybitTickersWire {
    #[serde(default)]
    result: BybitTickersResultWire,
}

#[derive(Debug, Deserialize, Default)]
struct BybitTickersResultWire {
    #[serde(default)]
    list: Vec<BybitTickerWire>,
}

#[derive(Debug, Deserialize)]
struct BybitTickerWire {
    symbol: String,
    #[serde(rename = "fundingRate", default)]
    funding_rate: String,
    #[serde(rename = "nextFundingTime", default)]
    next_funding_time: String,
}

impl BybitTickerWire {
    fn normalize(self) -> Option<FundingRecord> {
        let rate = parse_rate(&self.funding_rate)?;
        let next_funding_time_ms = parse_epoch_ms(&self.next_funding_time)?;
        if self.symbol.is_empty() {
            return None;
        }
        Some(FundingRecord {
            exchange: ExchangeId::Bybit,
            symbol: self.symbol,
            rate,
            next_funding_time_ms,
        })
    }
}

async fn fetch_bybit(client: &Client) -> Result<Vec<FundingRecord>, AppError> {
    let response = client
        .get(BYBIT_TICKERS_URL)
        .send()
        .await?
        .error_for_status()?;
    let payload = response.json::<BybitTickersWire>().await?;
    Ok(payload
        .result
        .list
        .into_iter()
        .filter_map(BybitTickerWire::normalize)
        .collect())
}

#[derive(Debug, Deserialize)]
struct OkxInstrumentsWire {
    #[serde(default)]
    data: Vec<OkxInstrumentWire>,
}

#[derive(Debug, Deserialize)]
struct OkxInstrumentWire {
    #[serde(rename = "instId", default)]
    inst_id: String,
}

#[derive(Debug, Deserialize)]
struct OkxFundingRateListWire {
    #[serde(default)]
    data: Vec<OkxFundingRateWire>,
}

#[derive(Debug, Deserialize)]
struct OkxFundingRateWire {
    #[serde(rename = "instId", default)]
    inst_id: String,
    #[serde(rename = "fundingRate", default)]
    funding_rate: String,
    #[serde(rename = "fundingTime", default)]
    funding_time: String,
}

impl OkxFundingRateWire {
    fn normalize(self) -> Option<FundingRecord> {
        let rate = parse_rate(&self.funding_rate)?;
        let next_funding_time_ms = parse_epoch_ms(&self.funding_time)?;
        if self.inst_id.is_empty() {
            return None;
        }
        Some(FundingRecord {
            exchange: ExchangeId::Okx,
            symbol: self.inst_id,
            rate,
            next_funding_time_ms,
        })
    }
}

/// OKX needs two steps: list the swap instruments, then one funding-rate
/// call per instrument. Instrument counts run into the hundreds, so the
/// second step fans out with a bounded concurrent pool instead of looping
/// serially. Per-instrument failures are skipped.
async fn fetch_okx(client: &Client) -> Result<Vec<FundingRecord>, AppError> {
    let response = client
        .get(OKX_INSTRUMENTS_URL)
        .send()
        .await?
        .error_for_status()?;
    let instruments = response.json::<OkxInstrumentsWire>().await?;

    let records = stream::iter(
        instruments
            .data
            .into_iter()
            .filter(|instrument| !instrument.inst_id.is_empty())
            .map(|instrument| {
                let client = client.clone();
                async move { fetch_okx_instrument(&client, &instrument.inst_id).await }
            }),
    )
    .buffer_unordered(OKX_FETCH_CONCURRENCY)
    .collect::<Vec<_>>()
    .await;

    Ok(records.into_iter().flatten().collect())
}

async fn fetch_okx_instrument(client: &Client, inst_id: &str) -> Vec<FundingRecord> {
    let payload = async {
        let response = client
            .get(okx_funding_endpoint(inst_id))
            .send()
            .await?
            .error_for_status()?;
        response.json::<OkxFundingRateListWire>().await
    }
    .await;

    match payload {
        Ok(listing) => listing
            .data
            .into_iter()
            .filter_map(OkxFundingRateWire::normalize)
            .collect(),
        Err(error) => {
            debug!(inst_id, %error, "okx funding-rate fetch skipped");
            Vec::new()
        }
    }
}

#[derive(Debug, Deserialize)]
struct GateContractWire {
    #[serde(default)]
    name: String,
    #[serde(rename = "funding_rate", default)]
    funding_rate: String,
    #[serde(rename = "funding_next_apply", default)]
    funding_next_apply: i64,
}

impl GateContractWire {
    fn normalize(self) -> Option<FundingRecord> {
        let rate = parse_rate(&self.funding_rate)?;
        if self.name.is_empty() || self.funding_next_apply <= 0 {
            return None;
        }
        Some(FundingRecord {
            exchange: ExchangeId::Gate,
            symbol: self.name,
            rate,
            // funding_next_apply arrives in seconds
            next_funding_time_ms: normalize_epoch_ms(self.funding_next_apply),
        })
    }
}

async fn fetch_gate(client: &Client) -> Result<Vec<FundingRecord>, AppError> {
    let response = client
        .get(GATE_CONTRACTS_URL)
        .send()
        .await?
        .error_for_status()?;
    let payload = response.json::<Vec<GateContractWire>>().await?;
    Ok(payload
        .into_iter()
        .filter_map(GateContractWire::normalize)
        .collect())
}

#[derive(Debug, Deserialize)]
struct BitgetTickersWire {
    #[serde(default)]
    data: Vec<BitgetTickerWire>,
}

#[derive(Debug, Deserialize)]
struct BitgetTickerWire {
    #[serde(default)]
    symbol: String,
    #[serde(rename = "fundingRate", default)]
    funding_rate: String,
    #[serde(rename = "nextFundingTime", default)]
    next_funding_time: String,
}

impl BitgetTickerWire {
    fn normalize(self) -> Option<FundingRecord> {
        let rate = parse_rate(&self.funding_rate)?;
        let next_funding_time_ms = parse_epoch_ms(&self.next_funding_time)?;
        if self.symbol.is_empty() {
            return None;
        }
        Some(FundingRecord {
            exchange: ExchangeId::Bitget,
            symbol: self.symbol,
            rate,
            next_funding_time_ms,
        })
    }
}

async fn fetch_bitget(client: &Client) -> Result<Vec<FundingRecord>, AppError> {
    let response = client
        .get(BITGET_TICKERS_URL)
        .send()
        .await?
        .error_for_status()?;
    let payload = response.json::<BitgetTickersWire>().await?;
    Ok(payload
        .data
        .into_iter()
        .filter_map(BitgetTickerWire::normalize)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn okx_funding_endpoint_carries_instrument_id() {
        let endpoint = okx_funding_endpoint("BTC-USDT-SWAP");
        assert!(endpoint.starts_with("https://www.okx.com/api/v5/public/funding-rate"));
        assert!(endpoint.ends_with("instId=BTC-USDT-SWAP"));
    }

    #[test]
    fn second_epochs_are_scaled_to_millis() {
        assert_eq!(normalize_epoch_ms(1_700_003_600), 1_700_003_600_000);
        assert_eq!(normalize_epoch_ms(1_700_003_600_000), 1_700_003_600_000);
        assert_eq!(normalize_epoch_ms(0), 0);
    }

    #[test]
    fn binance_wire_normalizes_and_skips_incomplete_entries() {
        let payload = r#"[
            {"symbol":"BTCUSDT","lastFundingRate":"0.00012","nextFundingTime":1700003600000},
            {"symbol":"ETHUSDT","lastFundingRate":"","nextFundingTime":1700003600000},
            {"symbol":"XRPUSDT","lastFundingRate":"0.0001","nextFundingTime":0}
        ]"#;
        let wire: Vec<BinancePremiumIndexWire> =
            serde_json::from_str(payload).expect("payload parses");
        let records: Vec<_> = wire
            .into_iter()
            .filter_map(BinancePremiumIndexWire::normalize)
            .collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].symbol, "BTCUSDT");
        assert!((records[0].rate - 0.00012).abs() < 1e-12);
        assert_eq!(records[0].next_funding_time_ms, 1_700_003_600_000);
    }

    #[test]
    fn bybit_wire_parses_string_epoch() {
        let payload = r#"{
            "result":{"list":[
                {"symbol":"BTCUSDT","fundingRate":"-0.0002","nextFundingTime":"1700003600000"},
                {"symbol":"BROKEN","fundingRate":"x","nextFundingTime":"1700003600000"}
            ]}
        }"#;
        let wire: BybitTickersWire = serde_json::from_str(payload).expect("payload parses");
        let records: Vec<_> = wire
            .result
            .list
            .into_iter()
            .filter_map(BybitTickerWire::normalize)
            .collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].exchange, ExchangeId::Bybit);
        assert!(records[0].rate < 0.0);
    }

    #[test]
    fn okx_wire_uses_inst_id_as_symbol() {
        let payload = r#"{
            "data":[{"instId":"BTC-USDT-SWAP","fundingRate":"0.0001","fundingTime":"1700003600000"}]
        }"#;
        let wire: OkxFundingRateListWire = serde_json::from_str(payload).expect("payload parses");
        let records: Vec<_> = wire
            .data
            .into_iter()
            .filter_map(OkxFundingRateWire::normalize)
            .collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].symbol, "BTC-USDT-SWAP");
    }

    #[test]
    fn gate_wire_scales_seconds_to_millis() {
        let payload = r#"[
            {"name":"BTC_USDT","funding_rate":"0.0003","funding_next_apply":1700003600}
        ]"#;
        let wire: Vec<GateContractWire> = serde_json::from_str(payload).expect("payload parses");
        let records: Vec<_> = wire
            .into_iter()
            .filter_map(GateContractWire::normalize)
            .collect();
        assert_eq!(records[0].next_funding_time_ms, 1_700_003_600_000);
    }

    #[test]
    fn bitget_wire_tolerates_missing_fields() {
        let payload = r#"{
            "data":[
                {"symbol":"BTCUSDT","fundingRate":"0.0001","nextFundingTime":"1700003600000"},
                {"symbol":"NOFUNDING"}
            ]
        }"#;
        let wire: BitgetTickersWire = serde_json::from_str(payload).expect("payload parses");
        let records: Vec<_> = wire
            .data
            .into_iter()
            .filter_map(BitgetTickerWire::normalize)
            .collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].exchange, ExchangeId::Bitget);
    }
}
