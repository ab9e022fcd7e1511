use crate::services::market_data::{MarketDataError, MarketDataSource, MarketFuture};
use crate::types::Candle;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const BINANCE_API_URL: &str = "https://api.binance.com/api/v3";
const BINANCE_TESTNET_URL: &str = "https://testnet.binance.vision/api/v3";
const REQUEST_TIMEOUT_SECS: u64 = 10;
const CANDLE_INTERVAL: &str = "1h";
/// Binance caps klines requests at 1000 rows.
const MAX_KLINES: usize = 1000;
/// Upstream error bodies are cut to this many characters.
const ERROR_BODY_CHARS: usize = 200;

/// Binance price ticker response.
#[derive(Debug, Deserialize)]
struct BinancePriceTicker {
    #[allow(dead_code)]
    symbol: String,
    price: String,
}

/// Live Binance market data over the public REST API.
#[derive(Clone)]
pub struct BinanceSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl BinanceSource {
    /// Create a new Binance source. `testnet` selects the testnet endpoint.
    pub fn new(api_key: Option<String>, testnet: bool) -> Self {
        let client = Client::builder()
            .user_agent("papertrader/0.1")
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        let base_url = if testnet { BINANCE_TESTNET_URL } else { BINANCE_API_URL };

        Self {
            client,
            base_url: base_url.to_string(),
            api_key,
        }
    }

    /// Point the source at another base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, MarketDataError> {
        let mut request = self.client.get(url);
        if let Some(ref key) = self.api_key {
            request = request.header("X-MBX-APIKEY", key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = truncate_body(&response.text().await.unwrap_or_default());
            warn!("Binance API returned {}: {}", status, body);
            return Err(MarketDataError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn fetch_price(&self, symbol: &str) -> Result<f64, MarketDataError> {
        let url = format!("{}/ticker/price?symbol={}", self.base_url, symbol);
        let ticker: BinancePriceTicker = self.get(&url).await?.json().await?;
        let price = parse_price(&ticker.price)?;
        debug!("Binance price: {} = {}", symbol, price);
        Ok(price)
    }

    async fn fetch_candles(&self, symbol: &str, count: usize) -> Result<Vec<Candle>, MarketDataError> {
        let limit = count.clamp(1, MAX_KLINES);
        let url = format!(
            "{}/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, CANDLE_INTERVAL, limit
        );
        let rows: Vec<Vec<serde_json::Value>> = self.get(&url).await?.json().await?;
        if rows.is_empty() {
            return Err(MarketDataError::EmptyResponse(symbol.to_string()));
        }
        rows.iter().map(|row| parse_kline(row)).collect()
    }
}

/// Cut on character boundaries; bodies may carry multi-byte text.
fn truncate_body(text: &str) -> String {
    text.chars().take(ERROR_BODY_CHARS).collect()
}

fn parse_price(raw: &str) -> Result<f64, MarketDataError> {
    raw.parse::<f64>()
        .map_err(|e| MarketDataError::Parse(format!("price {:?}: {}", raw, e)))
}

/// Parse one klines row: `[open_time, open, high, low, close, volume, ...]`
/// with prices as strings.
fn parse_kline(row: &[serde_json::Value]) -> Result<Candle, MarketDataError> {
    if row.len() < 6 {
        return Err(MarketDataError::Parse(format!(
            "kline row has {} fields, expected at least 6",
            row.len()
        )));
    }

    let time = row[0]
        .as_i64()
        .ok_or_else(|| MarketDataError::Parse("kline open time is not an integer".to_string()))?;
    let field = |i: usize| -> Result<f64, MarketDataError> {
        match &row[i] {
            serde_json::Value::String(s) => parse_price(s),
            serde_json::Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| MarketDataError::Parse(format!("kline field {} out of range", i))),
            other => Err(MarketDataError::Parse(format!("kline field {}: {}", i, other))),
        }
    };

    Ok(Candle {
        time,
        open: field(1)?,
        high: field(2)?,
        low: field(3)?,
        close: field(4)?,
        volume: field(5)?,
    })
}

impl MarketDataSource for BinanceSource {
    fn name(&self) -> &str {
        "binance"
    }

    fn price<'a>(&'a self, symbol: &'a str) -> MarketFuture<'a, f64> {
        Box::pin(self.fetch_price(symbol))
    }

    fn candles<'a>(&'a self, symbol: &'a str, count: usize) -> MarketFuture<'a, Vec<Candle>> {
        Box::pin(self.fetch_candles(symbol, count))
    }
}
