//! Market data client
//!
//! Fetches current price, price history, volume and RSI for a pair.
//! No retries: a failure is reported and the caller decides what to do.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::MarketDataConfig;
use crate::types::{MarketSnapshot, TradingPair};
use crate::{Error, Result};

/// Source of market data for a trading pair
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetch a snapshot, failing with [`Error::DataUnavailable`]
    async fn fetch(&self, pair: &TradingPair) -> Result<MarketSnapshot>;
}

/// HTTP market data provider: `GET <endpoint>?tokenA=..&tokenB=..`
pub struct HttpMarketDataClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpMarketDataClient {
    pub fn new(config: &MarketDataConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl MarketDataSource for HttpMarketDataClient {
    async fn fetch(&self, pair: &TradingPair) -> Result<MarketSnapshot> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("tokenA", &pair.token_a), ("tokenB", &pair.token_b)])
            .send()
            .await
            .map_err(|e| Error::DataUnavailable(format!("{} request failed: {}", pair, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::DataUnavailable(format!(
                "{} returned HTTP {}",
                pair, status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::DataUnavailable(format!("{} body unreadable: {}", pair, e)))?;

        let snapshot = parse_snapshot(&body)?;
        tracing::debug!(
            pair = %pair,
            price = snapshot.current_price,
            rsi = snapshot.rsi,
            history_len = snapshot.price_history.len(),
            "Fetched market data"
        );
        Ok(snapshot)
    }
}

/// Parse and sanity-check a provider response body
pub fn parse_snapshot(body: &str) -> Result<MarketSnapshot> {
    let snapshot: MarketSnapshot = serde_json::from_str(body)
        .map_err(|e| Error::DataUnavailable(format!("Malformed market data: {}", e)))?;

    if !snapshot.current_price.is_finite() || snapshot.current_price <= 0.0 {
        return Err(Error::DataUnavailable(format!(
            "Invalid current price {}",
            snapshot.current_price
        )));
    }
    if !(0.0..=100.0).contains(&snapshot.rsi) {
        return Err(Error::DataUnavailable(format!(
            "RSI {} outside [0, 100]",
            snapshot.rsi
        )));
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_body() {
        let body = r#"{
            "currentPrice": 3500.5,
            "priceHistory": [3400.0, 3450.0, 3500.5],
            "volume": 2500000.0,
            "rsi": 42.0
        }"#;
        let snapshot = parse_snapshot(body).unwrap();
        assert_eq!(snapshot.current_price, 3500.5);
        assert_eq!(snapshot.price_history.len(), 3);
        assert!(snapshot.liquidity.is_none());
        assert_eq!(snapshot.liquidity_or_volume(), 2500000.0);
    }

    #[test]
    fn malformed_body_is_data_unavailable() {
        let err = parse_snapshot(r#"{"currentPrice": "abc"}"#).unwrap_err();
        assert!(matches!(err, Error::DataUnavailable(_)));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let body = r#"{"currentPrice": 1.0, "priceHistory": [], "volume": 1.0, "rsi": 120.0}"#;
        assert!(matches!(parse_snapshot(body), Err(Error::DataUnavailable(_))));

        let body = r#"{"currentPrice": 0.0, "priceHistory": [], "volume": 1.0, "rsi": 50.0}"#;
        assert!(matches!(parse_snapshot(body), Err(Error::DataUnavailable(_))));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_data_unavailable() {
        let client = HttpMarketDataClient::new(&MarketDataConfig {
            endpoint: "http://127.0.0.1:9/market-data".to_string(),
            timeout_ms: 500,
        })
        .unwrap();
        let err = client
            .fetch(&TradingPair::new("USDC", "WETH"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DataUnavailable(_)));
    }
}
