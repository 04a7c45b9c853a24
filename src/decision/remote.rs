//! Remote analysis service client
//!
//! `POST <endpoint>` with the market inputs; the service answers with an
//! action, a confidence and its reasoning. Any failure (transport, non-2xx,
//! malformed body) is returned as an error for the fallback wrapper to absorb.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{conviction_amount, DecisionRequest, DecisionSource};
use crate::types::{Action, Decision};
use crate::{Error, Result};

/// Slippage reported when the service does not suggest one
const DEFAULT_SLIPPAGE_PERCENT: f64 = 0.5;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisRequest<'a> {
    current_price: f64,
    price_history: &'a [f64],
    volume: f64,
    rsi: f64,
    pair: String,
    strategy_type: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisResponse {
    action: String,
    confidence: f64,
    #[serde(default)]
    reasoning: Vec<String>,
    #[serde(default)]
    suggested_slippage: Option<f64>,
}

pub struct RemoteDecisionSource {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteDecisionSource {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl DecisionSource for RemoteDecisionSource {
    async fn decide(&self, request: &DecisionRequest) -> Result<Decision> {
        let body = AnalysisRequest {
            current_price: request.current_price,
            price_history: &request.price_history,
            volume: request.volume,
            rsi: request.rsi,
            pair: request.pair.to_string(),
            strategy_type: request.strategy_type.as_str(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Decision(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Decision(format!("HTTP {}", status)));
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::Decision(format!("body unreadable: {}", e)))?;

        let decision = parse_response(&text, request)?;
        tracing::debug!(
            pair = %request.pair,
            action = ?decision.action,
            confidence = decision.confidence,
            "Remote analysis answered"
        );
        Ok(decision)
    }

    fn name(&self) -> &'static str {
        "remote analysis"
    }
}

/// Validate a service response and size it against the request budget
pub fn parse_response(body: &str, request: &DecisionRequest) -> Result<Decision> {
    let response: AnalysisResponse = serde_json::from_str(body)
        .map_err(|e| Error::Decision(format!("malformed response: {}", e)))?;

    let action = match response.action.to_uppercase().as_str() {
        "BUY" => Action::Buy,
        "SELL" => Action::Sell,
        "HOLD" => Action::Hold,
        other => {
            return Err(Error::Decision(format!("unknown action '{}'", other)));
        }
    };

    if !response.confidence.is_finite() || !(0.0..=1.0).contains(&response.confidence) {
        return Err(Error::Decision(format!(
            "confidence {} outside [0, 1]",
            response.confidence
        )));
    }

    Ok(Decision {
        action,
        confidence: response.confidence,
        suggested_amount: conviction_amount(request.budget, action, response.confidence),
        suggested_slippage_percent: response
            .suggested_slippage
            .unwrap_or(DEFAULT_SLIPPAGE_PERCENT),
        reasoning: response.reasoning,
    })
}
