use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::config::FETCH_TIMEOUT_SECS;
use crate::error::FetchError;
use crate::types::Reading;

/// Source of the latest (price, cycle) observation.
pub trait Fetcher: Send + Sync {
    fn fetch(&self) -> impl Future<Output = Result<Reading, FetchError>> + Send;
}

/// Polls the oil price endpoint, which returns an ascending array of
/// `{"price": .., "cycle": ..}` entries.
pub struct HttpFetcher {
    client: reqwest::Client,
    url: String,
}

impl HttpFetcher {
    pub fn new(url: String) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, url })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self) -> Result<Reading, FetchError> {
        debug!("Fetching oil prices from {}", self.url);
        let resp = self.client.get(&self.url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body: serde_json::Value = resp.json().await?;
        parse_feed(&body)
    }
}

/// Select the most recent entry (the last element) of a feed body.
pub fn parse_feed(body: &serde_json::Value) -> Result<Reading, FetchError> {
    let entries = body
        .as_array()
        .ok_or_else(|| FetchError::Malformed("response was not an array".to_string()))?;
    let latest = entries
        .last()
        .ok_or_else(|| FetchError::Malformed("response array was empty".to_string()))?;

    let price = latest
        .get("price")
        .filter(|v| !v.is_null())
        .ok_or(FetchError::MissingField("price"))?;
    let price = price
        .as_f64()
        .or_else(|| price.as_str().and_then(|s| s.trim().parse().ok()))
        .filter(|p| p.is_finite())
        .ok_or_else(|| FetchError::Malformed(format!("price is not a number: {price}")))?;

    let cycle = latest
        .get("cycle")
        .filter(|v| !v.is_null())
        .ok_or(FetchError::MissingField("cycle"))?;
    let cycle = cycle
        .as_i64()
        .or_else(|| cycle.as_f64().filter(|c| c.fract() == 0.0).map(|c| c as i64))
        .or_else(|| cycle.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| FetchError::Malformed(format!("cycle is not an integer: {cycle}")))?;

    Ok(Reading::new(price, cycle))
}
