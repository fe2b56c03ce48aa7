//! EIA weekly retail fuel price client
//!
//! Fetches the most recent weekly gasoline and diesel prices from the EIA open
//! data API (v2, `petroleum/pri/gnd`) and reduces them to a single-period
//! [`PriceSnapshot`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{FuelGrade, PriceFeed, PriceSnapshot};
use crate::config::FeedConfig;

/// Characters of an upstream error body kept for diagnostics
const ERROR_EXCERPT_CHARS: usize = 120;

/// Errors that can occur when fetching prices from the feed
///
/// Cloneable so a single in-flight fetch can hand the same failure to every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// The feed answered with a non-success status
    #[error("price feed returned HTTP {status}: {excerpt}")]
    Status { status: u16, excerpt: String },

    /// The request could not be sent or the body could not be read
    #[error("price feed request failed: {0}")]
    Request(String),

    /// The feed did not answer in time
    #[error("price feed did not respond within {0:?}")]
    Timeout(Duration),

    /// The feed answered successfully but with no records
    #[error("no fuel price data returned from the price feed")]
    NoData,

    /// The response body did not have the expected shape
    #[error("failed to parse price feed response: {0}")]
    Parse(String),

    /// The fetch task panicked or was cancelled by runtime shutdown
    #[error("price fetch was interrupted: {0}")]
    Interrupted(String),
}

/// Top-level EIA v2 response envelope
#[derive(Debug, Default, Deserialize)]
struct EiaResponse {
    #[serde(default)]
    response: EiaPayload,
}

#[derive(Debug, Default, Deserialize)]
struct EiaPayload {
    #[serde(default)]
    data: Vec<EiaRecord>,
}

/// A single weekly price row
#[derive(Debug, Deserialize)]
struct EiaRecord {
    /// Reporting period (week-ending date, YYYY-MM-DD)
    period: String,
    /// EIA product code, e.g. "EPMR"
    #[serde(default)]
    product: Option<String>,
    /// USD per gallon; the feed sends this as a string
    #[serde(default)]
    value: Option<EiaValue>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EiaValue {
    Number(serde_json::Number),
    Text(String),
}

impl EiaValue {
    fn to_decimal(&self) -> Option<Decimal> {
        let text = match self {
            EiaValue::Number(n) => n.to_string(),
            EiaValue::Text(s) => s.trim().to_string(),
        };
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .ok()
    }
}

/// Client for the EIA weekly retail price dataset
#[derive(Clone)]
pub struct EiaClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    area: Option<String>,
    page_length: u32,
    request_timeout: Duration,
}

impl EiaClient {
    /// Creates a client whose HTTP requests time out after `config.request_timeout`
    pub fn new(config: &FeedConfig) -> Result<Self, UpstreamError> {
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| UpstreamError::Request(e.to_string()))?;
        Ok(Self::with_client(http_client, config))
    }

    /// Creates a client around an existing HTTP client
    pub fn with_client(http_client: Client, config: &FeedConfig) -> Self {
        Self {
            http_client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            area: config.area.clone(),
            page_length: config.page_length,
            request_timeout: config.request_timeout,
        }
    }

    /// Query string for the newest weekly rows across every tracked product,
    /// newest period first
    fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("api_key", self.api_key.clone()),
            ("frequency", "weekly".to_string()),
            ("data[0]", "value".to_string()),
        ];
        for grade in FuelGrade::all() {
            params.push(("facets[product][]", grade.product_code().to_string()));
        }
        if let Some(ref area) = self.area {
            params.push(("facets[duoarea][]", area.clone()));
        }
        params.extend([
            ("sort[0][column]", "period".to_string()),
            ("sort[0][direction]", "desc".to_string()),
            ("offset", "0".to_string()),
            ("length", self.page_length.to_string()),
        ]);
        params
    }

    /// Fetches the latest weekly snapshot
    ///
    /// # Returns
    /// * `Ok(PriceSnapshot)` - Prices for the newest reported period
    /// * `Err(UpstreamError)` - On a failed request, non-success status, empty
    ///   result set or malformed body
    pub async fn fetch_latest(&self) -> Result<PriceSnapshot, UpstreamError> {
        info!(url = %self.base_url, "fetching weekly fuel prices");

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&self.query_params())
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.request_error(e))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "price feed returned an error status");
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                excerpt: excerpt(&text),
            });
        }

        let body: EiaResponse =
            serde_json::from_str(&text).map_err(|e| UpstreamError::Parse(e.to_string()))?;

        let snapshot = snapshot_from_records(&body.response.data)?;
        debug!(
            records = body.response.data.len(),
            period = %snapshot.date,
            grades = snapshot.prices.len(),
            "parsed fuel price snapshot"
        );
        Ok(snapshot)
    }

    fn request_error(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout(self.request_timeout)
        } else {
            UpstreamError::Request(err.to_string())
        }
    }
}

impl fmt::Debug for EiaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EiaClient")
            .field("base_url", &self.base_url)
            .field("area", &self.area)
            .field("page_length", &self.page_length)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PriceFeed for EiaClient {
    async fn fetch(&self) -> Result<PriceSnapshot, UpstreamError> {
        self.fetch_latest().await
    }
}

/// Reduces newest-first rows to one snapshot for the newest period
///
/// Rows must be sorted by period, descending. The first row fixes the period;
/// scanning stops at the first row from another period. Within the period the
/// first row per grade wins and unknown product codes are skipped.
fn snapshot_from_records(records: &[EiaRecord]) -> Result<PriceSnapshot, UpstreamError> {
    let latest = records.first().ok_or(UpstreamError::NoData)?;
    let mut snapshot = PriceSnapshot::new(latest.period.clone());

    for record in records {
        if record.period != snapshot.date {
            break;
        }

        let Some(grade) = record
            .product
            .as_deref()
            .and_then(FuelGrade::from_product_code)
        else {
            continue;
        };

        if snapshot.prices.contains_key(&grade) {
            continue;
        }

        let price = record
            .value
            .as_ref()
            .and_then(EiaValue::to_decimal)
            .filter(|price| !price.is_sign_negative())
            .ok_or_else(|| {
                UpstreamError::Parse(format!(
                    "invalid {} price for period {}",
                    grade, record.period
                ))
            })?;

        snapshot.prices.insert(grade, price);
    }

    Ok(snapshot)
}

/// Truncates an upstream body to a short diagnostic excerpt
fn excerpt(body: &str) -> String {
    body.chars().take(ERROR_EXCERPT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn parse(json: &str) -> Result<PriceSnapshot, UpstreamError> {
        let body: EiaResponse = serde_json::from_str(json).expect("Failed to parse body");
        snapshot_from_records(&body.response.data)
    }

    /// Two weeks of rows, newest first, products interleaved
    const VALID_RESPONSE: &str = r#"{
        "response": {
            "total": "8",
            "dateFormat": "YYYY-MM-DD",
            "frequency": "weekly",
            "data": [
                {"period": "2024-06-10", "duoarea": "NUS", "product": "EPMR", "product-name": "Regular Gasoline", "value": "3.504", "units": "$/GAL"},
                {"period": "2024-06-10", "duoarea": "NUS", "product": "EPD2D", "product-name": "No 2 Diesel", "value": "3.758", "units": "$/GAL"},
                {"period": "2024-06-10", "duoarea": "NUS", "product": "EPMP", "product-name": "Premium Gasoline", "value": "4.369", "units": "$/GAL"},
                {"period": "2024-06-10", "duoarea": "NUS", "product": "EPMM", "product-name": "Midgrade Gasoline", "value": "3.958", "units": "$/GAL"},
                {"period": "2024-06-03", "duoarea": "NUS", "product": "EPMR", "product-name": "Regular Gasoline", "value": "3.580", "units": "$/GAL"},
                {"period": "2024-06-03", "duoarea": "NUS", "product": "EPD2D", "product-name": "No 2 Diesel", "value": "3.765", "units": "$/GAL"},
                {"period": "2024-06-03", "duoarea": "NUS", "product": "EPMP", "product-name": "Premium Gasoline", "value": "4.436", "units": "$/GAL"},
                {"period": "2024-06-03", "duoarea": "NUS", "product": "EPMM", "product-name": "Midgrade Gasoline", "value": "4.031", "units": "$/GAL"}
            ]
        },
        "apiVersion": "2.1.7"
    }"#;

    #[test]
    fn test_parse_valid_response() {
        let snapshot = parse(VALID_RESPONSE).expect("Failed to build snapshot");

        assert_eq!(snapshot.date, "2024-06-10");
        assert_eq!(snapshot.prices.len(), 4);
        assert_eq!(snapshot.price(FuelGrade::Regular), Some(dec("3.504")));
        assert_eq!(snapshot.price(FuelGrade::Midgrade), Some(dec("3.958")));
        assert_eq!(snapshot.price(FuelGrade::Premium), Some(dec("4.369")));
        assert_eq!(snapshot.price(FuelGrade::Diesel), Some(dec("3.758")));
    }

    #[test]
    fn test_stops_at_period_change() {
        // Premium only shows up in the older week, so it must not leak in
        let json = r#"{"response": {"data": [
            {"period": "2024-06-10", "product": "EPMR", "value": "3.504"},
            {"period": "2024-06-03", "product": "EPMP", "value": "4.436"},
            {"period": "2024-06-10", "product": "EPD2D", "value": "3.758"}
        ]}}"#;

        let snapshot = parse(json).unwrap();
        assert_eq!(snapshot.date, "2024-06-10");
        assert_eq!(snapshot.prices.len(), 1);
        assert_eq!(snapshot.price(FuelGrade::Premium), None);
        // Rows after the period change are never scanned
        assert_eq!(snapshot.price(FuelGrade::Diesel), None);
    }

    #[test]
    fn test_first_occurrence_per_grade_wins() {
        let json = r#"{"response": {"data": [
            {"period": "2024-06-10", "product": "EPMR", "value": "3.504"},
            {"period": "2024-06-10", "product": "EPMR", "value": "9.999"}
        ]}}"#;

        let snapshot = parse(json).unwrap();
        assert_eq!(snapshot.price(FuelGrade::Regular), Some(dec("3.504")));
    }

    #[test]
    fn test_unknown_product_codes_are_ignored() {
        let json = r#"{"response": {"data": [
            {"period": "2024-06-10", "product": "EPM0", "value": "3.611"},
            {"period": "2024-06-10", "product": "EPMR", "value": "3.504"},
            {"period": "2024-06-10", "value": "1.000"}
        ]}}"#;

        let snapshot = parse(json).unwrap();
        assert_eq!(snapshot.prices.len(), 1);
        assert_eq!(snapshot.price(FuelGrade::Regular), Some(dec("3.504")));
    }

    #[test]
    fn test_numeric_values_are_accepted() {
        let json = r#"{"response": {"data": [
            {"period": "2024-06-10", "product": "EPMR", "value": 3.504},
            {"period": "2024-06-10", "product": "EPD2D", "value": 4}
        ]}}"#;

        let snapshot = parse(json).unwrap();
        assert_eq!(snapshot.price(FuelGrade::Regular), Some(dec("3.504")));
        assert_eq!(snapshot.price(FuelGrade::Diesel), Some(dec("4")));
    }

    #[test]
    fn test_empty_data_is_no_data() {
        let result = parse(r#"{"response": {"data": []}}"#);
        assert_eq!(result, Err(UpstreamError::NoData));
    }

    #[test]
    fn test_missing_envelope_is_no_data() {
        assert_eq!(parse("{}"), Err(UpstreamError::NoData));
        assert_eq!(parse(r#"{"response": {}}"#), Err(UpstreamError::NoData));
    }

    #[test]
    fn test_unparseable_value_is_parse_error() {
        let json = r#"{"response": {"data": [
            {"period": "2024-06-10", "product": "EPMR", "value": "n/a"}
        ]}}"#;

        match parse(json) {
            Err(UpstreamError::Parse(msg)) => {
                assert!(msg.contains("regular"));
                assert!(msg.contains("2024-06-10"));
            }
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_value_is_parse_error() {
        let json = r#"{"response": {"data": [
            {"period": "2024-06-10", "product": "EPMR", "value": null}
        ]}}"#;

        assert!(matches!(parse(json), Err(UpstreamError::Parse(_))));
    }

    #[test]
    fn test_negative_value_is_parse_error() {
        let json = r#"{"response": {"data": [
            {"period": "2024-06-10", "product": "EPMR", "value": "-1.25"}
        ]}}"#;

        assert!(matches!(parse(json), Err(UpstreamError::Parse(_))));
    }

    #[test]
    fn test_record_without_period_fails_to_parse() {
        let json = r#"{"response": {"data": [{"product": "EPMR", "value": "3.5"}]}}"#;
        let result: Result<EiaResponse, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_excerpt_truncates_long_bodies() {
        let body = "x".repeat(500);
        assert_eq!(excerpt(&body).len(), ERROR_EXCERPT_CHARS);
        assert_eq!(excerpt("short"), "short");
    }

    #[test]
    fn test_query_params() {
        let client = EiaClient::new(&FeedConfig::new("test-key")).unwrap();
        let params = client.query_params();

        assert!(params.contains(&("api_key", "test-key".to_string())));
        assert!(params.contains(&("frequency", "weekly".to_string())));
        assert!(params.contains(&("sort[0][column]", "period".to_string())));
        assert!(params.contains(&("sort[0][direction]", "desc".to_string())));
        assert!(params.contains(&("length", "5000".to_string())));
        assert!(params.contains(&("facets[duoarea][]", "NUS".to_string())));

        let products: Vec<&str> = params
            .iter()
            .filter(|(k, _)| *k == "facets[product][]")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(products, vec!["EPMR", "EPMM", "EPMP", "EPD2D"]);
    }

    #[test]
    fn test_query_params_without_area() {
        let mut config = FeedConfig::new("test-key");
        config.area = None;
        let client = EiaClient::new(&config).unwrap();

        assert!(!client
            .query_params()
            .iter()
            .any(|(k, _)| *k == "facets[duoarea][]"));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = EiaClient::new(&FeedConfig::new("super-secret-key")).unwrap();
        assert!(!format!("{:?}", client).contains("super-secret-key"));
    }
}
