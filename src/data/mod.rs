//! Core data models for fuelquote
//!
//! This module contains the fuel grades, weekly price snapshots and trip quote
//! types shared by the price feed client, the cache and the service layer.

pub mod eia;

pub use eia::{EiaClient, UpstreamError};

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A source of weekly fuel price snapshots
///
/// Implemented by [`EiaClient`] for the live feed. Each call is one upstream
/// request; implementations never retry or cache on their own.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Fetch the most recent complete snapshot from the feed
    async fn fetch(&self) -> Result<PriceSnapshot, UpstreamError>;
}

/// Retail fuel grades tracked by the price feed
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FuelGrade {
    /// Regular gasoline
    #[default]
    Regular,
    /// Midgrade gasoline
    Midgrade,
    /// Premium gasoline
    Premium,
    /// No. 2 diesel
    Diesel,
}

impl FuelGrade {
    /// Returns a slice containing all grade variants.
    pub fn all() -> &'static [FuelGrade] {
        &[
            FuelGrade::Regular,
            FuelGrade::Midgrade,
            FuelGrade::Premium,
            FuelGrade::Diesel,
        ]
    }

    /// Returns the lowercase label used on every external surface.
    pub fn label(&self) -> &'static str {
        match self {
            FuelGrade::Regular => "regular",
            FuelGrade::Midgrade => "midgrade",
            FuelGrade::Premium => "premium",
            FuelGrade::Diesel => "diesel",
        }
    }

    /// Returns the EIA product code for this grade.
    pub fn product_code(&self) -> &'static str {
        match self {
            FuelGrade::Regular => "EPMR",
            FuelGrade::Midgrade => "EPMM",
            FuelGrade::Premium => "EPMP",
            FuelGrade::Diesel => "EPD2D",
        }
    }

    /// Maps an EIA product code back to its grade.
    ///
    /// Returns `None` for product codes this crate does not track.
    pub fn from_product_code(code: &str) -> Option<FuelGrade> {
        FuelGrade::all()
            .iter()
            .copied()
            .find(|grade| grade.product_code() == code)
    }

    /// Parses user input into a FuelGrade.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// Returns `None` if the input doesn't name a tracked grade.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<FuelGrade> {
        match s.trim().to_lowercase().as_str() {
            "regular" => Some(FuelGrade::Regular),
            "midgrade" => Some(FuelGrade::Midgrade),
            "premium" => Some(FuelGrade::Premium),
            "diesel" => Some(FuelGrade::Diesel),
            _ => None,
        }
    }
}

impl fmt::Display for FuelGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Prices for every available grade as of one reporting period
///
/// A snapshot never mixes periods: every entry in `prices` was reported for
/// `date`. Grades the feed did not report are simply absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    /// Reporting period label from the feed (week-ending date, e.g. "2024-06-07")
    pub date: String,
    /// USD per gallon, keyed by grade
    pub prices: BTreeMap<FuelGrade, Decimal>,
}

impl PriceSnapshot {
    /// Creates an empty snapshot for the given period
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            prices: BTreeMap::new(),
        }
    }

    /// Adds a grade price, builder style
    pub fn with_price(mut self, grade: FuelGrade, price: Decimal) -> Self {
        self.prices.insert(grade, price);
        self
    }

    /// Returns the price for a grade, if the feed reported one
    pub fn price(&self, grade: FuelGrade) -> Option<Decimal> {
        self.prices.get(&grade).copied()
    }
}

/// Price of a single grade, as returned by a price lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradePrice {
    pub grade: FuelGrade,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_usd_per_gallon: Decimal,
    pub date: String,
}

/// Parameters for a trip fuel cost quote
///
/// Deserializes from the request body form: `grade` defaults to regular and
/// `return_secondary` to false. Unknown grade labels are rejected here,
/// before a request ever reaches the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripQuoteRequest {
    /// Trip distance in miles
    #[serde(with = "rust_decimal::serde::float")]
    pub miles: Decimal,
    /// Vehicle fuel economy in miles per gallon
    #[serde(with = "rust_decimal::serde::float")]
    pub mpg: Decimal,
    /// Grade to price the trip with
    #[serde(default)]
    pub grade: FuelGrade,
    /// Whether to also report the cost in a secondary currency
    #[serde(default)]
    pub return_secondary: bool,
    /// Units of secondary currency per USD
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub exchange_rate: Option<Decimal>,
}

impl TripQuoteRequest {
    /// Creates a primary-currency-only request
    pub fn new(miles: Decimal, mpg: Decimal, grade: FuelGrade) -> Self {
        Self {
            miles,
            mpg,
            grade,
            return_secondary: false,
            exchange_rate: None,
        }
    }

    /// Requests the secondary-currency cost at the given exchange rate
    pub fn with_secondary(mut self, exchange_rate: Decimal) -> Self {
        self.return_secondary = true;
        self.exchange_rate = Some(exchange_rate);
        self
    }
}

/// A computed trip quote
///
/// `cost_secondary` is left out of the serialized form entirely when it was
/// not requested, so "not requested" never looks like a zero cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TripQuoteResult {
    #[serde(with = "rust_decimal::serde::float")]
    pub miles: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub mpg: Decimal,
    pub grade: FuelGrade,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_usd_per_gallon: Decimal,
    /// Reporting period of the snapshot the price came from
    pub date: String,
    /// Fuel consumed, rounded to 6 decimal places
    #[serde(with = "rust_decimal::serde::float")]
    pub gallons: Decimal,
    /// Cost in USD, rounded to 2 decimal places
    #[serde(with = "rust_decimal::serde::float")]
    pub cost_usd: Decimal,
    /// Cost in the secondary currency, rounded to 2 decimal places
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub cost_secondary: Option<Decimal>,
}
