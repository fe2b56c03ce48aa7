//! Price lookup and trip quoting service
//!
//! `PriceService` is what the request layer talks to. It owns the price cache
//! and turns cache, feed and quote errors into the three outcomes a caller
//! needs to tell apart: bad request, not found, and upstream unavailable.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::cache::{CacheStatus, PriceCache};
use crate::config::ServiceConfig;
use crate::data::{
    EiaClient, FuelGrade, GradePrice, PriceSnapshot, TripQuoteRequest, TripQuoteResult,
    UpstreamError,
};
use crate::quote::{self, QuoteError};

/// Errors returned by [`PriceService`] operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Caller-supplied trip parameters are invalid
    #[error("{0}")]
    Validation(String),

    /// The current snapshot has no price for the grade
    #[error("No price for grade={0}")]
    UnknownGrade(FuelGrade),

    /// The price feed could not produce a snapshot
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Broad outcome class of a [`ServiceError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    UpstreamUnavailable,
}

impl ErrorKind {
    /// The HTTP status a transport layer would answer with
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::UpstreamUnavailable => 502,
        }
    }
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Validation(_) => ErrorKind::BadRequest,
            ServiceError::UnknownGrade(_) => ErrorKind::NotFound,
            ServiceError::Upstream(_) => ErrorKind::UpstreamUnavailable,
        }
    }
}

impl From<QuoteError> for ServiceError {
    fn from(err: QuoteError) -> Self {
        match err {
            QuoteError::InvalidTrip(msg) => ServiceError::Validation(msg),
            QuoteError::UnknownGrade(grade) => ServiceError::UnknownGrade(grade),
        }
    }
}

/// Fuel price lookups and trip quotes over a cached price snapshot
#[derive(Clone)]
pub struct PriceService {
    cache: PriceCache,
}

impl PriceService {
    /// Creates a service over an existing cache
    pub fn new(cache: PriceCache) -> Self {
        Self { cache }
    }

    /// Builds the EIA client and cache described by `config`
    pub fn from_config(config: &ServiceConfig) -> Result<Self, UpstreamError> {
        let feed = EiaClient::new(&config.feed)?;
        let cache = PriceCache::new(Arc::new(feed), config.cache.clone());
        Ok(Self::new(cache))
    }

    /// Returns the current price of one grade
    ///
    /// # Returns
    /// * `Ok(GradePrice)` - The grade's price and the period it was reported for
    /// * `Err(ServiceError::UnknownGrade)` - If the feed did not report the grade
    /// * `Err(ServiceError::Upstream)` - If the snapshot could not be refreshed
    pub async fn get_price(&self, grade: FuelGrade) -> Result<GradePrice, ServiceError> {
        let snapshot = self.cache.get_snapshot().await?;
        let price = snapshot
            .price(grade)
            .ok_or(ServiceError::UnknownGrade(grade))?;

        Ok(GradePrice {
            grade,
            price_usd_per_gallon: price,
            date: snapshot.date.clone(),
        })
    }

    /// Quotes the fuel cost of a trip at the current price
    ///
    /// The request is validated before the cache is consulted, so an invalid
    /// request never causes an upstream fetch.
    pub async fn quote_trip(
        &self,
        request: &TripQuoteRequest,
    ) -> Result<TripQuoteResult, ServiceError> {
        quote::validate_request(request)?;

        let snapshot = self.cache.get_snapshot().await?;
        let result = quote::compute_quote(request, &snapshot)?;
        debug!(
            grade = %result.grade,
            period = %result.date,
            cost_usd = %result.cost_usd,
            "quoted trip"
        );
        Ok(result)
    }

    /// Returns the whole current snapshot
    pub async fn snapshot(&self) -> Result<Arc<PriceSnapshot>, ServiceError> {
        Ok(self.cache.get_snapshot().await?)
    }

    /// Reports cache freshness without fetching
    pub fn cache_status(&self) -> CacheStatus {
        self.cache.status()
    }
}
