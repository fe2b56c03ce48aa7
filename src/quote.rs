//! Trip fuel cost calculation.
//!
//! Pure arithmetic over a [`TripQuoteRequest`] and a [`PriceSnapshot`]. All
//! values are `Decimal`; rounding is half away from zero (2.675 -> 2.68), with
//! gallons kept to 6 places and money to 2.

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

use crate::data::{FuelGrade, PriceSnapshot, TripQuoteRequest, TripQuoteResult};

/// Decimal places kept for fuel volume
const GALLONS_DP: u32 = 6;

/// Decimal places kept for money
const MONEY_DP: u32 = 2;

/// Errors that can occur when computing a quote
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuoteError {
    /// Trip parameters violate a precondition
    #[error("{0}")]
    InvalidTrip(String),

    /// The snapshot has no price for the requested grade
    #[error("No price for grade={0}")]
    UnknownGrade(FuelGrade),
}

/// Checks the trip parameters without looking at any prices.
pub fn validate_request(request: &TripQuoteRequest) -> Result<(), QuoteError> {
    if request.miles <= Decimal::ZERO || request.mpg <= Decimal::ZERO {
        return Err(QuoteError::InvalidTrip(
            "miles and mpg must be positive".to_string(),
        ));
    }
    if let Some(rate) = request.exchange_rate {
        if rate <= Decimal::ZERO {
            return Err(QuoteError::InvalidTrip(
                "exchange_rate must be positive".to_string(),
            ));
        }
    }
    Ok(())
}

/// Computes fuel use and cost for a trip at the snapshot's price.
///
/// `gallons = miles / mpg` and `cost = gallons * price`, where the cost uses the
/// unrounded gallons. The secondary-currency cost is only present when the
/// request both asks for it and carries an exchange rate.
pub fn compute_quote(
    request: &TripQuoteRequest,
    snapshot: &PriceSnapshot,
) -> Result<TripQuoteResult, QuoteError> {
    validate_request(request)?;

    let price = snapshot
        .price(request.grade)
        .ok_or(QuoteError::UnknownGrade(request.grade))?;

    let gallons = request
        .miles
        .checked_div(request.mpg)
        .ok_or_else(too_large)?;
    let cost_usd = gallons.checked_mul(price).ok_or_else(too_large)?;

    let cost_secondary = match (request.return_secondary, request.exchange_rate) {
        (true, Some(rate)) => Some(round(
            cost_usd.checked_mul(rate).ok_or_else(too_large)?,
            MONEY_DP,
        )),
        _ => None,
    };

    Ok(TripQuoteResult {
        miles: request.miles,
        mpg: request.mpg,
        grade: request.grade,
        price_usd_per_gallon: price,
        date: snapshot.date.clone(),
        gallons: round(gallons, GALLONS_DP),
        cost_usd: round(cost_usd, MONEY_DP),
        cost_secondary,
    })
}

fn too_large() -> QuoteError {
    QuoteError::InvalidTrip("trip is too large to quote".to_string())
}

fn round(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}
