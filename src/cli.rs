//! Command-line interface parsing for fuelquote
//!
//! This module handles parsing of CLI arguments using clap. Every global option
//! can also come from the environment (or a `.env` file), and the parsed
//! arguments are turned into a [`StartupConfig`] before anything touches the
//! network.

use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::config::{
    CacheConfig, FeedConfig, ServiceConfig, StalePolicy, DEFAULT_AREA, DEFAULT_PAGE_LENGTH,
    EIA_BASE_URL,
};
use crate::data::{FuelGrade, TripQuoteRequest};
use crate::service::ErrorKind;

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// No API credential was given on the command line or in the environment
    #[error("Missing EIA API key: pass --api-key or set EIA_API_KEY")]
    MissingApiKey,

    /// The specified grade name is not recognized
    #[error("Invalid grade: '{0}'. Valid grades: regular, midgrade, premium, diesel")]
    InvalidGrade(String),

    /// A quote argument required without --body was not given
    #[error("Missing required argument: --{0}")]
    MissingArgument(&'static str),

    /// The --body JSON is not a valid trip quote request
    #[error("Invalid request body: {0}")]
    InvalidBody(String),
}

/// fuelquote - weekly U.S. retail fuel prices and trip fuel cost quotes
#[derive(Parser, Debug)]
#[command(name = "fuelquote")]
#[command(about = "Weekly U.S. retail fuel prices and trip fuel cost quotes")]
#[command(version)]
pub struct Cli {
    /// EIA open data API key
    #[arg(long, env = "EIA_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// EIA weekly retail price endpoint
    #[arg(long, env = "EIA_BASE_URL", default_value = EIA_BASE_URL, global = true)]
    pub base_url: String,

    /// EIA area code to price against; empty for every area
    #[arg(long, env = "EIA_AREA", default_value = DEFAULT_AREA, global = true)]
    pub area: String,

    /// Seconds a fetched snapshot stays fresh
    #[arg(long, env = "FUEL_CACHE_TTL_SECS", default_value_t = 1800, global = true)]
    pub cache_ttl_secs: u64,

    /// Seconds to wait for the price feed before giving up
    #[arg(
        long,
        env = "FUEL_REQUEST_TIMEOUT_SECS",
        default_value_t = 15,
        value_parser = clap::value_parser!(u64).range(1..),
        global = true
    )]
    pub timeout_secs: u64,

    /// Serve the last snapshot when a refresh fails instead of erroring
    #[arg(long, env = "FUEL_SERVE_STALE", global = true)]
    pub serve_stale: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the current price of one grade
    Price {
        /// Fuel grade: regular, midgrade, premium or diesel
        #[arg(long, default_value = "regular", value_parser = parse_grade_arg)]
        grade: FuelGrade,
    },

    /// Quote the fuel cost of a trip
    ///
    /// Examples:
    ///   fuelquote quote --miles 300 --mpg 30
    ///   fuelquote quote --miles 300 --mpg 30 --grade diesel --secondary --exchange-rate 0.78
    ///   fuelquote quote --body '{"miles": 300, "mpg": 30}'
    Quote(QuoteArgs),

    /// Show every grade price in the current snapshot
    Snapshot,
}

#[derive(Args, Debug)]
pub struct QuoteArgs {
    /// Trip distance in miles
    #[arg(
        long,
        allow_negative_numbers = true,
        required_unless_present = "body",
        conflicts_with = "body"
    )]
    pub miles: Option<Decimal>,

    /// Vehicle fuel economy in miles per gallon
    #[arg(
        long,
        allow_negative_numbers = true,
        required_unless_present = "body",
        conflicts_with = "body"
    )]
    pub mpg: Option<Decimal>,

    /// Fuel grade (default: regular)
    #[arg(long, value_parser = parse_grade_arg, conflicts_with = "body")]
    pub grade: Option<FuelGrade>,

    /// Also report the cost in a secondary currency
    #[arg(long, conflicts_with = "body")]
    pub secondary: bool,

    /// Units of secondary currency per USD
    #[arg(long, allow_negative_numbers = true, conflicts_with = "body")]
    pub exchange_rate: Option<Decimal>,

    /// Full request as JSON: {"miles", "mpg", "grade", "return_secondary", "exchange_rate"}
    #[arg(long)]
    pub body: Option<String>,
}

/// What the invocation asks the service to do
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Price(FuelGrade),
    Quote(TripQuoteRequest),
    Snapshot,
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone)]
pub struct StartupConfig {
    /// Feed and cache settings
    pub service: ServiceConfig,
    /// The operation to run
    pub action: Action,
}

/// Parses a grade string argument into a FuelGrade.
///
/// # Returns
/// * `Ok(FuelGrade)` if the string names a tracked grade
/// * `Err(CliError::InvalidGrade)` if it doesn't
pub fn parse_grade_arg(s: &str) -> Result<FuelGrade, CliError> {
    FuelGrade::from_str(s).ok_or_else(|| CliError::InvalidGrade(s.to_string()))
}

/// Parses a JSON request body into a TripQuoteRequest.
///
/// Unknown grades and malformed numbers are rejected here, before the
/// service sees the request.
pub fn parse_quote_body(body: &str) -> Result<TripQuoteRequest, CliError> {
    serde_json::from_str(body).map_err(|e| CliError::InvalidBody(e.to_string()))
}

/// Process exit code for a failed service call
pub fn exit_code_for(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::BadRequest => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::UpstreamUnavailable => 4,
    }
}

impl QuoteArgs {
    fn to_request(&self) -> Result<TripQuoteRequest, CliError> {
        if let Some(ref body) = self.body {
            return parse_quote_body(body);
        }

        let miles = self.miles.ok_or(CliError::MissingArgument("miles"))?;
        let mpg = self.mpg.ok_or(CliError::MissingArgument("mpg"))?;
        Ok(TripQuoteRequest {
            miles,
            mpg,
            grade: self.grade.unwrap_or_default(),
            return_secondary: self.secondary,
            exchange_rate: self.exchange_rate,
        })
    }
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with the service settings and requested action
    /// * `Err(CliError)` if the API key is missing or a quote request is invalid
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let api_key = cli
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(CliError::MissingApiKey)?;

        let area = Some(cli.area.trim())
            .filter(|area| !area.is_empty())
            .map(str::to_string);

        let feed = FeedConfig {
            api_key: api_key.to_string(),
            base_url: cli.base_url.clone(),
            area,
            page_length: DEFAULT_PAGE_LENGTH,
            request_timeout: Duration::from_secs(cli.timeout_secs),
        };

        let cache = CacheConfig {
            ttl: Duration::from_secs(cli.cache_ttl_secs),
            fetch_timeout: Duration::from_secs(cli.timeout_secs),
            stale_policy: if cli.serve_stale {
                StalePolicy::ServeStale
            } else {
                StalePolicy::FailFast
            },
        };

        let action = match &cli.command {
            Command::Price { grade } => Action::Price(*grade),
            Command::Quote(args) => Action::Quote(args.to_request()?),
            Command::Snapshot => Action::Snapshot,
        };

        Ok(StartupConfig {
            service: ServiceConfig { feed, cache },
            action,
        })
    }
}
