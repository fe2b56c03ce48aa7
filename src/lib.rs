//! Fuelquote Library
//!
//! Weekly U.S. retail fuel prices from the EIA open data API, held in a
//! single-flight TTL cache, and trip fuel cost quotes computed over them.
//! The binary in `main.rs` is a thin CLI over [`service::PriceService`].

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod quote;
pub mod service;
