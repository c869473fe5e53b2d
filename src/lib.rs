//! Hourly weather collection for a set of cities.
//!
//! The `weather-scrap` binary runs the batch pipeline; `weather-api` serves
//! its outputs read-only over HTTP.

pub mod config;
pub mod errors;
pub mod helpers;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;
