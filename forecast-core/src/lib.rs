//! Core library for the `forecast` normalization service.
//!
//! This crate defines:
//! - The canonical, time-indexed forecast schema and its structural validator
//! - Abstraction over forecast providers and the two adapters
//!   (weather.gov interval grids, openweathermap.org hourly samples)
//! - The TTL-bounded query cache and the request orchestrator around it
//! - Configuration & credentials handling
//!
//! It is used by `forecast-cli`, but can also be reused by other binaries or services.

pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod provider;
pub mod service;
pub mod units;
pub mod validate;

pub use cache::ForecastCache;
pub use config::{Config, ProviderConfig};
pub use error::ForecastError;
pub use metrics::{FacadeMetrics, MetricsSink};
pub use model::{CanonicalForecast, HourRecord, Measurement};
pub use provider::{ForecastProvider, ProviderId, provider_for};
pub use service::ForecastService;
pub use validate::{CANONICAL_FIELDS, ValidationResult, validate};
