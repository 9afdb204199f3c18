//! A blocking Rust client for the Hildebrand Glowmarkt smart-meter API.
//!
//! The flow is: resolve credentials, log in for a bearer token, then read
//! resources and their time-series readings with that token.
//!
//! ## Quick start
//! - Provide credentials explicitly, via environment variables (`APP_ID`,
//!   `USERNAME`, `PASSWORD`) or a `~/.hildebrand.credentials` JSON file.
//! - Log in with [`Client::login`] (or use [`Client::from_env`]), then call the
//!   data operations.
//!
//! ```no_run
//! use chrono::{Duration, Utc};
//! use glowmarkt::{Client, ELECTRICITY_CONSUMPTION, Period};
//!
//! fn main() -> glowmarkt::Result<()> {
//!     let client = Client::from_env()?;
//!     if let Some(elec) = client.find_resource(ELECTRICITY_CONSUMPTION)? {
//!         let end = Utc::now();
//!         let readings = client.get_readings(&elec.id, end - Duration::days(1), end, Period::Hour)?;
//!         for r in readings {
//!             println!("{} {} {}", r.timestamp, r.value, r.unit);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

mod client;
mod config;
mod error;
mod readings;
mod resource;
mod tariff;
mod transport;

pub use client::{Client, CurrentUsage, DEFAULT_BASE_URL, Session};
pub use config::{
    CREDENTIALS_FILE, CREDENTIALS_PATH_ENV, CredentialField, Credentials, PartialCredentials,
    Resolver, resolve,
};
pub use error::{Error, Result};
pub use readings::{AggregateFunction, Period, Reading, ReadingsQuery};
pub use resource::{
    ELECTRICITY_CONSUMPTION, ELECTRICITY_COST, GAS_CONSUMPTION, GAS_COST, Resource,
    ResourceDetails,
};
pub use tariff::Tariff;
pub use transport::{HttpTransport, Method, Request, Response, Transport};
