//! Core library for the weather/stock `dashboard`.
//!
//! This crate defines:
//! - Configuration of the backend endpoints and trigger modes
//! - Data sources that POST a query and normalize the backend payload
//! - The fetch orchestrator (status lifecycle, staleness guard, timeout)
//! - Dataset controllers binding an editable query to the orchestrator
//!
//! It is used by `dashboard-cli`, but any other front end can drive a
//! [`DatasetController`] and render the [`Snapshot`]s it publishes.

pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod query;
pub mod source;

#[cfg(test)]
mod testing;

pub use config::{Config, DatasetConfig, DatasetOverrides};
pub use controller::{ControllerSettings, DatasetController};
pub use error::{ErrorKind, FetchError};
pub use model::{StockMetadata, StockPoint, StockSeries, WeatherObservation};
pub use orchestrator::{FetchOutcome, FetchStatus, Orchestrator, Snapshot, Tagged};
pub use query::{Commit, QueryState, TriggerMode};
pub use source::{DataSource, DatasetId, Transport, stock::StockSource, weather::WeatherSource};

/// Both dataset controllers, wired to the HTTP backends from config.
#[derive(Debug)]
pub struct Dashboard {
    pub weather: DatasetController<WeatherSource>,
    pub stock: DatasetController<StockSource>,
}

impl Dashboard {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let weather = source::weather_source_from_config(config)?;
        let stock = source::stock_source_from_config(config)?;

        Ok(Self {
            weather: DatasetController::from_config(weather, config),
            stock: DatasetController::from_config(stock, config),
        })
    }
}
