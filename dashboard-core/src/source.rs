use crate::{
    Config, FetchError,
    source::{http::HttpTransport, stock::StockSource, weather::WeatherSource},
};
use async_trait::async_trait;
use serde_json::Value;
use std::{convert::TryFrom, fmt::Debug, sync::Arc};

pub mod http;
pub mod stock;
pub mod weather;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetId {
    Weather,
    Stock,
}

impl DatasetId {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetId::Weather => "weather",
            DatasetId::Stock => "stock",
        }
    }

    pub const fn all() -> &'static [DatasetId] {
        &[DatasetId::Weather, DatasetId::Stock]
    }

    /// Fixed backend path for this dataset.
    pub fn endpoint(&self) -> &'static str {
        match self {
            DatasetId::Weather => "/api/weather/data",
            DatasetId::Stock => "/api/stock/data",
        }
    }

    /// Name of the JSON body field carrying the query parameter.
    pub fn request_field(&self) -> &'static str {
        match self {
            DatasetId::Weather => "location",
            DatasetId::Stock => "company",
        }
    }
}

impl std::fmt::Display for DatasetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for DatasetId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "weather" => Ok(DatasetId::Weather),
            "stock" => Ok(DatasetId::Stock),
            _ => Err(anyhow::anyhow!(
                "Unknown dataset '{value}'. Supported datasets: weather, stock."
            )),
        }
    }
}

/// Sends one JSON POST to the backend and returns the decoded JSON body.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, FetchError>;
}

/// A dataset backend: one request per call, normalized into `Output`.
#[async_trait]
pub trait DataSource: Send + Sync + Debug + 'static {
    type Output: Clone + Debug + Send + Sync + 'static;

    fn dataset(&self) -> DatasetId;

    async fn fetch(&self, parameter: &str) -> Result<Self::Output, FetchError>;
}

/// JSON body `{ <field>: parameter }` for a dataset request.
pub fn request_body(id: DatasetId, parameter: &str) -> Value {
    let mut body = serde_json::Map::new();
    body.insert(id.request_field().to_string(), Value::String(parameter.to_string()));
    Value::Object(body)
}

/// Build the HTTP transport for a dataset from config.
pub fn transport_from_config(id: DatasetId, config: &Config) -> anyhow::Result<Arc<dyn Transport>> {
    let dataset = config.dataset_config(id);
    let transport = HttpTransport::new(&dataset.base_url, config.request_timeout())?;
    tracing::debug!(dataset = %id, base_url = %transport.base_url(), "backend configured");
    Ok(Arc::new(transport))
}

pub fn weather_source_from_config(config: &Config) -> anyhow::Result<WeatherSource> {
    Ok(WeatherSource::new(transport_from_config(DatasetId::Weather, config)?))
}

pub fn stock_source_from_config(config: &Config) -> anyhow::Result<StockSource> {
    Ok(StockSource::new(transport_from_config(DatasetId::Stock, config)?))
}
