use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::{FetchError, model::WeatherObservation};

use super::{DataSource, DatasetId, Transport};

/// Current weather for a named location.
#[derive(Debug, Clone)]
pub struct WeatherSource {
    transport: Arc<dyn Transport>,
}

impl WeatherSource {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl DataSource for WeatherSource {
    type Output = Vec<WeatherObservation>;

    fn dataset(&self) -> DatasetId {
        DatasetId::Weather
    }

    async fn fetch(&self, location: &str) -> Result<Self::Output, FetchError> {
        let id = self.dataset();
        let body = super::request_body(id, location);

        let payload = self.transport.post_json(id.endpoint(), &body).await?;
        let rows = normalize(payload)?;

        debug!(dataset = %id, location, rows = rows.len(), "weather payload normalized");
        Ok(rows)
    }
}

#[derive(Debug, Deserialize)]
struct WeatherEnvelope {
    success: bool,
    data: Option<Value>,
}

/// Validate `{ success, data }` and type-check every observation.
///
/// Order and duplicate ids are kept as the backend sent them.
pub fn normalize(payload: Value) -> Result<Vec<WeatherObservation>, FetchError> {
    let envelope: WeatherEnvelope = serde_json::from_value(payload)
        .map_err(|err| FetchError::protocol(format!("malformed weather response: {err}")))?;

    if !envelope.success {
        return Err(FetchError::NoData);
    }

    let data = envelope
        .data
        .ok_or_else(|| FetchError::protocol("weather response has no 'data' field"))?;

    serde_json::from_value(data)
        .map_err(|err| FetchError::protocol(format!("malformed weather observation: {err}")))
}
