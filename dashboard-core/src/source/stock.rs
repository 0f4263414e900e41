use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::{collections::BTreeMap, str::FromStr, sync::Arc};
use tracing::{debug, warn};

use crate::{
    FetchError,
    model::{StockMetadata, StockPoint, StockSeries},
};

use super::{DataSource, DatasetId, Transport};

/// Historical daily prices for a ticker symbol.
#[derive(Debug, Clone)]
pub struct StockSource {
    transport: Arc<dyn Transport>,
}

impl StockSource {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl DataSource for StockSource {
    type Output = StockSeries;

    fn dataset(&self) -> DatasetId {
        DatasetId::Stock
    }

    async fn fetch(&self, company: &str) -> Result<Self::Output, FetchError> {
        let id = self.dataset();
        let body = super::request_body(id, company);

        let payload = self.transport.post_json(id.endpoint(), &body).await?;
        let series = normalize(payload)?;

        debug!(dataset = %id, company, points = series.points.len(), "stock payload normalized");
        Ok(series)
    }
}

#[derive(Debug, Deserialize)]
struct StockEnvelope {
    #[serde(rename = "metaData")]
    meta_data: Option<Map<String, Value>>,
    data: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct StockRecord {
    date: String,
    close: Value,
}

/// Turn `{ metaData, data }` into a [`StockSeries`].
///
/// Records with an unparsable `date` or `close` are dropped. The remaining
/// points keep the backend's order.
pub fn normalize(payload: Value) -> Result<StockSeries, FetchError> {
    let envelope: StockEnvelope = serde_json::from_value(payload)
        .map_err(|err| FetchError::protocol(format!("malformed stock response: {err}")))?;

    let meta = envelope
        .meta_data
        .ok_or_else(|| FetchError::protocol("stock response has no 'metaData' field"))?;
    let records = envelope
        .data
        .ok_or_else(|| FetchError::protocol("stock response has no 'data' field"))?;

    let total = records.len();
    let points: Vec<StockPoint> = records.into_iter().filter_map(parse_point).collect();

    let dropped = total - points.len();
    if dropped > 0 {
        warn!(dropped, total, "skipped stock records with unparsable date or close price");
    }

    Ok(StockSeries {
        metadata: metadata_from(meta),
        points,
    })
}

fn metadata_from(meta: Map<String, Value>) -> StockMetadata {
    let entries: BTreeMap<String, String> = meta
        .into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null | Value::Array(_) | Value::Object(_) => return None,
            };
            Some((key, value))
        })
        .collect();

    StockMetadata::new(entries)
}

fn parse_point(record: Value) -> Option<StockPoint> {
    let record: StockRecord = serde_json::from_value(record).ok()?;
    let date = parse_date(&record.date)?;
    let close_price = parse_price(&record.close)?;
    Some(StockPoint { date, close_price })
}

/// Accepts `YYYY-MM-DD`, RFC 3339, or `YYYY-MM-DD HH:MM:SS`; only the date is kept.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

pub fn parse_price(raw: &Value) -> Option<Decimal> {
    let text = match raw {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    Decimal::from_str(&text).or_else(|_| Decimal::from_scientific(&text)).ok()
}
