use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One row of the weather table, exactly as the backend sent it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub id: i64,
    pub main: String,
    pub description: String,
    pub icon: String,
}

impl WeatherObservation {
    /// Image URL for this observation's icon, e.g. `https://openweathermap.org/img/wn/01d@2x.png`.
    pub fn icon_url(&self, icon_base_url: &str) -> String {
        format!("{}/img/wn/{}@2x.png", icon_base_url.trim_end_matches('/'), self.icon)
    }
}

/// A single closing price on a calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPoint {
    pub date: NaiveDate,
    pub close_price: Decimal,
}

/// Descriptive metadata the backend ships alongside a price series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMetadata(BTreeMap<String, String>);

impl StockMetadata {
    pub const INFORMATION: &'static str = "1. Information";
    pub const SYMBOL: &'static str = "2. Symbol";
    pub const LAST_REFRESHED: &'static str = "3. Last Refreshed";
    pub const TIME_ZONE: &'static str = "5. Time Zone";

    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self(entries)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn information(&self) -> Option<&str> {
        self.get(Self::INFORMATION)
    }

    pub fn symbol(&self) -> Option<&str> {
        self.get(Self::SYMBOL)
    }

    pub fn last_refreshed(&self) -> Option<&str> {
        self.get(Self::LAST_REFRESHED)
    }

    pub fn time_zone(&self) -> Option<&str> {
        self.get(Self::TIME_ZONE)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Metadata and price points from the same response; always replaced together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSeries {
    pub metadata: StockMetadata,
    pub points: Vec<StockPoint>,
}
