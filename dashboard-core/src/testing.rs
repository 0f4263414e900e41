//! Fakes shared by unit tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    FetchError,
    source::{DataSource, DatasetId, Transport},
};

/// Transport that answers every request with the same canned result.
#[derive(Debug)]
pub struct RecordingTransport {
    response: Result<Value, FetchError>,
    requests: Mutex<Vec<(String, Value)>>,
}

impl RecordingTransport {
    pub fn replying(response: Result<Value, FetchError>) -> Self {
        Self {
            response,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, FetchError> {
        self.requests.lock().unwrap().push((path.to_string(), body.clone()));
        self.response.clone()
    }
}

#[derive(Debug, Clone)]
pub struct Reply {
    delay: Duration,
    result: Result<Vec<u32>, FetchError>,
}

pub fn reply(delay_ms: u64, result: Result<Vec<u32>, FetchError>) -> Reply {
    Reply {
        delay: Duration::from_millis(delay_ms),
        result,
    }
}

/// Data source with a per-parameter delay and result; records every call.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    script: HashMap<String, Reply>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, parameter: &str, reply: Reply) -> Self {
        self.script.insert(parameter.to_string(), reply);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DataSource for ScriptedSource {
    type Output = Vec<u32>;

    fn dataset(&self) -> DatasetId {
        DatasetId::Stock
    }

    async fn fetch(&self, parameter: &str) -> Result<Self::Output, FetchError> {
        self.calls.lock().unwrap().push(parameter.to_string());

        let Some(reply) = self.script.get(parameter).cloned() else {
            return Err(FetchError::NoData);
        };

        tokio::time::sleep(reply.delay).await;
        reply.result
    }
}
