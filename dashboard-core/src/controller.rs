//! Binds a [`QueryState`] to an [`Orchestrator`] under a [`TriggerMode`].
//!
//! Fetches run on spawned tokio tasks, so every method that may start one must
//! be called from inside a runtime.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;

use crate::{
    Config,
    orchestrator::{FetchOutcome, Orchestrator, Snapshot},
    query::{Commit, QueryState, TriggerMode},
    source::DataSource,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    pub mode: TriggerMode,
    pub debounce: Duration,
    pub initial_query: String,
    pub fetch_on_start: bool,
    pub timeout: Duration,
    pub abort_superseded: bool,
}

impl ControllerSettings {
    pub fn from_config(config: &Config, dataset: crate::DatasetId) -> Self {
        let ds = config.dataset_config(dataset);
        Self {
            mode: ds.mode,
            debounce: ds.debounce(),
            initial_query: ds.default_query.clone().unwrap_or_default(),
            fetch_on_start: ds.fetch_on_start,
            timeout: config.request_timeout(),
            abort_superseded: config.abort_superseded,
        }
    }
}

type Tasks = Arc<Mutex<Vec<(u64, AbortHandle)>>>;

pub struct DatasetController<S: DataSource> {
    orchestrator: Arc<Orchestrator<S>>,
    query: Arc<Mutex<QueryState>>,
    tasks: Tasks,
    settings: ControllerSettings,
}

impl<S: DataSource> std::fmt::Debug for DatasetController<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetController")
            .field("orchestrator", &self.orchestrator)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<S: DataSource> DatasetController<S> {
    pub fn new(source: S, settings: ControllerSettings) -> Self {
        Self {
            orchestrator: Arc::new(Orchestrator::new(source, settings.timeout)),
            query: Arc::new(Mutex::new(QueryState::new(settings.initial_query.clone()))),
            tasks: Arc::new(Mutex::new(Vec::new())),
            settings,
        }
    }

    pub fn from_config(source: S, config: &Config) -> Self {
        let settings = ControllerSettings::from_config(config, source.dataset());
        Self::new(source, settings)
    }

    pub fn mode(&self) -> TriggerMode {
        self.settings.mode
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator<S>> {
        &self.orchestrator
    }

    pub fn query(&self) -> QueryState {
        lock(&self.query).clone()
    }

    pub fn snapshot(&self) -> Snapshot<S::Output> {
        self.orchestrator.snapshot()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<Snapshot<S::Output>> {
        self.orchestrator.subscribe()
    }

    /// Fetch the initial query if the dataset is configured to load on open.
    pub fn start(&self) -> Option<JoinHandle<FetchOutcome>> {
        if !self.settings.fetch_on_start {
            return None;
        }

        let id = self.reserve(&mut lock(&self.query))?;
        Some(self.spawn_fetch(id, Duration::ZERO))
    }

    /// Replace the draft. In live mode a non-blank draft is committed and a
    /// debounced fetch is scheduled.
    pub fn edit(&self, text: impl Into<String>) -> Option<JoinHandle<FetchOutcome>> {
        let id = {
            let mut query = lock(&self.query);
            query.set_draft(text);
            if self.settings.mode != TriggerMode::Live {
                return None;
            }
            self.reserve(&mut query)?
        };

        Some(self.spawn_fetch(id, self.settings.debounce))
    }

    /// Commit the draft and fetch immediately, whatever the mode.
    pub fn submit(&self) -> Option<JoinHandle<FetchOutcome>> {
        let id = self.reserve(&mut lock(&self.query))?;
        Some(self.spawn_fetch(id, Duration::ZERO))
    }

    /// Commit the draft and reserve its request id while the query is locked,
    /// so request order always matches commit order.
    fn reserve(&self, query: &mut QueryState) -> Option<u64> {
        let Commit { seq, parameter } = query.commit()?;
        let id = self.orchestrator.reserve(&parameter)?;
        debug!(seq, request = id, %parameter, "query committed");
        Some(id)
    }

    fn spawn_fetch(&self, id: u64, delay: Duration) -> JoinHandle<FetchOutcome> {
        let orchestrator = Arc::clone(&self.orchestrator);
        let tasks = Arc::clone(&self.tasks);
        let abort_superseded = self.settings.abort_superseded;

        let handle = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let Some(ticket) = orchestrator.begin(id) else {
                if delay.is_zero() {
                    return FetchOutcome::Superseded;
                }
                debug!(request = id, "edit superseded during debounce");
                return FetchOutcome::Debounced;
            };

            if abort_superseded {
                abort_older(&tasks, id);
            }

            orchestrator.run(ticket).await
        });

        let mut tasks = lock(&self.tasks);
        tasks.retain(|(_, task)| !task.is_finished());
        tasks.push((id, handle.abort_handle()));

        handle
    }
}

fn abort_older(tasks: &Tasks, id: u64) {
    let mut tasks = lock(tasks);
    tasks.retain(|(task_id, task)| {
        if *task_id < id {
            task.abort();
            false
        } else {
            true
        }
    });
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
