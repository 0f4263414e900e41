//! Fetch lifecycle for one dataset.
//!
//! A request id is reserved at the moment a parameter is committed, in commit
//! order. Only the completion carrying the latest reserved id may touch the
//! published [`Snapshot`]; older completions are reported as
//! [`FetchOutcome::Superseded`] and discarded.

use std::{sync::Arc, time::Duration};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{FetchError, source::DataSource};

/// Lifecycle state of a dataset's most recent request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Succeeded,
    Failed,
}

/// A published dataset and the parameter it was fetched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tagged<T> {
    pub parameter: String,
    pub value: T,
}

/// What the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<T> {
    pub status: FetchStatus,
    /// Committed parameter of the latest reserved request.
    pub parameter: Option<String>,
    pub data: Option<Tagged<T>>,
    pub error: Option<String>,
    latest: u64,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            status: FetchStatus::Idle,
            parameter: None,
            data: None,
            error: None,
            latest: 0,
        }
    }
}

impl<T> Snapshot<T> {
    pub fn is_loading(&self) -> bool {
        self.status == FetchStatus::Loading
    }

    pub fn value(&self) -> Option<&T> {
        self.data.as_ref().map(|tagged| &tagged.value)
    }
}

/// How a single `fetch` call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Blank parameter; nothing was sent.
    Skipped,
    /// A live edit was overtaken during its debounce window; nothing was sent.
    Debounced,
    Succeeded,
    Failed(FetchError),
    /// A newer parameter was committed before this request completed.
    Superseded,
}

#[derive(Debug, Clone)]
pub(crate) struct Ticket {
    id: u64,
    parameter: String,
}

pub struct Orchestrator<S: DataSource> {
    source: Arc<S>,
    timeout: Duration,
    state: watch::Sender<Snapshot<S::Output>>,
}

impl<S: DataSource> std::fmt::Debug for Orchestrator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("dataset", &self.source.dataset())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<S: DataSource> Orchestrator<S> {
    pub fn new(source: S, timeout: Duration) -> Self {
        let (state, _) = watch::channel(Snapshot::default());
        Self {
            source: Arc::new(source),
            timeout,
            state,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn snapshot(&self) -> Snapshot<S::Output> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<S::Output>> {
        self.state.subscribe()
    }

    /// Run one request for `parameter` and publish its result unless it went stale.
    pub async fn fetch(&self, parameter: &str) -> FetchOutcome {
        let Some(id) = self.reserve(parameter) else {
            return FetchOutcome::Skipped;
        };

        match self.begin(id) {
            Some(ticket) => self.run(ticket).await,
            None => FetchOutcome::Superseded,
        }
    }

    /// Record `parameter` as committed and hand out the next request id.
    ///
    /// Every request reserved earlier becomes stale from this point on, even
    /// if it is already in flight.
    pub(crate) fn reserve(&self, parameter: &str) -> Option<u64> {
        let parameter = parameter.trim();
        if parameter.is_empty() {
            debug!(dataset = %self.source.dataset(), "blank parameter, fetch suppressed");
            return None;
        }

        let mut id = 0;
        self.state.send_modify(|s| {
            s.latest += 1;
            s.parameter = Some(parameter.to_string());
            id = s.latest;
        });

        debug!(dataset = %self.source.dataset(), request = id, parameter, "request reserved");
        Some(id)
    }

    /// Switch to `Loading` for reservation `id`, unless a newer one exists.
    pub(crate) fn begin(&self, id: u64) -> Option<Ticket> {
        let mut ticket = None;
        self.state.send_if_modified(|s| {
            let Some(parameter) = s.parameter.clone().filter(|_| s.latest == id) else {
                return false;
            };
            s.status = FetchStatus::Loading;
            ticket = Some(Ticket { id, parameter });
            true
        });

        match &ticket {
            Some(t) => {
                let dataset = self.source.dataset();
                info!(%dataset, request = id, parameter = %t.parameter, "fetch started");
            }
            None => debug!(request = id, "reservation superseded before start"),
        }
        ticket
    }

    /// Send the request for an already started ticket.
    pub(crate) async fn run(&self, ticket: Ticket) -> FetchOutcome {
        let in_flight = InFlight {
            state: &self.state,
            ticket: Some(ticket.clone()),
        };

        let request = self.source.fetch(&ticket.parameter);
        let result = match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        };

        in_flight.finish(result)
    }
}

/// Settles a ticket exactly once, even if the fetch future is dropped midway.
struct InFlight<'a, T> {
    state: &'a watch::Sender<Snapshot<T>>,
    ticket: Option<Ticket>,
}

impl<T> InFlight<'_, T> {
    fn finish(mut self, result: Result<T, FetchError>) -> FetchOutcome {
        match self.ticket.take() {
            Some(ticket) => settle(self.state, ticket, result),
            None => FetchOutcome::Superseded,
        }
    }
}

impl<T> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            settle(self.state, ticket, Err(FetchError::Aborted));
        }
    }
}

fn settle<T>(
    state: &watch::Sender<Snapshot<T>>,
    ticket: Ticket,
    result: Result<T, FetchError>,
) -> FetchOutcome {
    let mut outcome = FetchOutcome::Superseded;

    state.send_if_modified(|s| {
        let committed = s.parameter.as_deref() == Some(ticket.parameter.as_str());
        if s.latest != ticket.id || !committed {
            return false;
        }

        match result {
            Ok(value) => {
                s.status = FetchStatus::Succeeded;
                s.data = Some(Tagged {
                    parameter: ticket.parameter.clone(),
                    value,
                });
                s.error = None;
                outcome = FetchOutcome::Succeeded;
            }
            Err(err) => {
                s.status = FetchStatus::Failed;
                s.data = None;
                s.error = Some(err.to_string());
                outcome = FetchOutcome::Failed(err);
            }
        }
        true
    });

    match &outcome {
        FetchOutcome::Succeeded => {
            info!(request = ticket.id, parameter = %ticket.parameter, "fetch succeeded");
        }
        FetchOutcome::Failed(err) => {
            warn!(request = ticket.id, parameter = %ticket.parameter, error = %err, "fetch failed");
        }
        _ => {
            debug!(request = ticket.id, parameter = %ticket.parameter, "stale response discarded");
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ErrorKind,
        testing::{ScriptedSource, reply},
    };

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn orchestrator(source: ScriptedSource) -> Orchestrator<ScriptedSource> {
        Orchestrator::new(source, TIMEOUT)
    }

    fn tagged(parameter: &str, value: Vec<u32>) -> Option<Tagged<Vec<u32>>> {
        Some(Tagged {
            parameter: parameter.to_string(),
            value,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn success_publishes_tagged_data() {
        let source = ScriptedSource::new().with("Paris", reply(10, Ok(vec![1, 2])));
        let orch = orchestrator(source);

        assert_eq!(orch.fetch("Paris").await, FetchOutcome::Succeeded);

        let snap = orch.snapshot();
        assert_eq!(snap.status, FetchStatus::Succeeded);
        assert_eq!(snap.data, tagged("Paris", vec![1, 2]));
        assert_eq!(snap.error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn parameter_is_trimmed_before_sending() {
        let source = ScriptedSource::new().with("IBM", reply(0, Ok(vec![7])));
        let orch = orchestrator(source);

        assert_eq!(orch.fetch("  IBM ").await, FetchOutcome::Succeeded);
        assert_eq!(orch.source().calls(), vec!["IBM".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_parameter_never_calls_source() {
        let orch = orchestrator(ScriptedSource::new());

        assert_eq!(orch.fetch("").await, FetchOutcome::Skipped);
        assert_eq!(orch.fetch(" \t ").await, FetchOutcome::Skipped);

        assert!(orch.source().calls().is_empty());
        assert_eq!(orch.snapshot().status, FetchStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_clears_previous_data() {
        let source = ScriptedSource::new()
            .with("IBM", reply(5, Ok(vec![1])))
            .with("BROKEN", reply(5, Err(FetchError::protocol("missing 'data'"))));
        let orch = orchestrator(source);

        orch.fetch("IBM").await;
        assert!(orch.snapshot().data.is_some());

        let outcome = orch.fetch("BROKEN").await;
        assert!(matches!(outcome, FetchOutcome::Failed(ref e) if e.kind() == ErrorKind::Protocol));

        let snap = orch.snapshot();
        assert_eq!(snap.status, FetchStatus::Failed);
        assert_eq!(snap.data, None);
        assert!(snap.error.as_deref().is_some_and(|msg| !msg.is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn later_request_wins_even_if_earlier_finishes_last() {
        let source = ScriptedSource::new()
            .with("p1", reply(100, Ok(vec![1])))
            .with("p2", reply(10, Ok(vec![2])));
        let orch = orchestrator(source);

        let slow = orch.fetch("p1");
        let fast = async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            orch.fetch("p2").await
        };
        let (first, second) = tokio::join!(slow, fast);

        assert_eq!(first, FetchOutcome::Superseded);
        assert_eq!(second, FetchOutcome::Succeeded);

        let snap = orch.snapshot();
        assert_eq!(snap.status, FetchStatus::Succeeded);
        assert_eq!(snap.data, tagged("p2", vec![2]));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_failure_does_not_clobber_newer_success() {
        let source = ScriptedSource::new()
            .with("p1", reply(100, Err(FetchError::Transport("reset".into()))))
            .with("p2", reply(10, Ok(vec![2])));
        let orch = orchestrator(source);

        let (first, _) = tokio::join!(orch.fetch("p1"), async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            orch.fetch("p2").await
        });

        assert_eq!(first, FetchOutcome::Superseded);
        assert_eq!(orch.snapshot().status, FetchStatus::Succeeded);
        assert_eq!(orch.snapshot().error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn reserving_a_new_parameter_invalidates_in_flight_request() {
        let source = ScriptedSource::new().with("IB", reply(100, Ok(vec![1])));
        let orch = orchestrator(source);

        let (outcome, _) = tokio::join!(orch.fetch("IB"), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            orch.reserve("IBM")
        });

        assert_eq!(outcome, FetchOutcome::Superseded);

        let snap = orch.snapshot();
        assert_eq!(snap.parameter.as_deref(), Some("IBM"));
        assert_eq!(snap.data, None);
    }

    #[tokio::test(start_paused = true)]
    async fn request_order_follows_reservation_not_start_order() {
        let source = ScriptedSource::new()
            .with("p1", reply(10, Ok(vec![1])))
            .with("p2", reply(10, Ok(vec![2])));
        let orch = orchestrator(source);

        let first = orch.reserve("p1").unwrap();
        let second = orch.reserve("p2").unwrap();

        let newer = orch.begin(second).expect("latest reservation starts");
        assert!(orch.begin(first).is_none());

        assert_eq!(orch.run(newer).await, FetchOutcome::Succeeded);
        assert_eq!(orch.source().calls(), vec!["p2".to_string()]);
        assert_eq!(orch.snapshot().data, tagged("p2", vec![2]));
    }

    #[tokio::test(start_paused = true)]
    async fn status_leaves_loading_exactly_once() {
        let source = ScriptedSource::new()
            .with("ok", reply(20, Ok(vec![1])))
            .with("bad", reply(20, Err(FetchError::NoData)));
        let orch = orchestrator(source);
        let mut rx = orch.subscribe();

        for parameter in ["ok", "bad"] {
            let (_, seen) = tokio::join!(orch.fetch(parameter), async {
                let mut seen = Vec::new();
                while rx.changed().await.is_ok() {
                    let status = rx.borrow_and_update().status;
                    seen.push(status);
                    if status != FetchStatus::Loading {
                        break;
                    }
                }
                seen
            });

            assert_eq!(seen.first(), Some(&FetchStatus::Loading));
            let settled = seen.iter().filter(|s| **s != FetchStatus::Loading).count();
            assert_eq!(settled, 1);
            assert!(!orch.snapshot().is_loading());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_turns_into_failed() {
        let source = ScriptedSource::new().with("slow", reply(60_000, Ok(vec![1])));
        let orch = orchestrator(source);

        let outcome = orch.fetch("slow").await;
        assert_eq!(outcome, FetchOutcome::Failed(FetchError::Timeout(TIMEOUT)));
        assert_eq!(orch.snapshot().status, FetchStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_fetch_settles_as_aborted() {
        let source = ScriptedSource::new().with("IBM", reply(1_000, Ok(vec![1])));
        let orch = Arc::new(orchestrator(source));

        let task = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move { orch.fetch("IBM").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(orch.snapshot().is_loading());

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        let snap = orch.snapshot();
        assert_eq!(snap.status, FetchStatus::Failed);
        assert_eq!(snap.error, Some(FetchError::Aborted.to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_failure() {
        let unavailable = FetchError::HttpStatus {
            status: 503,
            body: String::new(),
        };
        let source = ScriptedSource::new()
            .with("down", reply(5, Err(unavailable)))
            .with("up", reply(5, Ok(vec![3])));
        let orch = orchestrator(source);

        orch.fetch("down").await;
        assert_eq!(orch.snapshot().status, FetchStatus::Failed);

        orch.fetch("up").await;
        let snap = orch.snapshot();
        assert_eq!(snap.status, FetchStatus::Succeeded);
        assert_eq!(snap.value(), Some(&vec![3]));
    }
}
