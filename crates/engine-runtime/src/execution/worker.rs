use crate::error::WorkerError;
use connectors::{query::source::TemplateSource, sql::base::provider::ConnectionProvider};
use engine_core::{
    cursor::OffsetHandle,
    gate::PauseGate,
    poll::PollLoop,
    sink::{CompletionReporter, EventSink},
    state::OffsetStore,
};
use model::execution::{session::PollingSession, state::WorkerState};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

type ReporterSlot = Arc<Mutex<Option<Weak<dyn CompletionReporter>>>>;

/// Control surface of one polling session. The poll loop runs on its own
/// tokio task once [`PollingWorker::start`] is called.
pub struct PollingWorker<P: ConnectionProvider + 'static> {
    name: String,
    poll: Option<PollLoop<P>>,
    offsets: OffsetHandle,
    gate: PauseGate,
    state: Arc<watch::Sender<WorkerState>>,
    reporter: ReporterSlot,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<P: ConnectionProvider + 'static> PollingWorker<P> {
    pub fn new(
        session: PollingSession,
        provider: P,
        templates: Arc<dyn TemplateSource>,
        sink: Weak<dyn EventSink>,
        cancel: CancellationToken,
    ) -> Self {
        let name = session.name.clone();
        let poll = PollLoop::new(session, provider, templates, sink, cancel.clone());
        let (state, _) = watch::channel(WorkerState::Idle);

        PollingWorker {
            name,
            offsets: poll.offsets(),
            gate: poll.gate(),
            poll: Some(poll),
            state: Arc::new(state),
            reporter: Arc::new(Mutex::new(None)),
            cancel,
            task: None,
        }
    }

    /// Persists checkpoints to `store`. Only effective before `start`.
    pub fn with_store(mut self, store: Arc<dyn OffsetStore>) -> Self {
        self.poll = self.poll.take().map(|poll| poll.with_store(store));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The worker keeps only a weak reference; the caller owns the reporter.
    pub fn register_completion_reporter(&self, reporter: &Arc<dyn CompletionReporter>) {
        let mut slot = self.reporter.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::downgrade(reporter));
    }

    pub fn start(&mut self) -> Result<(), WorkerError> {
        let Some(poll) = self.poll.take() else {
            return Err(WorkerError::AlreadyStarted(self.name.clone()));
        };

        let initial = if self.gate.is_paused() {
            WorkerState::Paused
        } else {
            WorkerState::Running
        };
        self.state.send_replace(initial);

        let state = self.state.clone();
        let reporter = self.reporter.clone();
        let name = self.name.clone();

        self.task = Some(tokio::spawn(async move {
            match poll.run().await {
                Ok(()) => {
                    state.send_replace(WorkerState::Stopped(None));
                }
                Err(failure) => {
                    state.send_replace(WorkerState::Stopped(Some(failure.to_string())));
                    let reporter = reporter
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .as_ref()
                        .and_then(Weak::upgrade);
                    match reporter {
                        Some(reporter) => reporter.on_failure(failure),
                        None => warn!(session = %name, "No completion reporter for failed session."),
                    }
                }
            }
        }));

        info!(session = %self.name, "Polling worker started.");
        Ok(())
    }

    /// Withholds delivery from the next row on. Rows already handed to the
    /// sink are unaffected. Safe to call from any thread.
    pub fn pause(&self) {
        let mut closed = false;
        // Gate and state change together under the state lock.
        self.state.send_if_modified(|state| {
            closed = self.gate.pause();
            if *state == WorkerState::Running {
                *state = WorkerState::Paused;
                true
            } else {
                false
            }
        });
        if closed {
            info!(session = %self.name, "Polling worker paused.");
        }
    }

    pub fn resume(&self) {
        let mut opened = false;
        self.state.send_if_modified(|state| {
            opened = self.gate.resume();
            if *state == WorkerState::Paused {
                *state = WorkerState::Running;
                true
            } else {
                false
            }
        });
        if opened {
            info!(session = %self.name, "Polling worker resumed.");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.gate.is_paused()
    }

    /// Cancels the session. The completion reporter is not called.
    pub fn stop(&mut self) {
        info!(session = %self.name, "Stopping polling worker.");
        self.cancel.cancel();
        if self.poll.take().is_some() {
            // Never started, there is no task to report the transition.
            self.state.send_replace(WorkerState::Stopped(None));
        }
    }

    pub fn current_offset(&self) -> Option<String> {
        self.offsets.current()
    }

    pub fn offsets(&self) -> OffsetHandle {
        self.offsets.clone()
    }

    pub fn state(&self) -> WorkerState {
        self.state.borrow().clone()
    }

    /// Waits for the polling task to end and returns the terminal state.
    pub async fn join(&mut self) -> Result<WorkerState, WorkerError> {
        if let Some(task) = self.task.take() {
            task.await?;
        }
        Ok(self.state())
    }
}
