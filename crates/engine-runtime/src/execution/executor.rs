use crate::{
    error::RuntimeError,
    execution::{
        sink::{SessionEvent, TaggedSink},
        worker::PollingWorker,
    },
};
use connectors::{
    adapter::Adapter, error::ConnectorError, query::source::TemplateSource,
    sql::base::provider::ConnectionProvider,
};
use engine_config::settings::PollerConfig;
use engine_core::{
    error::PollingFailure,
    sink::{CompletionReporter, EventSink},
    state::OffsetStore,
};
use model::execution::{session::PollingSession, state::WorkerState};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Final state of one session after a run.
#[derive(Debug, Clone, Serialize)]
pub struct SessionOutcome {
    pub session: String,
    pub table: String,
    pub state: WorkerState,
    pub offset: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub sessions: Vec<SessionOutcome>,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| s.state.failure().is_some())
            .count()
    }

    pub fn all_failed(&self) -> bool {
        !self.sessions.is_empty() && self.failed() == self.sessions.len()
    }
}

/// Runs every configured session against real databases until `cancel`
/// fires or every session has failed.
pub async fn run(
    config: PollerConfig,
    store: Option<Arc<dyn OffsetStore>>,
    events: mpsc::Sender<SessionEvent>,
    cancel: CancellationToken,
) -> Result<RunSummary, RuntimeError> {
    let registry = config.registry();
    PollingExecutor::new(config, store, cancel)
        .execute(events, |session| {
            Adapter::from_descriptor(&session.connection, &registry)
        })
        .await
}

struct RunningSession<P: ConnectionProvider + 'static> {
    worker: PollingWorker<P>,
    table: String,
    // Owned here, the worker only holds weak references.
    _sink: Arc<dyn EventSink>,
    _reporter: Arc<dyn CompletionReporter>,
}

pub struct PollingExecutor {
    config: PollerConfig,
    store: Option<Arc<dyn OffsetStore>>,
    cancel: CancellationToken,
}

impl PollingExecutor {
    pub fn new(
        config: PollerConfig,
        store: Option<Arc<dyn OffsetStore>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            store,
            cancel,
        }
    }

    /// Starts one worker per session with a provider built by `provider_for`.
    pub async fn execute<P, F>(
        self,
        events: mpsc::Sender<SessionEvent>,
        provider_for: F,
    ) -> Result<RunSummary, RuntimeError>
    where
        P: ConnectionProvider + 'static,
        F: Fn(&PollingSession) -> Result<P, ConnectorError>,
    {
        let templates: Arc<dyn TemplateSource> = Arc::new(self.config.template_source());
        let (failures_tx, mut failures_rx) = mpsc::unbounded_channel::<String>();

        // Every provider is built before the first worker starts.
        let mut prepared = Vec::new();
        for session in self.config.polling_sessions()? {
            let session = self.resume_offset(session).await?;
            let provider = provider_for(&session).map_err(|source| RuntimeError::Connector {
                session: session.name.clone(),
                source,
            })?;
            prepared.push((session, provider));
        }

        let mut running: Vec<RunningSession<P>> = Vec::new();
        for (session, provider) in prepared {
            let name = session.name.clone();
            let table = session.table.clone();
            let sink: Arc<dyn EventSink> = Arc::new(TaggedSink::new(&name, events.clone()));

            let failures = failures_tx.clone();
            let session_name = name.clone();
            let reporter: Arc<dyn CompletionReporter> = Arc::new(move |failure: PollingFailure| {
                error!(session = %session_name, error = %failure, "Session terminated.");
                let _ = failures.send(session_name.clone());
            });

            let mut worker = PollingWorker::new(
                session,
                provider,
                templates.clone(),
                Arc::downgrade(&sink),
                self.cancel.child_token(),
            );
            if let Some(store) = &self.store {
                worker = worker.with_store(store.clone());
            }
            worker.register_completion_reporter(&reporter);
            worker.start()?;

            running.push(RunningSession {
                worker,
                table,
                _sink: sink,
                _reporter: reporter,
            });
        }
        drop(failures_tx);

        info!(sessions = running.len(), "All polling sessions started.");

        let mut failed = 0usize;
        while failed < running.len() {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Shutdown requested, stopping polling sessions.");
                    break;
                }
                failure = failures_rx.recv() => match failure {
                    Some(session) => {
                        failed += 1;
                        warn!(%session, failed, total = running.len(), "Polling session failed.");
                    }
                    None => break,
                },
            }
        }

        let mut summary = RunSummary::default();
        for mut session in running {
            session.worker.stop();
            let state = session.worker.join().await?;
            summary.sessions.push(SessionOutcome {
                session: session.worker.name().to_string(),
                table: session.table,
                offset: session.worker.current_offset(),
                state,
            });
        }

        info!(
            sessions = summary.sessions.len(),
            failed = summary.failed(),
            "Polling run finished."
        );
        Ok(summary)
    }

    /// Fills in the stored watermark for sessions without an explicit one.
    async fn resume_offset(&self, session: PollingSession) -> Result<PollingSession, RuntimeError> {
        let Some(store) = &self.store else {
            return Ok(session);
        };
        if session.last_offset.is_some() {
            return Ok(session);
        }

        match store.load(&session.name).await? {
            Some(cp)
                if cp.table == session.table && cp.polling_column == session.polling_column =>
            {
                info!(session = %session.name, offset = %cp.offset, "Resuming from stored offset.");
                let offset = cp.offset;
                Ok(session.with_offset(Some(offset)))
            }
            Some(cp) => {
                warn!(
                    session = %session.name,
                    stored_table = %cp.table,
                    stored_column = %cp.polling_column,
                    "Stored offset belongs to a different table or column; seeding instead."
                );
                Ok(session)
            }
            None => Ok(session),
        }
    }
}
