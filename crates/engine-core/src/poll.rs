use crate::{
    cursor::{OffsetCursor, OffsetHandle},
    error::{PollingError, PollingFailure, SinkError},
    gate::PauseGate,
    sink::EventSink,
    state::OffsetStore,
};
use connectors::{
    query::{source::TemplateSource, template::QueryTemplateResolver},
    sql::base::provider::{ConnectionProvider, PollConnection},
};
use model::{
    execution::session::PollingSession,
    pagination::{
        checkpoint::OffsetCheckpoint,
        offset::{EMPTY_TABLE_OFFSET, SeedStrategy},
    },
    records::event::RowEvent,
};
use std::{
    future::Future,
    sync::{Arc, Weak},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of a step that may be interrupted by cancellation.
enum Step<T> {
    Done(T),
    Cancelled,
}

async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Step<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Step::Cancelled,
        out = fut => Step::Done(out),
    }
}

/// Unwraps a cancellable step, leaving the enclosing function with `Ok(())`
/// on cancellation and propagating errors.
macro_rules! step {
    ($cancel:expr, $fut:expr) => {
        match until_cancelled($cancel, $fut).await {
            Step::Done(out) => out?,
            Step::Cancelled => return Ok(()),
        }
    };
}

/// The scheduling core of one session: connect, resolve the template, seed
/// the watermark, then fetch and deliver rows until cancelled or failed.
///
/// The loop owns the connection and the prepared statement for its whole
/// lifetime. The sink is held weakly; an owner that drops it ends the session.
pub struct PollLoop<P: ConnectionProvider> {
    session: PollingSession,
    provider: P,
    resolver: QueryTemplateResolver,
    cursor: OffsetCursor,
    gate: PauseGate,
    sink: Weak<dyn EventSink>,
    store: Option<Arc<dyn OffsetStore>>,
    cancel: CancellationToken,
}

impl<P: ConnectionProvider> PollLoop<P> {
    pub fn new(
        session: PollingSession,
        provider: P,
        templates: Arc<dyn TemplateSource>,
        sink: Weak<dyn EventSink>,
        cancel: CancellationToken,
    ) -> Self {
        let resolver = QueryTemplateResolver::new(&session.table, templates);
        let cursor = OffsetCursor::new(session.last_offset.clone());
        PollLoop {
            session,
            provider,
            resolver,
            cursor,
            gate: PauseGate::new(),
            sink,
            store: None,
            cancel,
        }
    }

    pub fn with_gate(mut self, gate: PauseGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn OffsetStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn offsets(&self) -> OffsetHandle {
        self.cursor.handle()
    }

    pub fn gate(&self) -> PauseGate {
        self.gate.clone()
    }

    pub fn session(&self) -> &PollingSession {
        &self.session
    }

    /// Runs until cancelled (`Ok`) or until the first fatal error.
    pub async fn run(mut self) -> Result<(), PollingFailure> {
        match self.poll().await {
            Ok(()) => {
                info!(session = %self.session.name, "Polling session cancelled.");
                Ok(())
            }
            Err(cause) => {
                let failure = PollingFailure::new(&self.session.table, cause);
                error!(session = %self.session.name, error = %failure, "Polling session failed.");
                Err(failure)
            }
        }
    }

    async fn poll(&mut self) -> Result<(), PollingError> {
        info!(
            session = %self.session.name,
            table = %self.session.table,
            column = %self.session.polling_column,
            interval_secs = self.session.polling_interval.as_secs_f64(),
            seed = %self.session.seed,
            "Starting polling session."
        );

        let cancel = self.cancel.clone();
        let mut conn = step!(&cancel, self.provider.connect());
        let product = step!(&cancel, conn.product_name());
        self.resolver.resolve(&product)?;

        if !self.cursor.is_seeded() {
            let offset = step!(&cancel, self.seed(&mut conn));
            info!(table = %self.session.table, %offset, "Seeded offset.");
            self.cursor.seed(offset);
            self.checkpoint().await?;
        }

        let sql = self
            .resolver
            .build_query("*", &self.session.change_condition())?;
        let statement = step!(&cancel, conn.prepare(&sql));

        let mut batch_no = 0u64;
        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            let offset = self
                .cursor
                .current()
                .unwrap_or_else(|| EMPTY_TABLE_OFFSET.to_string());
            let rows = step!(
                &cancel,
                conn.query(&statement, &[offset.as_str()], &self.session.table)
            );

            if rows.is_empty() {
                debug!(table = %self.session.table, %offset, "No new rows.");
            } else {
                batch_no += 1;
                let count = rows.len();
                for row in rows {
                    if !self.deliver(row).await? {
                        return Ok(());
                    }
                }
                info!(
                    table = %self.session.table,
                    batch_no,
                    rows = count,
                    offset = self.cursor.current().as_deref().unwrap_or_default(),
                    "Delivered batch."
                );
                self.checkpoint().await?;
            }

            step!(
                &cancel,
                async {
                    tokio::time::sleep(self.session.polling_interval).await;
                    Ok::<_, PollingError>(())
                }
            );
        }
    }

    /// Reads the initial watermark. The sentinel stands in for an empty table
    /// so the first steady-state fetch picks up every row.
    async fn seed(&self, conn: &mut P::Connection) -> Result<String, PollingError> {
        let column = &self.session.polling_column;
        let field_list = match self.session.seed {
            SeedStrategy::LastRow => column.clone(),
            SeedStrategy::MaxAggregate => format!("MAX({column}) AS {column}"),
        };

        let sql = self.resolver.build_query(&field_list, "")?;
        let statement = conn.prepare(&sql).await?;
        let rows = conn.query(&statement, &[], &self.session.table).await?;

        let offset = rows
            .iter()
            .filter_map(|row| row.value(column))
            .last()
            .map(str::to_string)
            .unwrap_or_else(|| EMPTY_TABLE_OFFSET.to_string());
        Ok(offset)
    }

    /// Advances the watermark to `row`, waits at the gate, then hands the
    /// row to the sink. Returns `false` if cancelled on the way.
    async fn deliver(&self, row: RowEvent) -> Result<bool, PollingError> {
        match row.value(&self.session.polling_column) {
            Some(value) => self.cursor.advance(value),
            None => warn!(
                table = %self.session.table,
                column = %self.session.polling_column,
                "Polling column is NULL; offset unchanged."
            ),
        }

        if !self.gate.pass(&self.cancel).await {
            return Ok(false);
        }

        let sink = self.sink.upgrade().ok_or(SinkError::Dropped)?;
        match until_cancelled(&self.cancel, sink.on_event(row)).await {
            Step::Done(result) => result?,
            Step::Cancelled => return Ok(false),
        }
        Ok(true)
    }

    async fn checkpoint(&self) -> Result<(), PollingError> {
        let (Some(store), Some(offset)) = (&self.store, self.cursor.current()) else {
            return Ok(());
        };

        let checkpoint = OffsetCheckpoint::new(
            &self.session.name,
            &self.session.table,
            &self.session.polling_column,
            &offset,
        );
        if let Err(err) = store.save(&checkpoint).await {
            error!(session = %self.session.name, %offset, error = %err, "Failed to save offset checkpoint.");
            return Err(err.into());
        }
        Ok(())
    }
}
