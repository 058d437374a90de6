use crate::{
    cursor::OffsetHandle,
    error::{PollingError, PollingFailure, SinkError, StateError},
    gate::PauseGate,
    poll::PollLoop,
    sink::{ChannelSink, EventSink},
    state::{OffsetStore, sled_store::SledOffsetStore},
};
use async_trait::async_trait;
use connectors::{
    query::{error::TemplateError, source::ConfiguredTemplates},
    sql::memory::{MemoryProvider, MemoryTable},
};
use model::{
    execution::{connection::ConnectionDescriptor, session::PollingSession},
    pagination::{checkpoint::OffsetCheckpoint, offset::SeedStrategy},
    records::event::{EventField, RowEvent},
};
use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc, task::JoinHandle, time::timeout};
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

const WAIT: Duration = Duration::from_secs(2);

fn session(offset: Option<&str>) -> PollingSession {
    PollingSession::new("events", "id", ConnectionDescriptor::datasource("memory"))
        .with_interval(Duration::from_millis(10))
        .with_offset(offset.map(str::to_string))
}

fn event(id: &str, payload: &str) -> RowEvent {
    RowEvent::new(
        "events",
        vec![
            EventField::new("id", Some(id.to_string())),
            EventField::new("payload", Some(payload.to_string())),
        ],
    )
}

struct Running {
    handle: JoinHandle<Result<(), PollingFailure>>,
    offsets: OffsetHandle,
    gate: PauseGate,
    events: mpsc::Receiver<RowEvent>,
    cancel: CancellationToken,
    _sink: Arc<dyn EventSink>,
}

impl Running {
    async fn next_event(&mut self) -> RowEvent {
        timeout(WAIT, self.events.recv())
            .await
            .expect("event in time")
            .expect("channel open")
    }

    async fn wait_offset(&mut self, expected: &str) {
        let reached = timeout(WAIT, self.offsets.wait_until(|o| o == Some(expected))).await;
        assert_eq!(reached.expect("offset in time").as_deref(), Some(expected));
    }

    async fn finish(self) -> Result<(), PollingFailure> {
        timeout(WAIT, self.handle)
            .await
            .expect("loop ends in time")
            .expect("loop task joins")
    }
}

fn build(
    table: &MemoryTable,
    session: PollingSession,
    gate: PauseGate,
) -> (PollLoop<MemoryProvider>, mpsc::Receiver<RowEvent>, Arc<dyn EventSink>, CancellationToken) {
    let (sink, events) = ChannelSink::new(16);
    let sink: Arc<dyn EventSink> = Arc::new(sink);
    let cancel = CancellationToken::new();
    let poll = PollLoop::new(
        session,
        table.provider(),
        Arc::new(ConfiguredTemplates::default()),
        Arc::downgrade(&sink),
        cancel.clone(),
    )
    .with_gate(gate);
    (poll, events, sink, cancel)
}

fn start(table: &MemoryTable, session: PollingSession) -> Running {
    start_with_gate(table, session, PauseGate::new())
}

fn start_with_gate(table: &MemoryTable, session: PollingSession, gate: PauseGate) -> Running {
    let (poll, events, sink, cancel) = build(table, session, gate.clone());
    let offsets = poll.offsets();
    Running {
        handle: tokio::spawn(poll.run()),
        offsets,
        gate,
        events,
        cancel,
        _sink: sink,
    }
}

async fn wait_for_queries(table: &MemoryTable, n: usize) {
    timeout(WAIT, async {
        while table.queries() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("queries in time");
}

#[tokio::test]
async fn empty_table_seeds_sentinel() {
    let table = MemoryTable::new("MySQL");
    let mut running = start(&table, session(None));

    running.wait_offset("-1").await;

    // Zero is greater than the sentinel, so it is picked up.
    table.insert(&[("id", "0"), ("payload", "zero")]);
    assert_eq!(running.next_event().await, event("0", "zero"));
    running.wait_offset("0").await;

    running.cancel.cancel();
    assert!(running.finish().await.is_ok());
}

#[tokio::test]
async fn seed_skips_existing_rows_and_delivers_new_one() {
    let table = MemoryTable::new("MySQL");
    table.insert(&[("id", "1"), ("payload", "a")]);
    table.insert(&[("id", "2"), ("payload", "b")]);

    let mut running = start(&table, session(None));
    running.wait_offset("2").await;

    table.insert(&[("id", "3"), ("payload", "c")]);
    assert_eq!(running.next_event().await, event("3", "c"));
    running.wait_offset("3").await;
    assert_eq!(running.offsets.current().as_deref(), Some("3"));

    // Rows present at seed time are never delivered.
    wait_for_queries(&table, table.queries() + 1).await;
    assert!(running.events.try_recv().is_err());

    running.cancel.cancel();
    running.finish().await.unwrap();
}

#[tokio::test]
async fn last_row_seed_follows_scan_order() {
    let table = MemoryTable::new("MySQL");
    for id in ["5", "9", "7"] {
        table.insert(&[("id", id)]);
    }
    let mut running = start(&table, session(None));
    running.wait_offset("7").await;
    running.cancel.cancel();
    running.finish().await.unwrap();
}

#[tokio::test]
async fn max_aggregate_seed_ignores_scan_order() {
    let table = MemoryTable::new("MySQL");
    for id in ["5", "9", "7"] {
        table.insert(&[("id", id)]);
    }
    let mut running = start(&table, session(None).with_seed(SeedStrategy::MaxAggregate));
    running.wait_offset("9").await;
    running.cancel.cancel();
    running.finish().await.unwrap();

    assert_eq!(table.prepared()[0], "SELECT MAX(id) AS id FROM events");
}

#[tokio::test]
async fn max_aggregate_on_empty_table_seeds_sentinel() {
    let table = MemoryTable::new("PostgreSQL");
    let mut running = start(&table, session(None).with_seed(SeedStrategy::MaxAggregate));
    running.wait_offset("-1").await;
    running.cancel.cancel();
    running.finish().await.unwrap();
}

#[tokio::test]
async fn trailing_null_does_not_erase_seed() {
    let table = MemoryTable::new("MySQL");
    table.insert(&[("id", "4")]);
    table.insert_nullable(&[("id", None)]);
    let mut running = start(&table, session(None));
    running.wait_offset("4").await;
    running.cancel.cancel();
    running.finish().await.unwrap();
}

#[tokio::test]
async fn delivers_in_order_with_monotonic_offset() {
    let table = MemoryTable::new("MySQL");
    for id in 1..=5 {
        let id = id.to_string();
        table.insert(&[("id", id.as_str()), ("payload", "x")]);
    }

    let mut running = start(&table, session(Some("0")));
    let mut seen = Vec::new();
    let mut last_offset = 0i64;
    for _ in 0..5 {
        let ev = running.next_event().await;
        seen.push(ev.value("id").unwrap().to_string());

        let offset: i64 = running.offsets.current().unwrap().parse().unwrap();
        assert!(offset >= last_offset);
        last_offset = offset;
    }
    assert_eq!(seen, vec!["1", "2", "3", "4", "5"]);

    table.insert(&[("id", "6"), ("payload", "y")]);
    table.insert(&[("id", "7"), ("payload", "z")]);
    assert_eq!(running.next_event().await.value("id"), Some("6"));
    assert_eq!(running.next_event().await.value("id"), Some("7"));
    running.wait_offset("7").await;

    running.cancel.cancel();
    running.finish().await.unwrap();
}

#[tokio::test]
async fn given_offset_skips_seeding() {
    let table = MemoryTable::new("MySQL");
    table.insert(&[("id", "1"), ("payload", "a")]);
    table.insert(&[("id", "2"), ("payload", "b")]);

    let mut running = start(&table, session(Some("1")));
    assert_eq!(running.next_event().await, event("2", "b"));
    running.cancel.cancel();
    running.finish().await.unwrap();

    assert_eq!(table.prepared(), vec!["SELECT * FROM events WHERE id > ?"]);
}

#[tokio::test]
async fn statement_is_prepared_once() {
    let table = MemoryTable::new("MySQL");
    let running = start(&table, session(None));
    wait_for_queries(&table, 5).await;
    running.cancel.cancel();
    running.finish().await.unwrap();

    assert_eq!(
        table.prepared(),
        vec!["SELECT id FROM events", "SELECT * FROM events WHERE id > ?"]
    );
    assert_eq!(table.connects(), 1);
}

#[tokio::test]
async fn paused_gate_withholds_delivery_but_not_fetch() {
    let table = MemoryTable::new("MySQL");
    for (id, payload) in [("1", "a"), ("2", "b"), ("3", "c")] {
        table.insert(&[("id", id), ("payload", payload)]);
    }

    let gate = PauseGate::new();
    gate.pause();
    let mut running = start_with_gate(&table, session(Some("0")), gate);

    // The batch was fetched and the first row advanced the offset.
    running.wait_offset("1").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(running.events.try_recv().is_err());
    assert_eq!(table.queries(), 1);
    assert_eq!(running.offsets.current().as_deref(), Some("1"));

    running.gate.resume();
    assert_eq!(running.next_event().await, event("1", "a"));
    assert_eq!(running.next_event().await, event("2", "b"));
    assert_eq!(running.next_event().await, event("3", "c"));

    table.insert(&[("id", "4"), ("payload", "d")]);
    assert_eq!(running.next_event().await, event("4", "d"));

    running.cancel.cancel();
    running.finish().await.unwrap();
}

#[tokio::test]
async fn cancel_while_held_at_gate() {
    let table = MemoryTable::new("MySQL");
    table.insert(&[("id", "1"), ("payload", "a")]);

    let gate = PauseGate::new();
    gate.pause();
    let mut running = start_with_gate(&table, session(Some("0")), gate);
    running.wait_offset("1").await;

    running.cancel.cancel();
    let Running { handle, mut events, .. } = running;
    assert!(timeout(WAIT, handle).await.unwrap().unwrap().is_ok());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn cancel_interrupts_idle_sleep() {
    let table = MemoryTable::new("MySQL");
    let running = start(&table, session(Some("0")).with_interval_secs(3600));
    wait_for_queries(&table, 1).await;

    running.cancel.cancel();
    assert!(running.finish().await.is_ok());
    assert_eq!(table.queries(), 1);
}

#[tokio::test]
async fn execute_failure_is_fatal_and_stops_polling() {
    let table = MemoryTable::new("MySQL");
    // Query 1 seeds, query 2 is the first poll, query 3 fails.
    table.fail_query_at(3);

    let running = start(&table, session(None));
    let err = running.finish().await.unwrap_err();

    assert_eq!(err.table, "events");
    assert!(matches!(err.cause, PollingError::QueryExecution(_)));
    assert!(
        err.to_string()
            .starts_with("Error in polling for changes on events:")
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(table.queries(), 3);
}

#[tokio::test]
async fn connection_failure_is_fatal() {
    let table = MemoryTable::new("MySQL");
    table.fail_connect();

    let running = start(&table, session(None));
    let err = running.finish().await.unwrap_err();
    assert!(matches!(err.cause, PollingError::Connection(_)));
    assert_eq!(table.queries(), 0);
}

#[traced_test]
#[tokio::test]
async fn unsupported_database_names_override_key() {
    let table = MemoryTable::new("Informix");
    let (poll, _events, _sink, _cancel) = build(&table, session(None), PauseGate::new());

    let err = poll.run().await.unwrap_err();
    match &err.cause {
        PollingError::UnsupportedDatabase(TemplateError::UnsupportedDatabase { product, key }) => {
            assert_eq!(product, "Informix");
            assert_eq!(key, "Informix.recordSelectQuery");
        }
        other => panic!("unexpected cause: {other:?}"),
    }
    assert!(err.to_string().contains("Informix.recordSelectQuery"));
    assert!(table.prepared().is_empty());
    assert!(logs_contain("Polling session failed."));
}

#[tokio::test]
async fn dropped_sink_is_fatal() {
    let table = MemoryTable::new("MySQL");
    table.insert(&[("id", "1"), ("payload", "a")]);

    let (poll, _events, sink, _cancel) = build(&table, session(Some("0")), PauseGate::new());
    drop(sink);

    let err = poll.run().await.unwrap_err();
    assert!(matches!(err.cause, PollingError::Sink(SinkError::Dropped)));
}

#[tokio::test]
async fn checkpoint_follows_delivered_batches() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SledOffsetStore::open(dir.path()).unwrap());
    let table = MemoryTable::new("MySQL");
    table.insert(&[("id", "1"), ("payload", "a")]);
    table.insert(&[("id", "2"), ("payload", "b")]);

    let (poll, mut events, _sink, cancel) = build(&table, session(Some("0")), PauseGate::new());
    let poll = poll.with_store(store.clone());
    let handle = tokio::spawn(poll.run());

    for _ in 0..2 {
        timeout(WAIT, events.recv()).await.unwrap().unwrap();
    }
    wait_for_queries(&table, 2).await;
    cancel.cancel();
    timeout(WAIT, handle).await.unwrap().unwrap().unwrap();

    let cp = store.load("events").await.unwrap().unwrap();
    assert_eq!(cp.offset, "2");
    assert_eq!(cp.table, "events");
}

#[tokio::test]
async fn seed_is_checkpointed() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SledOffsetStore::open(dir.path()).unwrap());
    let table = MemoryTable::new("MySQL");
    table.insert(&[("id", "8")]);

    let (poll, _events, _sink, cancel) = build(&table, session(None), PauseGate::new());
    let poll = poll.with_store(store.clone());
    let handle = tokio::spawn(poll.run());
    wait_for_queries(&table, 2).await;
    cancel.cancel();
    timeout(WAIT, handle).await.unwrap().unwrap().unwrap();

    assert_eq!(store.load("events").await.unwrap().unwrap().offset, "8");
}

struct BrokenStore;

#[async_trait]
impl OffsetStore for BrokenStore {
    async fn save(&self, _checkpoint: &OffsetCheckpoint) -> Result<(), StateError> {
        Err(StateError::Sled(sled::Error::Unsupported(
            "read-only".to_string(),
        )))
    }

    async fn load(&self, _session: &str) -> Result<Option<OffsetCheckpoint>, StateError> {
        Ok(None)
    }

    async fn list(&self) -> Result<Vec<OffsetCheckpoint>, StateError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn checkpoint_failure_is_fatal() {
    let table = MemoryTable::new("MySQL");
    let (poll, _events, _sink, _cancel) = build(&table, session(None), PauseGate::new());
    let err = poll.with_store(Arc::new(BrokenStore)).run().await.unwrap_err();
    assert!(matches!(err.cause, PollingError::Checkpoint(_)));
}

#[traced_test]
#[tokio::test]
async fn logs_seed_and_batches() {
    let table = MemoryTable::new("MySQL");
    table.insert(&[("id", "1"), ("payload", "a")]);

    let (poll, mut events, _sink, cancel) = build(&table, session(None), PauseGate::new());
    let driver = async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        table.insert(&[("id", "2"), ("payload", "b")]);
        timeout(WAIT, events.recv()).await.unwrap().unwrap();
        cancel.cancel();
    };
    let (result, ()) = tokio::join!(poll.run(), driver);
    assert!(result.is_ok());

    assert!(logs_contain("Starting polling session."));
    assert!(logs_contain("Seeded offset."));
    assert!(logs_contain("Delivered batch."));
    assert!(logs_contain("Polling session cancelled."));
}
