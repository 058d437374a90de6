use crate::{LiveSession, TEST_MYSQL_URL, mysql_exec, session};
use connectors::{
    adapter::Adapter,
    sql::base::provider::{ConnectionProvider, PollConnection},
};
use engine_core::state::{OffsetStore, sled_store::SledOffsetStore};
use model::{
    execution::connection::{DirectConnection, Driver},
    pagination::offset::SeedStrategy,
};
use std::sync::Arc;

const EVENTS_DDL: &str = r#"CREATE TABLE poll_events (
  id INT PRIMARY KEY AUTO_INCREMENT,
  payload VARCHAR(32) NULL
)"#;

async fn reset_events_table() {
    mysql_exec(&["DROP TABLE IF EXISTS poll_events", EVENTS_DDL]).await;
}

#[tokio::test]
#[ignore = "requires the local MySQL test database"]
async fn reports_mysql_product_name() {
    let conn = DirectConnection::new(TEST_MYSQL_URL, Some(Driver::MySql));
    let adapter = Adapter::from_direct(&conn).expect("adapter");
    let mut conn = adapter.connect().await.expect("connect");
    let product = conn.product_name().await.expect("product name");
    assert!(product == "MySQL" || product == "MariaDB", "{product}");
}

// Scenario: rows exist before the session starts.
// Expected Outcome: only rows inserted afterwards are delivered, in order.
#[tokio::test]
#[ignore = "requires the local MySQL test database"]
async fn delivers_only_rows_inserted_after_start() {
    reset_events_table().await;
    mysql_exec(&["INSERT INTO poll_events (payload) VALUES ('a'), ('b')"]).await;

    let mut live = LiveSession::start(
        session(Driver::MySql, TEST_MYSQL_URL, "poll_events", "id"),
        None,
    );
    live.seeded_at("2").await;

    mysql_exec(&["INSERT INTO poll_events (payload) VALUES ('c'), ('d')"]).await;

    let first = live.next_event().await;
    assert_eq!(first.value("id"), Some("3"));
    assert_eq!(first.value("payload"), Some("c"));
    let second = live.next_event().await;
    assert_eq!(second.value("id"), Some("4"));
    assert_eq!(live.worker.current_offset().as_deref(), Some("4"));

    live.stop().await;
}

// Scenario: empty table, first row arrives while polling.
// Expected Outcome: the sentinel offset lets the first row through.
#[tokio::test]
#[ignore = "requires the local MySQL test database"]
async fn empty_table_delivers_first_row() {
    reset_events_table().await;

    let mut live = LiveSession::start(
        session(Driver::MySql, TEST_MYSQL_URL, "poll_events", "id"),
        None,
    );
    live.seeded_at("-1").await;

    mysql_exec(&["INSERT INTO poll_events (payload) VALUES (NULL)"]).await;

    let event = live.next_event().await;
    assert_eq!(event.value("id"), Some("1"));
    assert_eq!(event.get("payload").map(|f| f.value.is_none()), Some(true));

    live.stop().await;
}

// Scenario: max-aggregate seeding with checkpoints written to a sled store.
// Expected Outcome: the stored offset follows the delivered rows.
#[tokio::test]
#[ignore = "requires the local MySQL test database"]
async fn checkpoints_delivered_offsets() {
    reset_events_table().await;
    mysql_exec(&["INSERT INTO poll_events (payload) VALUES ('a'), ('b'), ('c')"]).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let store: Arc<dyn OffsetStore> =
        Arc::new(SledOffsetStore::open(dir.path()).expect("open store"));

    let mut live = LiveSession::start(
        session(Driver::MySql, TEST_MYSQL_URL, "poll_events", "id")
            .with_seed(SeedStrategy::MaxAggregate),
        Some(store.clone()),
    );
    live.seeded_at("3").await;

    mysql_exec(&["INSERT INTO poll_events (payload) VALUES ('d')"]).await;
    let event = live.next_event().await;
    assert_eq!(event.value("payload"), Some("d"));
    live.stop().await;

    let checkpoint = store
        .load("poll_events")
        .await
        .expect("load")
        .expect("checkpoint");
    assert_eq!(checkpoint.offset, "4");
    assert_eq!(checkpoint.polling_column, "id");
}
