use crate::{LiveSession, TEST_PG_URL, pg_exec, session};
use model::execution::connection::Driver;

const EVENTS_DDL: &str = r#"CREATE TABLE poll_events (
  id SERIAL PRIMARY KEY,
  payload VARCHAR(32),
  created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);"#;

async fn reset_events_table() {
    pg_exec(&["DROP TABLE IF EXISTS poll_events;", EVENTS_DDL]).await;
}

// Scenario: integer polling column; the text watermark must be bound as int4.
// Expected Outcome: new rows are delivered after the seeded offset.
#[tokio::test]
#[ignore = "requires the local Postgres test database"]
async fn polls_integer_column() {
    reset_events_table().await;
    pg_exec(&["INSERT INTO poll_events (payload) VALUES ('a'), ('b');"]).await;

    let mut live = LiveSession::start(
        session(Driver::Postgres, TEST_PG_URL, "poll_events", "id"),
        None,
    );
    live.seeded_at("2").await;

    pg_exec(&["INSERT INTO poll_events (payload) VALUES ('c');"]).await;

    let event = live.next_event().await;
    assert_eq!(event.value("id"), Some("3"));
    assert_eq!(event.value("payload"), Some("c"));
    assert_eq!(
        event.column_names().collect::<Vec<_>>(),
        vec!["id", "payload", "created_at"]
    );

    live.stop().await;
}

// Scenario: timestamp polling column on an empty table.
// Expected Outcome: the sentinel maps to the earliest date, so the first row arrives.
#[tokio::test]
#[ignore = "requires the local Postgres test database"]
async fn polls_timestamp_column_from_empty_table() {
    reset_events_table().await;

    let mut live = LiveSession::start(
        session(Driver::Postgres, TEST_PG_URL, "poll_events", "created_at"),
        None,
    );
    live.seeded_at("-1").await;

    pg_exec(&["INSERT INTO poll_events (payload) VALUES ('first');"]).await;

    let event = live.next_event().await;
    assert_eq!(event.value("payload"), Some("first"));
    assert_ne!(live.worker.current_offset().as_deref(), Some("-1"));

    live.stop().await;
}
