use crate::error::CliError;
use engine_runtime::execution::{executor::RunSummary, sink::SessionEvent};
use model::pagination::checkpoint::OffsetCheckpoint;
use std::io::Write;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Writes each event as one JSON line on stdout until every sender is gone.
pub async fn print_events(mut events: mpsc::Receiver<SessionEvent>) -> Result<u64, CliError> {
    let mut printed = 0u64;
    while let Some(event) = events.recv().await {
        let line = event_line(&event)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}").map_err(|e| CliError::Unexpected(e.to_string()))?;
        stdout.flush().map_err(|e| CliError::Unexpected(e.to_string()))?;
        printed += 1;
    }
    Ok(printed)
}

pub fn event_line(event: &SessionEvent) -> Result<String, CliError> {
    Ok(serde_json::to_string(event)?)
}

pub fn log_summary(summary: &RunSummary) {
    for outcome in &summary.sessions {
        match outcome.state.failure() {
            Some(err) => warn!(
                session = %outcome.session,
                table = %outcome.table,
                offset = outcome.offset.as_deref().unwrap_or("-"),
                error = %err,
                "Session failed."
            ),
            None => info!(
                session = %outcome.session,
                table = %outcome.table,
                offset = outcome.offset.as_deref().unwrap_or("-"),
                "Session stopped."
            ),
        }
    }
}

pub fn print_checkpoint(checkpoint: &OffsetCheckpoint, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(checkpoint)?);
    } else {
        println!("Session:        {}", checkpoint.session);
        println!("Table:          {}", checkpoint.table);
        println!("Polling column: {}", checkpoint.polling_column);
        println!("Offset:         {}", checkpoint.offset);
        println!("Updated at:     {}", checkpoint.updated_at.to_rfc3339());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::records::event::{EventField, RowEvent};

    #[test]
    fn event_line_is_flat_json() {
        let event = SessionEvent {
            session: "orders".to_string(),
            table: "orders".to_string(),
            event: RowEvent::new(
                "orders",
                vec![
                    EventField::new("id", Some("3".to_string())),
                    EventField::new("payload", Some("c".to_string())),
                    EventField::new("note", None),
                ],
            ),
        };
        assert_eq!(
            event_line(&event).unwrap(),
            r#"{"session":"orders","table":"orders","event":{"id":"3","payload":"c","note":null}}"#
        );
    }
}
