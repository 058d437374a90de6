use crate::{execution::connection::ConnectionDescriptor, pagination::offset::SeedStrategy};
use std::time::Duration;

pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(5);

/// Immutable description of one polled table.
#[derive(Debug, Clone)]
pub struct PollingSession {
    pub name: String,
    pub table: String,
    pub polling_column: String,
    pub polling_interval: Duration,
    pub connection: ConnectionDescriptor,
    /// Watermark to resume from. `None` makes the first poll seed it.
    pub last_offset: Option<String>,
    pub seed: SeedStrategy,
}

impl PollingSession {
    pub fn new(table: &str, polling_column: &str, connection: ConnectionDescriptor) -> Self {
        PollingSession {
            name: table.to_string(),
            table: table.to_string(),
            polling_column: polling_column.to_string(),
            polling_interval: DEFAULT_POLLING_INTERVAL,
            connection,
            last_offset: None,
            seed: SeedStrategy::default(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    pub fn with_interval_secs(self, secs: u64) -> Self {
        self.with_interval(Duration::from_secs(secs))
    }

    pub fn with_offset(mut self, offset: Option<String>) -> Self {
        self.last_offset = offset;
        self
    }

    pub fn with_seed(mut self, seed: SeedStrategy) -> Self {
        self.seed = seed;
        self
    }

    /// Steady-state filter, bound with the current watermark.
    pub fn change_condition(&self) -> String {
        format!("WHERE {} > ?", self.polling_column)
    }
}
