//! In-memory table speaking the same template dialect as the real drivers.
//! Understands `SELECT <fields> FROM <table> [WHERE <col> > ?]` where
//! `<fields>` is `*`, a single column, or `MAX(<col>) AS <alias>`.

use crate::{
    error::{ConnectorError, DbError},
    sql::base::provider::{ConnectionProvider, PollConnection},
};
use async_trait::async_trait;
use model::records::event::{EventField, RowEvent};
use std::{
    cmp::Ordering,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

type StoredRow = Vec<(String, Option<String>)>;

#[derive(Default)]
struct TableState {
    product: String,
    rows: Vec<StoredRow>,
    queries: usize,
    fail_query_at: Option<usize>,
    fail_connect: bool,
    connects: usize,
    prepared: Vec<String>,
}

/// Rows shared between the test and every connection handed out for it.
#[derive(Clone, Default)]
pub struct MemoryTable {
    state: Arc<Mutex<TableState>>,
}

impl MemoryTable {
    pub fn new(product: &str) -> Self {
        let table = MemoryTable::default();
        table.lock().product = product.to_string();
        table
    }

    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, row: &[(&str, &str)]) {
        let row = row
            .iter()
            .map(|(k, v)| (k.to_string(), Some(v.to_string())))
            .collect();
        self.lock().rows.push(row);
    }

    pub fn insert_nullable(&self, row: &[(&str, Option<&str>)]) {
        let row = row
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect();
        self.lock().rows.push(row);
    }

    /// Makes the `n`-th executed query (1-based, seed query included) fail.
    pub fn fail_query_at(&self, n: usize) {
        self.lock().fail_query_at = Some(n);
    }

    pub fn fail_connect(&self) {
        self.lock().fail_connect = true;
    }

    pub fn queries(&self) -> usize {
        self.lock().queries
    }

    pub fn connects(&self) -> usize {
        self.lock().connects
    }

    pub fn prepared(&self) -> Vec<String> {
        self.lock().prepared.clone()
    }

    pub fn provider(&self) -> MemoryProvider {
        MemoryProvider {
            table: self.clone(),
        }
    }
}

#[derive(Clone)]
pub struct MemoryProvider {
    table: MemoryTable,
}

#[async_trait]
impl ConnectionProvider for MemoryProvider {
    type Connection = MemoryConnection;

    async fn connect(&self) -> Result<MemoryConnection, ConnectorError> {
        let mut state = self.table.lock();
        state.connects += 1;
        if state.fail_connect {
            return Err(ConnectorError::Unavailable(
                "memory table refuses connections".to_string(),
            ));
        }
        Ok(MemoryConnection {
            table: self.table.clone(),
        })
    }
}

pub struct MemoryConnection {
    table: MemoryTable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    All,
    Column(String),
    Max { column: String, alias: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStatement {
    pub projection: Projection,
    pub greater_than: Option<String>,
}

#[async_trait]
impl PollConnection for MemoryConnection {
    type Statement = MemoryStatement;

    async fn product_name(&mut self) -> Result<String, ConnectorError> {
        Ok(self.table.lock().product.clone())
    }

    async fn prepare(&mut self, sql: &str) -> Result<MemoryStatement, DbError> {
        let statement = parse(sql)?;
        self.table.lock().prepared.push(sql.to_string());
        Ok(statement)
    }

    async fn query(
        &mut self,
        statement: &MemoryStatement,
        params: &[&str],
        table: &str,
    ) -> Result<Vec<RowEvent>, DbError> {
        let mut state = self.table.lock();
        state.queries += 1;
        if state.fail_query_at == Some(state.queries) {
            return Err(DbError::Unknown(format!(
                "injected failure on query {}",
                state.queries
            )));
        }

        let matching: Vec<&StoredRow> = match &statement.greater_than {
            Some(column) => {
                let bound = params
                    .first()
                    .ok_or_else(|| DbError::Unknown("missing parameter".to_string()))?;
                state
                    .rows
                    .iter()
                    .filter(|row| {
                        cell(row, column)
                            .is_some_and(|v| compare(v, bound) == Ordering::Greater)
                    })
                    .collect()
            }
            None => state.rows.iter().collect(),
        };

        let events = match &statement.projection {
            Projection::All => matching
                .into_iter()
                .map(|row| to_event(table, row.iter().cloned()))
                .collect(),
            Projection::Column(column) => matching
                .into_iter()
                .map(|row| {
                    to_event(
                        table,
                        std::iter::once((column.clone(), cell(row, column).map(str::to_string))),
                    )
                })
                .collect(),
            Projection::Max { column, alias } => {
                let max = matching
                    .into_iter()
                    .filter_map(|row| cell(row, column))
                    .max_by(|a, b| compare(a, b))
                    .map(str::to_string);
                vec![to_event(table, std::iter::once((alias.clone(), max)))]
            }
        };

        Ok(events)
    }
}

fn to_event(table: &str, cells: impl Iterator<Item = (String, Option<String>)>) -> RowEvent {
    RowEvent::new(
        table,
        cells.map(|(name, value)| EventField::new(name, value)).collect(),
    )
}

fn cell<'a>(row: &'a StoredRow, column: &str) -> Option<&'a str> {
    row.iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(column))
        .and_then(|(_, value)| value.as_deref())
}

fn compare(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

fn parse(sql: &str) -> Result<MemoryStatement, DbError> {
    let unsupported = || DbError::Unknown(format!("unsupported statement: {sql}"));

    let rest = sql.trim().strip_prefix("SELECT ").ok_or_else(unsupported)?;
    let (fields, rest) = rest.split_once(" FROM ").ok_or_else(unsupported)?;
    let rest = rest.trim();
    let condition = rest.split_once(' ').map(|(_, c)| c.trim()).unwrap_or("");

    let greater_than = match condition.strip_prefix("WHERE ") {
        Some(predicate) => {
            let (column, rhs) = predicate.split_once(" > ").ok_or_else(unsupported)?;
            if rhs.trim() != "?" {
                return Err(unsupported());
            }
            Some(column.trim().to_string())
        }
        None if condition.is_empty() => None,
        None => return Err(unsupported()),
    };

    let fields = fields.trim();
    let projection = if fields == "*" {
        Projection::All
    } else if let Some(inner) = fields.strip_prefix("MAX(") {
        let (column, alias) = inner.split_once(')').ok_or_else(unsupported)?;
        let alias = alias.trim().strip_prefix("AS ").unwrap_or(column).trim();
        Projection::Max {
            column: column.trim().to_string(),
            alias: alias.to_string(),
        }
    } else {
        Projection::Column(fields.to_string())
    };

    Ok(MemoryStatement {
        projection,
        greater_than,
    })
}
