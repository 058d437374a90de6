use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use model::records::event::{EventField, RowEvent};
use rust_decimal::Decimal;
use tokio_postgres::{Row, types::FromSql};
use tracing::warn;
use uuid::Uuid;

pub(crate) fn to_row_event(row: &Row, table: &str) -> RowEvent {
    let fields = row
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            EventField::new(column.name(), column_text(row, idx, column.type_().name()))
        })
        .collect();

    RowEvent::new(table, fields)
}

fn column_text(row: &Row, idx: usize, type_name: &str) -> Option<String> {
    match type_name {
        "bool" => text::<bool>(row, idx),
        "int2" => text::<i16>(row, idx),
        "int4" => text::<i32>(row, idx),
        "int8" => text::<i64>(row, idx),
        "oid" => text::<u32>(row, idx),
        "float4" => text::<f32>(row, idx),
        "float8" => text::<f64>(row, idx),
        "numeric" => text::<Decimal>(row, idx),
        "date" => text::<NaiveDate>(row, idx),
        "time" => text::<NaiveTime>(row, idx),
        "timestamp" => get::<NaiveDateTime>(row, idx)
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        "timestamptz" => get::<DateTime<Utc>>(row, idx).map(|ts| ts.to_rfc3339()),
        "uuid" => text::<Uuid>(row, idx),
        "json" | "jsonb" => text::<serde_json::Value>(row, idx),
        "bytea" => get::<Vec<u8>>(row, idx).map(|bytes| hex(&bytes)),
        other => {
            let value = row.try_get::<_, Option<String>>(idx);
            match value {
                Ok(v) => v,
                Err(err) => {
                    warn!(column_type = other, %err, "Unsupported column type, emitting null");
                    None
                }
            }
        }
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> Option<T> {
    match row.try_get::<_, Option<T>>(idx) {
        Ok(value) => value,
        Err(err) => {
            warn!(column = idx, %err, "Failed to read column");
            None
        }
    }
}

fn text<'a, T: FromSql<'a> + ToString>(row: &'a Row, idx: usize) -> Option<String> {
    get::<T>(row, idx).map(|v| v.to_string())
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytea_renders_like_postgres_hex_output() {
        assert_eq!(hex(&[0xde, 0xad, 0x01]), "\\xdead01");
        assert_eq!(hex(&[]), "\\x");
    }
}
