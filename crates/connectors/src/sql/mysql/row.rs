use model::records::event::{EventField, RowEvent};
use mysql_async::{Row, Value as MySqlValue, consts::ColumnType};

pub(crate) fn to_row_event(row: &Row, table: &str) -> RowEvent {
    let fields = row
        .columns_ref()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let value = row
                .as_ref(idx)
                .and_then(|v| value_to_string(v, column.column_type()));
            EventField::new(column.name_str().into_owned(), value)
        })
        .collect();

    RowEvent::new(table, fields)
}

pub(crate) fn value_to_string(value: &MySqlValue, column_type: ColumnType) -> Option<String> {
    match value {
        MySqlValue::NULL => None,
        MySqlValue::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        MySqlValue::Int(v) => Some(v.to_string()),
        MySqlValue::UInt(v) => Some(v.to_string()),
        MySqlValue::Float(v) => Some(v.to_string()),
        MySqlValue::Double(v) => Some(v.to_string()),
        MySqlValue::Date(year, month, day, hour, minute, second, micros) => {
            if column_type == ColumnType::MYSQL_TYPE_DATE {
                return Some(format!("{year:04}-{month:02}-{day:02}"));
            }
            let mut out = format!(
                "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
            );
            if *micros > 0 {
                out.push_str(&format!(".{micros:06}"));
            }
            Some(out)
        }
        MySqlValue::Time(negative, days, hours, minutes, seconds, micros) => {
            let sign = if *negative { "-" } else { "" };
            let hours = u32::from(*hours) + days * 24;
            let mut out = format!("{sign}{hours:02}:{minutes:02}:{seconds:02}");
            if *micros > 0 {
                out.push_str(&format!(".{micros:06}"));
            }
            Some(out)
        }
    }
}
