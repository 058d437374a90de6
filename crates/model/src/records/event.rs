use serde::{Serialize, Serializer, ser::SerializeMap};

/// A single column of a detected row, already coerced to its string form.
/// `None` means SQL `NULL`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventField {
    pub name: String,
    pub value: Option<String>,
}

impl EventField {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        EventField {
            name: name.into(),
            value,
        }
    }
}

/// One detected row. Field order follows the result-set metadata order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowEvent {
    pub table: String,
    #[serde(serialize_with = "fields_as_map")]
    pub fields: Vec<EventField>,
}

impl RowEvent {
    pub fn new(table: &str, fields: Vec<EventField>) -> Self {
        RowEvent {
            table: table.to_string(),
            fields,
        }
    }

    /// Case-insensitive column lookup.
    pub fn get(&self, column: &str) -> Option<&EventField> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(column))
    }

    /// Value of `column`, flattening a missing column and SQL `NULL` into `None`.
    pub fn value(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(|f| f.value.as_deref())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Serializes fields as an object in column order rather than a list of pairs.
pub fn fields_as_map<S>(fields: &[EventField], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(fields.len()))?;
    for field in fields {
        map.serialize_entry(&field.name, &field.value)?;
    }
    map.end()
}
