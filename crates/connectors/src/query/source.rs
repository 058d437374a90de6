use lazy_static::lazy_static;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::error;

/// Suffix of the configuration key that overrides a product's template.
pub const RECORD_SELECT_QUERY: &str = "recordSelectQuery";

const BUNDLED_QUERY_CONFIG: &str = include_str!("query-config.json");

#[derive(Debug, Deserialize)]
struct QueryConfiguration {
    databases: Vec<QueryConfigurationEntry>,
}

#[derive(Debug, Deserialize)]
struct QueryConfigurationEntry {
    database_name: String,
    record_select_query: String,
}

lazy_static! {
    // Parsed once per process; the table is immutable after that.
    static ref BUNDLED_TEMPLATES: Vec<QueryConfigurationEntry> =
        match serde_json::from_str::<QueryConfiguration>(BUNDLED_QUERY_CONFIG) {
            Ok(config) => config.databases,
            Err(err) => {
                error!(%err, "Bundled query configuration is unreadable");
                Vec::new()
            }
        };
}

/// Configuration key an operator sets to override `product`'s template.
pub fn override_key(product: &str) -> String {
    format!("{product}.{RECORD_SELECT_QUERY}")
}

/// Bundled template for `product`, matched case-insensitively.
pub fn bundled_template(product: &str) -> Option<String> {
    BUNDLED_TEMPLATES
        .iter()
        .find(|entry| entry.database_name.eq_ignore_ascii_case(product))
        .map(|entry| entry.record_select_query.clone())
}

/// Where query templates come from.
pub trait TemplateSource: Send + Sync {
    /// Runtime-configured template under `key` (`<product>.recordSelectQuery`).
    fn lookup_override(&self, key: &str) -> Option<String>;

    /// Template shipped with the crate for `product`.
    fn lookup_default(&self, product: &str) -> Option<String>;
}

/// Operator overrides layered over the bundled templates.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredTemplates {
    overrides: HashMap<String, String>,
}

impl ConfiguredTemplates {
    pub fn new(overrides: HashMap<String, String>) -> Self {
        Self { overrides }
    }

    pub fn with_override(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), template.into());
        self
    }
}

impl TemplateSource for ConfiguredTemplates {
    fn lookup_override(&self, key: &str) -> Option<String> {
        self.overrides.get(key).cloned()
    }

    fn lookup_default(&self, product: &str) -> Option<String> {
        bundled_template(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_lookup_ignores_case() {
        let mysql = bundled_template("mysql").unwrap();
        assert!(mysql.contains("{{FIELD_LIST}}"));
        assert!(bundled_template("POSTGRESQL").is_some());
        assert!(bundled_template("Microsoft SQL Server").is_some());
        assert!(bundled_template("Informix").is_none());
    }

    #[test]
    fn override_key_format() {
        assert_eq!(override_key("MySQL"), "MySQL.recordSelectQuery");
    }

    #[test]
    fn configured_overrides_are_keyed_exactly() {
        let source = ConfiguredTemplates::default()
            .with_override("MySQL.recordSelectQuery", "SELECT {{FIELD_LIST}} FROM x");
        assert!(source.lookup_override("MySQL.recordSelectQuery").is_some());
        assert!(source.lookup_override("mysql.recordSelectQuery").is_none());
        assert!(source.lookup_default("MySQL").is_some());
    }
}
