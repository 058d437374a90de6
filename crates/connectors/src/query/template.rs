use crate::query::{
    error::TemplateError,
    source::{TemplateSource, override_key},
};
use std::sync::Arc;
use tracing::{debug, info};

pub const PLACE_HOLDER_TABLE_NAME: &str = "{{TABLE_NAME}}";
pub const PLACE_HOLDER_FIELD_LIST: &str = "{{FIELD_LIST}}";
pub const PLACE_HOLDER_CONDITION: &str = "{{CONDITION}}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateOrigin {
    Override,
    Bundled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTemplate {
    pub product: String,
    pub origin: TemplateOrigin,
    pub structure: String,
}

/// Turns a database product name into the select statement skeleton of one
/// session. The first successful resolution is kept for the session's
/// lifetime, even if a later connection reports a different product.
pub struct QueryTemplateResolver {
    table: String,
    source: Arc<dyn TemplateSource>,
    resolved: Option<ResolvedTemplate>,
}

impl QueryTemplateResolver {
    pub fn new(table: &str, source: Arc<dyn TemplateSource>) -> Self {
        Self {
            table: table.to_string(),
            source,
            resolved: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    /// Resolves the template for `product`: the `<product>.recordSelectQuery`
    /// override first, then the bundled default. No-op once resolved.
    pub fn resolve(&mut self, product: &str) -> Result<&ResolvedTemplate, TemplateError> {
        if self.resolved.is_none() {
            let resolved = self.lookup(product)?;
            info!(
                table = %self.table,
                product = %resolved.product,
                origin = ?resolved.origin,
                "Resolved select query template."
            );
            self.resolved = Some(resolved);
        } else {
            debug!(product, "Template already resolved for this session.");
        }

        self.resolved.as_ref().ok_or(TemplateError::Unresolved)
    }

    /// Substitutes table, field list and condition into the resolved template.
    pub fn build_query(&self, field_list: &str, condition: &str) -> Result<String, TemplateError> {
        let template = self.resolved.as_ref().ok_or(TemplateError::Unresolved)?;
        Ok(render(&template.structure, &self.table, field_list, condition))
    }

    fn lookup(&self, product: &str) -> Result<ResolvedTemplate, TemplateError> {
        let key = override_key(product);

        if let Some(structure) = non_empty(self.source.lookup_override(&key)) {
            return Ok(ResolvedTemplate {
                product: product.to_string(),
                origin: TemplateOrigin::Override,
                structure,
            });
        }

        if let Some(structure) = non_empty(self.source.lookup_default(product)) {
            return Ok(ResolvedTemplate {
                product: product.to_string(),
                origin: TemplateOrigin::Bundled,
                structure,
            });
        }

        Err(TemplateError::UnsupportedDatabase {
            product: product.to_string(),
            key,
        })
    }
}

fn non_empty(template: Option<String>) -> Option<String> {
    template.filter(|t| !t.trim().is_empty())
}

/// Placeholder substitution. An empty condition leaves trailing whitespace,
/// which is trimmed.
pub fn render(structure: &str, table: &str, field_list: &str, condition: &str) -> String {
    structure
        .replace(PLACE_HOLDER_TABLE_NAME, table)
        .replace(PLACE_HOLDER_FIELD_LIST, field_list)
        .replace(PLACE_HOLDER_CONDITION, condition)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::source::ConfiguredTemplates;

    const TEMPLATE: &str = "SELECT {{FIELD_LIST}} FROM {{TABLE_NAME}} {{CONDITION}}";

    fn resolver(source: ConfiguredTemplates) -> QueryTemplateResolver {
        QueryTemplateResolver::new("orders", Arc::new(source))
    }

    #[test]
    fn substitutes_all_placeholders() {
        assert_eq!(
            render(TEMPLATE, "orders", "*", "WHERE id > ?"),
            "SELECT * FROM orders WHERE id > ?"
        );
    }

    #[test]
    fn seed_query_has_no_trailing_space() {
        assert_eq!(render(TEMPLATE, "orders", "id", ""), "SELECT id FROM orders");
    }

    #[test]
    fn override_wins_over_bundled() {
        let source = ConfiguredTemplates::default().with_override(
            "MySQL.recordSelectQuery",
            "SELECT {{FIELD_LIST}} FROM {{TABLE_NAME}} {{CONDITION}} LIMIT 1000",
        );
        let mut r = resolver(source);
        let resolved = r.resolve("MySQL").unwrap();
        assert_eq!(resolved.origin, TemplateOrigin::Override);
        assert_eq!(
            r.build_query("*", "WHERE id > ?").unwrap(),
            "SELECT * FROM orders WHERE id > ? LIMIT 1000"
        );
    }

    #[test]
    fn blank_override_falls_back_to_bundled() {
        let source = ConfiguredTemplates::default().with_override("PostgreSQL.recordSelectQuery", "  ");
        let mut r = resolver(source);
        assert_eq!(r.resolve("PostgreSQL").unwrap().origin, TemplateOrigin::Bundled);
    }

    #[test]
    fn unsupported_database_names_product_and_key() {
        let mut r = resolver(ConfiguredTemplates::default());
        let err = r.resolve("Informix").unwrap_err();
        assert_eq!(
            err,
            TemplateError::UnsupportedDatabase {
                product: "Informix".to_string(),
                key: "Informix.recordSelectQuery".to_string(),
            }
        );
        let msg = err.to_string();
        assert!(msg.contains("Informix"));
        assert!(msg.contains("Informix.recordSelectQuery"));
        assert!(!r.is_resolved());
    }

    #[test]
    fn resolution_is_memoized_per_session() {
        let mut r = resolver(ConfiguredTemplates::default());
        r.resolve("MySQL").unwrap();
        // A different product afterwards does not re-resolve.
        let resolved = r.resolve("Informix").unwrap();
        assert_eq!(resolved.product, "MySQL");
    }

    #[test]
    fn build_before_resolve_fails() {
        let r = resolver(ConfiguredTemplates::default());
        assert_eq!(r.build_query("*", ""), Err(TemplateError::Unresolved));
    }

    #[test]
    fn sessions_keep_independent_memos() {
        let source: Arc<dyn TemplateSource> = Arc::new(
            ConfiguredTemplates::default()
                .with_override("H2.recordSelectQuery", "SELECT {{FIELD_LIST}} FROM PUBLIC.{{TABLE_NAME}} {{CONDITION}}"),
        );
        let mut a = QueryTemplateResolver::new("a", source.clone());
        let mut b = QueryTemplateResolver::new("b", source);
        a.resolve("H2").unwrap();
        b.resolve("MySQL").unwrap();
        assert_eq!(a.build_query("*", "").unwrap(), "SELECT * FROM PUBLIC.a");
        assert_eq!(b.build_query("*", "").unwrap(), "SELECT * FROM b");
    }
}
