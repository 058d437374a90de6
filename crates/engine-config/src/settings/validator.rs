use crate::{error::ConfigError, settings::PollerConfig};
use model::execution::connection::ConnectionDescriptor;
use std::collections::HashSet;
use tracing::{info, warn};

/// Checks a parsed configuration and collects every problem before failing.
pub struct ConfigValidator<'a> {
    config: &'a PollerConfig,
}

impl<'a> ConfigValidator<'a> {
    pub fn new(config: &'a PollerConfig) -> Self {
        Self { config }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.config.sessions.is_empty() {
            errors.push("at least one session is required".to_string());
        }

        self.validate_datasources(&mut errors);
        self.validate_sessions(&mut errors);
        self.validate_templates();

        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }

        info!("Configuration validation completed successfully");
        Ok(())
    }

    fn validate_datasources(&self, errors: &mut Vec<String>) {
        for (name, conn) in &self.config.datasources {
            if conn.url.trim().is_empty() {
                errors.push(format!("datasource '{name}': url is empty"));
            } else if conn.driver().is_none() {
                errors.push(format!(
                    "datasource '{name}': driver is missing and cannot be derived from the url"
                ));
            }
        }
    }

    fn validate_sessions(&self, errors: &mut Vec<String>) {
        let mut names = HashSet::new();

        for session in &self.config.sessions {
            let name = session.name();
            if !names.insert(name.to_string()) {
                errors.push(format!("session '{name}' is defined more than once"));
            }

            if !is_table_name(&session.table) {
                errors.push(format!(
                    "session '{name}': table '{}' is not a valid table name",
                    session.table
                ));
            }

            if !is_identifier(&session.polling_column) {
                errors.push(format!(
                    "session '{name}': polling column '{}' is not a plain identifier",
                    session.polling_column
                ));
            }

            if session.polling_interval_secs == 0 {
                errors.push(format!(
                    "session '{name}': polling_interval_secs must be positive"
                ));
            }

            match session.connection.descriptor() {
                Ok(ConnectionDescriptor::Datasource(reference)) => {
                    if !self.config.datasources.contains_key(&reference.datasource) {
                        errors.push(format!(
                            "session '{name}': datasource '{}' is not defined",
                            reference.datasource
                        ));
                    }
                }
                Ok(ConnectionDescriptor::Direct(conn)) => {
                    if conn.driver().is_none() {
                        errors.push(format!(
                            "session '{name}': driver is missing and cannot be derived from the url"
                        ));
                    }
                }
                Err(e) => errors.push(format!("session '{name}': {e}")),
            }
        }
    }

    fn validate_templates(&self) {
        for (key, template) in &self.config.templates {
            if !key.ends_with(".recordSelectQuery") {
                warn!(%key, "Template key does not end with .recordSelectQuery and will never be used");
            }
            if !template.contains("{{TABLE_NAME}}") {
                warn!(%key, "Template has no {{{{TABLE_NAME}}}} placeholder");
            }
        }
    }
}

/// Letters, digits and underscores, not starting with a digit.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// An identifier, optionally schema-qualified.
pub fn is_table_name(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(is_identifier)
}
