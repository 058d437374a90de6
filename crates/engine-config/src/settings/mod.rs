use crate::{env::EnvContext, error::ConfigError, settings::validator::ConfigValidator};
use connectors::{query::source::ConfiguredTemplates, registry::StaticRegistry};
use model::{
    execution::{
        connection::{ConnectionDescriptor, DirectConnection, Driver},
        session::{DEFAULT_POLLING_INTERVAL, PollingSession},
    },
    pagination::offset::SeedStrategy,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path, path::PathBuf};
use tracing::info;

pub mod validator;

/// Top-level configuration file.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct PollerConfig {
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    /// `<product>.recordSelectQuery` overrides.
    #[serde(default)]
    pub templates: HashMap<String, String>,

    #[serde(default)]
    pub datasources: HashMap<String, DirectConnection>,

    pub sessions: Vec<SessionConfig>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Defaults to the table name.
    #[serde(default)]
    pub name: Option<String>,
    pub table: String,
    pub polling_column: String,
    #[serde(default = "default_interval_secs")]
    pub polling_interval_secs: u64,
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub seed: SeedStrategy,
    #[serde(default)]
    pub last_offset: Option<String>,
}

fn default_interval_secs() -> u64 {
    DEFAULT_POLLING_INTERVAL.as_secs()
}

impl SessionConfig {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.table)
    }
}

/// Connection block as written in the file. Exactly one of `url` or
/// `datasource` must be present.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub driver: Option<Driver>,
    #[serde(default)]
    pub datasource: Option<String>,
}

impl ConnectionConfig {
    pub fn descriptor(&self) -> Result<ConnectionDescriptor, String> {
        match (&self.url, &self.datasource) {
            (Some(url), None) => Ok(ConnectionDescriptor::Direct(DirectConnection {
                url: url.clone(),
                username: self.username.clone(),
                password: self.password.clone(),
                driver: self.driver,
            })),
            (None, Some(name)) => {
                if self.username.is_some() || self.password.is_some() || self.driver.is_some() {
                    return Err(format!(
                        "datasource '{name}' cannot be combined with url, username, password or driver"
                    ));
                }
                Ok(ConnectionDescriptor::datasource(name.as_str()))
            }
            (Some(_), Some(_)) => Err("both url and datasource are set".to_string()),
            (None, None) => Err("one of url or datasource is required".to_string()),
        }
    }
}

impl PollerConfig {
    /// Reads, expands and validates a configuration file.
    pub fn load<P: AsRef<Path>>(path: P, env: &EnvContext) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::parse(&content, env)?;
        info!(
            path = %path.display(),
            sessions = config.sessions.len(),
            "Loaded configuration."
        );
        Ok(config)
    }

    pub fn parse(content: &str, env: &EnvContext) -> Result<Self, ConfigError> {
        let mut config: PollerConfig = serde_json::from_str(content)?;
        config.expand_env(env)?;
        ConfigValidator::new(&config).validate()?;
        Ok(config)
    }

    fn expand_env(&mut self, env: &EnvContext) -> Result<(), ConfigError> {
        for conn in self.datasources.values_mut() {
            conn.url = env.expand(&conn.url)?;
            expand_opt(&mut conn.username, env)?;
            expand_opt(&mut conn.password, env)?;
        }
        for session in &mut self.sessions {
            let conn = &mut session.connection;
            expand_opt(&mut conn.url, env)?;
            expand_opt(&mut conn.username, env)?;
            expand_opt(&mut conn.password, env)?;
        }
        Ok(())
    }

    /// Sessions in file order. Call on a validated config.
    pub fn polling_sessions(&self) -> Result<Vec<PollingSession>, ConfigError> {
        self.sessions
            .iter()
            .map(|s| {
                let connection = s
                    .connection
                    .descriptor()
                    .map_err(|e| ConfigError::Validation(vec![format!("session '{}': {e}", s.name())]))?;
                Ok(PollingSession::new(&s.table, &s.polling_column, connection)
                    .with_name(s.name())
                    .with_interval_secs(s.polling_interval_secs)
                    .with_offset(s.last_offset.clone())
                    .with_seed(s.seed))
            })
            .collect()
    }

    pub fn registry(&self) -> StaticRegistry {
        StaticRegistry::new(self.datasources.clone())
    }

    pub fn template_source(&self) -> ConfiguredTemplates {
        ConfiguredTemplates::new(self.templates.clone())
    }
}

fn expand_opt(value: &mut Option<String>, env: &EnvContext) -> Result<(), ConfigError> {
    if let Some(v) = value {
        *v = env.expand(v)?;
    }
    Ok(())
}
