use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Database driver family a direct connection speaks.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Driver {
    #[serde(
        rename = "mysql",
        alias = "mariadb",
        alias = "com.mysql.jdbc.Driver",
        alias = "com.mysql.cj.jdbc.Driver"
    )]
    MySql,

    #[serde(
        rename = "postgres",
        alias = "pg",
        alias = "postgresql",
        alias = "org.postgresql.Driver"
    )]
    Postgres,
}

impl Driver {
    /// Guesses the driver from a connection URL scheme.
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split_once("://").map(|(s, _)| s)?;
        scheme.parse().ok()
    }
}

impl FromStr for Driver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" | "com.mysql.jdbc.driver" | "com.mysql.cj.jdbc.driver" => {
                Ok(Driver::MySql)
            }
            "postgres" | "postgresql" | "pg" | "org.postgresql.driver" => Ok(Driver::Postgres),
            other => Err(format!("unsupported driver '{other}'")),
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Driver::MySql => write!(f, "mysql"),
            Driver::Postgres => write!(f, "postgres"),
        }
    }
}

/// Endpoint, credentials and driver of a directly configured database.
#[derive(Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DirectConnection {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub driver: Option<Driver>,
}

impl DirectConnection {
    pub fn new(url: impl Into<String>, driver: Option<Driver>) -> Self {
        DirectConnection {
            url: url.into(),
            username: None,
            password: None,
            driver,
        }
    }

    /// Explicit driver, falling back to the URL scheme.
    pub fn driver(&self) -> Option<Driver> {
        self.driver.or_else(|| Driver::from_url(&self.url))
    }
}

impl fmt::Debug for DirectConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectConnection")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("driver", &self.driver)
            .finish()
    }
}

/// Reference to a datasource registered outside the session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DatasourceRef {
    pub datasource: String,
}

/// Exactly one connection mode per session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ConnectionDescriptor {
    Direct(DirectConnection),
    Datasource(DatasourceRef),
}

impl ConnectionDescriptor {
    pub fn direct(url: impl Into<String>, driver: Option<Driver>) -> Self {
        ConnectionDescriptor::Direct(DirectConnection::new(url, driver))
    }

    pub fn datasource(name: impl Into<String>) -> Self {
        ConnectionDescriptor::Datasource(DatasourceRef {
            datasource: name.into(),
        })
    }
}
