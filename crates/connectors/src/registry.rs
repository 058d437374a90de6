use model::execution::connection::DirectConnection;
use std::collections::HashMap;

/// Lookup of datasources that sessions reference by name.
pub trait DatasourceRegistry: Send + Sync {
    fn lookup(&self, name: &str) -> Option<DirectConnection>;
}

/// Registry built once from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    datasources: HashMap<String, DirectConnection>,
}

impl StaticRegistry {
    pub fn new(datasources: HashMap<String, DirectConnection>) -> Self {
        StaticRegistry { datasources }
    }

    pub fn with_datasource(mut self, name: &str, conn: DirectConnection) -> Self {
        self.datasources.insert(name.to_string(), conn);
        self
    }
}

impl DatasourceRegistry for StaticRegistry {
    fn lookup(&self, name: &str) -> Option<DirectConnection> {
        self.datasources.get(name).cloned()
    }
}
