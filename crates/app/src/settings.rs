//! Handles settings for the application. Configuration is read from an
//! optional `settings.toml` and from `RAWSTOCK__*` environment variables,
//! e.g. `RAWSTOCK__SERVER__PORT=8080`.
//!
//! ```toml
//! [app]
//! level = "info"
//!
//! [server]
//! bind = "0.0.0.0"
//! port = 3000
//! database = { sqlite = "./rawstock.db" }
//! store_timeout_ms = 5000
//! delete_roles = ["manager", "admin"]
//!
//! [catalog.skus]
//! flour = "Flour 00"
//!
//! [catalog.branches]
//! b1 = "Central"
//! ```
use config::{Config, ConfigError, Environment, File};
use engine::CatalogMap;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
    pub store_timeout_ms: u64,
    pub delete_roles: Vec<String>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            bind: None,
            port: 3000,
            database: Database::Sqlite("./rawstock.db".to_string()),
            store_timeout_ms: 5000,
            delete_roles: vec!["manager".to_string(), "admin".to_string()],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub server: Server,
    pub catalog: CatalogMap,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("settings").required(false))
            .add_source(
                Environment::with_prefix("RAWSTOCK")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.delete_roles")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}
