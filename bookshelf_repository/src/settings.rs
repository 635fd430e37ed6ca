use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::books_repository::PostgresBooksRepositoryConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/bookshelf.toml";
pub const CONFIG_PATH_ENV: &str = "BOOKSHELF_CONFIG";
const ENV_PREFIX: &str = "BOOKSHELF";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_hostname")]
    pub hostname: String,
    #[serde(default = "DatabaseSettings::default_credential")]
    pub username: String,
    #[serde(default = "DatabaseSettings::default_credential")]
    pub password: String,
    #[serde(default)]
    pub dbname: Option<String>,
}

impl DatabaseSettings {
    fn default_hostname() -> String {
        "127.0.0.1".to_string()
    }

    fn default_credential() -> String {
        "postgres".to_string()
    }

    pub fn repository_config(&self) -> PostgresBooksRepositoryConfig {
        PostgresBooksRepositoryConfig {
            hostname: self.hostname.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            dbname: self.dbname.clone(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            hostname: Self::default_hostname(),
            username: Self::default_credential(),
            password: Self::default_credential(),
            dbname: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub use_in_memory_db: bool,
}

impl Settings {
    /// Loads the optional TOML file at `path`, then overrides it with
    /// `BOOKSHELF__`-prefixed environment variables, e.g. `BOOKSHELF__DATABASE__HOSTNAME`
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

#[cfg(test)]
mod settings_tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let settings = Settings::load(Path::new("does/not/exist.toml")).expect("Failed to load");
        assert_eq!(settings.database, DatabaseSettings::default());
        assert_eq!(settings.server.port, 8080);
    }

    #[test]
    fn values_are_read_from_file() {
        let path = std::env::temp_dir().join(format!("bookshelf-settings-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).expect("Failed to create config file");
        writeln!(
            file,
            "use_in_memory_db = true\n\n[database]\nhostname = \"db.internal\"\ndbname = \"bookshelf\"\n\n[server]\nport = 9000"
        )
        .expect("Failed to write config file");

        let settings = Settings::load(&path).expect("Failed to load");
        std::fs::remove_file(&path).ok();

        assert!(settings.use_in_memory_db);
        assert_eq!(settings.database.hostname, "db.internal");
        assert_eq!(settings.database.username, "postgres");
        assert_eq!(settings.database.dbname.as_deref(), Some("bookshelf"));
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.host, "0.0.0.0");
    }
}
