use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Environment variable that overrides `database.password`.
pub const PASSWORD_ENV: &str = "BWTAG_DATABASE_PASSWORD";

pub const DEFAULT_MYSQL_PORT: u16 = 3306;
pub const DEFAULT_TOLERANCE: f64 = 0.1;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    #[default]
    Mysql,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub driver: Driver,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub database: String,
    /// Library file, only used with the `sqlite` driver.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default = "default_tolerance")]
    pub grayscale_tolerance: f64,
    #[serde(default)]
    pub image_base_url: String,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

fn default_port() -> u16 {
    DEFAULT_MYSQL_PORT
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

fn default_http_timeout() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

impl Config {
    /// Read, parse and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let mut config = Self::parse(&text)?;
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            config.database.password = password;
        }
        Ok(config)
    }

    /// Parse and validate configuration text. Does not consult the environment.
    pub fn parse(text: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(text).map_err(|e| Error::Config(format!("failed to parse: {e}")))?;
        // Zero means unset
        if config.database.port == 0 {
            config.database.port = DEFAULT_MYSQL_PORT;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let db = &self.database;
        match db.driver {
            Driver::Mysql => {
                require(&db.host, "database.host")?;
                require(&db.username, "database.username")?;
                require(&db.database, "database.database")?;
            }
            Driver::Sqlite => {
                if db.path.as_deref().map_or(true, |p| p.as_os_str().is_empty()) {
                    return Err(Error::Config(
                        "database.path is required for the sqlite driver".into(),
                    ));
                }
            }
        }
        require(&self.image_base_url, "image_base_url")?;
        if !(0.0..=1.0).contains(&self.grayscale_tolerance) {
            return Err(Error::Config(format!(
                "grayscale_tolerance must be between 0 and 1, got {}",
                self.grayscale_tolerance
            )));
        }
        if self.http_timeout_secs == 0 {
            return Err(Error::Config("http_timeout_secs must be non-zero".into()));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn require(value: &str, key: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Config(format!("{key} is required")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        image_base_url = "https://photos.example.com/uploads/"

        [database]
        host = "db.local"
        username = "lychee"
        database = "lychee"
    "#;

    #[test]
    fn test_defaults_applied() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.database.driver, Driver::Mysql);
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.database.password, "");
        assert_eq!(config.grayscale_tolerance, 0.1);
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_explicit_values() {
        let config = Config::parse(
            r#"
            grayscale_tolerance = 0.25
            image_base_url = "http://localhost/"
            http_timeout_secs = 5

            [database]
            host = "127.0.0.1"
            port = 3307
            username = "u"
            password = "secret"
            database = "photos"
            "#,
        )
        .unwrap();
        assert_eq!(config.database.port, 3307);
        assert_eq!(config.database.password, "secret");
        assert_eq!(config.grayscale_tolerance, 0.25);
        assert_eq!(config.http_timeout_secs, 5);
    }

    #[test]
    fn test_zero_port_means_default() {
        let text = MINIMAL.replace("database = \"lychee\"", "database = \"lychee\"\n        port = 0");
        let config = Config::parse(&text).unwrap();
        assert_eq!(config.database.port, DEFAULT_MYSQL_PORT);
    }

    #[test]
    fn test_missing_host_rejected() {
        let err = Config::parse(
            r#"
            image_base_url = "http://x/"
            [database]
            username = "u"
            database = "d"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("database.host")));
    }

    #[test]
    fn test_missing_base_url_rejected() {
        let err = Config::parse(
            r#"
            [database]
            host = "h"
            username = "u"
            database = "d"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("image_base_url")));
    }

    #[test]
    fn test_tolerance_out_of_range_rejected() {
        let text = MINIMAL.replace(
            "image_base_url",
            "grayscale_tolerance = 1.5\n        image_base_url",
        );
        let err = Config::parse(&text).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("grayscale_tolerance")));
    }

    #[test]
    fn test_sqlite_driver_needs_path_only() {
        let config = Config::parse(
            r#"
            image_base_url = "http://x/"
            [database]
            driver = "sqlite"
            path = "/var/lib/lychee/database.sqlite"
            "#,
        )
        .unwrap();
        assert_eq!(config.database.driver, Driver::Sqlite);

        let err = Config::parse(
            r#"
            image_base_url = "http://x/"
            [database]
            driver = "sqlite"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("database.path")));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = Config::parse("database = [").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Config::load(&tmp.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("failed to read")));
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, MINIMAL).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.database.host, "db.local");
    }
}
