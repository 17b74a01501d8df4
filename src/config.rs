use std::{path::PathBuf, str::FromStr, time::Duration};

use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use strum::{Display, EnumString};

use crate::adapters::image_store::cloudinary::CloudinaryCredentials;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub image_store: ImageStoreSettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    /// Fallback `tracing` filter when `RUST_LOG` is not set
    pub log_filter: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub require_ssl: bool,
}

impl DatabaseSettings {
    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };

        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .ssl_mode(ssl_mode)
    }

    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db().database(&self.database_name)
    }
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImageStoreBackend {
    Local,
    Cloudinary,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ImageStoreSettings {
    pub backend: ImageStoreBackend,
    pub local: LocalImageStoreSettings,
    pub cloudinary: CloudinarySettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct LocalImageStoreSettings {
    pub root: PathBuf,
}

#[derive(Deserialize, Clone)]
pub struct CloudinarySettings {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub timeout_seconds: u64,
}

impl CloudinarySettings {
    pub fn credentials(&self) -> CloudinaryCredentials {
        CloudinaryCredentials {
            cloud_name: self.cloud_name.clone(),
            api_key: self.api_key.clone(),
            api_secret: self.api_secret.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

// Keep the secret out of logs
impl std::fmt::Debug for CloudinarySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinarySettings")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[from] std::io::Error),
    #[error("invalid APP_ENVIRONMENT {0:?}")]
    Environment(String),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

/// Read settings from `config/` under the current directory
///
/// Sources in increasing priority: `base.yaml`, `{APP_ENVIRONMENT}.yaml` and `PARTY__*`
/// environment variables, e.g. `PARTY__DATABASE__HOST`.
pub fn read_config() -> Result<Settings, Error> {
    dotenvy::dotenv().ok();

    let config_directory = std::env::current_dir()?.join("config");
    let environment = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "local".into());
    let environment =
        Environment::from_str(&environment).map_err(|_| Error::Environment(environment))?;

    read_config_from(config_directory, environment)
}

fn read_config_from(
    config_directory: PathBuf,
    environment: Environment,
) -> Result<Settings, Error> {
    let settings = config::Config::builder()
        .add_source(config::File::from(config_directory.join("base.yaml")))
        .add_source(
            config::File::from(config_directory.join(format!("{environment}.yaml")))
                .required(false),
        )
        .add_source(
            config::Environment::with_prefix("PARTY")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize::<Settings>()?)
}

#[derive(Display, Debug, EnumString, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    #[strum(ascii_case_insensitive, serialize = "local")]
    Local,
    #[strum(ascii_case_insensitive, serialize = "production")]
    Production,
}
