//! Wiring of the adapters selected by [`Settings`] into a [`DomainLogic`].

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::{
    adapters::{
        database::postgres::PostgresDatabase,
        image_store::{cloudinary::CloudinaryImageStore, local::LocalImageStore},
    },
    commands::DomainLogic,
    config::{ImageStoreBackend, ImageStoreSettings, Settings},
    ports::image_store::ImageStorePort,
};

/// Commands backed by PostgreSQL and the configured image store
pub type PartyService = DomainLogic<
    PostgresDatabase,
    PostgresDatabase,
    dyn ImageStorePort,
    PostgresDatabase,
    PostgresDatabase,
>;

/// Install the global `fmt` subscriber
///
/// `RUST_LOG` takes precedence over `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    if let Err(err) = fmt().with_env_filter(filter).try_init() {
        warn!(error = %err, "tracing init failed");
    }
}

pub fn image_store(settings: &ImageStoreSettings) -> anyhow::Result<Arc<dyn ImageStorePort>> {
    let store: Arc<dyn ImageStorePort> = match settings.backend {
        ImageStoreBackend::Local => {
            info!(root = %settings.local.root.display(), "using local image store");
            Arc::new(LocalImageStore::new(settings.local.root.clone()))
        }
        ImageStoreBackend::Cloudinary => {
            let cloudinary = &settings.cloudinary;
            if cloudinary.cloud_name.is_empty() || cloudinary.api_secret.is_empty() {
                anyhow::bail!("cloudinary backend selected without credentials");
            }
            info!(cloud_name = %cloudinary.cloud_name, "using cloudinary image store");
            let store = CloudinaryImageStore::new(cloudinary.credentials(), cloudinary.timeout())
                .context("failed to build the cloudinary client")?;
            Arc::new(store)
        }
    };

    Ok(store)
}

/// Connect to the database, apply migrations and assemble the commands
pub async fn build(settings: &Settings) -> anyhow::Result<PartyService> {
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(settings.database.with_db())
        .await
        .with_context(|| {
            format!(
                "failed to connect to database {} on {}:{}",
                settings.database.database_name, settings.database.host, settings.database.port
            )
        })?;
    let database = Arc::new(PostgresDatabase::new(pool));
    database
        .migrate()
        .await
        .context("failed to apply database migrations")?;
    info!("database ready");

    let images = image_store(&settings.image_store)?;

    Ok(DomainLogic::new(
        database.clone(),
        database.clone(),
        images,
        database.clone(),
        database,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CloudinarySettings, LocalImageStoreSettings};
    use speculoos::prelude::*;

    fn settings(backend: ImageStoreBackend, cloud_name: &str) -> ImageStoreSettings {
        ImageStoreSettings {
            backend,
            local: LocalImageStoreSettings {
                root: "file_storage/parties".into(),
            },
            cloudinary: CloudinarySettings {
                cloud_name: cloud_name.to_string(),
                api_key: "123".to_string(),
                api_secret: "secret".to_string(),
                timeout_seconds: 5,
            },
        }
    }

    #[tokio::test]
    async fn test_image_store_local() -> anyhow::Result<()> {
        let store = image_store(&settings(ImageStoreBackend::Local, ""))?;

        // Local references are plain file names
        assert_that!(store.exists("missing.jpg").await?).is_false();

        Ok(())
    }

    #[test]
    fn test_image_store_cloudinary() {
        let configured = image_store(&settings(ImageStoreBackend::Cloudinary, "demo"));
        let missing_credentials = image_store(&settings(ImageStoreBackend::Cloudinary, ""));

        assert_that!(configured.is_ok()).is_true();
        assert_that!(missing_credentials.is_err()).is_true();
    }
}
