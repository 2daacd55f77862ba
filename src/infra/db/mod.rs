//! Postgres-backed repository implementations.

mod email_templates;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;
use std::time::Duration;

use sqlx::{
    migrate::MigrateError,
    postgres::{PgPool, PgPoolOptions},
};
use tracing::info;

use crate::config::DatabaseSettings;

use super::error::InfraError;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect using the `[database]` settings. A missing URL is a configuration error.
    pub async fn from_settings(settings: &DatabaseSettings) -> Result<Self, InfraError> {
        let url = settings.url.as_deref().ok_or_else(|| {
            InfraError::configuration(
                "database url is not configured (provide --database-url or set SKPROD_DATABASE__URL)",
            )
        })?;
        let pool = Self::connect(url, settings.max_connections.get()).await?;
        info!(
            max_connections = settings.max_connections.get(),
            "Connected to Postgres"
        );
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await
    }

    pub async fn run_migrations(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./migrations").run(self.pool()).await
    }
}
