//! Store configuration and connection bootstrap.
//!
//! The pool is constructed here and injected into whatever owns the
//! ledger; nothing in the core holds global connection state.

use anyhow::Context;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Connection settings for the Postgres-backed store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
}

impl StoreConfig {
    /// Read configuration from the environment.
    ///
    /// `DATABASE_URL` is required; `VAULTBOOK_MAX_CONNECTIONS` defaults
    /// to 5.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let max_connections = std::env::var("VAULTBOOK_MAX_CONNECTIONS")
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .context("VAULTBOOK_MAX_CONNECTIONS must be a positive integer")?
            .unwrap_or(5);

        Ok(Self {
            database_url,
            max_connections,
        })
    }

    /// Open the connection pool. Teardown is dropping the pool (owned by
    /// the outer service, not the ledger core).
    pub async fn connect(&self) -> anyhow::Result<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.database_url)
            .await
            .context("failed to connect to Postgres")?;

        tracing::info!(max_connections = self.max_connections, "connected to Postgres");
        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_database_url_is_an_error() {
        unsafe { std::env::remove_var("DATABASE_URL") };
        assert!(StoreConfig::from_env().is_err());
    }
}
