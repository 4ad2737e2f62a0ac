//! Pooled Redis connections used for publishing.

use deadpool_redis::{Config, Pool, PoolConfig, Runtime};
use presence_common::RedisConfig;

use crate::transport::{TransportError, TransportResult};

/// deadpool-backed Redis connections
#[derive(Clone)]
pub struct RedisPool {
    pool: Pool,
}

impl std::fmt::Debug for RedisPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.pool.status();
        f.debug_struct("RedisPool")
            .field("size", &status.size)
            .field("max_size", &status.max_size)
            .finish()
    }
}

impl RedisPool {
    /// Build the pool; connections are opened lazily
    pub fn connect(config: &RedisConfig) -> TransportResult<Self> {
        let mut pool_config = Config::from_url(config.url.as_str());
        pool_config.pool = Some(PoolConfig::new(config.max_connections as usize));

        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| TransportError::CreatePool(e.to_string()))?;

        tracing::info!(
            host = %without_credentials(&config.url),
            max_connections = config.max_connections,
            "Redis pool created"
        );

        Ok(Self { pool })
    }

    pub async fn get(&self) -> TransportResult<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }

    /// Round-trip a PING so a bad URL or unreachable server shows up early
    pub async fn ping(&self) -> TransportResult<()> {
        let mut conn = self.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Strip `user:password@` from a Redis URL for logging
fn without_credentials(url: &str) -> &str {
    url.rsplit_once('@').map_or(url, |(_, host)| host)
}
