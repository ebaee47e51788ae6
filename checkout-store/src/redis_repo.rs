use async_trait::async_trait;
use checkout_core::repository::{pending_reference_key, PendingReferenceStore, RepositoryError};
use redis::AsyncCommands;
use tracing::debug;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
    pending_ttl_seconds: u64,
}

impl RedisClient {
    pub async fn new(connection_string: &str, pending_ttl_seconds: u64) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client, pending_ttl_seconds })
    }
}

#[async_trait]
impl PendingReferenceStore for RedisClient {
    async fn put(&self, customer_session: &str, session_id: &str) -> Result<(), RepositoryError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = pending_reference_key(customer_session);
        // Plain SET overwrites, so a retried checkout replaces the earlier reference
        conn.set_ex::<_, _, ()>(&key, session_id, self.pending_ttl_seconds).await?;
        debug!("Pending reference set: {} -> {}", key, session_id);
        Ok(())
    }

    async fn take(&self, customer_session: &str) -> Result<Option<String>, RepositoryError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = pending_reference_key(customer_session);
        let session_id: Option<String> = redis::cmd("GETDEL")
            .arg(&key)
            .query_async(&mut conn)
            .await?;
        Ok(session_id)
    }
}
