//! Server-side token state: current refresh tokens, live sessions, the
//! revocation list and one-shot OAuth states. Every entry carries a TTL.
//!
//! `AppState` holds an `Arc<dyn SessionStore>`; production uses Redis.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::debug;

use crate::config::RedisKeys;
use crate::errors::AppError;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Replaces the member's current refresh token.
    async fn save_refresh_token(
        &self,
        member_id: i64,
        token: &str,
        ttl: Duration,
    ) -> Result<(), AppError>;

    async fn refresh_token(&self, member_id: i64) -> Result<Option<String>, AppError>;

    async fn remove_refresh_token(&self, member_id: i64) -> Result<(), AppError>;

    async fn open_session(
        &self,
        member_id: i64,
        refresh_token: &str,
        ttl: Duration,
    ) -> Result<(), AppError>;

    async fn has_session(&self, member_id: i64) -> Result<bool, AppError>;

    async fn close_session(&self, member_id: i64) -> Result<(), AppError>;

    /// Blacklists a token id until the token would have expired anyway.
    async fn revoke(&self, jti: &str, ttl: Duration) -> Result<(), AppError>;

    async fn is_revoked(&self, jti: &str) -> Result<bool, AppError>;

    async fn put_oauth_state(&self, state: &str, ttl: Duration) -> Result<(), AppError>;

    /// Returns true exactly once per stored state.
    async fn take_oauth_state(&self, state: &str) -> Result<bool, AppError>;
}

/// Redis-backed store. Keys are `<prefix><member_id>` or `<prefix><jti>`.
///
/// Holds one multiplexed connection; every operation works on a clone of it.
pub struct RedisSessionStore {
    conn: MultiplexedConnection,
    keys: RedisKeys,
}

impl RedisSessionStore {
    pub async fn connect(client: &redis::Client, keys: RedisKeys) -> Result<Self, redis::RedisError> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn, keys })
    }

    fn conn(&self) -> MultiplexedConnection {
        self.conn.clone()
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError> {
        let mut conn = self.conn();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, AppError> {
        let mut conn = self.conn();
        Ok(conn.exists(key).await?)
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let mut conn = self.conn();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}

/// Redis rejects `EX 0`; anything shorter than a second rounds up.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn save_refresh_token(
        &self,
        member_id: i64,
        token: &str,
        ttl: Duration,
    ) -> Result<(), AppError> {
        let key = format!("{}{member_id}", self.keys.refresh_token);
        self.set_with_ttl(&key, token, ttl).await
    }

    async fn refresh_token(&self, member_id: i64) -> Result<Option<String>, AppError> {
        let key = format!("{}{member_id}", self.keys.refresh_token);
        let mut conn = self.conn();
        Ok(conn.get(key).await?)
    }

    async fn remove_refresh_token(&self, member_id: i64) -> Result<(), AppError> {
        self.delete(&format!("{}{member_id}", self.keys.refresh_token))
            .await
    }

    async fn open_session(
        &self,
        member_id: i64,
        refresh_token: &str,
        ttl: Duration,
    ) -> Result<(), AppError> {
        let key = format!("{}{member_id}", self.keys.user_session);
        let mut conn = self.conn();
        redis::pipe()
            .atomic()
            .del(&key)
            .ignore()
            .hset(&key, "refresh_token", refresh_token)
            .ignore()
            .hset(&key, "last_activity", Utc::now().timestamp_millis())
            .ignore()
            .cmd("EXPIRE")
            .arg(&key)
            .arg(ttl_secs(ttl))
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        debug!(member_id, "Session opened");
        Ok(())
    }

    async fn has_session(&self, member_id: i64) -> Result<bool, AppError> {
        self.exists(&format!("{}{member_id}", self.keys.user_session))
            .await
    }

    async fn close_session(&self, member_id: i64) -> Result<(), AppError> {
        self.delete(&format!("{}{member_id}", self.keys.user_session))
            .await
    }

    async fn revoke(&self, jti: &str, ttl: Duration) -> Result<(), AppError> {
        let key = format!("{}{jti}", self.keys.blacklist);
        self.set_with_ttl(&key, "blacklisted", ttl).await
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, AppError> {
        self.exists(&format!("{}{jti}", self.keys.blacklist)).await
    }

    async fn put_oauth_state(&self, state: &str, ttl: Duration) -> Result<(), AppError> {
        let key = format!("{}{state}", self.keys.oauth_state);
        self.set_with_ttl(&key, "1", ttl).await
    }

    async fn take_oauth_state(&self, state: &str) -> Result<bool, AppError> {
        let key = format!("{}{state}", self.keys.oauth_state);
        let mut conn = self.conn();
        let value: Option<String> = redis::cmd("GETDEL")
            .arg(&key)
            .query_async(&mut conn)
            .await?;
        Ok(value.is_some())
    }
}

#[cfg(test)]
pub(crate) use memory::MemorySessionStore;
