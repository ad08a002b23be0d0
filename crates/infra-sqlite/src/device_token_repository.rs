// SQLite DeviceTokenRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use medtrack_core::domain::{DeviceToken, TokenRegistration, UserId};
use medtrack_core::error::Result;
use medtrack_core::port::DeviceTokenRepository;
use sqlx::SqlitePool;

pub struct SqliteDeviceTokenRepository {
    pool: SqlitePool,
}

impl SqliteDeviceTokenRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceTokenRepository for SqliteDeviceTokenRepository {
    async fn register(
        &self,
        user_id: UserId,
        token: &str,
        now_millis: i64,
    ) -> Result<TokenRegistration> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let owner: Option<i64> =
            sqlx::query_scalar("SELECT user_id FROM device_tokens WHERE token = ?")
                .bind(token)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

        let outcome = match owner {
            Some(owner) if owner == user_id => TokenRegistration::AlreadyRegistered,
            Some(_) => {
                sqlx::query("UPDATE device_tokens SET user_id = ?, created_at = ? WHERE token = ?")
                    .bind(user_id)
                    .bind(now_millis)
                    .bind(token)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_sqlx_error)?;
                TokenRegistration::Reassigned
            }
            None => {
                sqlx::query(
                    "INSERT INTO device_tokens (user_id, token, created_at) VALUES (?, ?, ?)",
                )
                .bind(user_id)
                .bind(token)
                .bind(now_millis)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
                TokenRegistration::Created
            }
        };

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(outcome)
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<DeviceToken>> {
        let rows: Vec<(i64, i64, String, i64)> = sqlx::query_as(
            "SELECT id, user_id, token, created_at FROM device_tokens WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(id, user_id, token, created_at)| DeviceToken {
                id,
                user_id,
                token,
                created_at,
            })
            .collect())
    }

    async fn remove_for_user(&self, user_id: UserId, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM device_tokens WHERE user_id = ? AND token = ?")
            .bind(user_id)
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM device_tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}
