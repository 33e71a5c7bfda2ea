//! Provider account persistence / 云账号持久化
//!
//! Account rows are the backing store of the config cache: the first row
//! with `is_active = 1` of each table is the active provider configuration.

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::{
    AliyunAccount, AliyunAccountPayload, AliyunAccountUpdate, CloudflareAccount,
    CloudflareAccountPayload, CloudflareAccountUpdate,
};

/// Create account tables / 创建账号表
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cloudflare_accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_client TEXT NOT NULL,
            account_id TEXT NOT NULL,
            access_key_id TEXT NOT NULL,
            access_key_secret TEXT NOT NULL,
            api_token TEXT NOT NULL,
            environment TEXT NOT NULL DEFAULT 'prod',
            country_code TEXT NOT NULL DEFAULT 'global',
            is_active INTEGER NOT NULL DEFAULT 1,
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS aliyun_accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_client TEXT NOT NULL,
            access_key_id TEXT NOT NULL,
            access_key_secret TEXT NOT NULL,
            account_id TEXT NOT NULL,
            main_account_id TEXT NOT NULL,
            environment TEXT NOT NULL,
            region TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list_cloudflare_accounts(pool: &SqlitePool) -> Result<Vec<CloudflareAccount>> {
    let rows = sqlx::query_as::<_, CloudflareAccount>("SELECT * FROM cloudflare_accounts ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn active_cloudflare_account(pool: &SqlitePool) -> Result<Option<CloudflareAccount>> {
    let row = sqlx::query_as::<_, CloudflareAccount>(
        "SELECT * FROM cloudflare_accounts WHERE is_active = 1 ORDER BY id LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn create_cloudflare_account(pool: &SqlitePool, req: &CloudflareAccountPayload) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        r#"INSERT INTO cloudflare_accounts
           (site_client, account_id, access_key_id, access_key_secret, api_token,
            environment, country_code, is_active, description, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&req.site_client)
    .bind(&req.account_id)
    .bind(&req.access_key_id)
    .bind(&req.access_key_secret)
    .bind(&req.api_token)
    .bind(req.environment.as_deref().unwrap_or("prod"))
    .bind(req.country_code.as_deref().unwrap_or("global"))
    .bind(req.is_active.unwrap_or(true))
    .bind(&req.description)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

/// Partial update, returns false when the row does not exist / 部分更新
pub async fn update_cloudflare_account(pool: &SqlitePool, id: i64, req: &CloudflareAccountUpdate) -> Result<bool> {
    let result = sqlx::query(
        r#"UPDATE cloudflare_accounts SET
             site_client = COALESCE(?, site_client),
             account_id = COALESCE(?, account_id),
             access_key_id = COALESCE(?, access_key_id),
             access_key_secret = COALESCE(?, access_key_secret),
             api_token = COALESCE(?, api_token),
             environment = COALESCE(?, environment),
             country_code = COALESCE(?, country_code),
             is_active = COALESCE(?, is_active),
             description = COALESCE(?, description),
             updated_at = ?
           WHERE id = ?"#,
    )
    .bind(&req.site_client)
    .bind(&req.account_id)
    .bind(&req.access_key_id)
    .bind(&req.access_key_secret)
    .bind(&req.api_token)
    .bind(&req.environment)
    .bind(&req.country_code)
    .bind(req.is_active)
    .bind(&req.description)
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_cloudflare_account(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM cloudflare_accounts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_aliyun_accounts(pool: &SqlitePool) -> Result<Vec<AliyunAccount>> {
    let rows = sqlx::query_as::<_, AliyunAccount>("SELECT * FROM aliyun_accounts ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn active_aliyun_account(pool: &SqlitePool) -> Result<Option<AliyunAccount>> {
    let row = sqlx::query_as::<_, AliyunAccount>(
        "SELECT * FROM aliyun_accounts WHERE is_active = 1 ORDER BY id LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn create_aliyun_account(pool: &SqlitePool, req: &AliyunAccountPayload) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        r#"INSERT INTO aliyun_accounts
           (site_client, access_key_id, access_key_secret, account_id, main_account_id,
            environment, region, is_active, description, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&req.site_client)
    .bind(&req.access_key_id)
    .bind(&req.access_key_secret)
    .bind(&req.account_id)
    .bind(&req.main_account_id)
    .bind(&req.environment)
    .bind(&req.region)
    .bind(req.is_active.unwrap_or(true))
    .bind(&req.description)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn update_aliyun_account(pool: &SqlitePool, id: i64, req: &AliyunAccountUpdate) -> Result<bool> {
    let result = sqlx::query(
        r#"UPDATE aliyun_accounts SET
             site_client = COALESCE(?, site_client),
             access_key_id = COALESCE(?, access_key_id),
             access_key_secret = COALESCE(?, access_key_secret),
             account_id = COALESCE(?, account_id),
             main_account_id = COALESCE(?, main_account_id),
             environment = COALESCE(?, environment),
             region = COALESCE(?, region),
             is_active = COALESCE(?, is_active),
             description = COALESCE(?, description),
             updated_at = ?
           WHERE id = ?"#,
    )
    .bind(&req.site_client)
    .bind(&req.access_key_id)
    .bind(&req.access_key_secret)
    .bind(&req.account_id)
    .bind(&req.main_account_id)
    .bind(&req.environment)
    .bind(&req.region)
    .bind(req.is_active)
    .bind(&req.description)
    .bind(Utc::now().to_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_aliyun_account(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM aliyun_accounts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}


#[cfg(test)]
mod tests {
    use super::*;

    fn cf_payload(account_id: &str) -> CloudflareAccountPayload {
        CloudflareAccountPayload {
            site_client: "site".to_string(),
            account_id: account_id.to_string(),
            access_key_id: "ak".to_string(),
            access_key_secret: "sk".to_string(),
            api_token: "tok".to_string(),
            environment: None,
            country_code: None,
            is_active: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn test_cloudflare_account_crud() {
        let pool = testing::memory_pool().await;

        let id = create_cloudflare_account(&pool, &cf_payload("cf-1")).await.unwrap();
        let accounts = list_cloudflare_accounts(&pool).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].environment, "prod");
        assert!(accounts[0].is_active);

        let update = CloudflareAccountUpdate {
            description: Some("rotated".to_string()),
            is_active: Some(false),
            ..Default::default()
        };
        assert!(update_cloudflare_account(&pool, id, &update).await.unwrap());
        assert!(active_cloudflare_account(&pool).await.unwrap().is_none());

        let account = &list_cloudflare_accounts(&pool).await.unwrap()[0];
        assert_eq!(account.account_id, "cf-1");
        assert_eq!(account.description.as_deref(), Some("rotated"));

        assert!(!update_cloudflare_account(&pool, id + 100, &update).await.unwrap());
        assert!(delete_cloudflare_account(&pool, id).await.unwrap());
        assert!(!delete_cloudflare_account(&pool, id).await.unwrap());
    }

    #[tokio::test]
    async fn test_secrets_are_not_serialized() {
        let pool = testing::memory_pool().await;
        create_cloudflare_account(&pool, &cf_payload("cf-1")).await.unwrap();
        let account = active_cloudflare_account(&pool).await.unwrap().unwrap();
        let json = serde_json::to_value(&account).unwrap();
        assert!(json.get("access_key_secret").is_none());
        assert!(json.get("api_token").is_none());
        assert_eq!(json["account_id"], "cf-1");
    }
}
