use anyhow::Result;
use chrono::Utc;
use rand::Rng;
use sqlx::SqlitePool;
use uuid::Uuid;

use cloudops_backend::accounts;

/// Generate random password / 生成随机密码
fn generate_random_password(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghjkmnpqrstuvwxyz23456789!@#$%^&*";
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Run database migrations / 运行数据库迁移
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            is_admin INTEGER NOT NULL DEFAULT 0,
            enabled INTEGER NOT NULL DEFAULT 1,
            last_login TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_sessions (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            username TEXT NOT NULL,
            expires_at INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_user_sessions_expires ON user_sessions(expires_at)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS alias_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            service_name TEXT NOT NULL,
            alias_name TEXT NOT NULL,
            version_id TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    accounts::migrate(pool).await?;

    tracing::info!("Database migrations completed");
    Ok(())
}

/// Create the admin user on first start / 首次启动时创建管理员
///
/// Returns the generated password when a user was created.
pub async fn seed_admin(pool: &SqlitePool, username: &str) -> Result<Option<String>> {
    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        return Ok(None);
    }

    let password = generate_random_password(16);
    let hash = bcrypt::hash(&password, bcrypt::DEFAULT_COST)?;
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO users (id, username, password_hash, is_admin, enabled, created_at, updated_at)
         VALUES (?, ?, ?, 1, 1, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(username)
    .bind(&hash)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    tracing::warn!("==============================================");
    tracing::warn!("Created admin user: {}", username);
    tracing::warn!("Initial password: {}", password);
    tracing::warn!("Please change it after the first login / 请登录后修改密码");
    tracing::warn!("==============================================");

    Ok(Some(password))
}

/// Record an alias switch / 记录别名切换
pub async fn insert_alias_record(
    pool: &SqlitePool,
    service_name: &str,
    alias_name: &str,
    version_id: &str,
    description: Option<&str>,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO alias_records (service_name, alias_name, version_id, description, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(service_name)
    .bind(alias_name)
    .bind(version_id)
    .bind(description)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}


#[cfg(test)]
mod tests {
    use super::testing::migrated_pool;
    use super::*;
    use cloudops_backend::models::AliasRecord;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = migrated_pool().await;
        run_migrations(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_seed_admin_once() {
        let pool = migrated_pool().await;
        let password = seed_admin(&pool, "admin").await.unwrap().unwrap();
        assert_eq!(password.len(), 16);
        assert!(seed_admin(&pool, "admin").await.unwrap().is_none());

        let (hash,): (String,) = sqlx::query_as("SELECT password_hash FROM users WHERE username = 'admin'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(bcrypt::verify(&password, &hash).unwrap());
    }

    #[tokio::test]
    async fn test_alias_record_insert() {
        let pool = migrated_pool().await;
        insert_alias_record(&pool, "demo", "prod", "3", Some("rollback")).await.unwrap();

        let records: Vec<AliasRecord> = sqlx::query_as("SELECT * FROM alias_records")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].version_id, "3");
        assert_eq!(records[0].description.as_deref(), Some("rollback"));
    }
}
