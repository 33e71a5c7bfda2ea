use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use sqlx::sqlite::SqlitePool;
use tower_cookies::CookieManagerLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod auth;
mod db;
mod state;

use cloudops_backend::cache::{ConfigCache, SqliteConfigSource};
use cloudops_backend::config;
use cloudops_backend::drivers::aliyun_fc::FcClientFactory;
use cloudops_backend::drivers::cloudflare::CloudflareClient;
use cloudops_backend::drivers::r2::R2ClientFactory;
use state::AppState;

fn router(state: Arc<AppState>) -> Router {
    let v1 = Router::new()
        // 认证
        .route("/auth/login", post(api::auth::login))
        .route("/auth/register", post(api::auth::register))
        .route("/auth/logout", post(api::auth::logout))
        .route("/auth/change-password", post(api::auth::change_password))
        // 函数计算
        .route("/services", get(api::fc::list_services))
        .route("/services/versions", post(api::fc::list_versions))
        .route("/services/functions", post(api::fc::list_functions))
        .route("/services/aliases", post(api::fc::list_aliases).put(api::fc::update_alias))
        .route("/services/publish", post(api::fc::publish_version))
        // Cloudflare Pages / KV
        .route("/cloudflare/pages/info", get(api::cloudflare::pages_info))
        .route("/cloudflare/pages/projects", get(api::cloudflare::pages_projects))
        .route("/cloudflare/kv/namespaces", get(api::cloudflare::kv_namespaces))
        .route("/cloudflare/kv/namespaces/keys", post(api::cloudflare::kv_keys))
        .route(
            "/cloudflare/kv/namespaces/keys/values",
            post(api::cloudflare::kv_value).put(api::cloudflare::update_kv_value),
        )
        // R2
        .route(
            "/cloudflare/bucketinfo",
            post(api::cloudflare::bucket_info).delete(api::cloudflare::delete_directory),
        )
        .route("/cloudflare/bucketinfo/copy", post(api::cloudflare::copy_directory))
        // 账号管理
        .route(
            "/cloudflare/accounts",
            get(api::accounts::list_cloudflare_accounts).post(api::accounts::create_cloudflare_account),
        )
        .route(
            "/cloudflare/accounts/:id",
            put(api::accounts::update_cloudflare_account).delete(api::accounts::delete_cloudflare_account),
        )
        .route(
            "/aliyun/accounts",
            get(api::accounts::list_aliyun_accounts).post(api::accounts::create_aliyun_account),
        )
        .route(
            "/aliyun/accounts/:id",
            put(api::accounts::update_aliyun_account).delete(api::accounts::delete_aliyun_account),
        )
        .route("/system/zones", get(api::system::zone_info))
        .route("/system/config/refresh", post(api::system::refresh_config));

    Router::new()
        .route("/healthcheck", get(api::system::health_check))
        .nest("/api/v1", v1)
        .layer(CookieManagerLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cloudops_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration / 加载配置
    config::init_config().map_err(anyhow::Error::msg)?;
    let app_config = config::config();
    tracing::info!("Server will listen on {}", app_config.get_bind_address());

    // Create data directory if not exists / 创建数据目录
    let data_dir = app_config.get_data_dir();
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)?;
        tracing::info!("Created data directory: {:?}", data_dir);
    }

    let pool = SqlitePool::connect(&app_config.get_database_url()).await?;
    db::run_migrations(&pool).await?;
    db::seed_admin(&pool, &app_config.auth.admin_username).await?;

    // Provider config is loaded explicitly; missing accounts are not fatal / 加载云账号配置
    let cache = Arc::new(ConfigCache::new(Arc::new(SqliteConfigSource::new(pool.clone()))));
    if let Err(e) = cache.refresh_all().await {
        tracing::warn!("Provider config not fully loaded at startup: {}", e);
    }

    let r2 = R2ClientFactory::new(cache.clone(), app_config.cloudflare.clone()).shared()?;
    let fc = FcClientFactory::new(cache.clone(), app_config.aliyun.clone()).shared()?;
    let cloudflare = CloudflareClient::new(cache.clone(), app_config.cloudflare.clone())?;

    let state = Arc::new(AppState {
        db: pool,
        config: app_config.clone(),
        cache,
        r2,
        fc,
        cloudflare,
    });

    let app = router(state);

    let bind_addr = app_config.get_bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server running at http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
