use blog_portal::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    storage::{ImageStorage, S3ImageStorage, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Pretty logs locally, JSON lines in production. `RUST_LOG` overrides the filter.
fn init_tracing(env: &Env) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "blog_portal=debug,tower_http=info,axum=trace".into());
    let registry = tracing_subscriber::registry().with(filter);

    match env {
        Env::Local => registry.with(tracing_subscriber::fmt::layer().pretty()).init(),
        Env::Production => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown requested, draining connections");
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    // Panics on missing required settings.
    let config = AppConfig::load();
    init_tracing(&config.env);

    tracing::info!(
        env = ?config.env,
        posts_per_page = config.posts_per_page,
        "starting blog portal"
    );

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: Failed to apply database migrations.");
    tracing::info!("database schema is up to date");

    let images = S3ImageStorage::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.s3_bucket,
    );
    // Local MinIO starts without the bucket.
    if config.env == Env::Local {
        images.ensure_bucket_exists().await;
    }

    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState {
        repo: Arc::new(PostgresRepository::new(pool)) as RepositoryState,
        storage: Arc::new(images) as StorageState,
        config,
    });

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener. Check BIND_ADDR.");
    tracing::info!(%bind_addr, "listening; API docs at /swagger-ui");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
