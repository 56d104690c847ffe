use db_pool::{create_pool, DbConfig};
use sqlx::{Pool, Postgres};

/// Builds the shared Postgres pool. Pool sizing comes from DB_* env vars,
/// the connection string from the service config.
pub async fn init_pool(database_url: &str) -> Result<Pool<Postgres>, sqlx::Error> {
    let mut config = DbConfig::from_env("chat-service").unwrap_or_default();
    if config.database_url.is_empty() {
        config.database_url = database_url.to_string();
    }
    if config.service_name == "unknown" {
        config.service_name = "chat-service".to_string();
    }
    create_pool(config).await
}
