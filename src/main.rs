use actix_web::{web, App, HttpServer};
use chat_service::{
    config::Config,
    db, error, logging, migrations, routes,
    repository::PgStore,
    services::{ConversationService, UserService},
    state::AppState,
    websocket::{gateway::Gateway, RoomRegistry},
};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(Config::from_env()?);

    // Initialize DB pool
    let db = db::init_pool(&cfg.database_url)
        .await
        .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;

    migrations::run_all(&db)
        .await
        .map_err(|e| error::AppError::StartServer(format!("migrations: {e}")))?;

    let store = Arc::new(PgStore::new(db));
    let registry = RoomRegistry::new();
    let engine = ConversationService::new(store.clone());
    let users = UserService::new(store);
    let gateway = Arc::new(Gateway::new(
        engine.clone(),
        users.clone(),
        registry.clone(),
    ));

    let state = AppState {
        registry,
        engine,
        users,
        gateway,
        config: cfg.clone(),
    };

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting chat-service");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(routes::configure_routes)
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(format!("server: {e}")))?;

    Ok(())
}
