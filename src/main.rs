use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use petwheel::{
    app_router, AppConfig, AppState, DocumentProfileStore, DocumentStore, GameRoomCoordinator,
    InMemoryDocumentStore, PetCatalog, TokenConfig,
};
use petwheel::store::PostgresDocumentStore;

/// PostgreSQL when DATABASE_URL is set, otherwise one shared in-memory store
async fn select_store(config: &AppConfig) -> Arc<dyn DocumentStore> {
    let Some(database_url) = config.database_url.as_deref() else {
        info!("DATABASE_URL not set, using in-memory document store");
        return Arc::new(InMemoryDocumentStore::new());
    };

    match PostgresDocumentStore::connect(database_url).await {
        Ok(store) => {
            info!("Connected to PostgreSQL document store");
            Arc::new(store)
        }
        Err(e) => {
            warn!(error = %e, "PostgreSQL unavailable, falling back to in-memory document store");
            Arc::new(InMemoryDocumentStore::new())
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "petwheel=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting pet wheel game server");

    let config = AppConfig::from_env();
    let store = select_store(&config).await;
    let profiles = Arc::new(DocumentProfileStore::new(store.clone()));
    let catalog = Arc::new(PetCatalog::load(&config.pets_path));

    let coordinator = Arc::new(GameRoomCoordinator::new(
        store,
        profiles,
        catalog,
        config.game.clone(),
    ));
    let app_state = AppState::new(coordinator, TokenConfig::new());

    let app = app_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(bind_addr = %config.bind_addr, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };
    info!("Server running on http://{}", config.bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
