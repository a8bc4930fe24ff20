//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{FileParser, RestRemoteStore, SqliteStore},
    checkpoint::{replay_crash_buffer, CheckpointFile, ProgressSaver},
    config::Config,
    error::ApiError,
    web::{rest, state::AppState, ws_handler, ApiDoc},
};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use flashread_core::ports::{
    Clock, LocalStore, NullLocalStore, NullRemoteStore, RemoteStore, SourceParser, SystemClock,
};
use flashread_core::stats::StatsEngine;
use flashread_core::sync::SyncCoordinator;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Open the Local Store ---
    // Reading still works without persistence; the store degrades to a
    // no-op implementation if the database cannot be opened.
    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        warn!("Could not create data directory: {e}");
    }
    let store: Arc<dyn LocalStore> = match SqliteStore::open(&config.database_path()).await {
        Ok(store) => {
            info!("Local store ready at {}", config.database_path().display());
            Arc::new(store)
        }
        Err(e) => {
            warn!("Local storage unavailable ({e}); progress will not be persisted.");
            Arc::new(NullLocalStore)
        }
    };

    // --- 3. Attach the Remote Metadata Store (when signed in) ---
    let remote: Arc<dyn RemoteStore> = match &config.remote {
        Some(remote_config) => match RestRemoteStore::new(remote_config) {
            Ok(remote) => {
                info!("Remote metadata store configured.");
                Arc::new(remote)
            }
            Err(e) => {
                warn!("Remote store client failed to build ({e}); staying local-only.");
                Arc::new(NullRemoteStore)
            }
        },
        None => {
            info!("No remote identity configured; running local-only.");
            Arc::new(NullRemoteStore)
        }
    };

    // --- 4. Assemble the Core Services ---
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let parser: Arc<dyn SourceParser> = Arc::new(FileParser::default());
    let sync = Arc::new(SyncCoordinator::new(store.clone(), remote.clone()));
    let stats = Arc::new(Mutex::new(StatsEngine::new(
        store.clone(),
        remote.clone(),
        clock.clone(),
    )));

    // Replay an interrupted session before anything else touches the store.
    let checkpoint = CheckpointFile::new(config.crash_buffer_path());
    replay_crash_buffer(&store, &checkpoint).await;
    let saver = Arc::new(ProgressSaver::new(
        store.clone(),
        checkpoint,
        Duration::from_millis(config.progress_debounce_ms),
    ));

    let app_state = Arc::new(AppState {
        store,
        remote,
        parser,
        clock,
        sync: sync.clone(),
        stats,
        saver,
        config: config.clone(),
    });

    // --- 5. Reconcile With the Remote in the Background ---
    tokio::spawn(async move {
        let needs_reupload = sync.sync_all().await;
        if !needs_reupload.is_empty() {
            info!(
                "{} synced document(s) need their content re-uploaded on this device",
                needs_reupload.len()
            );
        }
    });

    // --- 6. Create the Web Router ---
    let cors = CorsLayer::new()
        .allow_origin(
            config
                .allowed_origin
                .parse::<HeaderValue>()
                .map_err(|e| ApiError::Internal(format!("Invalid ALLOWED_ORIGIN: {e}")))?,
        )
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    let api_router = Router::new()
        .route(
            "/documents",
            post(rest::upload_document_handler).get(rest::list_documents_handler),
        )
        .route("/documents/paste", post(rest::paste_document_handler))
        .route(
            "/documents/{id}",
            get(rest::get_document_handler).delete(rest::delete_document_handler),
        )
        .route("/documents/{id}/progress", post(rest::update_progress_handler))
        .route("/stats", get(rest::stats_handler))
        .route("/stats/freeze", post(rest::streak_freeze_handler))
        .route("/sync", post(rest::sync_handler))
        .route("/export", get(rest::export_handler))
        .route("/import", post(rest::import_handler))
        .route("/ws", get(ws_handler))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
