//! TicTacToe Back binary entrypoint wiring REST, SSE, storage and the stale-match sweeper.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::{net::TcpListener, sync::watch};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tictactoe_back::{
    config::AppConfig,
    dao::{
        match_store::{InMemoryMatchStore, MatchStore},
        storage::StorageError,
    },
    routes,
    services::{storage_supervisor, sweeper},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config.clone());

    spawn_storage_supervisor(app_state.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = tokio::spawn(sweeper::run(
        app_state.clone(),
        config.sweep_interval,
        config.max_match_age,
        shutdown_rx,
    ));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("serving axum")?;

    sweeper.await.context("joining sweeper")?;
    Ok(())
}

/// Pick the storage backend from the environment and supervise it in the background.
fn spawn_storage_supervisor(state: SharedState) {
    match env::var("MONGO_URI").ok().filter(|uri| !uri.is_empty()) {
        #[cfg(feature = "mongo-store")]
        Some(uri) => {
            let db_name = env::var("MONGO_DB").ok();
            tokio::spawn(storage_supervisor::run(state, move || {
                connect_mongo(uri.clone(), db_name.clone())
            }));
        }
        #[cfg(not(feature = "mongo-store"))]
        Some(_) => {
            warn!("MONGO_URI is set but MongoDB support is not compiled in; using in-memory store");
            spawn_in_memory(state);
        }
        None => {
            info!("MONGO_URI not set; using in-memory store");
            spawn_in_memory(state);
        }
    }
}

fn spawn_in_memory(state: SharedState) {
    let store: Arc<dyn MatchStore> = Arc::new(InMemoryMatchStore::new());
    tokio::spawn(storage_supervisor::run(state, move || {
        let store = store.clone();
        async move { Ok::<_, StorageError>(store) }
    }));
}

#[cfg(feature = "mongo-store")]
async fn connect_mongo(
    uri: String,
    db_name: Option<String>,
) -> Result<Arc<dyn MatchStore>, StorageError> {
    use tictactoe_back::dao::match_store::mongodb::{MongoConfig, MongoMatchStore};

    let config = MongoConfig::from_uri(&uri, db_name.as_deref()).await?;
    let store = MongoMatchStore::connect(config).await?;
    Ok(Arc::new(store))
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
