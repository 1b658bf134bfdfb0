//! Quiz Arena binary entrypoint wiring REST, WebSocket and storage layers.

use std::{env, net::SocketAddr, path::Path, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quiz_arena_back::{
    config::AppConfig,
    dao::arena_store::memory::MemoryArenaStore,
    routes,
    services::gateway::JwtVerifier,
    state::{AppState, SharedState},
};

const DEV_JWT_SECRET: &str = "quiz-arena-dev-secret";

/// Which storage backend the process runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreBackend {
    Mongo,
    Memory,
}

impl StoreBackend {
    fn from_env() -> anyhow::Result<Self> {
        match env::var("STORE_BACKEND").ok().as_deref() {
            None | Some("") | Some("mongo") => Ok(StoreBackend::Mongo),
            Some("memory") => Ok(StoreBackend::Memory),
            Some(other) => bail!("unknown STORE_BACKEND `{other}` (expected `mongo` or `memory`)"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let backend = StoreBackend::from_env()?;
    let secret = jwt_secret(backend)?;
    let app_state = AppState::new(config, Arc::new(JwtVerifier::new(&secret)));

    match backend {
        StoreBackend::Memory => install_memory_store(&app_state).await?,
        StoreBackend::Mongo => spawn_mongo_supervisor(&app_state)?,
    }

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, ?backend, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

fn jwt_secret(backend: StoreBackend) -> anyhow::Result<String> {
    match env::var("JWT_SECRET") {
        Ok(secret) if !secret.is_empty() => Ok(secret),
        _ if backend == StoreBackend::Memory => {
            warn!("JWT_SECRET not set; using the development secret");
            Ok(DEV_JWT_SECRET.to_owned())
        }
        _ => bail!("JWT_SECRET must be set"),
    }
}

async fn install_memory_store(state: &SharedState) -> anyhow::Result<()> {
    let store = match env::var("MEMORY_SEED_PATH") {
        Ok(path) if !path.is_empty() => {
            let store = MemoryArenaStore::from_seed_file(Path::new(&path))
                .with_context(|| format!("loading memory seed `{path}`"))?;
            info!(%path, "memory store seeded");
            store
        }
        _ => MemoryArenaStore::new(),
    };
    state.install_arena_store(Arc::new(store)).await;
    Ok(())
}

#[cfg(feature = "mongo-store")]
fn spawn_mongo_supervisor(state: &SharedState) -> anyhow::Result<()> {
    use quiz_arena_back::{
        dao::{
            arena_store::{
                ArenaStore,
                mongodb::{MongoArenaStore, MongoConfig},
            },
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    let uri = env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let db_name = env::var("MONGO_DB").ok();

    tokio::spawn(storage_supervisor::run(state.clone(), move || {
        let uri = uri.clone();
        let db_name = db_name.clone();
        async move {
            let config = MongoConfig::from_uri(&uri, db_name.as_deref()).await?;
            let store = MongoArenaStore::connect(config).await?;
            Ok::<Arc<dyn ArenaStore>, StorageError>(Arc::new(store))
        }
    }));
    Ok(())
}

#[cfg(not(feature = "mongo-store"))]
fn spawn_mongo_supervisor(_state: &SharedState) -> anyhow::Result<()> {
    bail!("built without the `mongo-store` feature; set STORE_BACKEND=memory")
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
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
