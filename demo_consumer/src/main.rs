//! Demo front: loads every model under `MODELKIT_MODEL_ROOT`, migrates the tables and
//! serves them over HTTP.
//!
//! Run from repo root: `cargo run -p modelkit-demo`

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use modelkit::{load_dir, migrate_all, AppState, Fault, Paginated, PgStore, QueryDescriptor, Record, Settings};
use serde::Deserialize;
use tokio::net::TcpListener;

#[derive(Deserialize)]
struct SearchBody {
    #[serde(default)]
    query: QueryDescriptor,
    #[serde(default)]
    page: u64,
    #[serde(default)]
    pagesize: u64,
}

async fn search(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Json(body): Json<SearchBody>,
) -> Result<Json<Paginated>, Fault> {
    let handle = state.select(&model)?;
    Ok(Json(handle.must_search(&body.query, body.page, body.pagesize).await?))
}

async fn read(
    State(state): State<AppState>,
    Path((model, id)): Path<(String, i64)>,
) -> Result<Json<Record>, Fault> {
    let handle = state.select(&model)?;
    Ok(Json(handle.must_find(id, &QueryDescriptor::new()).await?))
}

async fn create(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Json(row): Json<Record>,
) -> Result<Json<serde_json::Value>, Fault> {
    let handle = state.select(&model)?;
    let id = handle.must_create(row).await?;
    Ok(Json(serde_json::json!({ "id": id })))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("modelkit=info,modelkit_demo=info")),
        )
        .init();

    let settings = Settings::from_env();
    let store = PgStore::connect(&settings).await?;
    let state = AppState::new(store).with_hash_cost(settings.bcrypt_cost);
    for model in load_dir(&settings.model_root).await? {
        state.registry.register(model);
    }
    for report in migrate_all(&state, false).await? {
        if !report.is_noop() {
            tracing::info!(table = %report.table, created = report.created, "migrated");
        }
    }

    let app = Router::new()
        .route("/:model", post(create))
        .route("/search/:model", post(search))
        .route("/:model/:id", get(read))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    let port = listener.local_addr()?.port();
    tracing::info!("modelkit demo listening on http://127.0.0.1:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}
