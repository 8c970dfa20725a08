use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::sync::Arc;
use time::Date;
use tracing::info;

use super::error::ServerError;
use super::models::{
    LogRequest, LogResponse, MenuRequest, MenuResponse, NutritionRequest, NutritionResponse,
    NutritionResult, SelectRequest, SelectResponse, TotalQuery, TotalResponse,
};
use super::state::ServerState;
use crate::nutrition::NutritionRecord;
use crate::pipeline::Pipeline;
use crate::session::{MenuSession, SessionState};
use crate::storage;

pub async fn run_server(pipeline: Pipeline, addr: String) -> Result<()> {
    let app = router(pipeline);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind server address {}", addr))?;
    info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(pipeline: Pipeline) -> Router {
    let state = Arc::new(ServerState::new(pipeline));
    Router::new()
        .route("/health", get(health))
        .route("/menu", post(menu))
        .route("/select", post(select))
        .route("/session/:id", get(session_state))
        .route("/nutrition", post(nutrition))
        .route("/nutrition/:item", get(cached_nutrition))
        .route("/log", post(log))
        .route("/total", get(total))
        .with_state(state)
        .layer(axum::middleware::from_fn(cors_middleware))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type"),
    );
}

async fn menu(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<MenuRequest>,
) -> Result<Json<MenuResponse>, ServerError> {
    let pipeline = &state.pipeline;
    let language = pipeline.language_or_default(payload.lang.as_deref())?;
    let image = decode_image(&payload.image_base64)?;
    let scanned = pipeline.scan_menu(&image, language).await?;
    let mut session = MenuSession::new();
    session.scan(scanned.lines.clone());
    session.translate(scanned.translation.clone())?;
    let session_id = state.open_session(session)?;
    Ok(Json(MenuResponse {
        session_id,
        language: scanned.language,
        lines: scanned.lines,
        translations: scanned.translation.lines,
        translation_source: scanned.translation.source,
        aligned: scanned.translation.aligned,
    }))
}

/// Picks scanned lines by index; a later call replaces the selection.
async fn select(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<SelectRequest>,
) -> Result<Json<SelectResponse>, ServerError> {
    let session = state.session(&payload.session_id)?;
    let mut session = session.lock().await;
    let items = session.select(&payload.indices)?.to_vec();
    Ok(Json(SelectResponse {
        session_id: payload.session_id.trim().to_string(),
        items,
    }))
}

async fn session_state(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionState>, ServerError> {
    let session = state.session(&id)?;
    let session = session.lock().await;
    Ok(Json(session.state().clone()))
}

async fn nutrition(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<NutritionRequest>,
) -> Result<Json<NutritionResponse>, ServerError> {
    if payload.items.is_empty() {
        return Err(ServerError::bad_request("items is required"));
    }
    let results = state.pipeline.resolve_many(&payload.items).await?;
    Ok(Json(NutritionResponse {
        results: results.into_iter().map(NutritionResult::from).collect(),
    }))
}

/// Served from the store's cache of earlier lookups; nothing is resolved here.
async fn cached_nutrition(
    State(state): State<Arc<ServerState>>,
    Path(item): Path<String>,
) -> Result<Json<NutritionRecord>, ServerError> {
    state
        .pipeline
        .cached(&item)?
        .map(Json)
        .ok_or_else(|| ServerError::not_found(format!("no cached nutrition for '{}'", item.trim())))
}

/// Logs either a session's selection or an explicit item list.
async fn log(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<LogRequest>,
) -> Result<Json<LogResponse>, ServerError> {
    let session_id = payload
        .session_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());
    let pipeline = &state.pipeline;
    let user = user_or_default(pipeline, payload.user);
    let date = date_or_today(payload.date.as_deref())?;
    let outcome = match &session_id {
        Some(id) => {
            if !payload.items.is_empty() {
                return Err(ServerError::bad_request(
                    "send either session_id or items, not both",
                ));
            }
            let session = state.session(id)?;
            let mut session = session.lock().await;
            pipeline.log_selection(&mut session, &user, date).await?
        }
        None => {
            if payload.items.is_empty() {
                return Err(ServerError::bad_request("items or session_id is required"));
            }
            pipeline.log(&user, &payload.items, date).await?
        }
    };
    Ok(Json(LogResponse {
        session_id,
        user,
        date: storage::format_date(date),
        logged: outcome.logged,
        unresolved: outcome
            .unresolved
            .into_iter()
            .map(|failure| failure.query)
            .collect(),
        total_calories: outcome.total,
    }))
}

async fn total(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<TotalQuery>,
) -> Result<Json<TotalResponse>, ServerError> {
    let pipeline = &state.pipeline;
    let user = user_or_default(pipeline, query.user);
    let date = date_or_today(query.date.as_deref())?;
    let total_calories = pipeline.daily_total(&user, date)?;
    Ok(Json(TotalResponse {
        user,
        date: storage::format_date(date),
        total_calories,
    }))
}

fn user_or_default(pipeline: &Pipeline, user: Option<String>) -> String {
    user.map(|user| user.trim().to_string())
        .filter(|user| !user.is_empty())
        .unwrap_or_else(|| pipeline.default_user().to_string())
}

fn date_or_today(value: Option<&str>) -> Result<Date, ServerError> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => storage::parse_date(value)
            .map_err(|err| ServerError::bad_request(format!("{:#}", err))),
        None => Ok(storage::today()),
    }
}

/// Accepts plain base64 or a `data:<mime>;base64,` URL.
fn decode_image(encoded: &str) -> Result<Vec<u8>, ServerError> {
    let encoded = encoded.trim();
    let encoded = match encoded.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => encoded,
    };
    if encoded.is_empty() {
        return Err(ServerError::bad_request("image_base64 is required"));
    }
    BASE64
        .decode(encoded)
        .map_err(|err| ServerError::bad_request(format!("invalid image_base64: {}", err)))
}
