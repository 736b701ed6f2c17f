use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use super::stats::get_stats;
use super::types::{AppServer, AppState};
use crate::lib::apps::lifecycle::action_app;
use crate::lib::apps::provision::install_app;
use crate::lib::apps::status::{AppStatus, app_status};
use crate::lib::apps::types::AppAction;
use crate::lib::jobs::types::JobKind;

#[derive(Deserialize)]
struct ActionBody {
    action: String,
}

#[derive(Deserialize)]
struct JobsQuery {
    limit: Option<usize>,
}

impl AppServer {
    pub fn new(address: &str, port: &str, state: AppState) -> Self {
        Self {
            address: address.to_string(),
            port: port.to_string(),
            state,
        }
    }

    pub async fn start_server(self) {
        let app = Router::new()
            .route("/api/apps", get(list_apps))
            .route("/api/apps/{app_id}/install", post(install))
            .route("/api/apps/{app_id}/action", post(action))
            .route("/api/apps/{app_id}/status", get(status))
            .route("/api/jobs", get(jobs))
            .route("/api/jobs/{job_id}", get(job))
            .route("/api/stats", get(stats))
            .route("/healthz", get(healthz))
            .with_state(self.state);

        println!("Listening on {}:{}", self.address, self.port);
        let listener = TcpListener::bind(format!("{}:{}", self.address, self.port))
            .await
            .unwrap();

        axum::serve(listener, app).await.unwrap();
    }
}

async fn list_apps(State(state): State<AppState>) -> Json<Value> {
    let apps: Vec<Value> = state
        .catalog
        .entries()
        .map(|app| {
            json!({
                "id": app.id,
                "title": app.title,
                "description": app.description,
                "default_url": app.default_url,
            })
        })
        .collect();

    Json(json!({ "ok": true, "apps": apps }))
}

/// Validation is synchronous: an unknown app id never creates a job.
async fn install(
    State(state): State<AppState>,
    Path(app_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    let Some(app) = state.catalog.lookup(&app_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "ok": false, "error": "unknown application" })),
        );
    };

    let app = app.clone();
    let apps_root = state.apps_root.clone();
    let work = Box::pin(async move { install_app(&app, &apps_root).await });

    match state.executor.submit(JobKind::Install, &app_id, None, work) {
        Ok(job) => (
            StatusCode::ACCEPTED,
            Json(json!({ "ok": true, "job_id": job.id })),
        ),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "ok": false, "error": err.to_string() })),
        ),
    }
}

/// Both the app id and the action string are validated before a job is
/// created; "explode" fails here, not in a queued record.
async fn action(
    State(state): State<AppState>,
    Path(app_id): Path<String>,
    Json(body): Json<ActionBody>,
) -> (StatusCode, Json<Value>) {
    if state.catalog.lookup(&app_id).is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "ok": false, "error": "unknown application" })),
        );
    }

    let Some(app_action) = AppAction::parse(&body.action) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "ok": false, "error": "unknown action" })),
        );
    };

    let target = app_id.clone();
    let work = Box::pin(async move { action_app(&target, app_action).await });

    match state
        .executor
        .submit(JobKind::Action, &app_id, Some(app_action), work)
    {
        Ok(job) => (
            StatusCode::ACCEPTED,
            Json(json!({ "ok": true, "job_id": job.id })),
        ),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "ok": false, "error": err.to_string() })),
        ),
    }
}

async fn status(Path(app_id): Path<String>) -> Json<AppStatus> {
    Json(app_status(&app_id).await)
}

async fn jobs(
    State(state): State<AppState>,
    Query(query): Query<JobsQuery>,
) -> (StatusCode, Json<Value>) {
    match state.store.recent(query.limit.unwrap_or(20)) {
        Ok(jobs) => (StatusCode::OK, Json(json!({ "ok": true, "jobs": jobs }))),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "ok": false, "error": err.to_string() })),
        ),
    }
}

async fn job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    match state.store.get(&job_id) {
        Ok(Some(job)) => (StatusCode::OK, Json(json!({ "ok": true, "job": job }))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "ok": false, "error": "not found" })),
        ),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "ok": false, "error": err.to_string() })),
        ),
    }
}

async fn stats(State(state): State<AppState>) -> Json<Value> {
    let active_jobs = state.store.active_count().unwrap_or(0);
    let system = state.system.lock().await;
    let snapshot = get_stats(&system, active_jobs);
    Json(json!({ "ok": true, "stats": snapshot }))
}

async fn healthz() -> &'static str {
    "ok"
}
