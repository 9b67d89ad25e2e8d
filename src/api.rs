use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error};

use crate::db::Database;
use crate::error::PersistenceError;

pub fn router(db: Arc<Database>) -> Router {
    Router::new()
        .route("/companies", get(list_companies))
        .route("/company", get(get_company))
        .with_state(db)
}

#[derive(Debug, Deserialize)]
struct CompanyQuery {
    #[serde(default)]
    name: String,
}

async fn list_companies(State(db): State<Arc<Database>>) -> Response {
    match db.list_companies() {
        Ok(companies) => Json(json!({ "data": companies })).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn get_company(State(db): State<Arc<Database>>, Query(query): Query<CompanyQuery>) -> Response {
    match db.get_company(query.name.trim()) {
        Ok(Some(company)) => Json(json!({ "data": company })).into_response(),
        Ok(None) => {
            debug!(company = %query.name, "Company not found");
            (StatusCode::BAD_REQUEST, Json(json!({ "error": "Record not found!" }))).into_response()
        }
        Err(e) => internal_error(e),
    }
}

fn internal_error(e: PersistenceError) -> Response {
    error!(error = %e, "Database read failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
        .into_response()
}
