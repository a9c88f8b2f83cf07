//! `/event-types…` — register and inspect JSON-Schema entries (§4.2, §6).

use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use ledgerflow_events::SchemaEntry;

use crate::app::errors::{json_error, registry_error_response};
use crate::app::services::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterEventTypeRequest {
    type_name: String,
    schema_version: u32,
    json_schema: JsonValue,
    description: Option<String>,
}

pub async fn register(Extension(state): Extension<Arc<AppState>>, Json(body): Json<RegisterEventTypeRequest>) -> Response {
    let entry = SchemaEntry {
        type_name: body.type_name,
        schema_version: body.schema_version,
        json_schema: body.json_schema,
        description: body.description,
    };
    match state.event_types.register(entry.clone()) {
        Ok(()) => (StatusCode::CREATED, Json(json!(entry))).into_response(),
        Err(e) => registry_error_response(e),
    }
}

pub async fn list(Extension(state): Extension<Arc<AppState>>) -> Response {
    Json(state.event_types.list_types()).into_response()
}

pub async fn list_versions(Extension(state): Extension<Arc<AppState>>, Path(type_name): Path<String>) -> Response {
    Json(state.event_types.list_versions(&type_name)).into_response()
}

pub async fn get_schema(
    Extension(state): Extension<Arc<AppState>>,
    Path((type_name, version)): Path<(String, u32)>,
) -> Response {
    match state.event_types.get_schema(&type_name, version) {
        Some(entry) => Json(json!(entry)).into_response(),
        None => json_error(
            StatusCode::NOT_FOUND,
            "schema_not_found",
            format!("no schema for {type_name}@{version}"),
        ),
    }
}
