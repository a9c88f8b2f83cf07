//! `/audit/events[...]` — read-only access to the append-only log (§6
//! "Event stream format").

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;

use ledgerflow_core::EventId;

use crate::app::dto::event_to_json;
use crate::app::errors::{event_store_error_response, json_error};
use crate::app::services::AppState;

pub async fn get_event(Extension(state): Extension<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let id = match EventId::from_str(&id) {
        Ok(id) => id,
        Err(e) => return json_error(StatusCode::BAD_REQUEST, "invalid_event_id", e.to_string()),
    };

    match state.runtime.event_store.get_by_id(id) {
        Some(event) => Json(event_to_json(&event)).into_response(),
        None => json_error(StatusCode::NOT_FOUND, "event_not_found", format!("event {id} not found")),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    after_sequence: Option<u64>,
    limit: Option<u32>,
}

pub async fn list_events(Extension(state): Extension<Arc<AppState>>, Query(query): Query<ListEventsQuery>) -> Response {
    match state.runtime.event_store.read_stream(query.after_sequence, query.limit, None) {
        Ok(page) => Json(json!({
            "events": page.events.iter().map(event_to_json).collect::<Vec<_>>(),
            "has_more": page.has_more,
            "next_sequence": page.next_sequence,
        }))
        .into_response(),
        Err(e) => event_store_error_response(e),
    }
}
