//! `/projections/{name}` reads plus `/projections/:type/{rebuild,snapshot}`
//! (§4.5, §4.7, §6).

use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;

use ledgerflow_events::EventPage;
use ledgerflow_projections::{run_rebuild, RebuildHandle};

use crate::app::errors::{json_error, snapshot_error_response};
use crate::app::services::AppState;

pub async fn list(Extension(state): Extension<Arc<AppState>>, Path(name): Path<String>) -> Response {
    let projections = &state.projections;
    match name.as_str() {
        "vendor_list" => Json(json!(projections.vendor_list.list())).into_response(),
        "item_list" => Json(json!(projections.item_list.list())).into_response(),
        "ap_invoice_list" => Json(json!(projections.invoice_list.list())).into_response(),
        "ap_aging" => Json(json!(projections.aging.buckets())).into_response(),
        "ap_vendor_balance" => Json(json!(projections.vendor_balance.all_balances())).into_response(),
        "gl_postings" => Json(json!(projections.gl_postings.list())).into_response(),
        other => json_error(StatusCode::NOT_FOUND, "unknown_projection", format!("no projection named {other}")),
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RebuildRequest {
    batch_size: Option<u32>,
}

const DEFAULT_REBUILD_BATCH_SIZE: u32 = 500;

pub async fn rebuild(
    Extension(state): Extension<Arc<AppState>>,
    Path(projection_type): Path<String>,
    Json(body): Json<RebuildRequest>,
) -> Response {
    let batch_size = body.batch_size.unwrap_or(DEFAULT_REBUILD_BATCH_SIZE);
    let handle = RebuildHandle::new(projection_type.clone());

    let event_store = state.runtime.event_store.clone();
    let fetch_batch = |cursor: u64, limit: u32| -> Vec<ledgerflow_events::StoredEvent> {
        let after = if cursor == 0 { None } else { Some(cursor) };
        match event_store.read_stream(after, Some(limit), None) {
            Ok(EventPage { events, .. }) => events,
            Err(_) => Vec::new(),
        }
    };

    let outcome = run_rebuild(
        state.runtime.projections.as_ref(),
        &projection_type,
        &handle,
        batch_size,
        fetch_batch,
        || (),
        |_tx| {},
        state.runtime.dead_letters.as_ref(),
    );

    Json(json!({
        "projection_type": projection_type,
        "events_processed": outcome.events_processed,
        "dead_lettered": outcome.dead_lettered,
    }))
    .into_response()
}

pub async fn snapshot(Extension(state): Extension<Arc<AppState>>, Path(projection_type): Path<String>) -> Response {
    match state.snapshots.create_snapshot(&projection_type) {
        Ok(snapshot) => (StatusCode::CREATED, Json(json!(snapshot))).into_response(),
        Err(e) => snapshot_error_response(e),
    }
}
