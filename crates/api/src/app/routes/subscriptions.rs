//! `/subscriptions…` — projection cursor lifecycle (§4.6, §6).

use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;

use ledgerflow_projections::{run_rebuild, RebuildHandle, Subscription};

use crate::app::errors::{json_error, subscription_error_response};
use crate::app::services::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    projection_type: String,
    subscriber_type: String,
    subscriber_id: String,
    batch_size: Option<u32>,
}

pub async fn create(Extension(state): Extension<Arc<AppState>>, Json(body): Json<CreateSubscriptionRequest>) -> Response {
    let subscription = Subscription::new(
        body.projection_type,
        body.subscriber_type,
        body.subscriber_id,
        body.batch_size.unwrap_or(100),
    );
    match state.subscriptions.create(subscription.clone()) {
        Ok(()) => (StatusCode::CREATED, Json(json!(subscription))).into_response(),
        Err(e) => subscription_error_response(e),
    }
}

pub async fn get(
    Extension(state): Extension<Arc<AppState>>,
    Path((projection_type, subscriber_id)): Path<(String, String)>,
) -> Response {
    match state.subscriptions.get(&projection_type, &subscriber_id) {
        Some(subscription) => Json(json!(subscription)).into_response(),
        None => json_error(
            StatusCode::NOT_FOUND,
            "subscription_not_found",
            format!("subscription {projection_type}/{subscriber_id} not found"),
        ),
    }
}

pub async fn pause(
    Extension(state): Extension<Arc<AppState>>,
    Path((projection_type, subscriber_id)): Path<(String, String)>,
) -> Response {
    transition_response(&state, &projection_type, &subscriber_id, state.subscriptions.pause(&projection_type, &subscriber_id))
}

pub async fn resume(
    Extension(state): Extension<Arc<AppState>>,
    Path((projection_type, subscriber_id)): Path<(String, String)>,
) -> Response {
    transition_response(&state, &projection_type, &subscriber_id, state.subscriptions.resume(&projection_type, &subscriber_id))
}

fn transition_response(
    state: &AppState,
    projection_type: &str,
    subscriber_id: &str,
    result: Result<(), ledgerflow_projections::SubscriptionError>,
) -> Response {
    match result {
        Ok(()) => match state.subscriptions.get(projection_type, subscriber_id) {
            Some(subscription) => Json(json!(subscription)).into_response(),
            None => json_error(StatusCode::NOT_FOUND, "subscription_not_found", "subscription vanished mid-transition"),
        },
        Err(e) => subscription_error_response(e),
    }
}

/// Transitions the subscription to `resetting`, replays the full event log
/// through its projection, then transitions it back to `active` — a
/// synchronous stand-in for what would otherwise be a background rebuild
/// job per subscriber.
pub async fn reset(
    Extension(state): Extension<Arc<AppState>>,
    Path((projection_type, subscriber_id)): Path<(String, String)>,
) -> Response {
    if let Err(e) = state.subscriptions.begin_reset(&projection_type, &subscriber_id) {
        return subscription_error_response(e);
    }

    let handle = RebuildHandle::new(projection_type.clone());
    let event_store = state.runtime.event_store.clone();
    let fetch_batch = |cursor: u64, limit: u32| -> Vec<ledgerflow_events::StoredEvent> {
        let after = if cursor == 0 { None } else { Some(cursor) };
        event_store
            .read_stream(after, Some(limit), None)
            .map(|page| page.events)
            .unwrap_or_default()
    };

    let outcome = run_rebuild(
        state.runtime.projections.as_ref(),
        &projection_type,
        &handle,
        500,
        fetch_batch,
        || (),
        |_tx| {},
        state.runtime.dead_letters.as_ref(),
    );

    if let Err(e) = state.subscriptions.end_reset(&projection_type, &subscriber_id) {
        return subscription_error_response(e);
    }

    Json(json!({
        "projection_type": projection_type,
        "subscriber_id": subscriber_id,
        "events_processed": outcome.events_processed,
        "dead_lettered": outcome.dead_lettered,
    }))
    .into_response()
}
