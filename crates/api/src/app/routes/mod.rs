//! Protected routes, merged under the auth middleware layer in `app::build_app`.

pub mod audit;
pub mod event_types;
pub mod intents;
pub mod projections;
pub mod subscriptions;
pub mod system;

use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router {
    Router::new()
        .route("/intents", post(intents::submit))
        .route("/intents/:id", get(intents::get_by_id))
        .route("/intents/:id/approve", post(intents::approve))
        .route("/intents/:id/reject", post(intents::reject))
        .route("/intents/:id/execute", post(intents::execute))
        .route("/projections/:name", get(projections::list))
        .route("/projections/:name/rebuild", post(projections::rebuild))
        .route("/projections/:name/snapshot", post(projections::snapshot))
        .route("/audit/events", get(audit::list_events))
        .route("/audit/events/:id", get(audit::get_event))
        .route("/subscriptions", post(subscriptions::create))
        .route("/subscriptions/:projection_type/:subscriber_id", get(subscriptions::get))
        .route("/subscriptions/:projection_type/:subscriber_id/pause", post(subscriptions::pause))
        .route("/subscriptions/:projection_type/:subscriber_id/resume", post(subscriptions::resume))
        .route("/subscriptions/:projection_type/:subscriber_id/reset", post(subscriptions::reset))
        .route("/event-types", get(event_types::list).post(event_types::register))
        .route("/event-types/:type_name/versions", get(event_types::list_versions))
        .route("/event-types/:type_name/:version", get(event_types::get_schema))
}
