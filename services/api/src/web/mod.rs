pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

use axum::{
    routing::{get, post, put},
    Router,
};
use rest::*;
use state::AppState;
use std::sync::Arc;

pub use ws_handler::ws_handler;

/// Builds the API router. CORS and Swagger UI are layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/state", get(get_state_handler))
        .route(
            "/stats",
            get(get_stats_handler).patch(update_stats_handler),
        )
        .route("/stats/allocate", post(allocate_stat_handler))
        .route("/onboarding", post(complete_onboarding_handler))
        .route("/quests", post(create_quest_handler))
        .route(
            "/quests/{id}",
            put(edit_quest_handler).delete(delete_quest_handler),
        )
        .route("/quests/{id}/toggle", post(toggle_quest_handler))
        .route("/habits", post(create_habit_handler))
        .route(
            "/habits/{id}",
            put(edit_habit_handler).delete(delete_habit_handler),
        )
        .route("/habits/{id}/toggle", post(toggle_habit_handler))
        .route("/skills/{node_id}/start", post(start_skill_handler))
        .route("/skills/{node_id}/cancel", post(cancel_skill_handler))
        .route("/skills/{node_id}/tasks", post(toggle_skill_task_handler))
        .route("/skills/paths/{path_id}/nodes", post(create_skill_node_handler))
        .route(
            "/skills/nodes/{node_id}",
            put(edit_skill_node_handler).delete(delete_skill_node_handler),
        )
        .route("/journal", post(create_journal_handler))
        .route(
            "/journal/{id}",
            put(edit_journal_handler).delete(delete_journal_handler),
        )
        .route(
            "/session",
            post(start_session_handler).delete(end_session_handler),
        )
        .route("/sync/status", get(sync_status_handler))
        .route("/ws", get(ws_handler))
        .with_state(app_state)
}
