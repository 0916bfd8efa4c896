//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::sync::SyncStatus;
use crate::web::state::AppState;
use ascendant_core::level::level_progress;
use ascendant_core::{
    Ability, Difficulty, JournalDraft, Mood, NodeStatus, Polarity, ProfileSnapshot, ProgressError,
    QuestDraft, Reconciliation, SkillNodeDraft, StatsUpdate,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        get_state_handler,
        get_stats_handler,
        update_stats_handler,
        allocate_stat_handler,
        complete_onboarding_handler,
        create_quest_handler,
        edit_quest_handler,
        delete_quest_handler,
        toggle_quest_handler,
        create_habit_handler,
        edit_habit_handler,
        delete_habit_handler,
        toggle_habit_handler,
        start_skill_handler,
        cancel_skill_handler,
        toggle_skill_task_handler,
        create_skill_node_handler,
        edit_skill_node_handler,
        delete_skill_node_handler,
        create_journal_handler,
        edit_journal_handler,
        delete_journal_handler,
        start_session_handler,
        end_session_handler,
        sync_status_handler,
    ),
    components(
        schemas(
            StateResponse, StatsPatch, AllocateRequest, AllocateResponse, OnboardingRequest,
            QuestRequest, ToggleResponse, SkillTaskRequest, SkillStatusResponse,
            SkillNodeRequest, JournalRequest, SessionRequest, SessionResponse, SyncStatus
        )
    ),
    tags(
        (
            name = "Ascendant API",
            description = "Player progression, quests, skill tree and cloud sync."
        )
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

type HandlerError = (StatusCode, String);

fn progress_error(e: ProgressError) -> HandlerError {
    let status = match &e {
        ProgressError::NotFound(_) => StatusCode::NOT_FOUND,
        ProgressError::Validation(_) => StatusCode::BAD_REQUEST,
        ProgressError::InvalidState(_) | ProgressError::InsufficientPoints => StatusCode::CONFLICT,
    };
    warn!("Request rejected ({}): {}", status, e);
    (status, e.to_string())
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The whole progression state plus values derived from it.
#[derive(Serialize, ToSchema)]
pub struct StateResponse {
    #[schema(value_type = Object)]
    pub snapshot: ProfileSnapshot,
    pub xp_into_level: u64,
    pub level_span: u64,
    pub xp_multiplier_percent: u32,
    pub completed_xp_today: u64,
    #[schema(value_type = Object)]
    pub node_statuses: BTreeMap<String, NodeStatus>,
}

/// Partial stats update. Level, title and next-level XP are always derived.
#[derive(Deserialize, ToSchema, Default)]
#[serde(default)]
pub struct StatsPatch {
    pub name: Option<String>,
    /// Clamped to 1,000,000,000,000.
    pub xp: Option<u64>,
    pub strength: Option<u32>,
    pub agility: Option<u32>,
    pub vitality: Option<u32>,
    pub intelligence: Option<u32>,
    pub concentration: Option<u32>,
    pub streak: Option<u32>,
    pub skill_points: Option<u32>,
}

impl From<StatsPatch> for StatsUpdate {
    fn from(p: StatsPatch) -> Self {
        StatsUpdate {
            name: p.name,
            xp: p.xp,
            strength: p.strength,
            agility: p.agility,
            vitality: p.vitality,
            intelligence: p.intelligence,
            concentration: p.concentration,
            streak: p.streak,
            skill_points: p.skill_points,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct AllocateRequest {
    #[schema(value_type = String, example = "strength")]
    pub ability: Ability,
}

#[derive(Serialize, ToSchema)]
pub struct AllocateResponse {
    #[schema(value_type = String)]
    pub ability: Ability,
    pub value: u32,
    pub available_stat_points: u32,
}

#[derive(Deserialize, ToSchema)]
pub struct OnboardingRequest {
    pub name: String,
}

/// Body for creating or editing a quest or habit.
#[derive(Deserialize, ToSchema)]
pub struct QuestRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Defaults to the difficulty's XP when omitted.
    #[serde(default)]
    pub xp_value: Option<u32>,
    #[serde(default)]
    #[schema(value_type = String, example = "good")]
    pub polarity: Polarity,
    #[serde(default)]
    pub recurring: bool,
    #[serde(default)]
    #[schema(value_type = String, example = "normal")]
    pub difficulty: Difficulty,
}

impl From<QuestRequest> for QuestDraft {
    fn from(r: QuestRequest) -> Self {
        QuestDraft {
            title: r.title,
            description: r.description,
            xp_value: r.xp_value,
            polarity: r.polarity,
            recurring: r.recurring,
            difficulty: r.difficulty,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ToggleResponse {
    pub id: Uuid,
    pub completed: bool,
    pub xp: u64,
    pub level: u32,
}

#[derive(Deserialize, ToSchema)]
pub struct SkillTaskRequest {
    pub task: String,
}

#[derive(Serialize, ToSchema)]
pub struct SkillStatusResponse {
    pub node_id: String,
    #[schema(value_type = String, example = "active")]
    pub status: NodeStatus,
}

#[derive(Deserialize, ToSchema)]
pub struct SkillNodeRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub tasks: Vec<String>,
    /// Zero or omitted uses the default reward.
    #[serde(default)]
    pub xp_reward: u32,
}

impl From<SkillNodeRequest> for SkillNodeDraft {
    fn from(r: SkillNodeRequest) -> Self {
        SkillNodeDraft {
            name: r.name,
            description: r.description,
            tasks: r.tasks,
            xp_reward: r.xp_reward,
        }
    }
}

#[derive(Deserialize, ToSchema, Default)]
#[serde(default)]
pub struct JournalRequest {
    pub title: String,
    pub content: String,
    #[schema(value_type = String, example = "neutral")]
    pub mood: Mood,
    pub tags: Vec<String>,
}

impl From<JournalRequest> for JournalDraft {
    fn from(r: JournalRequest) -> Self {
        JournalDraft {
            title: r.title,
            content: r.content,
            mood: r.mood,
            tags: r.tags,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SessionRequest {
    pub user_id: Uuid,
}

#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub sync_enabled: bool,
    /// `restored` or `cleared`; absent when local-only or the pull failed.
    pub reconciliation: Option<String>,
    pub warning: Option<String>,
}

//=========================================================================================
// State and Stats Handlers
//=========================================================================================

/// Fetch the full progression state.
#[utoipa::path(
    get,
    path = "/state",
    responses((status = 200, description = "Current state", body = StateResponse))
)]
pub async fn get_state_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut store = app_state.store.lock().await;
    store.roll_over_day();

    let node_statuses = store
        .skill_tree()
        .paths
        .iter()
        .flat_map(|p| p.nodes.iter())
        .filter_map(|n| store.node_status(&n.id).map(|s| (n.id.clone(), s)))
        .collect();
    let (xp_into_level, level_span) = level_progress(store.stats().xp);

    Json(StateResponse {
        snapshot: store.snapshot(),
        xp_into_level,
        level_span,
        xp_multiplier_percent: store.xp_multiplier_percent(),
        completed_xp_today: store.completed_xp_today(),
        node_statuses,
    })
}

#[utoipa::path(
    get,
    path = "/stats",
    responses((status = 200, description = "Current player stats"))
)]
pub async fn get_stats_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let store = app_state.store.lock().await;
    Json(store.stats().clone())
}

/// Merge a partial stats update.
#[utoipa::path(
    patch,
    path = "/stats",
    request_body = StatsPatch,
    responses((status = 200, description = "Updated stats"))
)]
pub async fn update_stats_handler(
    State(app_state): State<Arc<AppState>>,
    Json(patch): Json<StatsPatch>,
) -> Result<impl IntoResponse, HandlerError> {
    let stats = app_state
        .mutate(|store| {
            store.update_stats(patch.into());
            Ok(store.stats().clone())
        })
        .await
        .map_err(progress_error)?;
    Ok(Json(stats))
}

/// Spend one available stat point.
#[utoipa::path(
    post,
    path = "/stats/allocate",
    request_body = AllocateRequest,
    responses(
        (status = 200, description = "Point spent", body = AllocateResponse),
        (status = 409, description = "No points available")
    )
)]
pub async fn allocate_stat_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<AllocateRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let response = app_state
        .mutate(|store| {
            let value = store.allocate_stat_point(req.ability)?;
            Ok(AllocateResponse {
                ability: req.ability,
                value,
                available_stat_points: store.stats().available_stat_points,
            })
        })
        .await
        .map_err(progress_error)?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/onboarding",
    request_body = OnboardingRequest,
    responses(
        (status = 200, description = "Onboarding complete"),
        (status = 400, description = "Empty name")
    )
)]
pub async fn complete_onboarding_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<OnboardingRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let stats = app_state
        .mutate(|store| {
            store.complete_onboarding(&req.name)?;
            Ok(store.stats().clone())
        })
        .await
        .map_err(progress_error)?;
    Ok(Json(stats))
}

//=========================================================================================
// Quest and Habit Handlers
//=========================================================================================

#[utoipa::path(
    post,
    path = "/quests",
    request_body = QuestRequest,
    responses(
        (status = 201, description = "Quest created"),
        (status = 400, description = "Invalid quest")
    )
)]
pub async fn create_quest_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<QuestRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let quest = app_state
        .mutate(|store| store.add_quest(req.into()))
        .await
        .map_err(progress_error)?;
    Ok((StatusCode::CREATED, Json(quest)))
}

#[utoipa::path(
    put,
    path = "/quests/{id}",
    request_body = QuestRequest,
    params(("id" = Uuid, Path, description = "Quest id")),
    responses(
        (status = 200, description = "Quest updated"),
        (status = 404, description = "Unknown quest")
    )
)]
pub async fn edit_quest_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<QuestRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let quest = app_state
        .mutate(|store| store.edit_quest(id, req.into()))
        .await
        .map_err(progress_error)?;
    Ok(Json(quest))
}

#[utoipa::path(
    delete,
    path = "/quests/{id}",
    params(("id" = Uuid, Path, description = "Quest id")),
    responses(
        (status = 204, description = "Quest deleted"),
        (status = 404, description = "Unknown quest")
    )
)]
pub async fn delete_quest_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    app_state
        .mutate(|store| store.delete_quest(id))
        .await
        .map_err(progress_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle(app_state: &AppState, id: Uuid) -> Result<ToggleResponse, HandlerError> {
    app_state
        .mutate(|store| {
            let completed = store.toggle_quest_or_habit(id)?;
            Ok(ToggleResponse {
                id,
                completed,
                xp: store.stats().xp,
                level: store.stats().level,
            })
        })
        .await
        .map_err(progress_error)
}

/// Complete or un-complete a quest for today.
#[utoipa::path(
    post,
    path = "/quests/{id}/toggle",
    params(("id" = Uuid, Path, description = "Quest id")),
    responses(
        (status = 200, description = "Toggled", body = ToggleResponse),
        (status = 404, description = "Unknown quest")
    )
)]
pub async fn toggle_quest_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    Ok(Json(toggle(&app_state, id).await?))
}

#[utoipa::path(
    post,
    path = "/habits",
    request_body = QuestRequest,
    responses(
        (status = 201, description = "Habit created"),
        (status = 400, description = "Invalid habit")
    )
)]
pub async fn create_habit_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<QuestRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let habit = app_state
        .mutate(|store| store.add_habit(req.into()))
        .await
        .map_err(progress_error)?;
    Ok((StatusCode::CREATED, Json(habit)))
}

#[utoipa::path(
    put,
    path = "/habits/{id}",
    request_body = QuestRequest,
    params(("id" = Uuid, Path, description = "Habit id")),
    responses(
        (status = 200, description = "Habit updated"),
        (status = 404, description = "Unknown habit")
    )
)]
pub async fn edit_habit_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<QuestRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let habit = app_state
        .mutate(|store| store.edit_habit(id, req.into()))
        .await
        .map_err(progress_error)?;
    Ok(Json(habit))
}

#[utoipa::path(
    delete,
    path = "/habits/{id}",
    params(("id" = Uuid, Path, description = "Habit id")),
    responses(
        (status = 204, description = "Habit deleted"),
        (status = 404, description = "Unknown habit")
    )
)]
pub async fn delete_habit_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    app_state
        .mutate(|store| store.delete_habit(id))
        .await
        .map_err(progress_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/habits/{id}/toggle",
    params(("id" = Uuid, Path, description = "Habit id")),
    responses(
        (status = 200, description = "Toggled", body = ToggleResponse),
        (status = 404, description = "Unknown habit")
    )
)]
pub async fn toggle_habit_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    Ok(Json(toggle(&app_state, id).await?))
}

//=========================================================================================
// Skill Tree Handlers
//=========================================================================================

#[utoipa::path(
    post,
    path = "/skills/{node_id}/start",
    params(("node_id" = String, Path, description = "Skill node id")),
    responses(
        (status = 200, description = "Node is now active", body = SkillStatusResponse),
        (status = 404, description = "Unknown node"),
        (status = 409, description = "Node is locked, active or mastered")
    )
)]
pub async fn start_skill_handler(
    State(app_state): State<Arc<AppState>>,
    Path(node_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    app_state
        .mutate(|store| store.start_skill_quest(&node_id))
        .await
        .map_err(progress_error)?;
    Ok(Json(SkillStatusResponse {
        node_id,
        status: NodeStatus::Active,
    }))
}

#[utoipa::path(
    post,
    path = "/skills/{node_id}/cancel",
    params(("node_id" = String, Path, description = "Skill node id")),
    responses(
        (status = 200, description = "Progress discarded", body = SkillStatusResponse),
        (status = 409, description = "Node is not active")
    )
)]
pub async fn cancel_skill_handler(
    State(app_state): State<Arc<AppState>>,
    Path(node_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    app_state
        .mutate(|store| store.cancel_skill_quest(&node_id))
        .await
        .map_err(progress_error)?;
    Ok(Json(SkillStatusResponse {
        node_id,
        status: NodeStatus::Unlocked,
    }))
}

/// Toggle one task of an active node.
#[utoipa::path(
    post,
    path = "/skills/{node_id}/tasks",
    request_body = SkillTaskRequest,
    params(("node_id" = String, Path, description = "Skill node id")),
    responses(
        (status = 200, description = "Status after the toggle", body = SkillStatusResponse),
        (status = 404, description = "Unknown node or task"),
        (status = 409, description = "Node is not active")
    )
)]
pub async fn toggle_skill_task_handler(
    State(app_state): State<Arc<AppState>>,
    Path(node_id): Path<String>,
    Json(req): Json<SkillTaskRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let status = app_state
        .mutate(|store| store.toggle_skill_task(&node_id, &req.task))
        .await
        .map_err(progress_error)?;
    Ok(Json(SkillStatusResponse { node_id, status }))
}

#[utoipa::path(
    post,
    path = "/skills/paths/{path_id}/nodes",
    request_body = SkillNodeRequest,
    params(("path_id" = String, Path, description = "Skill path id")),
    responses(
        (status = 201, description = "Custom node added"),
        (status = 400, description = "Invalid node"),
        (status = 404, description = "Unknown path")
    )
)]
pub async fn create_skill_node_handler(
    State(app_state): State<Arc<AppState>>,
    Path(path_id): Path<String>,
    Json(req): Json<SkillNodeRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let node = app_state
        .mutate(|store| store.add_custom_skill_node(&path_id, req.into()))
        .await
        .map_err(progress_error)?;
    Ok((StatusCode::CREATED, Json(node)))
}

#[utoipa::path(
    put,
    path = "/skills/nodes/{node_id}",
    request_body = SkillNodeRequest,
    params(("node_id" = String, Path, description = "Skill node id")),
    responses(
        (status = 200, description = "Node updated"),
        (status = 404, description = "Unknown node")
    )
)]
pub async fn edit_skill_node_handler(
    State(app_state): State<Arc<AppState>>,
    Path(node_id): Path<String>,
    Json(req): Json<SkillNodeRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let node = app_state
        .mutate(|store| store.edit_skill_node(&node_id, req.into()))
        .await
        .map_err(progress_error)?;
    Ok(Json(node))
}

#[utoipa::path(
    delete,
    path = "/skills/nodes/{node_id}",
    params(("node_id" = String, Path, description = "Skill node id")),
    responses(
        (status = 204, description = "Node deleted"),
        (status = 404, description = "Unknown node")
    )
)]
pub async fn delete_skill_node_handler(
    State(app_state): State<Arc<AppState>>,
    Path(node_id): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    app_state
        .mutate(|store| store.delete_skill_node(&node_id))
        .await
        .map_err(progress_error)?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Journal Handlers
//=========================================================================================

#[utoipa::path(
    post,
    path = "/journal",
    request_body = JournalRequest,
    responses(
        (status = 201, description = "Entry created"),
        (status = 400, description = "Empty entry")
    )
)]
pub async fn create_journal_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<JournalRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let entry = app_state
        .mutate(|store| store.add_journal_entry(req.into()))
        .await
        .map_err(progress_error)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[utoipa::path(
    put,
    path = "/journal/{id}",
    request_body = JournalRequest,
    params(("id" = Uuid, Path, description = "Journal entry id")),
    responses(
        (status = 200, description = "Entry updated"),
        (status = 404, description = "Unknown entry")
    )
)]
pub async fn edit_journal_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<JournalRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let entry = app_state
        .mutate(|store| store.edit_journal_entry(id, req.into()))
        .await
        .map_err(progress_error)?;
    Ok(Json(entry))
}

#[utoipa::path(
    delete,
    path = "/journal/{id}",
    params(("id" = Uuid, Path, description = "Journal entry id")),
    responses(
        (status = 204, description = "Entry deleted"),
        (status = 404, description = "Unknown entry")
    )
)]
pub async fn delete_journal_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    app_state
        .mutate(|store| store.delete_journal_entry(id))
        .await
        .map_err(progress_error)?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Session and Sync Handlers
//=========================================================================================

/// Start a session: pull the cloud profile and begin syncing.
///
/// Reconciliation is destructive. An onboarded cloud profile replaces local
/// state; otherwise local state is cleared.
#[utoipa::path(
    post,
    path = "/session",
    request_body = SessionRequest,
    responses((status = 200, description = "Session started", body = SessionResponse))
)]
pub async fn start_session_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<SessionRequest>,
) -> impl IntoResponse {
    let response = match app_state.start_session(req.user_id).await {
        Ok(outcome) => SessionResponse {
            user_id: req.user_id,
            sync_enabled: outcome.is_some(),
            reconciliation: outcome.map(|o| {
                match o {
                    Reconciliation::Restored => "restored",
                    Reconciliation::Cleared => "cleared",
                }
                .to_string()
            }),
            warning: None,
        },
        Err(e) => {
            error!("Session for {} started without sync: {}", req.user_id, e);
            SessionResponse {
                user_id: req.user_id,
                sync_enabled: false,
                reconciliation: None,
                warning: Some(format!("Cloud profile unavailable: {}", e)),
            }
        }
    };
    Json(response)
}

/// End the session: flush pending sync, then clear local state.
#[utoipa::path(
    delete,
    path = "/session",
    responses(
        (status = 204, description = "Session ended"),
        (status = 404, description = "No active session")
    )
)]
pub async fn end_session_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    if app_state.end_session().await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "No active session".to_string()))
    }
}

#[utoipa::path(
    get,
    path = "/sync/status",
    responses((status = 200, description = "Sync status", body = SyncStatus))
)]
pub async fn sync_status_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(app_state.sync_status.lock().await.clone())
}
