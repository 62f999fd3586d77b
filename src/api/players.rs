//! Roster and broadcast endpoints.
//!
//! These let an operator drive the engine without a game server attached:
//! players join the in-memory roster, broadcasts land in their outbox.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::audience::{Audience, OnlinePlayer, PermissionTier, RecipientId, SquadId, TeamTag};
use crate::broadcast::{BroadcastResult, OutboxEntry};
use crate::error::{AppError, Result};
use crate::server::AppState;

use super::render::{convert_args, ArgValue};

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub team: Option<u8>,
    #[serde(default)]
    pub squad: Option<u32>,
    #[serde(default)]
    pub tier: PermissionTier,
}

#[derive(Debug, Deserialize)]
pub struct LanguageRequest {
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AudienceRequest {
    All,
    Team { team: u8 },
    Squad { squad: u32 },
    Tier { tier: PermissionTier },
    Recipients { ids: Vec<u64> },
}

impl From<AudienceRequest> for Audience {
    fn from(request: AudienceRequest) -> Self {
        match request {
            AudienceRequest::All => Audience::All,
            AudienceRequest::Team { team } => Audience::Team(TeamTag(team)),
            AudienceRequest::Squad { squad } => Audience::Squad(SquadId(squad)),
            AudienceRequest::Tier { tier } => Audience::Tier(tier),
            AudienceRequest::Recipients { ids } => {
                Audience::Recipients(ids.into_iter().map(RecipientId).collect())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub key: String,
    pub audience: AudienceRequest,
    #[serde(default)]
    pub args: Vec<ArgValue>,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub player_id: RecipientId,
    pub messages: Vec<OutboxEntry>,
}

/// POST /api/v1/players - Add a player to the roster
#[tracing::instrument(name = "http.join", skip(state, request), fields(player_id = request.id))]
pub async fn join_player(
    State(state): State<AppState>,
    Json(request): Json<JoinRequest>,
) -> (StatusCode, Json<OnlinePlayer>) {
    let mut player = OnlinePlayer::new(request.id, request.name).with_tier(request.tier);
    player.language = request.language;
    player.team = request.team.map(TeamTag);
    player.squad = request.squad.map(SquadId);

    let player = state.roster.join(player);
    (StatusCode::CREATED, Json((*player).clone()))
}

/// DELETE /api/v1/players/{id} - Remove a player
#[tracing::instrument(name = "http.leave", skip(state))]
pub async fn leave_player(State(state): State<AppState>, Path(id): Path<u64>) -> Result<StatusCode> {
    let id = RecipientId(id);
    state
        .roster
        .leave(id)
        .ok_or_else(|| AppError::NotFound(format!("Player {}", id)))?;
    state.outbox.clear(id);
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/players/{id}/language - Change a player's language preference
#[tracing::instrument(name = "http.set_language", skip(state, request))]
pub async fn set_language(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<LanguageRequest>,
) -> Result<StatusCode> {
    if state
        .roster
        .set_language(RecipientId(id), request.language.as_deref())
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Player {}", id)))
    }
}

/// GET /api/v1/players/{id}/messages - Messages delivered to a player
#[tracing::instrument(name = "http.messages", skip(state))]
pub async fn player_messages(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Json<MessagesResponse> {
    let player_id = RecipientId(id);
    Json(MessagesResponse {
        player_id,
        messages: state.outbox.messages(player_id),
    })
}

/// POST /api/v1/broadcast - Broadcast a template to an audience
#[tracing::instrument(name = "http.broadcast", skip(state, request), fields(template = %request.key))]
pub async fn broadcast(
    State(state): State<AppState>,
    Json(request): Json<BroadcastRequest>,
) -> Result<Json<BroadcastResult>> {
    let args = convert_args(request.args)?;
    if state.localizer.templates().by_key(&request.key).is_none() {
        return Err(AppError::NotFound(format!("Template '{}'", request.key)));
    }

    let audience = Audience::from(request.audience);
    let result = state
        .broadcaster
        .broadcast_key(state.roster.as_ref(), &audience, &request.key, &args);
    Ok(Json(result))
}
