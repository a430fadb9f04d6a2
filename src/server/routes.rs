use std::sync::Arc;

use axum::extract::Path;
use axum::middleware;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::game::{Address, ArchivedGame, GameEngine, GameStats, Player, Session, SessionId};
use crate::scenario::{Scenario, ScenarioId};

use super::dto::{
    ActiveSessionsResponse, AddTokensRequest, AddTokensResponse, CreateSessionResponse,
    FinalizeResponse, PlayerRequest, RegisterPlayerRequest, RegisterPlayerResponse,
    StatusResponse, VoteRequest,
};
use super::error::ApiError;
use super::logging::log_requests;

#[derive(Clone)]
pub struct ServerContext {
    pub engine: Arc<GameEngine>,
}

pub struct ChainAuditServer {
    router: Router,
}

impl ChainAuditServer {
    pub fn new(engine: Arc<GameEngine>) -> Self {
        let context = Arc::new(ServerContext { engine });

        let router = Router::new()
            .route("/players", post(register_player))
            .route("/players/:address", get(get_player))
            .route("/players/:address/tokens", post(add_tokens))
            .route("/players/:address/history", get(player_history))
            .route("/sessions", post(create_session).get(list_sessions))
            .route("/sessions/:id", get(get_session))
            .route("/sessions/:id/join", post(join_session))
            .route("/sessions/:id/start", post(start_session))
            .route("/sessions/:id/voting", post(start_voting))
            .route("/sessions/:id/votes", post(submit_vote))
            .route("/sessions/:id/finalize", post(finalize_session))
            .route("/archive/:id", get(get_archived_game))
            .route("/leaderboard", get(leaderboard))
            .route("/stats", get(stats))
            .route("/scenarios/:id", get(get_scenario))
            .layer(Extension(context))
            .layer(middleware::from_fn(log_requests))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http());

        Self { router }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

type Ctx = Extension<Arc<ServerContext>>;

async fn register_player(
    Extension(ctx): Ctx,
    Json(body): Json<RegisterPlayerRequest>,
) -> Result<Json<RegisterPlayerResponse>, ApiError> {
    if body.address.as_str().is_empty() {
        return Err(ApiError::bad_request("address must not be empty"));
    }
    let registered = ctx.engine.register_player(body.address, body.name).await?;
    Ok(Json(RegisterPlayerResponse { registered }))
}

async fn get_player(
    Extension(ctx): Ctx,
    Path(address): Path<Address>,
) -> Result<Json<Player>, ApiError> {
    ctx.engine
        .player(&address)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("player {address} not found")))
}

async fn add_tokens(
    Extension(ctx): Ctx,
    Path(address): Path<Address>,
    Json(body): Json<AddTokensRequest>,
) -> Result<Json<AddTokensResponse>, ApiError> {
    let credited = ctx.engine.add_tokens(&address, body.amount).await?;
    Ok(Json(AddTokensResponse { credited }))
}

async fn player_history(
    Extension(ctx): Ctx,
    Path(address): Path<Address>,
) -> Json<Vec<ArchivedGame>> {
    Json(ctx.engine.player_history(&address))
}

async fn create_session(
    Extension(ctx): Ctx,
    Json(body): Json<PlayerRequest>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let session_id = ctx.engine.create_session(&body.player).await?;
    Ok(Json(CreateSessionResponse { session_id }))
}

async fn list_sessions(Extension(ctx): Ctx) -> Json<ActiveSessionsResponse> {
    Json(ActiveSessionsResponse {
        sessions: ctx.engine.list_active_sessions(),
    })
}

async fn get_session(
    Extension(ctx): Ctx,
    Path(id): Path<SessionId>,
) -> Result<Json<Session>, ApiError> {
    ctx.engine
        .session(id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("session {id} not found")))
}

async fn join_session(
    Extension(ctx): Ctx,
    Path(id): Path<SessionId>,
    Json(body): Json<PlayerRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    ctx.engine.join_session(id, &body.player).await?;
    Ok(Json(StatusResponse::ok()))
}

async fn start_session(
    Extension(ctx): Ctx,
    Path(id): Path<SessionId>,
) -> Result<Json<StatusResponse>, ApiError> {
    ctx.engine.start_session(id).await?;
    Ok(Json(StatusResponse::ok()))
}

async fn start_voting(
    Extension(ctx): Ctx,
    Path(id): Path<SessionId>,
) -> Result<Json<StatusResponse>, ApiError> {
    ctx.engine.start_voting(id).await?;
    Ok(Json(StatusResponse::ok()))
}

async fn submit_vote(
    Extension(ctx): Ctx,
    Path(id): Path<SessionId>,
    Json(body): Json<VoteRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    ctx.engine.submit_vote(id, &body.voter, &body.target).await?;
    Ok(Json(StatusResponse::ok()))
}

async fn finalize_session(
    Extension(ctx): Ctx,
    Path(id): Path<SessionId>,
) -> Result<Json<FinalizeResponse>, ApiError> {
    let result = ctx.engine.finalize_session(id).await?;
    Ok(Json(FinalizeResponse {
        session_id: id,
        result,
    }))
}

async fn get_archived_game(
    Extension(ctx): Ctx,
    Path(id): Path<SessionId>,
) -> Result<Json<ArchivedGame>, ApiError> {
    ctx.engine
        .archived_game(id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("archived game {id} not found")))
}

async fn leaderboard(Extension(ctx): Ctx) -> Result<Json<Vec<Player>>, ApiError> {
    Ok(Json(ctx.engine.leaderboard().await?))
}

async fn stats(Extension(ctx): Ctx) -> Result<Json<GameStats>, ApiError> {
    Ok(Json(ctx.engine.stats().await?))
}

async fn get_scenario(
    Extension(ctx): Ctx,
    Path(id): Path<ScenarioId>,
) -> Result<Json<Scenario>, ApiError> {
    ctx.engine
        .scenario(id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("scenario {id} not found")))
}
