use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use minedrop_core::{derive_hash_hex, Credits, Engine, EngineError, EngineParams, RoundState};
use minedrop_shared::{
    AdminSetParamsRequest, ApiError, ApiResult, BetResponse, BetStepRequest, BonusBuyRequest,
    BonusBuyResponse, ErrorBody, NewSessionRequest, RotateSeedRequest, RotateSeedResponse,
    SessionView, SpinRequest, SpinResponse, VerifyResponse, VerifyRoundRequest,
    VerifyRoundResponse,
};

const DEFAULT_SERVER_SEED: &str = "dev-server-seed";

struct Session {
    /// Params are fixed for a session's lifetime; `/admin/set-params` only affects new ones.
    engine: Arc<Engine>,
    round: RoundState,
    created_at: DateTime<Utc>,
}

impl Session {
    fn view(&self, id: u64) -> SessionView {
        SessionView::new(id, self.created_at, &self.round)
    }
}

struct AppState {
    api_key: String,
    engine: RwLock<Arc<Engine>>,
    server_seed: RwLock<String>,
    sessions: RwLock<HashMap<u64, Arc<Mutex<Session>>>>,
    next_id: AtomicU64,
}

impl AppState {
    fn new(api_key: String, server_seed: String, engine: Engine) -> Self {
        Self {
            api_key,
            engine: RwLock::new(Arc::new(engine)),
            server_seed: RwLock::new(server_seed),
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    async fn session(&self, id: u64) -> ApiResult<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(&id).cloned().ok_or(ApiError::NotFound(id))
    }

    fn authorize(&self, bearer: &Bearer) -> ApiResult<()> {
        if bearer.token() != self.api_key {
            return Err(ApiError::Unauthorized);
        }
        Ok(())
    }
}

struct HttpError(ApiError);

impl From<ApiError> for HttpError {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

impl From<EngineError> for HttpError {
    fn from(err: EngineError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ApiError::Invalid(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

type HttpResult<T> = Result<Json<T>, HttpError>;

fn parse_bet(bet: f64) -> ApiResult<Credits> {
    if !bet.is_finite() || bet <= 0.0 {
        return Err(ApiError::Invalid(format!("bet must be a positive amount, got {bet}")));
    }
    Ok(Credits::from_f64(bet))
}

async fn route_verify(State(state): State<Arc<AppState>>) -> Json<VerifyResponse> {
    let seed = state.server_seed.read().await;
    Json(VerifyResponse {
        server_seed_hash: derive_hash_hex(seed.as_bytes()),
    })
}

async fn route_new_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewSessionRequest>,
) -> HttpResult<SessionView> {
    let engine = state.engine.read().await.clone();
    let round = {
        let seed = state.server_seed.read().await;
        engine.new_session(&seed, &req.client_seed)?
    };
    let id = state.next_id.fetch_add(1, Ordering::Relaxed);
    let session = Session {
        engine,
        round,
        created_at: Utc::now(),
    };
    let view = session.view(id);
    state.sessions.write().await.insert(id, Arc::new(Mutex::new(session)));
    info!(session = id, "session created");
    Ok(Json(view))
}

async fn route_get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> HttpResult<SessionView> {
    let session = state.session(id).await?;
    let guard = session.lock().await;
    Ok(Json(guard.view(id)))
}

async fn route_spin(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(req): Json<SpinRequest>,
) -> HttpResult<SpinResponse> {
    let bet = parse_bet(req.bet)?;
    let session = state.session(id).await?;
    let mut guard = session.lock().await;
    let Session { engine, round, .. } = &mut *guard;
    let outcome = engine.spin(round, bet)?;
    Ok(Json(SpinResponse::from((&outcome, &*round))))
}

async fn route_step_bet(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(req): Json<BetStepRequest>,
) -> HttpResult<BetResponse> {
    let session = state.session(id).await?;
    let mut guard = session.lock().await;
    let Session { engine, round, .. } = &mut *guard;
    let bet = engine.step_bet(round, req.direction)?;
    Ok(Json(BetResponse { bet: bet.as_f64() }))
}

async fn route_bonus_buy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(req): Json<BonusBuyRequest>,
) -> HttpResult<BonusBuyResponse> {
    let bet = parse_bet(req.bet)?;
    let session = state.session(id).await?;
    let mut guard = session.lock().await;
    let Session { engine, round, .. } = &mut *guard;
    let cost = engine.buy_bonus(round, bet)?;
    Ok(Json(BonusBuyResponse {
        cost: cost.as_f64(),
        balance: round.balance.as_f64(),
        bonus_spins_left: round.bonus.spins_left,
    }))
}

// Replays against the current params.
async fn route_verify_round(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRoundRequest>,
) -> HttpResult<VerifyRoundResponse> {
    let bet = parse_bet(req.bet)?;
    let engine = state.engine.read().await.clone();
    let replay = engine.verify_round(
        &req.server_seed,
        &req.client_seed,
        req.nonce,
        bet,
        req.bonus_mode,
        &req.grid,
    )?;
    Ok(Json(VerifyRoundResponse {
        payout: replay.total_payout.as_f64(),
        replay,
    }))
}

async fn route_admin_set_params(
    State(state): State<Arc<AppState>>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(req): Json<AdminSetParamsRequest>,
) -> Result<StatusCode, HttpError> {
    state.authorize(&bearer)?;
    let engine = Engine::new(req.params).map_err(|e| ApiError::Invalid(e.to_string()))?;
    *state.engine.write().await = Arc::new(engine);
    info!("engine params replaced");
    Ok(StatusCode::NO_CONTENT)
}

async fn route_admin_rotate_seed(
    State(state): State<Arc<AppState>>,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    Json(req): Json<RotateSeedRequest>,
) -> HttpResult<RotateSeedResponse> {
    state.authorize(&bearer)?;
    if req.new_seed.is_empty() {
        return Err(ApiError::Invalid("new_seed must not be empty".into()).into());
    }
    let new_seed_hash = derive_hash_hex(req.new_seed.as_bytes());
    let revealed_seed = std::mem::replace(&mut *state.server_seed.write().await, req.new_seed);
    info!(new_seed_hash = %new_seed_hash, "server seed rotated");
    Ok(Json(RotateSeedResponse {
        revealed_seed_hash: derive_hash_hex(revealed_seed.as_bytes()),
        revealed_seed,
        new_seed_hash,
    }))
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/verify", get(route_verify))
        .route("/verify-round", post(route_verify_round))
        .route("/session", post(route_new_session))
        .route("/session/:id", get(route_get_session))
        .route("/session/:id/spin", post(route_spin))
        .route("/session/:id/bet", post(route_step_bet))
        .route("/session/:id/bonus-buy", post(route_bonus_buy))
        .route("/admin/set-params", post(route_admin_set_params))
        .route("/admin/rotate-seed", post(route_admin_rotate_seed))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

fn load_params() -> anyhow::Result<EngineParams> {
    let Ok(path) = std::env::var("PARAMS_PATH") else {
        return Ok(EngineParams::default());
    };
    let json = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let params = EngineParams::from_json_str(&json).with_context(|| format!("parsing {path}"))?;
    info!(path, "loaded engine params");
    Ok(params)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let engine = Engine::new(load_params()?)?;
    let server_seed = std::env::var("SERVER_SEED").unwrap_or_else(|_| {
        warn!("SERVER_SEED not set, using the development seed");
        DEFAULT_SERVER_SEED.to_string()
    });
    info!(server_seed_hash = %derive_hash_hex(server_seed.as_bytes()), "committed to server seed");

    let state = Arc::new(AppState::new(
        std::env::var("API_KEY").unwrap_or_else(|_| "dev-key".into()),
        server_seed,
        engine,
    ));

    let addr = std::env::var("BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {addr}");
    axum::serve(listener, app(state)).await?;
    Ok(())
}
