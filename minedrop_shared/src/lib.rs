use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use minedrop_core::{
    BetStep, Block, BlockKind, ColumnOutcome, EngineError, EngineParams, Grid, Multiplier,
    RoundReplay, RoundState, SpinOutcome, WinTier,
};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NewSessionRequest {
    pub client_seed: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SpinRequest {
    pub bet: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BonusBuyRequest {
    pub bet: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BetStepRequest {
    pub direction: BetStep,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BlockView {
    pub id: String,
    pub kind: BlockKind,
    pub current_hp: u32,
    pub max_hp: u32,
    pub payout_multiplier: f64,
    pub destroyed: bool,
    pub has_chest: bool,
    pub chest_value: f64,
}

impl From<&Block> for BlockView {
    fn from(block: &Block) -> Self {
        Self {
            id: block.id().to_string(),
            kind: block.kind(),
            current_hp: block.current_hp(),
            max_hp: block.max_hp(),
            payout_multiplier: block.payout().as_f64(),
            destroyed: block.is_destroyed(),
            has_chest: block.has_chest(),
            chest_value: block.chest_value().as_f64(),
        }
    }
}

/// Column-major block views.
pub fn grid_view(grid: &Grid) -> Vec<Vec<BlockView>> {
    grid.columns()
        .iter()
        .map(|column| column.iter().map(BlockView::from).collect())
        .collect()
}

/// What a player may see of their session. Never carries the server seed.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionView {
    pub session_id: u64,
    pub created_at: DateTime<Utc>,
    pub client_seed: String,
    pub server_seed_hash: String,
    pub nonce: u64,
    pub balance: f64,
    pub bet: f64,
    pub bonus_active: bool,
    pub bonus_spins_left: u32,
    pub last_win: f64,
    pub total_session_win: f64,
    pub reels: Vec<Vec<u8>>, // symbol indices, column-major
    pub grid: Vec<Vec<BlockView>>,
}

impl SessionView {
    pub fn new(session_id: u64, created_at: DateTime<Utc>, state: &RoundState) -> Self {
        Self {
            session_id,
            created_at,
            client_seed: state.seeds.client_seed.clone(),
            server_seed_hash: state.server_seed_hash.clone(),
            nonce: state.nonce,
            balance: state.balance.as_f64(),
            bet: state.bet.as_f64(),
            bonus_active: state.bonus.active,
            bonus_spins_left: state.bonus.spins_left,
            last_win: state.last_win.as_f64(),
            total_session_win: state.total_session_win.as_f64(),
            reels: state
                .reels
                .iter()
                .map(|column| column.iter().map(|cell| cell.to_index()).collect())
                .collect(),
            grid: grid_view(&state.grid),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SpinResponse {
    pub server_seed_hash: String,
    pub nonce: u64,
    pub bet: f64,
    pub free_spin: bool,
    pub payout: f64,
    pub win_tier: WinTier,
    pub chests: Vec<f64>,
    pub columns: Vec<ColumnOutcome>,
    pub bonus_triggered: bool,
    pub bonus_ended: bool,
    pub bonus_spins_left: u32,
    pub balance: f64,
    /// The grid the next round starts from; pass it back to `/verify-round`.
    pub next_grid: Grid,
}

impl From<(&SpinOutcome, &RoundState)> for SpinResponse {
    fn from((outcome, state): (&SpinOutcome, &RoundState)) -> Self {
        Self {
            server_seed_hash: outcome.server_seed_hash.clone(),
            nonce: outcome.nonce,
            bet: outcome.bet.as_f64(),
            free_spin: outcome.free_spin,
            payout: outcome.total_payout.as_f64(),
            win_tier: outcome.win_tier,
            chests: outcome.chests.iter().map(|m: &Multiplier| m.as_f64()).collect(),
            columns: outcome.columns.clone(),
            bonus_triggered: outcome.bonus_triggered,
            bonus_ended: outcome.bonus_ended,
            bonus_spins_left: outcome.bonus_spins_left,
            balance: outcome.balance_after.as_f64(),
            next_grid: state.grid.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BonusBuyResponse {
    pub cost: f64,
    pub balance: f64,
    pub bonus_spins_left: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BetResponse {
    pub bet: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerifyResponse {
    pub server_seed_hash: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerifyRoundRequest {
    pub server_seed: String,
    pub client_seed: String,
    pub nonce: u64,
    pub bet: f64,
    #[serde(default)]
    pub bonus_mode: bool,
    pub grid: Grid,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerifyRoundResponse {
    pub payout: f64,
    pub replay: RoundReplay,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdminSetParamsRequest {
    pub params: EngineParams,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RotateSeedRequest {
    pub new_seed: String,
}

/// The retired seed is revealed so past rounds can be audited.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RotateSeedResponse {
    pub revealed_seed: String,
    pub revealed_seed_hash: String,
    pub new_seed_hash: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("session {0} not found")]
    NotFound(u64),
    #[error("unauthorized")]
    Unauthorized,
    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: f64, required: f64 },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal server error")]
    Internal,
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InsufficientFunds { balance, required } => ApiError::InsufficientFunds {
                balance: balance.as_f64(),
                required: required.as_f64(),
            },
            EngineError::BonusAlreadyActive
            | EngineError::BetLocked { .. }
            | EngineError::RoundInProgress(_) => ApiError::Conflict(err.to_string()),
            EngineError::Configuration(_) | EngineError::InvalidBet(_) => {
                ApiError::Invalid(err.to_string())
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorBody {
    pub error: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use minedrop_core::{Credits, Engine, EngineParams};

    #[test]
    fn session_view_hides_server_seed() {
        let engine = Engine::new(EngineParams::default()).unwrap();
        let state = engine.new_session("very-secret", "player").unwrap();
        let view = SessionView::new(1, Utc::now(), &state);
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("very-secret"));
        assert_eq!(view.grid.len(), 5);
        assert_eq!(view.grid[0].len(), 6);
        assert_eq!(view.balance, 1000.0);
    }

    #[test]
    fn engine_errors_map_to_api_errors() {
        let err: ApiError = EngineError::InsufficientFunds {
            balance: Credits::cents(50),
            required: Credits::whole(1),
        }
        .into();
        assert!(matches!(
            err,
            ApiError::InsufficientFunds { balance, required } if balance == 0.5 && required == 1.0
        ));
        assert!(matches!(
            ApiError::from(EngineError::BonusAlreadyActive),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(EngineError::BetLocked {
                locked: Credits::whole(1)
            }),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(EngineError::InvalidBet(Credits::ZERO)),
            ApiError::Invalid(_)
        ));
    }
}
