use crate::engine::RoundPhase;
use crate::money::Credits;

/// Table, seed and parameter problems. Always fatal for the call that hit them.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("malformed seed: {0}")]
    MalformedSeed(&'static str),
    #[error("weighted table `{0}` is empty")]
    EmptyTable(&'static str),
    #[error("weighted table `{table}` has a zero weight at position {index}")]
    ZeroWeight { table: &'static str, index: usize },
    #[error("probability `{name}` must lie in [0, 1], got {value}")]
    Probability { name: &'static str, value: f64 },
    #[error("invalid parameter: {0}")]
    Invalid(String),
    #[error("could not parse engine params: {0}")]
    Parse(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: Credits, required: Credits },
    #[error("invalid bet {0}")]
    InvalidBet(Credits),
    #[error("bet is locked at {locked} while bonus mode is active")]
    BetLocked { locked: Credits },
    #[error("bonus mode is already active")]
    BonusAlreadyActive,
    #[error("a round is in progress ({0:?})")]
    RoundInProgress(RoundPhase),
}

pub type EngineResult<T> = Result<T, EngineError>;
