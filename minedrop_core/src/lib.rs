pub mod blocks;
pub mod engine;
pub mod error;
pub mod generate;
pub mod money;
pub mod params;
pub mod paytable;
pub mod resolver;
pub mod rng;
pub mod sampler;
pub mod symbols;

pub use crate::blocks::{
    Block, BlockId, BlockKind, BlockStats, Grid, Position, CHEST_ROW, COLUMNS, GRID_ROWS,
};
pub use crate::engine::{
    new_session, BetStep, BonusState, Engine, RoundPhase, RoundReplay, RoundState, SpinOutcome,
};
pub use crate::error::{ConfigError, EngineError, EngineResult};
pub use crate::generate::{
    generate_chest_multipliers, generate_column, generate_initial_grid, generate_reel, refill,
};
pub use crate::money::{Credits, Multiplier};
pub use crate::params::{BonusRules, EngineParams, Stratum};
pub use crate::paytable::{BlockStatTable, PickaxePower, WinTier};
pub use crate::resolver::{
    column_power, resolve_column, BlockEvent, ColumnOutcome, ColumnRequest, DestroyCause,
};
pub use crate::rng::{
    derive_floats, derive_hash_hex, FairStream, ProvablyFairRng, RandomSource, SeedPair,
    SequenceSource,
};
pub use crate::sampler::{WeightedEntry, WeightedTable};
pub use crate::symbols::{PickaxeTier, Reel, ReelCell, ReelColumn, SpecialSymbol, REEL_ROWS};
