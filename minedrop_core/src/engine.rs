use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    blocks::{Grid, Position, COLUMNS},
    error::{ConfigError, EngineError, EngineResult},
    generate::{
        generate_chest_multipliers, generate_column, generate_initial_grid, generate_reel, refill,
    },
    money::{Credits, Multiplier},
    params::EngineParams,
    paytable::WinTier,
    resolver::{resolve_column, ColumnOutcome, ColumnRequest},
    rng::{FairStream, ProvablyFairRng, SeedPair},
    symbols::Reel,
};

/// Where a round stands. Outside of `Engine::spin` a session is always `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    Idle,
    AwaitingColumns(usize),
    Settling,
    BonusCheck,
    Refilling,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusState {
    pub active: bool,
    pub spins_left: u32,
    /// Bet every free spin is played at; zero outside bonus mode.
    pub bet: Credits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetStep {
    Up,
    Down,
}

/// Everything one player's session carries between rounds.
///
/// `seeds.server_seed` is secret until it is rotated out; hosts must not
/// hand this struct to players as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundState {
    pub balance: Credits,
    pub bet: Credits,
    pub grid: Grid,
    pub reels: Reel,
    pub bonus: BonusState,
    pub last_win: Credits,
    pub total_session_win: Credits,
    pub seeds: SeedPair,
    pub server_seed_hash: String,
    /// Round counter; the next round uses `nonce + 1`.
    pub nonce: u64,
    pub phase: RoundPhase,
}

impl RoundState {
    fn ensure_idle(&self) -> EngineResult<()> {
        match self.phase {
            RoundPhase::Idle => Ok(()),
            phase => Err(EngineError::RoundInProgress(phase)),
        }
    }

    /// Moves the current bet one step along `ladder`, clamped at both ends.
    pub fn step_bet(&mut self, ladder: &[Credits], step: BetStep) -> EngineResult<Credits> {
        self.ensure_idle()?;
        if self.bonus.active {
            return Err(EngineError::BetLocked {
                locked: self.bonus.bet,
            });
        }
        let Some(last) = ladder.len().checked_sub(1) else {
            return Err(ConfigError::Invalid("bet ladder is empty".into()).into());
        };
        let next = match ladder.iter().position(|&b| b == self.bet) {
            Some(i) => match step {
                BetStep::Up => (i + 1).min(last),
                BetStep::Down => i.saturating_sub(1),
            },
            // off-ladder bets snap to the nearest step in the requested direction
            None => match step {
                BetStep::Up => ladder.iter().position(|&b| b > self.bet).unwrap_or(last),
                BetStep::Down => ladder.iter().rposition(|&b| b < self.bet).unwrap_or(0),
            },
        };
        self.bet = ladder[next];
        Ok(self.bet)
    }
}

/// Result of one spin, ordered the way a presentation layer animates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpinOutcome {
    pub nonce: u64,
    pub bet: Credits,
    pub free_spin: bool,
    pub chests: [Multiplier; COLUMNS],
    pub columns: Vec<ColumnOutcome>,
    pub total_payout: Credits,
    pub total_eyes: u32,
    pub win_tier: WinTier,
    pub bonus_triggered: bool,
    pub bonus_ended: bool,
    pub bonus_spins_left: u32,
    pub balance_before: Credits,
    pub balance_after: Credits,
    pub refilled: Vec<Position>,
    pub draws: u64,
    pub server_seed_hash: String,
}

/// A round recomputed from disclosed seeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundReplay {
    pub nonce: u64,
    pub bet: Credits,
    pub bonus_mode: bool,
    pub chests: [Multiplier; COLUMNS],
    pub columns: Vec<ColumnOutcome>,
    pub total_payout: Credits,
    pub total_eyes: u32,
    /// Grid after the five columns resolved, before refill.
    pub resolved_grid: Grid,
    /// Grid the following round starts from.
    pub next_grid: Grid,
    pub draws: u64,
    pub server_seed_hash: String,
}

impl RoundReplay {
    /// Whether a recorded outcome is exactly what these seeds produce.
    pub fn agrees_with(&self, outcome: &SpinOutcome) -> bool {
        self.nonce == outcome.nonce
            && self.bet == outcome.bet
            && self.chests == outcome.chests
            && self.columns == outcome.columns
            && self.total_payout == outcome.total_payout
            && self.draws == outcome.draws
    }
}

struct ResolvedColumns {
    chests: [Multiplier; COLUMNS],
    columns: Vec<ColumnOutcome>,
    total_payout: Credits,
    total_eyes: u32,
}

/// A round resolved against a scratch grid, not yet applied to the session.
struct SettledRound {
    stream: FairStream,
    grid: Grid,
    resolved: ResolvedColumns,
    balance_after: Credits,
    total_session_win: Credits,
}

#[derive(Debug, Clone)]
pub struct Engine {
    params: EngineParams,
}

impl Engine {
    pub fn new(params: EngineParams) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    fn stream(seeds: &SeedPair, nonce: u64) -> EngineResult<FairStream> {
        Ok(ProvablyFairRng::new(seeds, nonce)?.stream())
    }

    /// Bets must be positive and no larger than the top of the ladder.
    fn check_bet(&self, bet: Credits) -> EngineResult<()> {
        if !bet.is_positive() || bet > self.params.max_bet() {
            return Err(EngineError::InvalidBet(bet));
        }
        Ok(())
    }

    /// A grid a round may start from: nothing destroyed, and every block's
    /// stats as the current tables define them.
    fn check_start_grid(&self, grid: &Grid) -> Result<(), ConfigError> {
        for pos in Grid::positions() {
            let block = grid.block(pos);
            if block.is_destroyed() {
                return Err(ConfigError::Invalid(format!(
                    "block {} is destroyed; a round starts from a refilled grid",
                    block.id()
                )));
            }
            let stats = self.params.blocks.get(block.kind());
            if block.max_hp() != stats.hp || block.payout() != stats.payout {
                return Err(ConfigError::Invalid(format!(
                    "block {} does not match the {:?} stats",
                    block.id(),
                    block.kind()
                )));
            }
        }
        Ok(())
    }

    /// Fresh session at nonce 0. The opening grid and reel come from the nonce-0 stream.
    pub fn new_session(&self, server_seed: &str, client_seed: &str) -> EngineResult<RoundState> {
        let seeds = SeedPair::new(server_seed, client_seed)?;
        let mut stream = Self::stream(&seeds, 0)?;
        let grid = generate_initial_grid(&self.params, &mut stream);
        let reels = generate_reel(&self.params, &mut stream);
        info!(client_seed, "session started");
        Ok(RoundState {
            balance: self.params.starting_balance,
            bet: self.params.default_bet,
            grid,
            reels,
            bonus: BonusState::default(),
            last_win: Credits::ZERO,
            total_session_win: Credits::ZERO,
            server_seed_hash: seeds.server_seed_hash_hex(),
            seeds,
            nonce: 0,
            phase: RoundPhase::Idle,
        })
    }

    /// Chest draws, then the five columns left to right. Each column sees the
    /// grid as the previous ones left it.
    fn resolve_columns(
        &self,
        grid: &mut Grid,
        stream: &mut FairStream,
        bet: Credits,
        bonus_mode: bool,
        phase: &mut RoundPhase,
    ) -> EngineResult<ResolvedColumns> {
        let chests = generate_chest_multipliers(&self.params, stream);
        let mut columns = Vec::with_capacity(COLUMNS);
        for x in 0..COLUMNS {
            *phase = RoundPhase::AwaitingColumns(x);
            let reel = generate_column(&self.params, stream);
            let request = ColumnRequest {
                x,
                reel,
                chest: chests[x],
                bet,
                bonus_mode,
            };
            columns.push(resolve_column(&self.params, grid, request)?);
        }
        let total_payout = Credits::checked_sum(columns.iter().map(|c| c.payout))
            .ok_or(EngineError::InvalidBet(bet))?;
        Ok(ResolvedColumns {
            chests,
            total_payout,
            total_eyes: columns.iter().map(|c| c.eyes).sum(),
            columns,
        })
    }

    /// Resolves round `nonce` on a copy of the grid and works out the new
    /// balance. Only `state.phase` is touched.
    fn settle(
        &self,
        state: &mut RoundState,
        bet: Credits,
        free_spin: bool,
        nonce: u64,
    ) -> EngineResult<SettledRound> {
        let mut stream = Self::stream(&state.seeds, nonce)?;
        let mut grid = state.grid.clone();
        let resolved =
            self.resolve_columns(&mut grid, &mut stream, bet, free_spin, &mut state.phase)?;

        state.phase = RoundPhase::Settling;
        let debit = if free_spin { Credits::ZERO } else { bet };
        let balance_after = state
            .balance
            .checked_sub(debit)
            .and_then(|b| b.checked_add(resolved.total_payout))
            .ok_or(EngineError::InvalidBet(bet))?;
        let total_session_win = state
            .total_session_win
            .checked_add(resolved.total_payout)
            .ok_or(EngineError::InvalidBet(bet))?;
        Ok(SettledRound {
            stream,
            grid,
            resolved,
            balance_after,
            total_session_win,
        })
    }

    /// Plays one round. Rejected spins leave `state` untouched.
    ///
    /// In bonus mode the round is free and must be played at the bet the
    /// bonus was bought or triggered at.
    pub fn spin(&self, state: &mut RoundState, bet: Credits) -> EngineResult<SpinOutcome> {
        state.ensure_idle()?;
        self.check_bet(bet)?;
        let free_spin = state.bonus.active;
        if free_spin && bet != state.bonus.bet {
            return Err(EngineError::BetLocked {
                locked: state.bonus.bet,
            });
        }
        if !free_spin && state.balance < bet {
            return Err(EngineError::InsufficientFunds {
                balance: state.balance,
                required: bet,
            });
        }
        let nonce = state.nonce + 1;
        let balance_before = state.balance;
        debug!(nonce, bet = %bet, free_spin, "round started");

        let settled = self.settle(state, bet, free_spin, nonce);
        let SettledRound {
            mut stream,
            grid,
            resolved,
            balance_after,
            total_session_win,
        } = match settled {
            Ok(settled) => settled,
            Err(err) => {
                state.phase = RoundPhase::Idle;
                return Err(err);
            }
        };

        state.grid = grid;
        state.nonce = nonce;
        state.bet = bet;
        state.balance = balance_after;
        state.last_win = resolved.total_payout;
        state.total_session_win = total_session_win;
        for column in &resolved.columns {
            state.reels[column.x] = column.reel;
        }

        state.phase = RoundPhase::BonusCheck;
        let (bonus_triggered, bonus_ended) =
            self.bonus_check(&mut state.bonus, free_spin, resolved.total_eyes, bet);

        state.phase = RoundPhase::Refilling;
        let refilled = refill(&self.params, &mut state.grid, nonce, &mut stream);
        state.phase = RoundPhase::Idle;

        debug!(
            nonce,
            payout = %resolved.total_payout,
            eyes = resolved.total_eyes,
            refilled = refilled.len(),
            draws = stream.draws(),
            "round settled"
        );

        Ok(SpinOutcome {
            nonce,
            bet,
            free_spin,
            chests: resolved.chests,
            win_tier: WinTier::classify(resolved.total_payout, bet),
            total_payout: resolved.total_payout,
            total_eyes: resolved.total_eyes,
            columns: resolved.columns,
            bonus_triggered,
            bonus_ended,
            bonus_spins_left: state.bonus.spins_left,
            balance_before,
            balance_after: state.balance,
            refilled,
            draws: stream.draws(),
            server_seed_hash: state.server_seed_hash.clone(),
        })
    }

    /// Activation and expiry are exclusive within one round: a round that
    /// started in bonus mode only counts down, a round that started outside
    /// it can only trigger. Eyes seen during bonus mode do not re-trigger.
    fn bonus_check(
        &self,
        bonus: &mut BonusState,
        was_active: bool,
        eyes: u32,
        bet: Credits,
    ) -> (bool, bool) {
        if was_active {
            bonus.spins_left = bonus.spins_left.saturating_sub(1);
            if bonus.spins_left == 0 {
                *bonus = BonusState::default();
                info!("bonus mode over");
                return (false, true);
            }
            return (false, false);
        }
        if eyes >= self.params.bonus.trigger_eyes {
            *bonus = BonusState {
                active: true,
                spins_left: self.params.bonus.free_spins,
                bet,
            };
            info!(eyes, spins = bonus.spins_left, bet = %bet, "bonus mode activated");
            return (true, false);
        }
        (false, false)
    }

    /// Buys bonus mode outright for `buy_cost_multiplier × bet`. Returns the price paid.
    pub fn buy_bonus(&self, state: &mut RoundState, bet: Credits) -> EngineResult<Credits> {
        state.ensure_idle()?;
        if state.bonus.active {
            return Err(EngineError::BonusAlreadyActive);
        }
        self.check_bet(bet)?;
        let cost = self
            .params
            .bonus
            .buy_cost(bet)
            .ok_or(EngineError::InvalidBet(bet))?;
        let Some(balance) = state.balance.checked_sub(cost).filter(|b| *b >= Credits::ZERO) else {
            return Err(EngineError::InsufficientFunds {
                balance: state.balance,
                required: cost,
            });
        };
        state.balance = balance;
        state.bet = bet;
        state.bonus = BonusState {
            active: true,
            spins_left: self.params.bonus.free_spins,
            bet,
        };
        info!(cost = %cost, spins = state.bonus.spins_left, "bonus purchased");
        Ok(cost)
    }

    pub fn step_bet(&self, state: &mut RoundState, step: BetStep) -> EngineResult<Credits> {
        state.step_bet(&self.params.bet_ladder, step)
    }

    /// Recomputes round `nonce` from disclosed seeds and the grid it started from.
    pub fn verify_round(
        &self,
        server_seed: &str,
        client_seed: &str,
        nonce: u64,
        bet: Credits,
        bonus_mode: bool,
        initial_grid: &Grid,
    ) -> EngineResult<RoundReplay> {
        let seeds = SeedPair::new(server_seed, client_seed)?;
        self.check_bet(bet)?;
        self.check_start_grid(initial_grid)?;
        let mut stream = Self::stream(&seeds, nonce)?;
        let mut grid = initial_grid.clone();
        let mut phase = RoundPhase::Idle;

        let resolved =
            self.resolve_columns(&mut grid, &mut stream, bet, bonus_mode, &mut phase)?;
        let resolved_grid = grid.clone();
        refill(&self.params, &mut grid, nonce, &mut stream);

        Ok(RoundReplay {
            nonce,
            bet,
            bonus_mode,
            chests: resolved.chests,
            columns: resolved.columns,
            total_payout: resolved.total_payout,
            total_eyes: resolved.total_eyes,
            resolved_grid,
            next_grid: grid,
            draws: stream.draws(),
            server_seed_hash: seeds.server_seed_hash_hex(),
        })
    }
}

/// Convenience: a session on the default tables.
pub fn new_session(server_seed: &str, client_seed: &str) -> EngineResult<(Engine, RoundState)> {
    let engine = Engine::new(EngineParams::default())?;
    let state = engine.new_session(server_seed, client_seed)?;
    Ok((engine, state))
}
