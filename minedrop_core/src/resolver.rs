//! Resolution of one revealed reel column against the block grid.
//!
//! Order within a column: spellbook upgrade, eye count, power sum (boosted
//! in bonus mode), a top-to-bottom strike walk, TNT chain reactions, and
//! finally the chest check against the column's state before the walk.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use crate::blocks::{Block, BlockKind, Grid, Position, CHEST_ROW, GRID_ROWS};
use crate::error::{EngineError, EngineResult};
use crate::money::{Credits, Multiplier};
use crate::params::EngineParams;
use crate::symbols::{apply_spellbook, count_eyes, ReelColumn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DestroyCause {
    Strike,
    Explosion { origin: Position },
}

/// One change to the grid, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockEvent {
    Struck {
        pos: Position,
        damage: u32,
        remaining_hp: u32,
    },
    Destroyed {
        pos: Position,
        kind: BlockKind,
        payout: Multiplier,
        cause: DestroyCause,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRequest {
    pub x: usize,
    pub reel: ReelColumn,
    /// Pending chest multiplier for this column.
    pub chest: Multiplier,
    pub bet: Credits,
    pub bonus_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnOutcome {
    pub x: usize,
    /// The revealed column after any spellbook upgrade.
    pub reel: ReelColumn,
    pub upgraded: bool,
    pub eyes: u32,
    pub power: u32,
    pub unused_power: u32,
    /// Sum of payout multipliers of every block destroyed here, explosions included.
    pub block_multiplier: Multiplier,
    pub chest: Option<Multiplier>,
    pub payout: Credits,
    pub events: Vec<BlockEvent>,
    /// The resolved column as it stands afterwards.
    pub column: [Block; GRID_ROWS],
}

impl ColumnOutcome {
    pub fn destroyed_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, BlockEvent::Destroyed { .. }))
            .count()
    }
}

/// Mining power of a (possibly upgraded) column.
pub fn column_power(params: &EngineParams, reel: &ReelColumn, bonus_mode: bool) -> u32 {
    let base: u32 = reel
        .iter()
        .filter_map(|cell| cell.pickaxe())
        .map(|tier| params.power_of(tier))
        .sum();
    if bonus_mode {
        params.bonus.boost(base)
    } else {
        base
    }
}

/// Fails only if the payout overflows, after the grid was already mutated;
/// callers resolve on a scratch grid.
pub fn resolve_column(
    params: &EngineParams,
    grid: &mut Grid,
    request: ColumnRequest,
) -> EngineResult<ColumnOutcome> {
    let ColumnRequest {
        x,
        mut reel,
        chest,
        bet,
        bonus_mode,
    } = request;

    let upgraded = apply_spellbook(&mut reel);
    let eyes = count_eyes(&reel);
    let power = column_power(params, &reel, bonus_mode);
    let was_cleared = grid.column_cleared(x);

    let mut events = Vec::new();
    let mut block_multiplier = Multiplier::ZERO;
    let mut remaining = power;

    for y in 0..GRID_ROWS {
        if remaining == 0 {
            break;
        }
        let pos = Position::new(x, y);
        let block = grid.block_mut(pos);
        if block.is_destroyed() {
            continue;
        }
        let damage = block.strike(remaining);
        remaining -= damage;
        events.push(BlockEvent::Struck {
            pos,
            damage,
            remaining_hp: block.current_hp(),
        });
        if block.current_hp() == 0 {
            block_multiplier += demolish(grid, pos, &mut events);
        }
    }

    let chest = if !was_cleared && grid.column_cleared(x) {
        grid.block_mut(Position::new(x, CHEST_ROW)).place_chest(chest);
        Some(chest)
    } else {
        None
    };

    let payout = bet
        .times(block_multiplier + chest.unwrap_or(Multiplier::ZERO))
        .ok_or(EngineError::InvalidBet(bet))?;
    debug!(
        x,
        power,
        unused = remaining,
        eyes,
        upgraded,
        blocks = %block_multiplier,
        chest = ?chest,
        payout = %payout,
        "column resolved"
    );

    Ok(ColumnOutcome {
        x,
        reel,
        upgraded,
        eyes,
        power,
        unused_power: remaining,
        block_multiplier,
        chest,
        payout,
        events,
        column: grid.column(x).clone(),
    })
}

/// Destroys the block at `start` and everything its explosions reach.
///
/// Work-list flood fill: a coordinate is paid only when its block is
/// claimed, and a claimed block is never queued again, so dense TNT
/// clusters terminate and pay each block once.
fn demolish(grid: &mut Grid, start: Position, events: &mut Vec<BlockEvent>) -> Multiplier {
    let mut total = Multiplier::ZERO;
    let mut queue = VecDeque::from([(start, DestroyCause::Strike)]);

    while let Some((pos, cause)) = queue.pop_front() {
        let block = grid.block_mut(pos);
        if !block.claim_destroyed() {
            continue;
        }
        let kind = block.kind();
        let payout = block.payout();
        total += payout;
        events.push(BlockEvent::Destroyed {
            pos,
            kind,
            payout,
            cause,
        });

        if kind.is_explosive() {
            for next in Grid::neighborhood(pos) {
                if !grid.block(next).is_destroyed() {
                    queue.push_back((next, DestroyCause::Explosion { origin: pos }));
                }
            }
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{PickaxeTier, ReelCell, SpecialSymbol};

    const WOOD: ReelCell = ReelCell::Pickaxe(PickaxeTier::Wooden);
    const BLANK: ReelCell = ReelCell::BLANK;

    /// Dirt, Dirt, Stone, Ruby, Diamond, Dirt in every column.
    fn layered_grid(params: &EngineParams) -> Grid {
        let kinds = [
            BlockKind::Dirt,
            BlockKind::Dirt,
            BlockKind::Stone,
            BlockKind::Ruby,
            BlockKind::Diamond,
            BlockKind::Dirt,
        ];
        Grid::from_fn(|pos| Block::new(0, pos, kinds[pos.y], params.blocks.get(kinds[pos.y])))
    }

    fn with_kind(params: &EngineParams, grid: &mut Grid, pos: Position, kind: BlockKind) {
        grid.replace(pos, Block::new(0, pos, kind, params.blocks.get(kind)));
    }

    fn request(x: usize, reel: ReelColumn) -> ColumnRequest {
        ColumnRequest {
            x,
            reel,
            chest: Multiplier::whole(10),
            bet: Credits::whole(1),
            bonus_mode: false,
        }
    }

    #[test]
    fn three_wooden_pickaxes_leave_stone_damaged() {
        let params = EngineParams::default();
        let mut grid = layered_grid(&params);
        let out = resolve_column(&params, &mut grid, request(0, [WOOD; 3])).unwrap();

        assert_eq!(out.power, 3);
        assert_eq!(out.unused_power, 0);
        assert_eq!(out.payout, Credits::ZERO);
        let stone = grid.block(Position::new(0, 2));
        assert!(!stone.is_destroyed());
        assert_eq!(stone.current_hp(), 1);
        assert_eq!(out.destroyed_count(), 2);
    }

    #[test]
    fn four_power_clears_dirt_dirt_stone_exactly() {
        let params = EngineParams::default();
        let mut grid = layered_grid(&params);
        let reel = [WOOD, WOOD, ReelCell::Pickaxe(PickaxeTier::Stone)];
        let out = resolve_column(&params, &mut grid, request(0, reel)).unwrap();

        assert_eq!(out.power, 4);
        assert_eq!(out.unused_power, 0);
        assert_eq!(out.payout, Credits::cents(10));
        assert_eq!(out.chest, None);
        assert!(grid.block(Position::new(0, 2)).is_destroyed());
        let ruby = grid.block(Position::new(0, 3));
        assert!(!ruby.is_destroyed());
        assert_eq!(ruby.current_hp(), ruby.max_hp());
        assert_eq!(out.destroyed_count(), 3);
    }

    #[test]
    fn spellbook_upgrades_before_power_is_summed() {
        let params = EngineParams::default();
        let mut grid = layered_grid(&params);
        let reel = [ReelCell::Special(SpecialSymbol::Spellbook), WOOD, BLANK];
        let out = resolve_column(&params, &mut grid, request(1, reel)).unwrap();

        assert!(out.upgraded);
        assert_eq!(out.reel[1], ReelCell::Pickaxe(PickaxeTier::Diamond));
        assert_eq!(out.power, 5);
        // dirt 1 + dirt 1 + stone 2 + 1 into ruby
        assert_eq!(grid.block(Position::new(1, 3)).current_hp(), 3);
    }

    #[test]
    fn bonus_mode_boosts_power() {
        let params = EngineParams::default();
        let mut grid = layered_grid(&params);
        let mut req = request(2, [WOOD; 3]);
        req.bonus_mode = true;
        let out = resolve_column(&params, &mut grid, req).unwrap();
        assert_eq!(out.power, 5);
    }

    #[test]
    fn zero_power_changes_nothing() {
        let params = EngineParams::default();
        let mut grid = layered_grid(&params);
        let before = grid.clone();
        let reel = [
            ReelCell::Special(SpecialSymbol::Eye),
            BLANK,
            ReelCell::Special(SpecialSymbol::Eye),
        ];
        let out = resolve_column(&params, &mut grid, request(3, reel)).unwrap();

        assert_eq!(out.eyes, 2);
        assert_eq!(out.power, 0);
        assert_eq!(out.payout, Credits::ZERO);
        assert!(out.events.is_empty());
        assert_eq!(grid, before);
    }

    #[test]
    fn tnt_chain_destroys_each_block_once() {
        let params = EngineParams::default();
        let mut grid = layered_grid(&params);
        with_kind(&params, &mut grid, Position::new(2, 0), BlockKind::Tnt);
        with_kind(&params, &mut grid, Position::new(2, 1), BlockKind::Tnt);
        with_kind(&params, &mut grid, Position::new(3, 1), BlockKind::Tnt);
        with_kind(&params, &mut grid, Position::new(3, 2), BlockKind::Tnt);

        let reel = [WOOD, BLANK, BLANK];
        let out = resolve_column(&params, &mut grid, request(2, reel)).unwrap();

        let mut seen = std::collections::HashSet::new();
        for event in &out.events {
            if let BlockEvent::Destroyed { pos, .. } = event {
                assert!(seen.insert(*pos), "{pos:?} destroyed twice");
            }
        }
        let mut expected_destroyed = std::collections::HashSet::new();
        for (x, ys) in [(1, 0..=2), (2, 0..=3), (3, 0..=3), (4, 0..=3)] {
            for y in ys {
                expected_destroyed.insert(Position::new(x, y));
            }
        }
        assert_eq!(seen, expected_destroyed);
        for pos in Grid::positions() {
            assert_eq!(
                grid.block(pos).is_destroyed(),
                expected_destroyed.contains(&pos),
                "{pos:?}"
            );
        }
        // stones at x = 1, 2, 4 and rubies at x = 2, 3, 4
        assert_eq!(out.block_multiplier, Multiplier::from_hundredths(3 * 10 + 3 * 100));
    }

    #[test]
    fn chest_awarded_once_per_clear() {
        let params = EngineParams::default();
        let mut grid = layered_grid(&params);
        // 1 + 1 + 2 + 4 + 6 + 1 hp
        let diamonds = [ReelCell::Pickaxe(PickaxeTier::Diamond); 3];
        let out = resolve_column(&params, &mut grid, request(4, diamonds)).unwrap();
        assert_eq!(out.power, 15);
        assert_eq!(out.unused_power, 0);
        assert_eq!(out.chest, Some(Multiplier::whole(10)));
        // stone 0.10 + ruby 1 + diamond 5 + chest 10
        assert_eq!(out.payout, Credits::from_units(161_000));
        let chest_block = grid.block(Position::new(4, CHEST_ROW));
        assert!(chest_block.has_chest());
        assert_eq!(chest_block.chest_value(), Multiplier::whole(10));

        let again = resolve_column(&params, &mut grid, request(4, diamonds)).unwrap();
        assert_eq!(again.chest, None);
        assert_eq!(again.payout, Credits::ZERO);
        assert_eq!(again.unused_power, 15);
    }

    #[test]
    fn explosion_from_neighbour_can_complete_a_clear() {
        let params = EngineParams::default();
        let mut grid = layered_grid(&params);
        // pre-clear column 0 except the chest row, then blow it from column 1
        for y in 0..CHEST_ROW {
            grid.block_mut(Position::new(0, y)).claim_destroyed();
        }
        with_kind(&params, &mut grid, Position::new(1, 0), BlockKind::Tnt);
        with_kind(&params, &mut grid, Position::new(1, 4), BlockKind::Tnt);
        with_kind(&params, &mut grid, Position::new(1, 1), BlockKind::Tnt);
        with_kind(&params, &mut grid, Position::new(1, 2), BlockKind::Tnt);
        with_kind(&params, &mut grid, Position::new(1, 3), BlockKind::Tnt);

        let out = resolve_column(&params, &mut grid, request(1, [WOOD, BLANK, BLANK])).unwrap();
        assert!(grid.column_cleared(0));
        assert!(grid.column_cleared(1));
        // only the resolved column's chest is awarded here
        assert_eq!(out.chest, Some(Multiplier::whole(10)));
        assert!(!grid.block(Position::new(0, CHEST_ROW)).has_chest());
    }
}
