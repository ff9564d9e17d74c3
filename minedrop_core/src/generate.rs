//! Reel, grid and chest generation.
//!
//! Every function takes its randomness explicitly and consumes a fixed,
//! documented number of draws, so a round replays identically from seeds.

use crate::blocks::{Block, BlockKind, Grid, Position, CHEST_ROW, COLUMNS};
use crate::money::Multiplier;
use crate::params::{EngineParams, Stratum};
use crate::rng::RandomSource;
use crate::symbols::{Reel, ReelColumn};

/// Three independent symbol draws.
pub fn generate_column<R: RandomSource + ?Sized>(
    params: &EngineParams,
    source: &mut R,
) -> ReelColumn {
    std::array::from_fn(|_| *params.symbols.sample(&mut *source))
}

pub fn generate_reel<R: RandomSource + ?Sized>(params: &EngineParams, source: &mut R) -> Reel {
    std::array::from_fn(|_| generate_column(params, &mut *source))
}

/// Picks the kind for depth `y`: the stratum draw first (split rows only),
/// then the TNT draw (every row above the chest row).
pub fn roll_block_kind<R: RandomSource + ?Sized>(
    params: &EngineParams,
    y: usize,
    source: &mut R,
) -> BlockKind {
    let mut kind = match params.strata[y] {
        Stratum::Fixed { kind } => kind,
        Stratum::Split { rare, chance, common } => {
            if source.chance(chance) {
                rare
            } else {
                common
            }
        }
    };
    if y < CHEST_ROW && source.chance(params.tnt_chance) {
        kind = BlockKind::Tnt;
    }
    kind
}

pub fn generate_block<R: RandomSource + ?Sized>(
    params: &EngineParams,
    generation: u64,
    pos: Position,
    source: &mut R,
) -> Block {
    let kind = roll_block_kind(params, pos.y, source);
    Block::new(generation, pos, kind, params.blocks.get(kind))
}

pub fn generate_initial_grid<R: RandomSource + ?Sized>(
    params: &EngineParams,
    source: &mut R,
) -> Grid {
    Grid::from_fn(|pos| generate_block(params, 0, pos, &mut *source))
}

/// One pending chest multiplier per column, drawn left to right.
pub fn generate_chest_multipliers<R: RandomSource + ?Sized>(
    params: &EngineParams,
    source: &mut R,
) -> [Multiplier; COLUMNS] {
    std::array::from_fn(|_| *params.chests.sample(&mut *source))
}

/// Replaces every destroyed block with a fresh instance of `generation`.
/// Untouched blocks keep their identity and state. Returns the refilled positions.
pub fn refill<R: RandomSource + ?Sized>(
    params: &EngineParams,
    grid: &mut Grid,
    generation: u64,
    source: &mut R,
) -> Vec<Position> {
    let destroyed = grid.destroyed_positions();
    for &pos in &destroyed {
        let block = generate_block(params, generation, pos, source);
        grid.replace(pos, block);
    }
    destroyed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{ProvablyFairRng, SeedPair, SequenceSource};
    use crate::symbols::{PickaxeTier, ReelCell, SpecialSymbol};

    #[test]
    fn depth_bands_without_tnt() {
        let params = EngineParams::default();
        // every draw 0.5: split rows take the common kind, no TNT
        let mut src = SequenceSource::new(vec![0.5]);
        let grid = generate_initial_grid(&params, &mut src);
        let expected = [
            BlockKind::Dirt,
            BlockKind::Dirt,
            BlockKind::Stone,
            BlockKind::Gold,
            BlockKind::Diamond,
            BlockKind::Dirt,
        ];
        for x in 0..COLUMNS {
            let kinds: Vec<BlockKind> = grid.column(x).iter().map(Block::kind).collect();
            assert_eq!(kinds, expected);
        }
        // 5 TNT draws + 2 stratum draws per column
        assert_eq!(src.consumed(), COLUMNS * 7);
    }

    #[test]
    fn low_draws_give_rare_kinds_and_tnt() {
        let params = EngineParams::default();
        let mut src = SequenceSource::new(vec![0.01]);
        assert_eq!(roll_block_kind(&params, 3, &mut src), BlockKind::Tnt);

        // stratum draw 0.1 -> Ruby, TNT draw 0.9 -> stays Ruby
        let mut src = SequenceSource::new(vec![0.1, 0.9]);
        assert_eq!(roll_block_kind(&params, 3, &mut src), BlockKind::Ruby);
        let mut src = SequenceSource::new(vec![0.1, 0.9]);
        assert_eq!(roll_block_kind(&params, 4, &mut src), BlockKind::Obsidian);
    }

    #[test]
    fn chest_row_never_draws() {
        let params = EngineParams::default();
        let mut src = SequenceSource::new(vec![0.0]);
        assert_eq!(roll_block_kind(&params, CHEST_ROW, &mut src), BlockKind::Dirt);
        assert_eq!(src.consumed(), 0);
    }

    #[test]
    fn block_stats_come_from_table() {
        let params = EngineParams::default();
        let mut src = SequenceSource::new(vec![0.05, 0.9]);
        let block = generate_block(&params, 7, Position::new(2, 4), &mut src);
        assert_eq!(block.kind(), BlockKind::Obsidian);
        assert_eq!(block.current_hp(), 7);
        assert_eq!(block.max_hp(), 7);
        assert_eq!(block.payout(), Multiplier::whole(25));
        assert_eq!(block.id().generation, 7);
        assert!(!block.is_destroyed());
    }

    #[test]
    fn symbol_table_order() {
        let params = EngineParams::default();
        // scaled by 100: 54 -> Wooden, 55.5 -> Stone, 95 -> Spellbook, 99 -> Eye
        let mut src = SequenceSource::new(vec![0.54, 0.555, 0.95, 0.99]);
        assert_eq!(
            generate_column(&params, &mut src),
            [
                ReelCell::Pickaxe(PickaxeTier::Wooden),
                ReelCell::Pickaxe(PickaxeTier::Stone),
                ReelCell::Special(SpecialSymbol::Spellbook),
            ]
        );
        assert_eq!(*params.symbols.sample(&mut src), ReelCell::Special(SpecialSymbol::Eye));
    }

    #[test]
    fn refill_only_touches_destroyed_cells() {
        let params = EngineParams::default();
        let seeds = SeedPair::new("server", "client").unwrap();
        let mut stream = ProvablyFairRng::new(&seeds, 0).unwrap().stream();
        let mut grid = generate_initial_grid(&params, &mut stream);
        let before = grid.clone();

        let hit = Position::new(1, 2);
        grid.block_mut(hit).claim_destroyed();
        let refilled = refill(&params, &mut grid, 9, &mut stream);

        assert_eq!(refilled, vec![hit]);
        assert_eq!(grid.block(hit).id().generation, 9);
        assert!(!grid.block(hit).is_destroyed());
        for pos in Grid::positions().filter(|&p| p != hit) {
            assert_eq!(grid.block(pos), before.block(pos));
        }
        assert!(grid.destroyed_positions().is_empty());
    }

    #[test]
    fn chest_draws_are_independent_per_column() {
        let params = EngineParams::default();
        let mut src = SequenceSource::new(vec![0.0, 0.999_5, 0.5, 0.9, 0.46]);
        let chests = generate_chest_multipliers(&params, &mut src);
        assert_eq!(
            chests,
            [
                Multiplier::whole(10),
                Multiplier::whole(5000),
                Multiplier::whole(20),
                Multiplier::whole(100),
                Multiplier::whole(20),
            ]
        );
    }
}
