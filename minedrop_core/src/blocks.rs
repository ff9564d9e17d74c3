use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{error::ConfigError, money::Multiplier};

/// Reel/grid columns.
pub const COLUMNS: usize = 5;
/// Grid depth, surface at `y = 0`.
pub const GRID_ROWS: usize = 6;
/// The bottom row holds the column's chest.
pub const CHEST_ROW: usize = GRID_ROWS - 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Dirt,
    Stone,
    Ruby,
    Gold,
    Diamond,
    Obsidian,
    Tnt,
}

impl BlockKind {
    pub fn is_explosive(self) -> bool {
        self == BlockKind::Tnt
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockStats {
    pub hp: u32,
    pub payout: Multiplier,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Identity of one block instance: where it sits and which round created it.
/// A refill always produces a new id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BlockId {
    pub generation: u64,
    pub x: u8,
    pub y: u8,
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-g{}", self.x, self.y, self.generation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BlockRecord")]
pub struct Block {
    id: BlockId,
    kind: BlockKind,
    current_hp: u32,
    max_hp: u32,
    payout: Multiplier,
    destroyed: bool,
    has_chest: bool,
    chest_value: Multiplier,
}

impl Block {
    pub fn new(generation: u64, pos: Position, kind: BlockKind, stats: BlockStats) -> Self {
        Self {
            id: BlockId {
                generation,
                x: pos.x as u8,
                y: pos.y as u8,
            },
            kind,
            current_hp: stats.hp,
            max_hp: stats.hp,
            payout: stats.payout,
            destroyed: false,
            has_chest: false,
            chest_value: Multiplier::ZERO,
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn current_hp(&self) -> u32 {
        self.current_hp
    }

    pub fn max_hp(&self) -> u32 {
        self.max_hp
    }

    pub fn payout(&self) -> Multiplier {
        self.payout
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn has_chest(&self) -> bool {
        self.has_chest
    }

    pub fn chest_value(&self) -> Multiplier {
        self.chest_value
    }

    /// Applies up to `power` damage and returns how much was absorbed.
    pub fn strike(&mut self, power: u32) -> u32 {
        debug_assert!(!self.destroyed, "struck destroyed block {}", self.id);
        let damage = power.min(self.current_hp);
        self.current_hp -= damage;
        damage
    }

    /// Marks the block destroyed. Returns `false` if it already was, so each
    /// instance is paid out at most once.
    pub fn claim_destroyed(&mut self) -> bool {
        if self.destroyed {
            return false;
        }
        self.destroyed = true;
        true
    }

    pub(crate) fn place_chest(&mut self, value: Multiplier) {
        debug_assert!(!self.has_chest, "chest placed twice on {}", self.id);
        self.has_chest = true;
        self.chest_value = value;
    }
}

/// Wire form of a [`Block`], checked before it becomes one.
#[derive(Deserialize)]
struct BlockRecord {
    id: BlockId,
    kind: BlockKind,
    current_hp: u32,
    max_hp: u32,
    payout: Multiplier,
    destroyed: bool,
    has_chest: bool,
    chest_value: Multiplier,
}

impl TryFrom<BlockRecord> for Block {
    type Error = ConfigError;

    fn try_from(record: BlockRecord) -> Result<Self, Self::Error> {
        let id = record.id;
        let invalid = |what: &str| Err(ConfigError::Invalid(format!("block {id}: {what}")));
        if usize::from(id.x) >= COLUMNS || usize::from(id.y) >= GRID_ROWS {
            return invalid("coordinate outside the grid");
        }
        if record.max_hp == 0 {
            return invalid("max_hp is zero");
        }
        if record.current_hp > record.max_hp {
            return invalid("current_hp exceeds max_hp");
        }
        if !record.destroyed && record.current_hp == 0 {
            return invalid("standing block has no hp left");
        }
        if record.has_chest && !(record.destroyed && usize::from(id.y) == CHEST_ROW) {
            return invalid("chest on a block that is not a cleared chest-row block");
        }
        if !record.has_chest && record.chest_value != Multiplier::ZERO {
            return invalid("chest value without a chest");
        }
        Ok(Self {
            id,
            kind: record.kind,
            current_hp: record.current_hp,
            max_hp: record.max_hp,
            payout: record.payout,
            destroyed: record.destroyed,
            has_chest: record.has_chest,
            chest_value: record.chest_value,
        })
    }
}

/// Column-major 5×6 block grid; exactly one block per coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GridRecord")]
pub struct Grid {
    columns: [[Block; GRID_ROWS]; COLUMNS],
}

impl Grid {
    pub fn from_fn(mut make: impl FnMut(Position) -> Block) -> Self {
        Self {
            columns: std::array::from_fn(|x| std::array::from_fn(|y| make(Position::new(x, y)))),
        }
    }

    pub fn block(&self, pos: Position) -> &Block {
        &self.columns[pos.x][pos.y]
    }

    pub fn block_mut(&mut self, pos: Position) -> &mut Block {
        &mut self.columns[pos.x][pos.y]
    }

    /// Puts a new instance at `pos`, replacing the occupant.
    pub fn replace(&mut self, pos: Position, block: Block) {
        self.columns[pos.x][pos.y] = block;
    }

    pub fn column(&self, x: usize) -> &[Block; GRID_ROWS] {
        &self.columns[x]
    }

    pub fn columns(&self) -> &[[Block; GRID_ROWS]; COLUMNS] {
        &self.columns
    }

    pub fn column_cleared(&self, x: usize) -> bool {
        self.columns[x].iter().all(Block::is_destroyed)
    }

    /// Every coordinate, column-major.
    pub fn positions() -> impl Iterator<Item = Position> {
        (0..COLUMNS).flat_map(|x| (0..GRID_ROWS).map(move |y| Position::new(x, y)))
    }

    pub fn destroyed_positions(&self) -> Vec<Position> {
        Self::positions()
            .filter(|&pos| self.block(pos).is_destroyed())
            .collect()
    }

    /// The 3×3 box around `center`, clamped to the grid, including `center`.
    pub fn neighborhood(center: Position) -> impl Iterator<Item = Position> {
        let xs = center.x.saturating_sub(1)..=(center.x + 1).min(COLUMNS - 1);
        xs.flat_map(move |x| {
            let ys = center.y.saturating_sub(1)..=(center.y + 1).min(GRID_ROWS - 1);
            ys.map(move |y| Position::new(x, y))
        })
    }
}

#[derive(Deserialize)]
struct GridRecord {
    columns: [[Block; GRID_ROWS]; COLUMNS],
}

impl TryFrom<GridRecord> for Grid {
    type Error = ConfigError;

    fn try_from(record: GridRecord) -> Result<Self, Self::Error> {
        let grid = Self {
            columns: record.columns,
        };
        for pos in Self::positions() {
            let id = grid.block(pos).id();
            if (usize::from(id.x), usize::from(id.y)) != (pos.x, pos.y) {
                return Err(ConfigError::Invalid(format!(
                    "block {id} stored at {},{}",
                    pos.x, pos.y
                )));
            }
        }
        Ok(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn dirt(pos: Position) -> Block {
        Block::new(
            0,
            pos,
            BlockKind::Dirt,
            BlockStats {
                hp: 1,
                payout: Multiplier::ZERO,
            },
        )
    }

    fn tampered(edit: impl FnOnce(&mut Value)) -> serde_json::Result<Grid> {
        let mut value = serde_json::to_value(Grid::from_fn(dirt)).unwrap();
        edit(&mut value);
        serde_json::from_value(value)
    }

    #[test]
    fn neighborhood_is_clamped() {
        assert_eq!(Grid::neighborhood(Position::new(0, 0)).count(), 4);
        assert_eq!(Grid::neighborhood(Position::new(2, 3)).count(), 9);
        assert_eq!(Grid::neighborhood(Position::new(4, 5)).count(), 4);
        assert_eq!(Grid::neighborhood(Position::new(4, 2)).count(), 6);
    }

    #[test]
    fn strike_never_overshoots() {
        let mut block = Block::new(
            0,
            Position::new(0, 0),
            BlockKind::Ruby,
            BlockStats {
                hp: 4,
                payout: Multiplier::whole(1),
            },
        );
        assert_eq!(block.strike(3), 3);
        assert_eq!(block.current_hp(), 1);
        assert_eq!(block.strike(10), 1);
        assert_eq!(block.current_hp(), 0);
        assert!(block.claim_destroyed());
        assert!(!block.claim_destroyed());
    }

    #[test]
    fn column_cleared_needs_every_row() {
        let mut grid = Grid::from_fn(dirt);
        for y in 0..CHEST_ROW {
            grid.block_mut(Position::new(1, y)).claim_destroyed();
        }
        assert!(!grid.column_cleared(1));
        grid.block_mut(Position::new(1, CHEST_ROW)).claim_destroyed();
        assert!(grid.column_cleared(1));
        assert_eq!(grid.destroyed_positions().len(), GRID_ROWS);
    }

    #[test]
    fn block_id_display() {
        let block = dirt(Position::new(3, 2));
        assert_eq!(block.id().to_string(), "3-2-g0");
    }

    #[test]
    fn grid_json_is_checked_on_load() {
        let grid = Grid::from_fn(dirt);
        let json = serde_json::to_string(&grid).unwrap();
        assert_eq!(serde_json::from_str::<Grid>(&json).unwrap(), grid);

        let chest_on_live_block = tampered(|v| v["columns"][0][5]["has_chest"] = json!(true));
        assert!(chest_on_live_block.is_err());
        assert!(tampered(|v| v["columns"][1][0]["current_hp"] = json!(7)).is_err());
        assert!(tampered(|v| v["columns"][1][0]["max_hp"] = json!(0)).is_err());
        assert!(tampered(|v| v["columns"][2][3]["id"]["y"] = json!(4)).is_err());
        assert!(tampered(|v| v["columns"][3][1]["current_hp"] = json!(0)).is_err());
        assert!(tampered(|v| v["columns"][4][2]["chest_value"] = json!(500)).is_err());
    }

    #[test]
    fn awarded_chest_survives_a_round_trip() {
        let mut grid = Grid::from_fn(dirt);
        for y in 0..GRID_ROWS {
            grid.block_mut(Position::new(2, y)).claim_destroyed();
        }
        grid.block_mut(Position::new(2, CHEST_ROW))
            .place_chest(Multiplier::whole(10));
        let json = serde_json::to_string(&grid).unwrap();
        assert_eq!(serde_json::from_str::<Grid>(&json).unwrap(), grid);
    }
}
