use serde::{Deserialize, Serialize};

/// Visible rows per reel column.
pub const REEL_ROWS: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PickaxeTier {
    Wooden,
    Stone,
    Gold,
    Diamond,
}

impl PickaxeTier {
    pub fn to_index(self) -> u8 {
        match self {
            PickaxeTier::Wooden => 0,
            PickaxeTier::Stone => 1,
            PickaxeTier::Gold => 2,
            PickaxeTier::Diamond => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SpecialSymbol {
    None,
    Eye,
    Spellbook,
}

/// One revealed symbol: a pickaxe or a special, never both.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ReelCell {
    Pickaxe(PickaxeTier),
    Special(SpecialSymbol),
}

impl ReelCell {
    pub const BLANK: ReelCell = ReelCell::Special(SpecialSymbol::None);

    pub fn pickaxe(self) -> Option<PickaxeTier> {
        match self {
            ReelCell::Pickaxe(tier) => Some(tier),
            ReelCell::Special(_) => None,
        }
    }

    pub fn is_eye(self) -> bool {
        self == ReelCell::Special(SpecialSymbol::Eye)
    }

    pub fn is_spellbook(self) -> bool {
        self == ReelCell::Special(SpecialSymbol::Spellbook)
    }

    /// Compact index used on the wire: pickaxes 0..=3, spellbook 4, eye 5, blank 6.
    pub fn to_index(self) -> u8 {
        match self {
            ReelCell::Pickaxe(tier) => tier.to_index(),
            ReelCell::Special(SpecialSymbol::Spellbook) => 4,
            ReelCell::Special(SpecialSymbol::Eye) => 5,
            ReelCell::Special(SpecialSymbol::None) => 6,
        }
    }

    pub fn from_index(i: u8) -> Self {
        match i {
            0 => ReelCell::Pickaxe(PickaxeTier::Wooden),
            1 => ReelCell::Pickaxe(PickaxeTier::Stone),
            2 => ReelCell::Pickaxe(PickaxeTier::Gold),
            3 => ReelCell::Pickaxe(PickaxeTier::Diamond),
            4 => ReelCell::Special(SpecialSymbol::Spellbook),
            5 => ReelCell::Special(SpecialSymbol::Eye),
            _ => ReelCell::BLANK,
        }
    }
}

pub type ReelColumn = [ReelCell; REEL_ROWS];

/// 5 columns × 3 visible rows, column-major.
pub type Reel = [ReelColumn; crate::blocks::COLUMNS];

/// A spellbook anywhere in the column turns every pickaxe in it into Diamond.
/// Returns whether an upgrade happened.
pub fn apply_spellbook(column: &mut ReelColumn) -> bool {
    if !column.iter().any(|cell| cell.is_spellbook()) {
        return false;
    }
    for cell in column.iter_mut() {
        if let ReelCell::Pickaxe(tier) = cell {
            *tier = PickaxeTier::Diamond;
        }
    }
    true
}

pub fn count_eyes(column: &ReelColumn) -> u32 {
    column.iter().filter(|cell| cell.is_eye()).count() as u32
}
