use serde::{Deserialize, Serialize};

use crate::blocks::{BlockKind, BlockStats};
use crate::error::ConfigError;
use crate::money::{Credits, Multiplier};
use crate::sampler::WeightedTable;
use crate::symbols::PickaxeTier;

/// Hit points and payout multiplier per block kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockStatTable {
    pub dirt: BlockStats,
    pub stone: BlockStats,
    pub ruby: BlockStats,
    pub gold: BlockStats,
    pub diamond: BlockStats,
    pub obsidian: BlockStats,
    pub tnt: BlockStats,
}

impl BlockStatTable {
    pub fn simple_default() -> Self {
        let stats = |hp, hundredths| BlockStats {
            hp,
            payout: Multiplier::from_hundredths(hundredths),
        };
        Self {
            dirt: stats(1, 0),
            stone: stats(2, 10),
            ruby: stats(4, 100),
            gold: stats(5, 300),
            diamond: stats(6, 500),
            obsidian: stats(7, 2500),
            tnt: stats(1, 0),
        }
    }

    pub fn get(&self, kind: BlockKind) -> BlockStats {
        match kind {
            BlockKind::Dirt => self.dirt,
            BlockKind::Stone => self.stone,
            BlockKind::Ruby => self.ruby,
            BlockKind::Gold => self.gold,
            BlockKind::Diamond => self.diamond,
            BlockKind::Obsidian => self.obsidian,
            BlockKind::Tnt => self.tnt,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let all = [
            ("dirt", self.dirt),
            ("stone", self.stone),
            ("ruby", self.ruby),
            ("gold", self.gold),
            ("diamond", self.diamond),
            ("obsidian", self.obsidian),
            ("tnt", self.tnt),
        ];
        match all.iter().find(|(_, s)| s.hp == 0) {
            Some((name, _)) => Err(ConfigError::Invalid(format!(
                "{name} blocks need at least 1 hp"
            ))),
            None => Ok(()),
        }
    }
}

/// Mining power per pickaxe tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickaxePower {
    pub wooden: u32,
    pub stone: u32,
    pub gold: u32,
    pub diamond: u32,
}

impl Default for PickaxePower {
    fn default() -> Self {
        Self {
            wooden: 1,
            stone: 2,
            gold: 3,
            diamond: 5,
        }
    }
}

impl PickaxePower {
    pub fn of(&self, tier: PickaxeTier) -> u32 {
        match tier {
            PickaxeTier::Wooden => self.wooden,
            PickaxeTier::Stone => self.stone,
            PickaxeTier::Gold => self.gold,
            PickaxeTier::Diamond => self.diamond,
        }
    }
}

pub fn default_chest_table() -> WeightedTable<Multiplier> {
    WeightedTable::from_trusted([
        (Multiplier::whole(10), 450),
        (Multiplier::whole(20), 250),
        (Multiplier::whole(50), 150),
        (Multiplier::whole(100), 80),
        (Multiplier::whole(250), 40),
        (Multiplier::whole(500), 20),
        (Multiplier::whole(1000), 9),
        (Multiplier::whole(5000), 1),
    ])
}

/// Celebration tier of a round's payout relative to the bet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum WinTier {
    None,
    Win,
    Good,
    Big,
    Mega,
}

impl WinTier {
    pub fn classify(payout: Credits, bet: Credits) -> Self {
        if !payout.is_positive() {
            return WinTier::None;
        }
        let Some(ratio) = payout.ratio_to(bet) else {
            return WinTier::Win;
        };
        if ratio >= Multiplier::whole(50) {
            WinTier::Mega
        } else if ratio >= Multiplier::whole(20) {
            WinTier::Big
        } else if ratio >= Multiplier::whole(5) {
            WinTier::Good
        } else {
            WinTier::Win
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WinTier::None => "",
            WinTier::Win => "WIN!",
            WinTier::Good => "GOOD WIN!",
            WinTier::Big => "BIG WIN!",
            WinTier::Mega => "MEGA WIN!",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_match_depth_bands() {
        let table = BlockStatTable::simple_default();
        assert_eq!(table.get(BlockKind::Obsidian).hp, 7);
        assert_eq!(table.get(BlockKind::Obsidian).payout, Multiplier::whole(25));
        assert_eq!(table.get(BlockKind::Stone).payout, Multiplier::from_hundredths(10));
        assert!(table.validate().is_ok());
    }

    #[test]
    fn chest_table_weights_sum_to_thousand() {
        let chests = default_chest_table();
        assert!(chests.validate("chests").is_ok());
        assert_eq!(chests.total_weight(), 1000);
        assert_eq!(chests.entries()[0].item, Multiplier::whole(10));
    }

    #[test]
    fn win_tiers() {
        let bet = Credits::whole(1);
        assert_eq!(WinTier::classify(Credits::ZERO, bet), WinTier::None);
        assert_eq!(WinTier::classify(Credits::cents(10), bet), WinTier::Win);
        assert_eq!(WinTier::classify(Credits::whole(5), bet), WinTier::Good);
        assert_eq!(WinTier::classify(Credits::whole(20), bet), WinTier::Big);
        assert_eq!(WinTier::classify(Credits::whole(75), bet), WinTier::Mega);
        assert_eq!(WinTier::Mega.label(), "MEGA WIN!");
    }
}
