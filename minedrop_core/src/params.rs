use serde::{Deserialize, Serialize};

use crate::blocks::{BlockKind, CHEST_ROW, GRID_ROWS};
use crate::error::ConfigError;
use crate::money::{Credits, Multiplier};
use crate::paytable::{default_chest_table, BlockStatTable, PickaxePower};
use crate::sampler::WeightedTable;
use crate::symbols::{PickaxeTier, ReelCell, SpecialSymbol};

/// Block-kind rule for one depth row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Stratum {
    Fixed { kind: BlockKind },
    /// `rare` with probability `chance`, otherwise `common`. One draw.
    Split {
        rare: BlockKind,
        chance: f64,
        common: BlockKind,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusRules {
    /// Eyes across one spin needed to start bonus mode.
    pub trigger_eyes: u32,
    pub free_spins: u32,
    /// Bonus buy price, in bets.
    pub buy_cost_multiplier: u32,
    pub power_percent: u32,
    pub power_flat: u32,
}

impl Default for BonusRules {
    fn default() -> Self {
        Self {
            trigger_eyes: 3,
            free_spins: 5,
            buy_cost_multiplier: 100,
            power_percent: 150,
            power_flat: 1,
        }
    }
}

impl BonusRules {
    /// floor(power × percent / 100) + flat
    pub fn boost(&self, power: u32) -> u32 {
        power * self.power_percent / 100 + self.power_flat
    }

    /// `None` if the price overflows.
    pub fn buy_cost(&self, bet: Credits) -> Option<Credits> {
        Multiplier::whole_checked(self.buy_cost_multiplier).and_then(|m| bet.times(m))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineParams {
    pub symbols: WeightedTable<ReelCell>,
    pub chests: WeightedTable<Multiplier>,
    pub strata: [Stratum; GRID_ROWS],
    /// Chance that a non-chest-row cell becomes TNT.
    pub tnt_chance: f64,
    pub blocks: BlockStatTable,
    pub pickaxe_power: PickaxePower,
    pub bonus: BonusRules,
    pub bet_ladder: Vec<Credits>,
    pub starting_balance: Credits,
    pub default_bet: Credits,
    pub rtp_target: f64, // reported by simulations, not enforced
}

impl Default for EngineParams {
    fn default() -> Self {
        let fixed = |kind| Stratum::Fixed { kind };
        Self {
            symbols: default_symbol_table(),
            chests: default_chest_table(),
            strata: [
                fixed(BlockKind::Dirt),
                fixed(BlockKind::Dirt),
                fixed(BlockKind::Stone),
                Stratum::Split {
                    rare: BlockKind::Ruby,
                    chance: 0.3,
                    common: BlockKind::Gold,
                },
                Stratum::Split {
                    rare: BlockKind::Obsidian,
                    chance: 0.2,
                    common: BlockKind::Diamond,
                },
                fixed(BlockKind::Dirt),
            ],
            tnt_chance: 0.015,
            blocks: BlockStatTable::simple_default(),
            pickaxe_power: PickaxePower::default(),
            bonus: BonusRules::default(),
            bet_ladder: [10, 50, 100, 200, 500, 1_000, 2_500, 5_000, 10_000, 50_000, 100_000]
                .into_iter()
                .map(Credits::cents)
                .collect(),
            starting_balance: Credits::whole(1000),
            default_bet: Credits::whole(1),
            rtp_target: 0.96,
        }
    }
}

pub fn default_symbol_table() -> WeightedTable<ReelCell> {
    WeightedTable::from_trusted([
        (ReelCell::Pickaxe(PickaxeTier::Wooden), 55),
        (ReelCell::Pickaxe(PickaxeTier::Stone), 25),
        (ReelCell::Pickaxe(PickaxeTier::Gold), 10),
        (ReelCell::Pickaxe(PickaxeTier::Diamond), 3),
        (ReelCell::Special(SpecialSymbol::Spellbook), 5),
        (ReelCell::Special(SpecialSymbol::Eye), 2),
    ])
}

fn check_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Probability { name, value })
    }
}

impl EngineParams {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let params: EngineParams =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.symbols.validate("symbols")?;
        self.chests.validate("chests")?;
        check_probability("tnt_chance", self.tnt_chance)?;
        for stratum in &self.strata {
            if let Stratum::Split { chance, .. } = stratum {
                check_probability("strata.chance", *chance)?;
            }
        }
        if matches!(self.strata[CHEST_ROW], Stratum::Fixed { kind: BlockKind::Tnt }) {
            return Err(ConfigError::Invalid("the chest row cannot be TNT".into()));
        }
        self.blocks.validate()?;
        if self.bonus.trigger_eyes == 0 || self.bonus.free_spins == 0 {
            return Err(ConfigError::Invalid(
                "bonus trigger and spin count must be positive".into(),
            ));
        }
        if self.bonus.power_percent < 100 || self.bonus.power_flat == 0 {
            return Err(ConfigError::Invalid("bonus power must exceed base power".into()));
        }
        if self.bet_ladder.is_empty() || self.bet_ladder.iter().any(|bet| !bet.is_positive()) {
            return Err(ConfigError::Invalid("bet ladder needs at least one positive step".into()));
        }
        if !self.default_bet.is_positive() {
            return Err(ConfigError::Invalid("default bet must be positive".into()));
        }
        Ok(())
    }

    /// Largest accepted bet: the top of the ladder.
    pub fn max_bet(&self) -> Credits {
        self.bet_ladder.iter().copied().max().unwrap_or(Credits::ZERO)
    }

    pub fn power_of(&self, tier: PickaxeTier) -> u32 {
        self.pickaxe_power.of(tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(EngineParams::default().validate(), Ok(()));
    }

    #[test]
    fn json_roundtrip_keeps_table_order() {
        let params = EngineParams::default();
        let json = params.to_json_pretty().unwrap();
        let back = EngineParams::from_json_str(&json).unwrap();
        assert_eq!(back, params);
        assert_eq!(back.symbols.entries()[5].item, ReelCell::Special(SpecialSymbol::Eye));
    }

    #[test]
    fn bad_probability_is_rejected() {
        let mut params = EngineParams::default();
        params.tnt_chance = 1.5;
        assert!(matches!(params.validate(), Err(ConfigError::Probability { .. })));
    }

    #[test]
    fn bonus_boost_is_strictly_stronger() {
        let rules = BonusRules::default();
        assert_eq!(rules.boost(0), 1);
        assert_eq!(rules.boost(3), 5);
        assert_eq!(rules.boost(15), 23);
        for p in 0..50 {
            assert!(rules.boost(p) > p);
        }
        assert_eq!(rules.buy_cost(Credits::whole(2)), Some(Credits::whole(200)));
        assert_eq!(EngineParams::default().max_bet(), Credits::whole(1000));
    }
}
