//! Weighted draws over ordered `(item, weight)` tables.
//!
//! Table order is part of the outcome: the first entry whose cumulative
//! weight reaches the scaled draw wins, so reordering a table changes
//! every replay.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::rng::RandomSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedEntry<T> {
    pub item: T,
    pub weight: u32,
}

/// A validated, non-empty table with strictly positive weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<WeightedEntry<T>>", into = "Vec<WeightedEntry<T>>")]
#[serde(bound(
    serialize = "T: Clone + Serialize",
    deserialize = "T: Deserialize<'de>"
))]
pub struct WeightedTable<T> {
    entries: Vec<WeightedEntry<T>>,
    total: u64,
}

impl<T> WeightedTable<T> {
    pub fn new(name: &'static str, entries: Vec<WeightedEntry<T>>) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::EmptyTable(name));
        }
        if let Some(index) = entries.iter().position(|e| e.weight == 0) {
            return Err(ConfigError::ZeroWeight { table: name, index });
        }
        let total = entries.iter().map(|e| u64::from(e.weight)).sum();
        Ok(Self { entries, total })
    }

    /// Builds a table from compile-time constants that are known to be valid.
    pub(crate) fn from_trusted(pairs: impl IntoIterator<Item = (T, u32)>) -> Self {
        let entries: Vec<WeightedEntry<T>> = pairs
            .into_iter()
            .map(|(item, weight)| WeightedEntry { item, weight })
            .collect();
        let total = entries.iter().map(|e| u64::from(e.weight)).sum();
        Self { entries, total }
    }

    pub fn from_pairs(
        name: &'static str,
        pairs: impl IntoIterator<Item = (T, u32)>,
    ) -> Result<Self, ConfigError> {
        let entries = pairs
            .into_iter()
            .map(|(item, weight)| WeightedEntry { item, weight })
            .collect();
        Self::new(name, entries)
    }

    /// Re-checks the invariants `new` enforces.
    pub fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if self.entries.is_empty() {
            return Err(ConfigError::EmptyTable(name));
        }
        match self.entries.iter().position(|e| e.weight == 0) {
            Some(index) => Err(ConfigError::ZeroWeight { table: name, index }),
            None => Ok(()),
        }
    }

    pub fn total_weight(&self) -> u64 {
        self.total
    }

    pub fn entries(&self) -> &[WeightedEntry<T>] {
        &self.entries
    }

    /// Draws one value from `source` and picks the matching entry.
    pub fn sample<R: RandomSource + ?Sized>(&self, source: &mut R) -> &T {
        let scaled = source.next_unit() * self.total as f64;
        let mut cumulative = 0u64;
        for entry in &self.entries {
            cumulative += u64::from(entry.weight);
            if cumulative as f64 >= scaled {
                return &entry.item;
            }
        }
        // scaled < total for draws in [0, 1); only reachable on a malformed draw
        &self.entries[self.entries.len() - 1].item
    }

    /// Probability of the entry at `index`.
    pub fn probability(&self, index: usize) -> Option<f64> {
        self.entries
            .get(index)
            .map(|e| f64::from(e.weight) / self.total as f64)
    }
}

impl<T> TryFrom<Vec<WeightedEntry<T>>> for WeightedTable<T> {
    type Error = ConfigError;

    fn try_from(entries: Vec<WeightedEntry<T>>) -> Result<Self, Self::Error> {
        Self::new("deserialized", entries)
    }
}

impl<T> From<WeightedTable<T>> for Vec<WeightedEntry<T>> {
    fn from(table: WeightedTable<T>) -> Self {
        table.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SequenceSource;

    fn table() -> WeightedTable<char> {
        WeightedTable::from_pairs("test", [('a', 1), ('b', 2), ('c', 1)]).unwrap()
    }

    #[test]
    fn picks_first_entry_reaching_the_draw() {
        let t = table();
        // scaled draws: 0.0, 1.0, 1.2, 3.0, 3.96
        let mut src = SequenceSource::new(vec![0.0, 0.25, 0.3, 0.75, 0.99]);
        let picks: Vec<char> = (0..5).map(|_| *t.sample(&mut src)).collect();
        assert_eq!(picks, vec!['a', 'a', 'b', 'b', 'c']);
    }

    #[test]
    fn degenerate_tables_are_configuration_errors() {
        let empty: Result<WeightedTable<u8>, _> = WeightedTable::new("empty", vec![]);
        assert_eq!(empty.unwrap_err(), ConfigError::EmptyTable("empty"));

        let zero = WeightedTable::from_pairs("zero", [(1u8, 3), (2u8, 0)]);
        assert_eq!(zero.unwrap_err(), ConfigError::ZeroWeight { table: "zero", index: 1 });
    }

    #[test]
    fn serde_validates_on_load() {
        let ok: WeightedTable<u32> =
            serde_json::from_str(r#"[{"item":10,"weight":9},{"item":20,"weight":1}]"#).unwrap();
        assert_eq!(ok.total_weight(), 10);
        assert_eq!(ok.probability(1), Some(0.1));

        let bad = serde_json::from_str::<WeightedTable<u32>>(r#"[{"item":10,"weight":0}]"#);
        assert!(bad.is_err());
    }
}
