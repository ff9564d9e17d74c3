use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ConfigError;

// Deterministic RNG using provably-fair HMAC construction
// server_seed (secret) + client_seed + nonce + block cursor
//   -> HMAC-SHA256 -> bytes -> floats in [0,1)

pub type HmacSha256 = Hmac<Sha256>;

/// Floats produced by one 32-byte HMAC block.
pub const FLOATS_PER_BLOCK: usize = 8;

pub fn derive_hash_hex(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}

/// Maps each whole 4-byte big-endian chunk to a float in `[0, 1)`.
pub fn derive_floats(hmac_bytes: &[u8]) -> Vec<f64> {
    hmac_bytes
        .chunks_exact(4)
        .map(|c| unit_from_u32(u32::from_be_bytes([c[0], c[1], c[2], c[3]])))
        .collect()
}

fn unit_from_u32(v: u32) -> f64 {
    f64::from(v) / (f64::from(u32::MAX) + 1.0)
}

/// A stream of uniform values in `[0, 1)`.
///
/// Every draw the engine makes goes through this trait, so a round can be
/// replayed from seeds or scripted in tests.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;

    /// `true` with the given probability. Consumes exactly one draw.
    fn chance(&mut self, probability: f64) -> bool {
        self.next_unit() < probability
    }
}

impl<R: RandomSource + ?Sized> RandomSource for &mut R {
    fn next_unit(&mut self) -> f64 {
        (**self).next_unit()
    }
}

/// The disclosed half and the secret half of a provably-fair seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPair {
    pub server_seed: String, // secret until rotated
    pub client_seed: String,
}

impl SeedPair {
    pub fn new(
        server_seed: impl Into<String>,
        client_seed: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let pair = Self {
            server_seed: server_seed.into(),
            client_seed: client_seed.into(),
        };
        pair.validate()?;
        Ok(pair)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_seed.is_empty() {
            return Err(ConfigError::MalformedSeed("server seed is empty"));
        }
        if self.client_seed.contains(':') {
            return Err(ConfigError::MalformedSeed("client seed may not contain ':'"));
        }
        Ok(())
    }

    pub fn server_seed_hash_hex(&self) -> String {
        derive_hash_hex(self.server_seed.as_bytes())
    }
}

#[derive(Clone)]
pub struct ProvablyFairRng {
    mac: HmacSha256,
    pub client_seed: String,
    pub nonce: u64,
}

impl std::fmt::Debug for ProvablyFairRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvablyFairRng")
            .field("client_seed", &self.client_seed)
            .field("nonce", &self.nonce)
            .finish_non_exhaustive()
    }
}

impl ProvablyFairRng {
    pub fn new(seeds: &SeedPair, nonce: u64) -> Result<Self, ConfigError> {
        seeds.validate()?;
        let mac = HmacSha256::new_from_slice(seeds.server_seed.as_bytes())
            .map_err(|_| ConfigError::MalformedSeed("server seed rejected as HMAC key"))?;
        Ok(Self {
            mac,
            client_seed: seeds.client_seed.clone(),
            nonce,
        })
    }

    /// HMAC block `cursor` of this nonce's stream.
    pub fn hmac_bytes(&self, cursor: u64) -> [u8; 32] {
        let mut mac = self.mac.clone();
        let msg = format!("{}:{}:{}", self.client_seed, self.nonce, cursor);
        mac.update(msg.as_bytes());
        let res = mac.finalize().into_bytes();
        let mut out = [0u8; 32];
        out.copy_from_slice(&res);
        out
    }

    pub fn next_floats(&self, count: usize) -> Vec<f64> {
        let mut stream = self.stream();
        (0..count).map(|_| stream.next_unit()).collect()
    }

    /// A fresh stream positioned at the first draw.
    pub fn stream(&self) -> FairStream {
        FairStream {
            rng: self.clone(),
            cursor: 0,
            buffer: Vec::new(),
            offset: 0,
            draws: 0,
        }
    }
}

/// Lazily evaluated draw sequence for one `(server, client, nonce)` triple.
#[derive(Debug, Clone)]
pub struct FairStream {
    rng: ProvablyFairRng,
    cursor: u64,
    buffer: Vec<f64>,
    offset: usize,
    draws: u64,
}

impl FairStream {
    /// Values consumed so far.
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Rewind to the first draw.
    pub fn restart(&mut self) {
        self.cursor = 0;
        self.buffer.clear();
        self.offset = 0;
        self.draws = 0;
    }
}

impl RandomSource for FairStream {
    fn next_unit(&mut self) -> f64 {
        if self.offset >= self.buffer.len() {
            let block = self.rng.hmac_bytes(self.cursor);
            self.buffer = derive_floats(&block);
            self.cursor += 1;
            self.offset = 0;
        }
        let value = self.buffer[self.offset];
        self.offset += 1;
        self.draws += 1;
        value
    }
}

/// Replays a fixed list of values, wrapping around at the end.
///
/// Useful for auditing hand-built layouts; an empty list yields `0.0`.
#[derive(Debug, Clone, Default)]
pub struct SequenceSource {
    values: Vec<f64>,
    position: usize,
}

impl SequenceSource {
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        Self {
            values: values.into(),
            position: 0,
        }
    }

    pub fn consumed(&self) -> usize {
        self.position
    }
}

impl RandomSource for SequenceSource {
    fn next_unit(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let value = self.values[self.position % self.values.len()];
        self.position += 1;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeds() -> SeedPair {
        SeedPair::new("server", "client").unwrap()
    }

    #[test]
    fn test_determinism() {
        let rng1 = ProvablyFairRng::new(&seeds(), 1).unwrap();
        let rng2 = ProvablyFairRng::new(&seeds(), 1).unwrap();
        assert_eq!(seeds().server_seed_hash_hex(), seeds().server_seed_hash_hex());
        assert_eq!(rng1.hmac_bytes(0).to_vec(), rng2.hmac_bytes(0).to_vec());
        assert_eq!(rng1.next_floats(20), rng2.next_floats(20));
    }

    #[test]
    fn nonce_changes_sequence() {
        let a = ProvablyFairRng::new(&seeds(), 1).unwrap().next_floats(8);
        let b = ProvablyFairRng::new(&seeds(), 2).unwrap().next_floats(8);
        assert_ne!(a, b);
    }

    #[test]
    fn stream_crosses_block_boundary_and_restarts() {
        let rng = ProvablyFairRng::new(&seeds(), 3).unwrap();
        let mut stream = rng.stream();
        let first: Vec<f64> = (0..20).map(|_| stream.next_unit()).collect();
        assert_eq!(stream.draws(), 20);
        assert!(first.iter().all(|v| (0.0..1.0).contains(v)));
        assert_eq!(
            &first[..FLOATS_PER_BLOCK],
            derive_floats(&rng.hmac_bytes(0)).as_slice()
        );
        assert_eq!(
            &first[FLOATS_PER_BLOCK..2 * FLOATS_PER_BLOCK],
            derive_floats(&rng.hmac_bytes(1)).as_slice()
        );

        stream.restart();
        let again: Vec<f64> = (0..20).map(|_| stream.next_unit()).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn malformed_seeds_are_rejected() {
        assert!(matches!(SeedPair::new("", "client"), Err(ConfigError::MalformedSeed(_))));
        assert!(matches!(SeedPair::new("server", "a:b"), Err(ConfigError::MalformedSeed(_))));
        assert!(SeedPair::new("server", "").is_ok());
    }

    #[test]
    fn derive_floats_reads_whole_chunks() {
        let floats = derive_floats(&[0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0, 0xff]);
        assert_eq!(floats.len(), 2);
        assert!(floats[0] > 0.99 && floats[0] < 1.0);
        assert_eq!(floats[1], 0.0);
        assert_eq!(derive_floats(&[0; 32]).len(), FLOATS_PER_BLOCK);
    }

    #[test]
    fn sequence_source_wraps() {
        let mut src = SequenceSource::new(vec![0.1, 0.9]);
        assert_eq!(src.next_unit(), 0.1);
        assert_eq!(src.next_unit(), 0.9);
        assert_eq!(src.next_unit(), 0.1);
        assert_eq!(src.consumed(), 3);
        assert!(!src.chance(0.5));
    }
}
