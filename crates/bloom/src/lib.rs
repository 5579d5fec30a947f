//! # Bloom Filter
//!
//! A space-efficient probabilistic data structure for set membership testing.
//!
//! A bloom filter can tell you with certainty that a key is **not** in the set
//! (no false negatives), but may occasionally report that a key **is** in the
//! set when it isn't (false positives). The false positive rate depends on the
//! number of bits and hash functions used.
//!
//! ## Usage in LoomKV
//!
//! Each shard keeps one filter covering every key ever admitted to it. Point
//! lookups consult the filter first — a negative answer short-circuits the
//! whole read path (memtable, learned index, and every SSTable are skipped).
//!
//! ## Example
//!
//! ```rust
//! use bloom::BloomFilter;
//!
//! let bf = BloomFilter::new(1000, 0.01);
//! bf.insert(42);
//! assert!(bf.may_contain(42));
//! ```

use parking_lot::Mutex;

/// Snapshot of a filter's sizing and fill state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloomStats {
    /// Number of bits in the filter (m).
    pub bits: u64,
    /// Number of hash probes per key (k).
    pub hashes: u32,
    /// Number of keys inserted so far.
    pub inserted: u64,
}

/// A bloom filter over `i64` keys, sized for an expected capacity and target
/// false-positive probability.
///
/// Uses double hashing: probe `i` touches bit `(h1 + i * h2) mod m`, where
/// `h1` is FNV-1a over the key's little-endian bytes and `h2` folds the high
/// half of the key onto the low half.
///
/// Interior mutex; all operations take `&self` so the filter can sit beside
/// the shard's reader-writer lock without participating in it.
pub struct BloomFilter {
    inner: Mutex<BloomInner>,
    num_bits: u64,
    num_hashes: u32,
}

struct BloomInner {
    bits: Vec<u8>,
    inserted: u64,
}

impl BloomFilter {
    /// Creates a filter sized for `expected_items` with the given target
    /// `false_positive_rate`.
    ///
    /// Optimal sizing: `m = -n * ln(p) / (ln 2)^2`, `k = (m/n) * ln 2`.
    ///
    /// # Panics
    ///
    /// Panics if `expected_items` is 0 or `false_positive_rate` is not in `(0, 1)`.
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        assert!(expected_items > 0, "expected_items must be > 0");
        assert!(
            false_positive_rate > 0.0 && false_positive_rate < 1.0,
            "false_positive_rate must be in (0, 1)"
        );

        let n = expected_items as f64;
        let m = (-n * false_positive_rate.ln() / (std::f64::consts::LN_2.powi(2))).ceil() as u64;
        let m = m.max(8);

        let k = ((m as f64 / n) * std::f64::consts::LN_2).ceil() as u32;
        let k = k.max(1);

        let byte_len = ((m + 7) / 8) as usize;

        Self {
            inner: Mutex::new(BloomInner {
                bits: vec![0u8; byte_len],
                inserted: 0,
            }),
            num_bits: m,
            num_hashes: k,
        }
    }

    /// Admits a key to the filter.
    pub fn insert(&self, key: i64) {
        let (h1, h2) = hash_pair(key);
        let mut inner = self.inner.lock();
        for i in 0..self.num_hashes {
            let idx = probe(h1, h2, i, self.num_bits);
            inner.bits[(idx / 8) as usize] |= 1 << (idx % 8);
        }
        inner.inserted += 1;
    }

    /// Returns `true` if the key **might** have been admitted, `false` if it
    /// **definitely** was not.
    #[must_use]
    pub fn may_contain(&self, key: i64) -> bool {
        let (h1, h2) = hash_pair(key);
        let inner = self.inner.lock();
        for i in 0..self.num_hashes {
            let idx = probe(h1, h2, i, self.num_bits);
            if inner.bits[(idx / 8) as usize] >> (idx % 8) & 1 == 0 {
                return false;
            }
        }
        true
    }

    /// Returns a snapshot of the filter's parameters and fill count.
    #[must_use]
    pub fn stats(&self) -> BloomStats {
        BloomStats {
            bits: self.num_bits,
            hashes: self.num_hashes,
            inserted: self.inner.lock().inserted,
        }
    }
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("num_bits", &self.num_bits)
            .field("num_hashes", &self.num_hashes)
            .finish()
    }
}

/// Double hashing: probe `i` maps to `(h1 + i * h2) mod m`.
fn probe(h1: u32, h2: u32, i: u32, m: u64) -> u64 {
    (h1.wrapping_add(i.wrapping_mul(h2)) as u64) % m
}

fn hash_pair(key: i64) -> (u32, u32) {
    (fnv1a_32(&key.to_le_bytes()), fold_hash(key))
}

/// FNV-1a 32-bit over the key's little-endian byte representation.
fn fnv1a_32(data: &[u8]) -> u32 {
    const FNV_OFFSET: u32 = 0x811c9dc5;
    const FNV_PRIME: u32 = 0x01000193;
    let mut hash = FNV_OFFSET;
    for &byte in data {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Secondary hash: xor-fold the high 32 bits onto the low 32 bits.
fn fold_hash(key: i64) -> u32 {
    (key ^ (key >> 32)) as u32
}
