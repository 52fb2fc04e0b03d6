//! Deterministic hashing helpers shared by the mock backends.
//!
//! Everything here is a pure function of its input string so that mock
//! predictions and plate reads are reproducible across runs and processes.

use sha2::{Digest, Sha256};

/// Map a string to a stable fraction in `[0, 1)` with two decimal places.
///
/// The SHA-256 digest is read as one big-endian integer, reduced mod 100
/// and divided by 100.
pub fn hash_fraction(value: &str) -> f64 {
    let digest = Sha256::digest(value.as_bytes());
    let rem = digest
        .iter()
        .fold(0u32, |acc, byte| (acc * 256 + u32::from(*byte)) % 100);
    f64::from(rem) / 100.0
}

/// Index into a catalog of `len` entries using a fraction in `[0, 1)`.
pub fn pick_index(fraction: f64, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    ((fraction * len as f64) as usize) % len
}

/// Condition flags derived from substrings of an image reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UriFeatures {
    pub is_night: bool,
    pub is_blur: bool,
    pub is_low_res: bool,
    pub is_rain: bool,
    pub hash_value: f64,
}

impl UriFeatures {
    pub fn from_uri(image_uri: &str) -> Self {
        let lower = image_uri.to_lowercase();
        Self {
            is_night: lower.contains("night"),
            is_blur: lower.contains("blur"),
            is_low_res: lower.contains("low_res"),
            is_rain: lower.contains("rain"),
            hash_value: hash_fraction(image_uri),
        }
    }
}

/// Small linear congruential generator for reproducible slot filling.
///
/// Not suitable for anything but deterministic mock data.
#[derive(Debug, Clone)]
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.state >> 33) as u32
    }

    /// Uniform integer in `[low, high]`.
    pub fn range_inclusive(&mut self, low: u32, high: u32) -> u32 {
        debug_assert!(low <= high);
        low + self.next_u32() % (high - low + 1)
    }

    /// Uniform float in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / f64::from(1u32 << 31)
    }

    pub fn digit(&mut self) -> char {
        char::from(b'0' + self.range_inclusive(0, 9) as u8)
    }

    pub fn upper(&mut self) -> char {
        char::from(b'A' + self.range_inclusive(0, 25) as u8)
    }
}

/// Generate a short unique identifier such as `CASE-1a2b3c4d`.
pub fn generate_id(prefix: &str) -> String {
    let uid = uuid::Uuid::new_v4().simple().to_string();
    let short = &uid[..8];
    if prefix.is_empty() {
        short.to_string()
    } else {
        format!("{prefix}-{short}")
    }
}
