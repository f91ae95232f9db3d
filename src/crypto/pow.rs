//! Canonical share hashing and the leading-zero-bit difficulty check.
//!
//! The canonical input is bit-exact by design: it must match what the
//! browser-side mining harness hashes, so there are no separators and no
//! alternate encodings.

use sha2::{Digest, Sha256};

/// A computed share hash, hex-encoded, plus its leading-zero-bit count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareHash {
    pub hash_hex: String,
    pub leading_zero_bits: u32,
}

/// Builds the canonical input: lowercase address || decimal block number ||
/// seed hex || nonce, concatenated with no separators, as UTF-8 bytes.
pub fn canonical_input(address: &str, block_number: u64, seed_hex: &str, nonce: &str) -> Vec<u8> {
    let mut s = String::with_capacity(address.len() + 20 + seed_hex.len() + nonce.len());
    s.push_str(address);
    s.push_str(&block_number.to_string());
    s.push_str(seed_hex);
    s.push_str(nonce);
    s.into_bytes()
}

/// Hashes the canonical input with a single SHA-256 pass.
pub fn hash_share(address: &str, block_number: u64, seed_hex: &str, nonce: &str) -> ShareHash {
    let input = canonical_input(address, block_number, seed_hex, nonce);
    let digest = Sha256::digest(&input);
    let hash_hex = hex::encode(digest);
    let leading_zero_bits = leading_zero_bits(&digest);
    ShareHash {
        hash_hex,
        leading_zero_bits,
    }
}

/// Counts leading zero bits of a digest, treating it as a big-endian bit string.
pub fn leading_zero_bits(digest: &[u8]) -> u32 {
    let mut count = 0u32;
    for byte in digest {
        if *byte == 0 {
            count += 8;
            continue;
        }
        count += byte.leading_zeros();
        break;
    }
    count
}
