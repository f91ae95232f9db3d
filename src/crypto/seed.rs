//! Secure random seed generation for new block epochs.

use rand::rngs::OsRng;
use rand::RngCore;

/// Generates 16 cryptographically secure random bytes, hex-encoded.
pub fn generate_seed_hex() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_has_expected_length() {
        let seed = generate_seed_hex();
        assert_eq!(seed.len(), 32);
        assert!(seed.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn seeds_are_not_repeated() {
        let a = generate_seed_hex();
        let b = generate_seed_hex();
        assert_ne!(a, b);
    }
}
