//! Cryptographically secure weighted random selection for the Pool B lottery.

use rand::rngs::OsRng;
use rand::RngCore;

/// A source of weighted-random choices. Lets the reward calculator stay a
/// pure, deterministically-testable function: production code wires up
/// `SecureChooser`, tests wire up `ForcedChooser`.
pub trait WeightedChooser {
    fn choose(&mut self, weights: &[u64]) -> Option<usize>;
}

/// Production chooser backed by a cryptographically secure RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct SecureChooser;

impl WeightedChooser for SecureChooser {
    fn choose(&mut self, weights: &[u64]) -> Option<usize> {
        weighted_select(weights)
    }
}

/// Test chooser that always returns a fixed index (or `None`), regardless of
/// weights, as long as the index is within bounds and non-zero-weighted.
#[derive(Debug, Clone, Copy)]
pub struct ForcedChooser(pub Option<usize>);

impl WeightedChooser for ForcedChooser {
    fn choose(&mut self, weights: &[u64]) -> Option<usize> {
        let total: u64 = weights.iter().sum();
        if total == 0 {
            return None;
        }
        self.0
    }
}

/// Selects an index with probability proportional to its weight.
///
/// Returns `None` when the total weight is zero. Ties in the cumulative-sum
/// scan favor the lower index.
pub fn weighted_select(weights: &[u64]) -> Option<usize> {
    let total: u128 = weights.iter().map(|&w| w as u128).sum();
    if total == 0 {
        return None;
    }

    let pick = secure_uniform_u128(total);

    let mut cumulative: u128 = 0;
    for (idx, &w) in weights.iter().enumerate() {
        cumulative += w as u128;
        if pick < cumulative {
            return Some(idx);
        }
    }
    // Unreachable given pick < total, but keep a safe fallback.
    weights.len().checked_sub(1)
}

/// Draws a uniformly distributed value in `[0, bound)` from a CSPRNG.
fn secure_uniform_u128(bound: u128) -> u128 {
    let mut rng = OsRng;
    loop {
        let hi = rng.next_u64() as u128;
        let lo = rng.next_u64() as u128;
        let raw = (hi << 64) | lo;
        // Rejection sampling to avoid modulo bias.
        let limit = u128::MAX - (u128::MAX % bound);
        if raw < limit {
            return raw % bound;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_total_weight_returns_none() {
        assert_eq!(weighted_select(&[0, 0, 0]), None);
        assert_eq!(weighted_select(&[]), None);
    }

    #[test]
    fn single_nonzero_weight_always_wins() {
        for _ in 0..20 {
            assert_eq!(weighted_select(&[0, 0, 5, 0]), Some(2));
        }
    }

    #[test]
    fn selection_is_within_bounds() {
        let weights = [3, 7, 0, 12];
        for _ in 0..200 {
            let idx = weighted_select(&weights).unwrap();
            assert!(idx < weights.len());
            assert_ne!(idx, 2); // zero-weight entry never wins
        }
    }
}
