//! Pure three-pool reward calculator.
//!
//! Given a block's shares grouped by address and the three pool budgets,
//! computes the per-address micro-token reward. No I/O, no storage access —
//! the block engine is the only caller, and it owns persisting the result.

use std::collections::HashMap;

use crate::crypto::weighted::WeightedChooser;

/// Per-block reward budgets, in micro-tokens.
#[derive(Debug, Clone, Copy)]
pub struct RewardBudgets {
    pub pool_a_micro: u64,
    pub pool_b_micro: u64,
    pub pool_c_micro: u64,
}

/// Computes rewards for a block's shares.
///
/// `shares_by_address` maps address -> raw share count (must be >= 1 for any
/// entry present). Returns a map of address -> micro-token reward; addresses
/// with a zero total contribution are omitted.
pub fn compute_rewards(
    shares_by_address: &HashMap<String, u64>,
    budgets: RewardBudgets,
    chooser: &mut dyn WeightedChooser,
) -> HashMap<String, u64> {
    let mut rewards: HashMap<String, u64> = HashMap::new();

    if shares_by_address.is_empty() {
        return rewards;
    }

    // Stable address ordering for reproducible weighted selection and Pool A.
    let mut addresses: Vec<&String> = shares_by_address.keys().collect();
    addresses.sort();

    let weights: Vec<u64> = addresses.iter().map(|a| shares_by_address[*a]).collect();

    // ---- Pool B: weighted lottery over raw shares ----
    let winner_idx = chooser.choose(&weights);
    let winner_addr: Option<&String> = winner_idx.map(|i| addresses[i]);

    if let Some(winner) = winner_addr {
        *rewards.entry(winner.clone()).or_insert(0) += budgets.pool_b_micro;
    }

    // ---- Adjusted shares for Pool A ----
    let total: u64 = weights.iter().sum();
    let mut adjusted: HashMap<&String, u64> = HashMap::new();
    for addr in &addresses {
        let raw = shares_by_address[*addr];
        let adjusted_share = if Some(*addr) == winner_addr {
            let loser_shares = total - raw;
            let penalty = loser_shares.min(total / 2);
            raw.saturating_sub(penalty) / 2
        } else {
            raw
        };
        if adjusted_share > 0 {
            adjusted.insert(addr, adjusted_share);
        }
    }

    // ---- Pool A: proportional over adjusted shares ----
    let total_adjusted: u64 = adjusted.values().sum();
    if total_adjusted > 0 {
        for (addr, share) in &adjusted {
            let amount = (*share as u128 * budgets.pool_a_micro as u128 / total_adjusted as u128)
                as u64;
            if amount > 0 {
                *rewards.entry((*addr).clone()).or_insert(0) += amount;
            }
        }
    }

    // ---- Pool C: low-earner compensation among non-winners ----
    if budgets.pool_c_micro > 0 {
        let mut non_winners: Vec<(&String, u64)> = addresses
            .iter()
            .filter(|a| Some(**a) != winner_addr)
            .map(|a| (*a, *rewards.get(*a).unwrap_or(&0)))
            .collect();

        let num_c = non_winners.len();
        if num_c > 0 {
            // Stable sort ascending by running reward.
            non_winners.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));

            // Extend the compensation prefix across a gap as long as the
            // whole Pool C budget could in principle bridge it; cut off at
            // the first gap too large for the budget to ever close.
            let mut m = num_c;
            for i in 1..num_c {
                let gap = non_winners[i].1.saturating_sub(non_winners[i - 1].1);
                if gap > budgets.pool_c_micro {
                    m = i;
                    break;
                }
            }

            let base = budgets.pool_c_micro / m as u64;
            let remainder = budgets.pool_c_micro % m as u64;
            for (idx, (addr, _)) in non_winners.iter().take(m).enumerate() {
                let mut amount = base;
                if (idx as u64) < remainder {
                    amount += 1;
                }
                if amount > 0 {
                    *rewards.entry((*addr).clone()).or_insert(0) += amount;
                }
            }
        }
    }

    rewards
}
