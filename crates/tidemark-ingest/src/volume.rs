//! Per-transaction volume heuristic.
//!
//! A swap's "volume" is taken as the largest absolute lamport change across
//! all accounts touched by the transaction (`preBalances` vs
//! `postBalances`). This deliberately coarse measure needs no knowledge of
//! any particular DEX program layout. It lives alone in this module so a
//! precise instruction-level parser can replace it without touching the
//! cursor, the ledger, or accrual.

use tidemark_types::Lamports;

/// Largest absolute lamport delta across paired account balances.
///
/// Mismatched slice lengths (malformed meta) are handled by zipping to the
/// shorter side.
pub fn max_balance_delta(pre_balances: &[u64], post_balances: &[u64]) -> Lamports {
    pre_balances
        .iter()
        .zip(post_balances.iter())
        .map(|(pre, post)| pre.abs_diff(*post))
        .max()
        .unwrap_or(0)
}
