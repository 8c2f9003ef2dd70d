//! # tidemark-types
//!
//! Shared domain types and unit conventions used across the tidemark
//! workspace. All money paths are integer fixed-point; floating point is
//! confined to display formatting.

use serde::{Deserialize, Serialize};

/// A holder address, kept as an opaque base58 string. Tidemark never
/// derives keys from addresses, so they are not parsed into key types.
pub type Address = String;

/// An amount of the tracked token in base units.
pub type BaseUnits = u64;

/// An amount of the native coin in lamports.
pub type Lamports = u64;

/// A fiat amount in micro-USD (1 USD = 1,000,000 micro-USD).
pub type MicroUsd = u64;

/// Balance-time credit: the sum of a holder's base-unit balance across
/// applied accumulation cycles. Wide because it is balance × cycles.
pub type Credit = u128;

/// A Unix timestamp in whole seconds.
pub type UnixSecs = u64;

/// An accumulation cycle index: `unix_secs / cycle_secs`.
pub type CycleIndex = u64;

/// Lamports per SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Micro-USD per USD.
pub const MICRO_USD_PER_USD: u64 = 1_000_000;

/// Default accumulation cycle length in seconds (10 minutes).
pub const DEFAULT_CYCLE_SECS: u64 = 600;

/// Basis points denominator.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// A holder's current balance as reported by the balance indexer.
///
/// One snapshot cycle produces one `HolderBalance` per holder with a
/// nonzero balance; zero-balance accounts may be omitted by the indexer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderBalance {
    /// The holder's address.
    pub address: Address,
    /// Token balance in base units at observation time.
    pub balance: BaseUnits,
}

/// Current Unix time in whole seconds.
pub fn now_secs() -> UnixSecs {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Convert a lamport amount to micro-USD at a micro-USD-per-SOL price.
///
/// Floor division. `None` only when the result exceeds `u64::MAX`, which
/// requires an implausible price; callers treat that as overflow.
pub fn lamports_to_micro_usd(lamports: Lamports, price_micro_usd: MicroUsd) -> Option<MicroUsd> {
    let product = u128::from(lamports) * u128::from(price_micro_usd);
    u64::try_from(product / u128::from(LAMPORTS_PER_SOL)).ok()
}

/// Serde helper carrying [`Credit`] as a decimal string.
///
/// JSON numbers top out at u64 in the RPC layer, so credit crosses the
/// wire (and lands in SQLite) as text. Deserialization accepts either a
/// string or a plain number for hand-written fixtures.
pub mod credit_str {
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// Serialize a credit value as its decimal string form.
    pub fn serialize<S: Serializer>(credit: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&credit.to_string())
    }

    /// Deserialize a credit value from a decimal string or a number.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s
                .trim()
                .parse::<u128>()
                .map_err(|e| de::Error::custom(format!("invalid credit {s:?}: {e}"))),
            Raw::Number(n) => Ok(u128::from(n)),
        }
    }
}
