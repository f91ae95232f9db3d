//! Crypto primitives: canonical share hashing, difficulty checks, weighted
//! selection, address validation, and seed generation.

pub mod address;
pub mod pow;
pub mod seed;
pub mod weighted;

pub use address::{is_valid_address, normalize_address};
pub use pow::{canonical_input, hash_share, leading_zero_bits, ShareHash};
pub use seed::generate_seed_hex;
pub use weighted::weighted_select;
