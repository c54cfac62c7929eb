//! SeedShard Core
//!
//! Shared secret-handling types for SeedShard.
//!
//! # Secret Memory
//!
//! Master secrets, encrypted master secrets and BIP-39 seeds are carried in
//! [`SecretBuffer`], which is zeroized on drop, locked in memory where the
//! platform allows it, and never printed by `Debug`.
//!
//! # BIP-39 Interop
//!
//! The [`seed`] module converts master secret entropy to and from BIP-39
//! phrases for wallets that only understand the older standard.

pub mod memory;
pub mod seed;

pub use memory::SecretBuffer;
pub use seed::{from_bip39, to_bip39, wallet_seed, SeedError, WalletDerivation};
