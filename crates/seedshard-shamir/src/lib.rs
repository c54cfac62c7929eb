//! SeedShard Shamir Module
//!
//! SLIP-39 Shamir's Secret-Sharing for mnemonic codes, from the field
//! arithmetic up to incremental recovery.
//!
//! # Layers
//!
//! - [`gf256`]: GF(256) arithmetic and Lagrange interpolation
//! - [`shamir`]: one threshold split/recover engine with a digest share
//! - [`rs1024`]: the RS1024 checksum over 10-bit words
//! - [`share`]: share metadata to and from mnemonic words
//! - [`cipher`]: the passphrase Feistel cipher
//! - [`slip39`]: two-level (group, member) generation
//! - [`recovery`]: the incremental recovery state machine
//! - [`config`]: group layouts and TOML configuration
//!
//! # Example: Split and recover a 128-bit master secret
//!
//! ```
//! use seedshard_shamir::{combine_mnemonics, generate_mnemonics, Slip39Config};
//!
//! let master_secret = [0x42u8; 16];
//!
//! // One group, 3-of-5 members
//! let config = Slip39Config::single_group(3, 5).with_iteration_exponent(0);
//! let groups = generate_mnemonics(&master_secret, "", &config).unwrap();
//! assert_eq!(groups[0].len(), 5);
//!
//! // Any 3 members recover it
//! let picked = [&groups[0][4], &groups[0][0], &groups[0][2]];
//! let recovered = combine_mnemonics(&picked, "").unwrap();
//! assert_eq!(recovered.as_slice(), &master_secret);
//! ```

pub mod cipher;
pub mod config;
pub mod gf256;
pub mod recovery;
pub mod rs1024;
pub mod shamir;
pub mod share;
pub mod slip39;
pub mod wordlist;

// Re-exports
pub use config::{ConfigError, GroupSpec, Slip39Config};
pub use recovery::{GroupProgress, Recovery, RecoverySet, RecoveryState};
pub use share::Share;
pub use slip39::{
    combine_mnemonics, generate_from_bip39, generate_from_bip39_with_rng, generate_mnemonics,
    generate_mnemonics_with_rng, generate_shares, generate_shares_with_rng, random_master_secret,
    GeneratedGroup,
};

use seedshard_core::SeedError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShamirError {
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),
    #[error("Not enough shares to reconstruct")]
    InsufficientShares,
    #[error("Share digest mismatch: the shares do not belong together")]
    IntegrityError,
    #[error("Invalid mnemonic checksum")]
    ChecksumError,
    #[error("Malformed mnemonic: {0}")]
    MalformedMnemonic(String),
    #[error("Mnemonic rejected: {0}")]
    RejectedMnemonic(Box<ShamirError>),
    #[error("Share belongs to a different secret or share set")]
    IdentifierMismatch,
    #[error("Share was already supplied")]
    DuplicateShare,
    #[error("Shares of group {0} disagree on the member threshold")]
    InconsistentGroup(u8),
    #[error("Division by zero in GF(256)")]
    ArithmeticError,
    #[error("Invalid master secret: {0}")]
    InvalidSecret(String),
    #[error("Passphrase must contain only printable ASCII characters")]
    InvalidPassphrase,
    #[error(transparent)]
    Seed(#[from] SeedError),
}
