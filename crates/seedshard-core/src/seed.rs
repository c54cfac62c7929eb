//! BIP-39 interop
//!
//! Converts master secret entropy to and from BIP-39 phrases, and derives
//! wallet seeds. A SLIP-39 master secret is used directly as the BIP-32
//! seed, whereas a BIP-39 phrase is stretched through PBKDF2 into a 64-byte
//! seed; the same entropy therefore yields two unrelated wallets.
//! [`WalletDerivation`] makes the caller pick one explicitly.

use bip39::{Language, Mnemonic};
use thiserror::Error;

use crate::memory::SecretBuffer;

/// Entropy lengths (bytes) BIP-39 can encode: 12, 15, 18, 21 and 24 words.
pub const BIP39_ENTROPY_LENGTHS: [usize; 5] = [16, 20, 24, 28, 32];

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),
    #[error("Invalid entropy length: {0} bytes")]
    InvalidEntropy(usize),
}

/// How a recovered master secret becomes a wallet seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletDerivation<'a> {
    /// SLIP-39: the master secret itself is the BIP-32 seed.
    Slip39MasterSecret,
    /// BIP-39: the secret is treated as phrase entropy and stretched with
    /// the given BIP-39 passphrase.
    Bip39Seed { passphrase: &'a str },
}

/// Encode entropy as BIP-39 English words
pub fn to_bip39(entropy: &[u8]) -> Result<Vec<String>, SeedError> {
    if !BIP39_ENTROPY_LENGTHS.contains(&entropy.len()) {
        return Err(SeedError::InvalidEntropy(entropy.len()));
    }
    let mnemonic = Mnemonic::from_entropy_in(Language::English, entropy)
        .map_err(|e| SeedError::InvalidMnemonic(e.to_string()))?;
    Ok(mnemonic.words().map(str::to_string).collect())
}

/// Parse a BIP-39 phrase
pub fn parse_phrase(phrase: &str) -> Result<Mnemonic, SeedError> {
    Mnemonic::parse_in(Language::English, phrase.to_lowercase().as_str())
        .map_err(|e| SeedError::InvalidMnemonic(e.to_string()))
}

/// Decode BIP-39 words back to their entropy, verifying the checksum
pub fn from_bip39<S: AsRef<str>>(words: &[S]) -> Result<SecretBuffer, SeedError> {
    let mnemonic = parse_phrase(&join_words(words))?;
    Ok(SecretBuffer::from(mnemonic.to_entropy()))
}

/// Derive the 64-byte BIP-39 seed from a phrase and passphrase
pub fn bip39_seed<S: AsRef<str>>(words: &[S], passphrase: &str) -> Result<SecretBuffer, SeedError> {
    let mnemonic = parse_phrase(&join_words(words))?;
    Ok(SecretBuffer::from_slice(&mnemonic.to_seed(passphrase)))
}

/// Produce the wallet seed for `secret` under the chosen derivation
pub fn wallet_seed(
    secret: &[u8],
    derivation: WalletDerivation<'_>,
) -> Result<SecretBuffer, SeedError> {
    match derivation {
        WalletDerivation::Slip39MasterSecret => Ok(SecretBuffer::from_slice(secret)),
        WalletDerivation::Bip39Seed { passphrase } => {
            let words = to_bip39(secret)?;
            bip39_seed(&words, passphrase)
        }
    }
}

fn join_words<S: AsRef<str>>(words: &[S]) -> String {
    words
        .iter()
        .map(|w| w.as_ref().trim())
        .collect::<Vec<_>>()
        .join(" ")
}
