//! Passphrase encryption of the master secret
//!
//! SLIP-39 encrypts the master secret with a 4-round Feistel network before
//! splitting. The round function is PBKDF2-HMAC-SHA256 keyed by the round
//! number and passphrase, salted with the right half of the state.
//!
//! # Security Notes
//!
//! - Any passphrase decrypts to *some* secret; a wrong passphrase is not an
//!   error and yields a different, valid-looking wallet
//! - Non-extendable shares also salt with the share set identifier
//! - Cost doubles with each step of the iteration exponent

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::ShamirError;

/// PBKDF2 iterations at exponent 0, spread over all rounds
pub const BASE_ITERATION_COUNT: u32 = 10_000;

/// Feistel rounds
pub const ROUND_COUNT: u8 = 4;

/// Salt prefix for non-extendable shares
const CUSTOMIZATION_STRING: &[u8] = b"shamir";

/// Largest iteration exponent that fits the 4-bit share field
pub const MAX_ITERATION_EXPONENT: u8 = 15;

/// Encrypt a master secret for splitting
pub fn encrypt(
    master_secret: &[u8],
    passphrase: &str,
    iteration_exponent: u8,
    identifier: u16,
    extendable: bool,
) -> Result<Zeroizing<Vec<u8>>, ShamirError> {
    feistel(
        master_secret,
        passphrase,
        iteration_exponent,
        identifier,
        extendable,
        0..ROUND_COUNT,
    )
}

/// Decrypt a recovered encrypted master secret
pub fn decrypt(
    encrypted_secret: &[u8],
    passphrase: &str,
    iteration_exponent: u8,
    identifier: u16,
    extendable: bool,
) -> Result<Zeroizing<Vec<u8>>, ShamirError> {
    feistel(
        encrypted_secret,
        passphrase,
        iteration_exponent,
        identifier,
        extendable,
        (0..ROUND_COUNT).rev(),
    )
}

/// Check that a passphrase is printable ASCII
pub fn validate_passphrase(passphrase: &str) -> Result<(), ShamirError> {
    if passphrase.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
        Ok(())
    } else {
        Err(ShamirError::InvalidPassphrase)
    }
}

fn feistel(
    input: &[u8],
    passphrase: &str,
    iteration_exponent: u8,
    identifier: u16,
    extendable: bool,
    rounds: impl Iterator<Item = u8>,
) -> Result<Zeroizing<Vec<u8>>, ShamirError> {
    validate_passphrase(passphrase)?;
    if input.len() % 2 != 0 {
        return Err(ShamirError::InvalidSecret(
            "length must be an even number of bytes".into(),
        ));
    }
    if iteration_exponent > MAX_ITERATION_EXPONENT {
        return Err(ShamirError::MalformedMnemonic(format!(
            "iteration exponent {} exceeds {}",
            iteration_exponent, MAX_ITERATION_EXPONENT
        )));
    }

    let half = input.len() / 2;
    let mut left = Zeroizing::new(input[..half].to_vec());
    let mut right = Zeroizing::new(input[half..].to_vec());
    let salt_prefix = salt(identifier, extendable);
    let iterations = (BASE_ITERATION_COUNT << iteration_exponent) / u32::from(ROUND_COUNT);

    for round in rounds {
        let f = round_function(round, passphrase.as_bytes(), iterations, &salt_prefix, &right);
        for (l, k) in left.iter_mut().zip(f.iter()) {
            *l ^= k;
        }
        std::mem::swap(&mut left, &mut right);
    }

    // Output is R || L after the final swap
    let mut output = Zeroizing::new(Vec::with_capacity(input.len()));
    output.extend_from_slice(&right);
    output.extend_from_slice(&left);
    Ok(output)
}

fn salt(identifier: u16, extendable: bool) -> Vec<u8> {
    if extendable {
        Vec::new()
    } else {
        let mut salt = CUSTOMIZATION_STRING.to_vec();
        salt.extend_from_slice(&identifier.to_be_bytes());
        salt
    }
}

fn round_function(
    round: u8,
    passphrase: &[u8],
    iterations: u32,
    salt_prefix: &[u8],
    right: &[u8],
) -> Zeroizing<Vec<u8>> {
    let mut password = Zeroizing::new(Vec::with_capacity(passphrase.len() + 1));
    password.push(round);
    password.extend_from_slice(passphrase);

    let mut salt = Zeroizing::new(salt_prefix.to_vec());
    salt.extend_from_slice(right);

    let mut out = Zeroizing::new(vec![0u8; right.len()]);
    pbkdf2_hmac::<Sha256>(&password, &salt, iterations, &mut out);
    out
}
