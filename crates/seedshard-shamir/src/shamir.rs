//! Core Shamir's Secret Sharing implementation
//!
//! Split a secret into N shares where any M can reconstruct it.
//!
//! Follows the SLIP-39 construction: the secret is the polynomial's value at
//! x = 255 and a digest share sits at x = 254. The digest share holds
//! `HMAC-SHA256(R, secret)[..4] || R` for random `R`, so combining shares
//! from different splits (or too few shares of a tampered set) is detected
//! instead of silently yielding garbage.

use std::fmt;

use hmac::{Hmac, Mac};
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::gf256::interpolate;
use crate::ShamirError;

type HmacSha256 = Hmac<Sha256>;

/// Maximum number of shares in one split (4-bit indices)
pub const MAX_SHARE_COUNT: u8 = 16;

/// Evaluation point holding the secret
pub const SECRET_INDEX: u8 = 255;

/// Evaluation point holding the digest share
pub const DIGEST_INDEX: u8 = 254;

/// Bytes of HMAC output kept in the digest share
pub const DIGEST_LENGTH: usize = 4;

/// A single share of a secret
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct RawShare {
    /// Evaluation point (0..count)
    pub index: u8,
    /// Share data (same length as original secret)
    pub data: Vec<u8>,
}

impl fmt::Debug for RawShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawShare")
            .field("index", &self.index)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Split a secret into shares using Shamir's Secret Sharing
///
/// # Arguments
/// * `threshold` - Minimum shares needed to reconstruct (M)
/// * `count` - Total shares to generate (N)
/// * `secret` - The secret bytes to split
/// * `rng` - Entropy source for the random polynomial
///
/// # Returns
/// Vector of N shares with indices `0..N`, any M of which reconstruct the secret.
/// With M = 1 every share is a copy of the secret.
pub fn split_secret<R: RngCore + CryptoRng>(
    threshold: u8,
    count: u8,
    secret: &[u8],
    rng: &mut R,
) -> Result<Vec<RawShare>, ShamirError> {
    validate_threshold(threshold, count)?;

    if threshold == 1 {
        return Ok((0..count)
            .map(|index| RawShare {
                index,
                data: secret.to_vec(),
            })
            .collect());
    }

    if secret.len() <= DIGEST_LENGTH {
        return Err(ShamirError::InvalidSecret(format!(
            "secret must be longer than {} bytes",
            DIGEST_LENGTH
        )));
    }

    let random_share_count = threshold - 2;
    let mut shares: Vec<RawShare> = (0..random_share_count)
        .map(|index| {
            let mut data = vec![0u8; secret.len()];
            rng.fill_bytes(&mut data);
            RawShare { index, data }
        })
        .collect();

    let mut random_part = Zeroizing::new(vec![0u8; secret.len() - DIGEST_LENGTH]);
    rng.fill_bytes(&mut random_part);

    let mut digest_share = Zeroizing::new(create_digest(&random_part, secret)?.to_vec());
    digest_share.extend_from_slice(&random_part);

    // Base points: the random shares, the digest share and the secret
    let mut base: Vec<(u8, &[u8])> = shares.iter().map(|s| (s.index, s.data.as_slice())).collect();
    base.push((DIGEST_INDEX, digest_share.as_slice()));
    base.push((SECRET_INDEX, secret));

    let derived = (random_share_count..count)
        .map(|index| {
            interpolate(&base, index).map(|data| RawShare { index, data })
        })
        .collect::<Result<Vec<_>, _>>()?;
    shares.extend(derived);

    Ok(shares)
}

/// Reconstruct a secret from shares
///
/// # Arguments
/// * `threshold` - The threshold the shares were split with
/// * `shares` - At least `threshold` shares with distinct indices
///
/// # Returns
/// The original secret bytes, after verifying the digest share
pub fn recover_secret(threshold: u8, shares: &[RawShare]) -> Result<Zeroizing<Vec<u8>>, ShamirError> {
    if threshold == 0 {
        return Err(ShamirError::InvalidThreshold("threshold must be at least 1".into()));
    }
    if shares.is_empty() || shares.len() < threshold as usize {
        return Err(ShamirError::InsufficientShares);
    }

    let mut indices: Vec<u8> = shares.iter().map(|s| s.index).collect();
    indices.sort_unstable();
    indices.dedup();
    if indices.len() != shares.len() {
        return Err(ShamirError::DuplicateShare);
    }

    if threshold == 1 {
        return Ok(Zeroizing::new(shares[0].data.clone()));
    }

    let points: Vec<(u8, &[u8])> = shares.iter().map(|s| (s.index, s.data.as_slice())).collect();
    let secret = Zeroizing::new(interpolate(&points, SECRET_INDEX)?);
    let digest_share = Zeroizing::new(interpolate(&points, DIGEST_INDEX)?);

    if digest_share.len() <= DIGEST_LENGTH {
        return Err(ShamirError::IntegrityError);
    }
    let (digest, random_part) = digest_share.split_at(DIGEST_LENGTH);
    let expected = create_digest(random_part, &secret)?;

    // Constant-time comparison
    let diff = digest
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));
    if diff != 0 {
        return Err(ShamirError::IntegrityError);
    }

    Ok(secret)
}

fn validate_threshold(threshold: u8, count: u8) -> Result<(), ShamirError> {
    if threshold < 1 {
        return Err(ShamirError::InvalidThreshold("threshold must be at least 1".into()));
    }
    if threshold > count {
        return Err(ShamirError::InvalidThreshold(format!(
            "threshold {} exceeds share count {}",
            threshold, count
        )));
    }
    if count > MAX_SHARE_COUNT {
        return Err(ShamirError::InvalidThreshold(format!(
            "share count {} exceeds {}",
            count, MAX_SHARE_COUNT
        )));
    }
    Ok(())
}

fn create_digest(random_part: &[u8], secret: &[u8]) -> Result<[u8; DIGEST_LENGTH], ShamirError> {
    // HMAC accepts keys of any length; the error arm is unreachable in practice.
    let mut mac =
        HmacSha256::new_from_slice(random_part).map_err(|_| ShamirError::IntegrityError)?;
    mac.update(secret);
    let tag = mac.finalize().into_bytes();

    let mut digest = [0u8; DIGEST_LENGTH];
    digest.copy_from_slice(&tag[..DIGEST_LENGTH]);
    Ok(digest)
}
