//! SLIP-39: Shamir's Secret-Sharing for Mnemonic Codes
//!
//! Two-level generation and combination on top of the share codec.
//! https://github.com/satoshilabs/slips/blob/master/slip-0039.md
//!
//! The master secret is first encrypted with the passphrase, then split
//! into group shares, and each group share is split again among the
//! group's members.

use log::debug;
use rand::{CryptoRng, RngCore};
use seedshard_core::seed::from_bip39;
use seedshard_core::SecretBuffer;

use crate::cipher;
use crate::config::Slip39Config;
use crate::recovery::{Recovery, RecoverySet};
use crate::shamir::split_secret;
use crate::share::{Share, ID_LENGTH_BITS, MIN_STRENGTH_BYTES};
use crate::ShamirError;

/// Longest master secret accepted (256 bits)
pub const MAX_STRENGTH_BYTES: usize = 32;

/// The shares of one group, in member order
#[derive(Debug, Clone)]
pub struct GeneratedGroup {
    pub name: String,
    pub member_threshold: u8,
    pub shares: Vec<Share>,
}

impl GeneratedGroup {
    /// Encode every member share as a mnemonic
    pub fn mnemonics(&self) -> Result<Vec<String>, ShamirError> {
        self.shares.iter().map(Share::to_mnemonic).collect()
    }
}

/// Check that a master secret can be shared
pub fn validate_master_secret(master_secret: &[u8]) -> Result<(), ShamirError> {
    let len = master_secret.len();
    if !(MIN_STRENGTH_BYTES..=MAX_STRENGTH_BYTES).contains(&len) || len % 2 != 0 {
        return Err(ShamirError::InvalidSecret(format!(
            "master secret must be an even number of bytes between {} and {}, got {}",
            MIN_STRENGTH_BYTES, MAX_STRENGTH_BYTES, len
        )));
    }
    Ok(())
}

/// Fresh random master secret of `len` bytes
pub fn random_master_secret<R: RngCore + CryptoRng>(
    len: usize,
    rng: &mut R,
) -> Result<SecretBuffer, ShamirError> {
    let mut secret = SecretBuffer::new(len);
    validate_master_secret(secret.as_slice())?;
    rng.fill_bytes(secret.as_mut_slice());
    Ok(secret)
}

/// Generate SLIP-39 shares from a master secret
///
/// # Arguments
/// * `master_secret` - The entropy to split (16 to 32 bytes, even length)
/// * `passphrase` - Printable ASCII; empty for none
/// * `config` - Group layout and encoding options
///
/// # Returns
/// One [`GeneratedGroup`] per configured group, in group order
pub fn generate_shares(
    master_secret: &[u8],
    passphrase: &str,
    config: &Slip39Config,
) -> Result<Vec<GeneratedGroup>, ShamirError> {
    generate_shares_with_rng(master_secret, passphrase, config, &mut rand::thread_rng())
}

/// [`generate_shares`] with an explicit entropy source
pub fn generate_shares_with_rng<R: RngCore + CryptoRng>(
    master_secret: &[u8],
    passphrase: &str,
    config: &Slip39Config,
    rng: &mut R,
) -> Result<Vec<GeneratedGroup>, ShamirError> {
    config.validate()?;
    validate_master_secret(master_secret)?;

    let identifier = config
        .identifier
        .unwrap_or_else(|| (rng.next_u32() & ((1 << ID_LENGTH_BITS) - 1)) as u16);
    let group_threshold = config.effective_group_threshold();
    let group_count = config.groups.len() as u8;

    debug!(
        "Generating share set {}: {} of {} groups, {}-byte secret",
        identifier,
        group_threshold,
        group_count,
        master_secret.len()
    );

    let encrypted_secret = cipher::encrypt(
        master_secret,
        passphrase,
        config.iteration_exponent,
        identifier,
        config.extendable,
    )?;

    let group_shares = split_secret(group_threshold, group_count, &encrypted_secret, rng)?;

    let mut groups = Vec::with_capacity(config.groups.len());
    for (spec, group_share) in config.groups.iter().zip(group_shares.iter()) {
        let members = split_secret(
            spec.member_threshold,
            spec.member_count,
            &group_share.data,
            rng,
        )?;

        let shares = members
            .into_iter()
            .map(|mut member| Share {
                identifier,
                extendable: config.extendable,
                iteration_exponent: config.iteration_exponent,
                group_index: group_share.index,
                group_threshold,
                group_count,
                member_index: member.index,
                member_threshold: spec.member_threshold,
                value: std::mem::take(&mut member.data),
            })
            .collect();

        groups.push(GeneratedGroup {
            name: spec.name.clone(),
            member_threshold: spec.member_threshold,
            shares,
        });
    }

    Ok(groups)
}

/// Generate mnemonics, one list per group
pub fn generate_mnemonics(
    master_secret: &[u8],
    passphrase: &str,
    config: &Slip39Config,
) -> Result<Vec<Vec<String>>, ShamirError> {
    generate_mnemonics_with_rng(master_secret, passphrase, config, &mut rand::thread_rng())
}

/// [`generate_mnemonics`] with an explicit entropy source
pub fn generate_mnemonics_with_rng<R: RngCore + CryptoRng>(
    master_secret: &[u8],
    passphrase: &str,
    config: &Slip39Config,
    rng: &mut R,
) -> Result<Vec<Vec<String>>, ShamirError> {
    generate_shares_with_rng(master_secret, passphrase, config, rng)?
        .iter()
        .map(GeneratedGroup::mnemonics)
        .collect()
}

/// Back up an existing BIP-39 phrase by splitting its entropy
///
/// Recovering the shares yields the BIP-39 entropy, which
/// [`seedshard_core::to_bip39`] turns back into the original phrase.
pub fn generate_from_bip39(
    phrase: &str,
    passphrase: &str,
    config: &Slip39Config,
) -> Result<Vec<GeneratedGroup>, ShamirError> {
    generate_from_bip39_with_rng(phrase, passphrase, config, &mut rand::thread_rng())
}

/// [`generate_from_bip39`] with an explicit entropy source
pub fn generate_from_bip39_with_rng<R: RngCore + CryptoRng>(
    phrase: &str,
    passphrase: &str,
    config: &Slip39Config,
    rng: &mut R,
) -> Result<Vec<GeneratedGroup>, ShamirError> {
    let words: Vec<&str> = phrase.split_whitespace().collect();
    let entropy = from_bip39(&words)?;
    generate_shares_with_rng(entropy.as_slice(), passphrase, config, rng)
}

/// Combine mnemonics to recover the master secret
///
/// Fails with [`ShamirError::InsufficientShares`] if the mnemonics do not
/// satisfy the group threshold.
pub fn combine_mnemonics<S: AsRef<str>>(
    mnemonics: &[S],
    passphrase: &str,
) -> Result<SecretBuffer, ShamirError> {
    if mnemonics.is_empty() {
        return Err(ShamirError::InsufficientShares);
    }

    let mut set = RecoverySet::new();
    for mnemonic in mnemonics {
        set.add_mnemonic(mnemonic.as_ref())?;
    }

    match set.recovered_secret(passphrase)? {
        Recovery::Complete(secret) => Ok(secret),
        Recovery::Pending => Err(ShamirError::InsufficientShares),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use seedshard_core::to_bip39;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(0x51139)
    }

    fn fast(config: Slip39Config) -> Slip39Config {
        config.with_iteration_exponent(0)
    }

    #[test]
    fn test_generate_and_combine_2_of_3() {
        let secret = [0x42u8; 16];
        let groups =
            generate_mnemonics_with_rng(&secret, "", &fast(Slip39Config::two_of_three()), &mut rng())
                .unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 3);
        for mnemonic in &groups[0] {
            assert_eq!(mnemonic.split(' ').count(), 20);
        }

        let recovered = combine_mnemonics(&groups[0][1..], "").unwrap();
        assert_eq!(recovered.as_slice(), &secret);
    }

    #[test]
    fn test_share_metadata() {
        let config = fast(Slip39Config::with_groups(2, vec![(2, 3), (3, 5)]))
            .with_identifier(1234)
            .with_extendable(false);
        let groups = generate_shares_with_rng(&[7u8; 32], "", &config, &mut rng()).unwrap();

        assert_eq!(groups[0].name, "Group1");
        for (g, group) in groups.iter().enumerate() {
            for (m, share) in group.shares.iter().enumerate() {
                assert_eq!(share.identifier, 1234);
                assert!(!share.extendable);
                assert_eq!(share.group_index, g as u8);
                assert_eq!(share.group_threshold, 2);
                assert_eq!(share.group_count, 2);
                assert_eq!(share.member_index, m as u8);
                assert_eq!(share.member_threshold, group.member_threshold);
                assert_eq!(share.value.len(), 32);
            }
        }
    }

    #[test]
    fn test_random_identifier_fits_15_bits() {
        let config = fast(Slip39Config::two_of_three());
        let mut rng = rng();
        for _ in 0..8 {
            let groups = generate_shares_with_rng(&[1u8; 16], "", &config, &mut rng).unwrap();
            assert!(groups[0].shares[0].identifier < 1 << 15);
        }
    }

    #[test]
    fn test_default_layout_recovers_from_two_groups() {
        let secret: Vec<u8> = (0u8..16).collect();
        let config = fast(Slip39Config::default());
        let groups = generate_mnemonics_with_rng(&secret, "pw", &config, &mut rng()).unwrap();
        assert_eq!(
            groups.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![1, 1, 4, 6]
        );

        let picked = vec![
            groups[2][3].clone(),
            groups[0][0].clone(),
            groups[2][1].clone(),
        ];
        let recovered = combine_mnemonics(&picked, "pw").unwrap();
        assert_eq!(recovered.as_slice(), secret.as_slice());

        // One group alone is not enough
        assert!(matches!(
            combine_mnemonics(&groups[0], "pw"),
            Err(ShamirError::InsufficientShares)
        ));
    }

    #[test]
    fn test_passphrase_changes_secret_without_error() {
        let secret = [0x99u8; 16];
        let groups =
            generate_mnemonics_with_rng(&secret, "TREZOR", &fast(Slip39Config::two_of_three()), &mut rng())
                .unwrap();

        let right = combine_mnemonics(&groups[0][..2], "TREZOR").unwrap();
        assert_eq!(right.as_slice(), &secret);

        let wrong = combine_mnemonics(&groups[0][..2], "trezor").unwrap();
        assert_ne!(wrong.as_slice(), &secret);
    }

    #[test]
    fn test_rejects_bad_secrets() {
        let config = Slip39Config::two_of_three();
        for len in [0usize, 15, 17, 34] {
            assert!(matches!(
                generate_shares_with_rng(&vec![0u8; len], "", &config, &mut rng()),
                Err(ShamirError::InvalidSecret(_))
            ));
        }
        assert!(matches!(
            generate_shares_with_rng(&[0u8; 16], "naïve", &config, &mut rng()),
            Err(ShamirError::InvalidPassphrase)
        ));
    }

    #[test]
    fn test_rejects_one_of_many_groups() {
        let config = Slip39Config::with_groups(1, vec![(1, 3)]);
        assert!(matches!(
            generate_shares_with_rng(&[0u8; 16], "", &config, &mut rng()),
            Err(ShamirError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_combine_nothing() {
        let none: [&str; 0] = [];
        assert!(matches!(
            combine_mnemonics(&none, ""),
            Err(ShamirError::InsufficientShares)
        ));
    }

    #[test]
    fn test_bip39_backup_roundtrip() {
        let phrase = "legal winner thank year wave sausage worth useful legal winner thank yellow";
        let groups =
            generate_from_bip39(phrase, "", &fast(Slip39Config::three_of_five())).unwrap();
        let mnemonics = groups[0].mnemonics().unwrap();

        let entropy = combine_mnemonics(&mnemonics[2..], "").unwrap();
        assert_eq!(to_bip39(entropy.as_slice()).unwrap().join(" "), phrase);
    }

    #[test]
    fn test_bip39_backup_is_reproducible_with_seeded_rng() {
        let phrase = "legal winner thank year wave sausage worth useful legal winner thank yellow";
        let config = fast(Slip39Config::two_of_three());
        let a = generate_from_bip39_with_rng(phrase, "", &config, &mut rng()).unwrap();
        let b = generate_from_bip39_with_rng(phrase, "", &config, &mut rng()).unwrap();
        assert_eq!(a[0].mnemonics().unwrap(), b[0].mnemonics().unwrap());

        let c = generate_from_bip39_with_rng(phrase, "", &config, &mut StdRng::seed_from_u64(9))
            .unwrap();
        assert_ne!(a[0].mnemonics().unwrap(), c[0].mnemonics().unwrap());
    }

    #[test]
    fn test_random_master_secret() {
        let a = random_master_secret(32, &mut rng()).unwrap();
        let b = random_master_secret(32, &mut StdRng::seed_from_u64(2)).unwrap();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        assert!(random_master_secret(12, &mut rng()).is_err());
    }
}
