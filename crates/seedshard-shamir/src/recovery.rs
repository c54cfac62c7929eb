//! Incremental SLIP-39 recovery
//!
//! Mnemonics arrive one at a time, in any order, possibly from several
//! groups. [`RecoverySet`] buckets them by group, reconstructs each group
//! share once its member threshold is reached, and reconstructs the
//! encrypted master secret once enough groups are satisfied.
//!
//! Being below a threshold is never an error: the set simply reports
//! [`Recovery::Pending`] until it has enough material.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::{debug, warn};
use seedshard_core::SecretBuffer;
use serde::Serialize;
use zeroize::Zeroizing;

use crate::cipher;
use crate::shamir::{recover_secret, RawShare};
use crate::share::{CommonParameters, Share};
use crate::ShamirError;

/// Outcome of feeding one mnemonic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RecoveryState {
    /// Nothing accepted yet
    Empty,
    /// Accepted, but the group threshold is not reached
    Collecting {
        satisfied_groups: u8,
        group_threshold: u8,
    },
    /// The last share completed its group
    GroupSatisfied {
        group_index: u8,
        satisfied_groups: u8,
        group_threshold: u8,
    },
    /// The encrypted master secret is reconstructed
    Recovered,
    /// Reconstruction failed; the set is unusable
    Failed,
}

/// Result of asking for the secret
#[derive(Debug)]
pub enum Recovery {
    Pending,
    Complete(SecretBuffer),
}

impl Recovery {
    pub fn is_complete(&self) -> bool {
        matches!(self, Recovery::Complete(_))
    }

    /// The secret, if recovery is complete
    pub fn into_secret(self) -> Option<SecretBuffer> {
        match self {
            Recovery::Complete(secret) => Some(secret),
            Recovery::Pending => None,
        }
    }
}

/// Per-group progress for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupProgress {
    pub group_index: u8,
    /// Unknown until a share of the group arrives
    pub member_threshold: Option<u8>,
    /// Distinct members supplied so far
    pub collected: u8,
    pub satisfied: bool,
}

enum GroupState {
    Collecting {
        member_threshold: u8,
        shares: BTreeMap<u8, Share>,
    },
    Satisfied {
        member_threshold: u8,
        members: BTreeSet<u8>,
        group_share: Zeroizing<Vec<u8>>,
    },
}

impl GroupState {
    fn member_threshold(&self) -> u8 {
        match self {
            GroupState::Collecting { member_threshold, .. }
            | GroupState::Satisfied { member_threshold, .. } => *member_threshold,
        }
    }

    fn contains(&self, member_index: u8) -> bool {
        match self {
            GroupState::Collecting { shares, .. } => shares.contains_key(&member_index),
            GroupState::Satisfied { members, .. } => members.contains(&member_index),
        }
    }

    fn collected(&self) -> usize {
        match self {
            GroupState::Collecting { shares, .. } => shares.len(),
            GroupState::Satisfied { members, .. } => members.len(),
        }
    }

    fn group_share(&self) -> Option<&[u8]> {
        match self {
            GroupState::Satisfied { group_share, .. } => Some(group_share.as_slice()),
            GroupState::Collecting { .. } => None,
        }
    }
}

enum Phase {
    Collecting,
    Recovered(Zeroizing<Vec<u8>>),
    Failed,
}

/// Accumulates mnemonics until the master secret can be recovered
pub struct RecoverySet {
    parameters: Option<CommonParameters>,
    groups: BTreeMap<u8, GroupState>,
    phase: Phase,
}

impl Default for RecoverySet {
    fn default() -> Self {
        Self::new()
    }
}

impl RecoverySet {
    pub fn new() -> Self {
        Self {
            parameters: None,
            groups: BTreeMap::new(),
            phase: Phase::Collecting,
        }
    }

    /// Decode a mnemonic and add it to the set
    pub fn add_mnemonic(&mut self, mnemonic: &str) -> Result<RecoveryState, ShamirError> {
        if let Some(terminal) = self.terminal()? {
            return Ok(terminal);
        }

        let share = Share::from_mnemonic(mnemonic).map_err(|e| {
            warn!("Rejected mnemonic: {}", e);
            ShamirError::RejectedMnemonic(Box::new(e))
        })?;
        self.add_share(share)
    }

    /// Add an already decoded share to the set
    pub fn add_share(&mut self, share: Share) -> Result<RecoveryState, ShamirError> {
        if let Some(terminal) = self.terminal()? {
            return Ok(terminal);
        }

        share.validate()?;
        let parameters = share.common_parameters();
        if let Some(expected) = self.parameters {
            if expected != parameters {
                warn!(
                    "Share for set {} does not match set {}",
                    parameters.identifier, expected.identifier
                );
                return Err(ShamirError::IdentifierMismatch);
            }
        }

        let group_index = share.group_index;
        let member_index = share.member_index;
        if let Some(group) = self.groups.get(&group_index) {
            if group.member_threshold() != share.member_threshold {
                return Err(ShamirError::InconsistentGroup(group_index));
            }
            if group.contains(member_index) {
                return Err(ShamirError::DuplicateShare);
            }
        }

        self.parameters = Some(parameters);
        debug!(
            "Accepted member {} of group {} (set {})",
            member_index, group_index, parameters.identifier
        );

        let group = self
            .groups
            .entry(group_index)
            .or_insert_with(|| GroupState::Collecting {
                member_threshold: share.member_threshold,
                shares: BTreeMap::new(),
            });

        let newly_satisfied = match group {
            GroupState::Satisfied { members, .. } => {
                // Beyond the threshold: remembered for duplicate detection only
                members.insert(member_index);
                false
            }
            GroupState::Collecting {
                member_threshold,
                shares,
            } => {
                let member_threshold = *member_threshold;
                shares.insert(member_index, share);
                if shares.len() < member_threshold as usize {
                    false
                } else {
                    let raw: Vec<RawShare> = shares
                        .values()
                        .map(|s| RawShare {
                            index: s.member_index,
                            data: s.value.clone(),
                        })
                        .collect();
                    let members: BTreeSet<u8> = shares.keys().copied().collect();
                    match recover_secret(member_threshold, &raw) {
                        Ok(group_share) => {
                            *group = GroupState::Satisfied {
                                member_threshold,
                                members,
                                group_share,
                            };
                            true
                        }
                        Err(e) => {
                            // Only the digest check condemns the whole set
                            shares.remove(&member_index);
                            return Err(self.fail(e));
                        }
                    }
                }
            }
        };

        let group_threshold = parameters.group_threshold;
        let satisfied_groups = self.satisfied_groups();

        if !newly_satisfied {
            return Ok(RecoveryState::Collecting {
                satisfied_groups,
                group_threshold,
            });
        }

        debug!(
            "Group {} satisfied ({} of {} groups)",
            group_index, satisfied_groups, group_threshold
        );

        if satisfied_groups < group_threshold {
            return Ok(RecoveryState::GroupSatisfied {
                group_index,
                satisfied_groups,
                group_threshold,
            });
        }

        let raw: Vec<RawShare> = self
            .groups
            .iter()
            .filter_map(|(&index, group)| {
                group.group_share().map(|data| RawShare {
                    index,
                    data: data.to_vec(),
                })
            })
            .take(group_threshold as usize)
            .collect();

        match recover_secret(group_threshold, &raw) {
            Ok(encrypted_secret) => {
                debug!("Recovered encrypted master secret of set {}", parameters.identifier);
                self.phase = Phase::Recovered(encrypted_secret);
                Ok(RecoveryState::Recovered)
            }
            Err(e) => {
                // Group shares are already committed and cannot be taken back
                warn!("Master secret reconstruction failed: {}", e);
                self.phase = Phase::Failed;
                Err(e)
            }
        }
    }

    /// Current state without adding anything
    pub fn state(&self) -> RecoveryState {
        match (&self.phase, self.parameters) {
            (Phase::Failed, _) => RecoveryState::Failed,
            (Phase::Recovered(_), _) => RecoveryState::Recovered,
            (Phase::Collecting, None) => RecoveryState::Empty,
            (Phase::Collecting, Some(parameters)) => RecoveryState::Collecting {
                satisfied_groups: self.satisfied_groups(),
                group_threshold: parameters.group_threshold,
            },
        }
    }

    pub fn is_recovered(&self) -> bool {
        matches!(self.phase, Phase::Recovered(_))
    }

    /// Decrypt the master secret with `passphrase`, once recovered
    ///
    /// A wrong passphrase is not detectable and yields a different secret.
    pub fn recovered_secret(&self, passphrase: &str) -> Result<Recovery, ShamirError> {
        match (&self.phase, self.parameters) {
            (Phase::Failed, _) => Err(ShamirError::IntegrityError),
            (Phase::Recovered(encrypted_secret), Some(parameters)) => {
                let master_secret = cipher::decrypt(
                    encrypted_secret,
                    passphrase,
                    parameters.iteration_exponent,
                    parameters.identifier,
                    parameters.extendable,
                )?;
                Ok(Recovery::Complete(SecretBuffer::from_slice(&master_secret)))
            }
            _ => Ok(Recovery::Pending),
        }
    }

    /// Progress of every group of the set, in group order
    pub fn progress(&self) -> Vec<GroupProgress> {
        let Some(parameters) = self.parameters else {
            return Vec::new();
        };

        (0..parameters.group_count)
            .map(|group_index| match self.groups.get(&group_index) {
                Some(group) => GroupProgress {
                    group_index,
                    member_threshold: Some(group.member_threshold()),
                    collected: group.collected() as u8,
                    satisfied: group.group_share().is_some(),
                },
                None => GroupProgress {
                    group_index,
                    member_threshold: None,
                    collected: 0,
                    satisfied: false,
                },
            })
            .collect()
    }

    /// Identifier of the share set being recovered
    pub fn identifier(&self) -> Option<u16> {
        self.parameters.map(|p| p.identifier)
    }

    pub fn group_threshold(&self) -> Option<u8> {
        self.parameters.map(|p| p.group_threshold)
    }

    fn satisfied_groups(&self) -> u8 {
        self.groups
            .values()
            .filter(|g| g.group_share().is_some())
            .count() as u8
    }

    fn terminal(&self) -> Result<Option<RecoveryState>, ShamirError> {
        match self.phase {
            Phase::Failed => Err(ShamirError::IntegrityError),
            Phase::Recovered(_) => Ok(Some(RecoveryState::Recovered)),
            Phase::Collecting => Ok(None),
        }
    }

    fn fail(&mut self, error: ShamirError) -> ShamirError {
        warn!("Share reconstruction failed: {}", error);
        if matches!(error, ShamirError::IntegrityError) {
            self.phase = Phase::Failed;
        }
        error
    }
}

impl fmt::Debug for RecoverySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoverySet")
            .field("identifier", &self.identifier())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Slip39Config;
    use crate::slip39::{generate_mnemonics_with_rng, generate_shares_with_rng};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SECRET: [u8; 16] = *b"recovery-secret!";

    fn mnemonics(config: &Slip39Config, seed: u64) -> Vec<Vec<String>> {
        generate_mnemonics_with_rng(&SECRET, "", config, &mut StdRng::seed_from_u64(seed))
            .unwrap()
    }

    fn secret_of(set: &RecoverySet) -> Vec<u8> {
        match set.recovered_secret("").unwrap() {
            Recovery::Complete(secret) => secret.as_slice().to_vec(),
            Recovery::Pending => panic!("still pending"),
        }
    }

    fn single_3_of_5() -> Vec<String> {
        let config = Slip39Config::single_group(3, 5).with_iteration_exponent(0);
        mnemonics(&config, 1).remove(0)
    }

    #[test]
    fn test_empty_set() {
        let set = RecoverySet::new();
        assert_eq!(set.state(), RecoveryState::Empty);
        assert!(set.progress().is_empty());
        assert!(matches!(set.recovered_secret(""), Ok(Recovery::Pending)));
    }

    #[test]
    fn test_pending_below_threshold() {
        let group = single_3_of_5();
        let mut set = RecoverySet::new();

        for mnemonic in &group[..2] {
            let state = set.add_mnemonic(mnemonic).unwrap();
            assert_eq!(
                state,
                RecoveryState::Collecting {
                    satisfied_groups: 0,
                    group_threshold: 1
                }
            );
        }
        assert!(matches!(set.recovered_secret(""), Ok(Recovery::Pending)));

        assert_eq!(set.add_mnemonic(&group[4]).unwrap(), RecoveryState::Recovered);
        assert_eq!(secret_of(&set), SECRET);
    }

    #[test]
    fn test_duplicate_mnemonic_rejected() {
        let group = single_3_of_5();
        let mut set = RecoverySet::new();
        set.add_mnemonic(&group[1]).unwrap();
        assert!(matches!(
            set.add_mnemonic(&group[1]),
            Err(ShamirError::DuplicateShare)
        ));
        // The set is still usable
        set.add_mnemonic(&group[2]).unwrap();
        set.add_mnemonic(&group[3]).unwrap();
        assert_eq!(secret_of(&set), SECRET);
    }

    #[test]
    fn test_foreign_share_is_identifier_mismatch() {
        let config = Slip39Config::two_of_three().with_iteration_exponent(0);
        let a = mnemonics(&config.clone().with_identifier(100), 1);
        let b = mnemonics(&config.with_identifier(200), 2);

        let mut set = RecoverySet::new();
        set.add_mnemonic(&a[0][0]).unwrap();
        assert!(matches!(
            set.add_mnemonic(&b[0][1]),
            Err(ShamirError::IdentifierMismatch)
        ));
        assert_eq!(set.identifier(), Some(100));
    }

    #[test]
    fn test_bad_mnemonic_is_rejected_with_cause() {
        let group = single_3_of_5();
        let mut words: Vec<&str> = group[0].split(' ').collect();
        words.swap(5, 6);
        let mut set = RecoverySet::new();

        match set.add_mnemonic(&words.join(" ")) {
            Err(ShamirError::RejectedMnemonic(cause)) => {
                assert!(matches!(*cause, ShamirError::ChecksumError))
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            set.add_mnemonic("not a mnemonic"),
            Err(ShamirError::RejectedMnemonic(_))
        ));
        assert_eq!(set.state(), RecoveryState::Empty);
    }

    #[test]
    fn test_share_of_different_length_is_rejected_before_insertion() {
        let config = Slip39Config::two_of_three()
            .with_iteration_exponent(0)
            .with_identifier(100);
        let short = generate_mnemonics_with_rng(&SECRET, "", &config, &mut StdRng::seed_from_u64(8))
            .unwrap()
            .remove(0);
        let long = generate_mnemonics_with_rng(&[7u8; 32], "", &config, &mut StdRng::seed_from_u64(9))
            .unwrap()
            .remove(0);

        let mut set = RecoverySet::new();
        set.add_mnemonic(&short[0]).unwrap();
        assert!(matches!(
            set.add_mnemonic(&long[1]),
            Err(ShamirError::IdentifierMismatch)
        ));
        assert_eq!(set.progress()[0].collected, 1);
        assert_eq!(
            set.state(),
            RecoveryState::Collecting {
                satisfied_groups: 0,
                group_threshold: 1
            }
        );

        // The remaining valid share still completes the group
        assert_eq!(set.add_mnemonic(&short[2]).unwrap(), RecoveryState::Recovered);
        assert_eq!(secret_of(&set), SECRET);
    }

    #[test]
    fn test_mixed_lengths_across_groups_rejected() {
        let config = Slip39Config::with_groups(2, vec![(1, 1), (2, 2)])
            .with_iteration_exponent(0)
            .with_identifier(300);
        let short = generate_mnemonics_with_rng(&SECRET, "", &config, &mut StdRng::seed_from_u64(10))
            .unwrap();
        let long = generate_mnemonics_with_rng(&[9u8; 32], "", &config, &mut StdRng::seed_from_u64(11))
            .unwrap();

        let mut set = RecoverySet::new();
        set.add_mnemonic(&short[1][0]).unwrap();
        // A whole satisfied group of the wrong length must not poison the top level
        assert!(matches!(
            set.add_mnemonic(&long[0][0]),
            Err(ShamirError::IdentifierMismatch)
        ));
        assert!(set.progress()[0].member_threshold.is_none());

        set.add_mnemonic(&short[0][0]).unwrap();
        assert_eq!(set.add_mnemonic(&short[1][1]).unwrap(), RecoveryState::Recovered);
        assert_eq!(secret_of(&set), SECRET);
    }

    #[test]
    fn test_inconsistent_member_threshold() {
        let config = Slip39Config::single_group(3, 5).with_iteration_exponent(0);
        let shares =
            generate_shares_with_rng(&SECRET, "", &config, &mut StdRng::seed_from_u64(3)).unwrap();
        let mut first = shares[0].shares[0].clone();
        let mut second = shares[0].shares[1].clone();
        first.member_threshold = 3;
        second.member_threshold = 2;

        let mut set = RecoverySet::new();
        set.add_share(first).unwrap();
        assert!(matches!(
            set.add_share(second),
            Err(ShamirError::InconsistentGroup(0))
        ));
    }

    #[test]
    fn test_group_index_out_of_range() {
        let config = Slip39Config::two_of_three().with_iteration_exponent(0);
        let shares =
            generate_shares_with_rng(&SECRET, "", &config, &mut StdRng::seed_from_u64(4)).unwrap();
        let mut share = shares[0].shares[0].clone();
        share.group_index = 3;

        let mut set = RecoverySet::new();
        assert!(matches!(
            set.add_share(share),
            Err(ShamirError::MalformedMnemonic(_))
        ));
    }

    #[test]
    fn test_multi_group_progress() {
        let config =
            Slip39Config::with_groups(2, vec![(2, 3), (3, 5), (1, 1)]).with_iteration_exponent(0);
        let groups = mnemonics(&config, 5);
        let mut set = RecoverySet::new();

        set.add_mnemonic(&groups[1][4]).unwrap();
        set.add_mnemonic(&groups[1][0]).unwrap();
        let state = set.add_mnemonic(&groups[1][2]).unwrap();
        assert_eq!(
            state,
            RecoveryState::GroupSatisfied {
                group_index: 1,
                satisfied_groups: 1,
                group_threshold: 2
            }
        );

        // Extra member of a satisfied group is accepted and ignored
        let state = set.add_mnemonic(&groups[1][3]).unwrap();
        assert!(matches!(state, RecoveryState::Collecting { satisfied_groups: 1, .. }));
        assert!(matches!(
            set.add_mnemonic(&groups[1][3]),
            Err(ShamirError::DuplicateShare)
        ));

        set.add_mnemonic(&groups[0][1]).unwrap();
        assert_eq!(
            set.progress(),
            vec![
                GroupProgress {
                    group_index: 0,
                    member_threshold: Some(2),
                    collected: 1,
                    satisfied: false
                },
                GroupProgress {
                    group_index: 1,
                    member_threshold: Some(3),
                    collected: 4,
                    satisfied: true
                },
                GroupProgress {
                    group_index: 2,
                    member_threshold: None,
                    collected: 0,
                    satisfied: false
                },
            ]
        );

        assert_eq!(set.add_mnemonic(&groups[2][0]).unwrap(), RecoveryState::Recovered);
        assert_eq!(secret_of(&set), SECRET);
    }

    #[test]
    fn test_add_after_recovery_is_noop() {
        let config = Slip39Config::two_of_three().with_iteration_exponent(0);
        let group = mnemonics(&config, 6).remove(0);
        let mut set = RecoverySet::new();
        set.add_mnemonic(&group[0]).unwrap();
        set.add_mnemonic(&group[2]).unwrap();

        assert_eq!(set.add_mnemonic(&group[1]).unwrap(), RecoveryState::Recovered);
        assert_eq!(set.add_mnemonic("garbage").unwrap(), RecoveryState::Recovered);
        assert_eq!(secret_of(&set), SECRET);
    }

    #[test]
    fn test_order_independence() {
        let group = single_3_of_5();
        for order in [[0, 1, 2], [2, 1, 0], [4, 0, 3], [3, 4, 1]] {
            let mut set = RecoverySet::new();
            for i in order {
                set.add_mnemonic(&group[i]).unwrap();
            }
            assert_eq!(secret_of(&set), SECRET);
        }
    }

    #[test]
    fn test_integrity_failure_is_sticky() {
        let config = Slip39Config::two_of_three().with_iteration_exponent(0);
        let shares =
            generate_shares_with_rng(&SECRET, "", &config, &mut StdRng::seed_from_u64(7)).unwrap();
        let good = shares[0].shares[0].clone();
        let mut bad = shares[0].shares[1].clone();
        bad.value[0] ^= 0x01;

        let mut set = RecoverySet::new();
        set.add_share(good).unwrap();
        assert!(matches!(set.add_share(bad), Err(ShamirError::IntegrityError)));
        assert_eq!(set.state(), RecoveryState::Failed);

        assert!(matches!(
            set.add_share(shares[0].shares[2].clone()),
            Err(ShamirError::IntegrityError)
        ));
        assert!(matches!(set.recovered_secret(""), Err(ShamirError::IntegrityError)));
    }

    #[test]
    fn test_state_serializes_for_display() {
        let json = serde_json::to_string(&RecoveryState::Collecting {
            satisfied_groups: 1,
            group_threshold: 2,
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"state":"collecting","satisfied_groups":1,"group_threshold":2}"#
        );
    }

    #[test]
    fn test_debug_hides_secret() {
        let group = single_3_of_5();
        let mut set = RecoverySet::new();
        for mnemonic in &group[..3] {
            set.add_mnemonic(mnemonic).unwrap();
        }
        let shown = format!("{:?}", set);
        assert!(shown.contains("Recovered"));
        assert!(!shown.contains("group_share"));
    }
}
