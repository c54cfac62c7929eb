//! Share layout configuration, parsed from TOML with environment variable overrides.
//!
//! Priority: environment variables > config file > defaults.
//!
//! ```toml
//! name = "Family vault"
//! groups = ["First(1/1)", "Second(1/1)", "Fam(2/4)", "Frens(3/6)"]
//! group_threshold = 2
//! iteration_exponent = 1
//! extendable = true
//! ```
//!
//! The passphrase is not part of the configuration; callers
//! pass it to generation and recovery directly.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cipher::MAX_ITERATION_EXPONENT;
use crate::shamir::MAX_SHARE_COUNT;
use crate::share::ID_LENGTH_BITS;
use crate::ShamirError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid group specification: {0:?}")]
    InvalidGroupSpec(String),
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
    #[error(transparent)]
    Layout(#[from] ShamirError),
}

/// One group of the layout: a name and its member threshold/count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupSpec {
    pub name: String,
    pub member_threshold: u8,
    pub member_count: u8,
}

impl GroupSpec {
    pub fn new(name: impl Into<String>, member_threshold: u8, member_count: u8) -> Self {
        Self {
            name: name.into(),
            member_threshold,
            member_count,
        }
    }
}

impl FromStr for GroupSpec {
    type Err = ConfigError;

    /// Accepts `Name(3/5)`, `Name(3 of 5)`, `Name(5)` (needs half, rounded
    /// up) and a bare `Name` (1/1).
    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidGroupSpec(spec.to_string());
        let trimmed = spec.trim();

        let (name, counts) = match trimmed.find('(') {
            Some(open) => {
                let inner = trimmed[open + 1..].strip_suffix(')').ok_or_else(invalid)?;
                (trimmed[..open].trim(), Some(inner))
            }
            None => (trimmed, None),
        };
        if name.is_empty() || name.contains(')') {
            return Err(invalid());
        }

        let parse = |s: &str| s.trim().parse::<u8>().map_err(|_| invalid());
        let (member_threshold, member_count) = match counts {
            None => (1, 1),
            Some(inner) => {
                let parts: Vec<&str> = if inner.contains('/') {
                    inner.split('/').collect()
                } else {
                    inner.split(" of ").collect()
                };
                match parts.as_slice() {
                    [needs, size] => (parse(needs)?, parse(size)?),
                    [size] => {
                        let size = parse(size)?;
                        (size.div_ceil(2), size)
                    }
                    _ => return Err(invalid()),
                }
            }
        };

        Ok(GroupSpec::new(name, member_threshold, member_count))
    }
}

impl TryFrom<String> for GroupSpec {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GroupSpec> for String {
    fn from(spec: GroupSpec) -> Self {
        spec.to_string()
    }
}

impl fmt::Display for GroupSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}/{})", self.name, self.member_threshold, self.member_count)
    }
}

/// Configuration for SLIP-39 generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slip39Config {
    /// Label for the share set
    #[serde(default = "default_name")]
    pub name: String,

    /// Groups, in group-index order
    #[serde(default = "default_groups")]
    pub groups: Vec<GroupSpec>,

    /// Groups needed to recover; half of the groups (rounded up) if unset
    #[serde(default)]
    pub group_threshold: Option<u8>,

    /// Passphrase cipher cost: 10000 * 2^e PBKDF2 iterations
    #[serde(default = "default_iteration_exponent")]
    pub iteration_exponent: u8,

    /// Emit extendable shares (identifier not mixed into the cipher salt)
    #[serde(default = "default_extendable")]
    pub extendable: bool,

    /// Fixed 15-bit identifier; random if unset
    #[serde(default)]
    pub identifier: Option<u16>,
}

impl Default for Slip39Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            groups: default_groups(),
            group_threshold: None,
            iteration_exponent: default_iteration_exponent(),
            extendable: default_extendable(),
            identifier: None,
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_name() -> String {
    "SLIP39".to_string()
}

fn default_groups() -> Vec<GroupSpec> {
    vec![
        GroupSpec::new("First", 1, 1),
        GroupSpec::new("Second", 1, 1),
        GroupSpec::new("Fam", 2, 4),
        GroupSpec::new("Frens", 3, 6),
    ]
}

fn default_iteration_exponent() -> u8 {
    1
}

fn default_extendable() -> bool {
    true
}

impl Slip39Config {
    /// One group of `threshold`-of-`count` members
    pub fn single_group(threshold: u8, count: u8) -> Self {
        Self {
            groups: vec![GroupSpec::new(format!("{}of{}", threshold, count), threshold, count)],
            group_threshold: Some(1),
            ..Default::default()
        }
    }

    /// Simple 2-of-3 setup (single group)
    pub fn two_of_three() -> Self {
        Self::single_group(2, 3)
    }

    /// Simple 3-of-5 setup (single group)
    pub fn three_of_five() -> Self {
        Self::single_group(3, 5)
    }

    /// Multi-group setup from (member threshold, member count) pairs
    pub fn with_groups(group_threshold: u8, groups: Vec<(u8, u8)>) -> Self {
        Self {
            group_threshold: Some(group_threshold),
            groups: groups
                .into_iter()
                .enumerate()
                .map(|(i, (t, n))| GroupSpec::new(format!("Group{}", i + 1), t, n))
                .collect(),
            ..Default::default()
        }
    }

    pub fn with_iteration_exponent(mut self, iteration_exponent: u8) -> Self {
        self.iteration_exponent = iteration_exponent;
        self
    }

    pub fn with_identifier(mut self, identifier: u16) -> Self {
        self.identifier = Some(identifier);
        self
    }

    pub fn with_extendable(mut self, extendable: bool) -> Self {
        self.extendable = extendable;
        self
    }

    /// The group threshold actually used for generation
    pub fn effective_group_threshold(&self) -> u8 {
        self.group_threshold
            .unwrap_or_else(|| self.groups.len().div_ceil(2).min(u8::MAX as usize) as u8)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load a file, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `SEEDSHARD_NAME`
    /// - `SEEDSHARD_GROUPS` (comma-separated group specs)
    /// - `SEEDSHARD_GROUP_THRESHOLD`
    /// - `SEEDSHARD_ITERATION_EXPONENT`
    /// - `SEEDSHARD_EXTENDABLE`
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
            value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            })
        }

        if let Some(v) = lookup("SEEDSHARD_NAME") {
            self.name = v;
        }
        if let Some(v) = lookup("SEEDSHARD_GROUPS") {
            self.groups = v
                .split(',')
                .map(str::parse)
                .collect::<Result<Vec<GroupSpec>, _>>()?;
        }
        if let Some(v) = lookup("SEEDSHARD_GROUP_THRESHOLD") {
            self.group_threshold = Some(parsed("SEEDSHARD_GROUP_THRESHOLD", v)?);
        }
        if let Some(v) = lookup("SEEDSHARD_ITERATION_EXPONENT") {
            self.iteration_exponent = parsed("SEEDSHARD_ITERATION_EXPONENT", v)?;
        }
        if let Some(v) = lookup("SEEDSHARD_EXTENDABLE") {
            self.extendable = parsed("SEEDSHARD_EXTENDABLE", v)?;
        }
        Ok(())
    }

    /// Validate that the layout can be encoded as SLIP-39 shares.
    pub fn validate(&self) -> Result<(), ShamirError> {
        let group_count = self.groups.len();
        if group_count == 0 || group_count > MAX_SHARE_COUNT as usize {
            return Err(ShamirError::InvalidThreshold(format!(
                "group count must be between 1 and {}, got {}",
                MAX_SHARE_COUNT, group_count
            )));
        }

        let group_threshold = self.effective_group_threshold();
        if group_threshold == 0 || group_threshold as usize > group_count {
            return Err(ShamirError::InvalidThreshold(format!(
                "group threshold {} must be between 1 and {}",
                group_threshold, group_count
            )));
        }

        for group in &self.groups {
            if group.member_threshold == 0
                || group.member_threshold > group.member_count
                || group.member_count > MAX_SHARE_COUNT
            {
                return Err(ShamirError::InvalidThreshold(format!(
                    "group {} needs 1 <= threshold <= count <= {}",
                    group, MAX_SHARE_COUNT
                )));
            }
            if group.member_threshold == 1 && group.member_count > 1 {
                return Err(ShamirError::InvalidThreshold(format!(
                    "group {}: use 1-of-1 instead of 1-of-N member sharing",
                    group
                )));
            }
        }

        if self.iteration_exponent > MAX_ITERATION_EXPONENT {
            return Err(ShamirError::InvalidThreshold(format!(
                "iteration exponent {} exceeds {}",
                self.iteration_exponent, MAX_ITERATION_EXPONENT
            )));
        }
        if let Some(id) = self.identifier {
            if id >= 1 << ID_LENGTH_BITS {
                return Err(ShamirError::InvalidThreshold(format!(
                    "identifier {} exceeds 15 bits",
                    id
                )));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
