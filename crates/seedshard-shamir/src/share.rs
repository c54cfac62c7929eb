//! SLIP-39 share encoding
//!
//! A share is serialized as a sequence of 10-bit words:
//! - ID: 15 bits
//! - Extendable flag: 1 bit
//! - Iteration exponent: 4 bits
//! - Group index: 4 bits
//! - Group threshold - 1: 4 bits
//! - Group count - 1: 4 bits
//! - Member index: 4 bits
//! - Member threshold - 1: 4 bits
//! - Share value: left-padded with zero bits to a word boundary
//! - Checksum: 30 bits (RS1024)

use std::fmt;
use std::str::FromStr;

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::rs1024::{create_checksum, verify_checksum, CHECKSUM_WORDS};
use crate::shamir::MAX_SHARE_COUNT;
use crate::wordlist::{index_to_word, word_to_index, RADIX_BITS};
use crate::ShamirError;

/// Bits in a share set identifier
pub const ID_LENGTH_BITS: usize = 15;

/// Bits in the iteration exponent
pub const ITERATION_EXP_LENGTH_BITS: usize = 4;

/// Words holding the identifier, flags and group/member parameters
pub const METADATA_WORDS: usize = 4;

/// Shortest allowed share value (128 bits)
pub const MIN_STRENGTH_BYTES: usize = 16;

/// Shortest valid mnemonic: metadata, a 128-bit value and the checksum
pub const MIN_MNEMONIC_WORDS: usize =
    METADATA_WORDS + (MIN_STRENGTH_BYTES * 8).div_ceil(RADIX_BITS) + CHECKSUM_WORDS;

const METADATA_BITS: usize = METADATA_WORDS * RADIX_BITS;

/// One decoded (or to-be-encoded) SLIP-39 share
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Share {
    /// Random identifier common to every share of one split
    pub identifier: u16,
    /// Whether the identifier is left out of the passphrase cipher salt
    pub extendable: bool,
    /// PBKDF2 cost exponent for the passphrase cipher
    pub iteration_exponent: u8,
    /// Group index (0-indexed)
    pub group_index: u8,
    /// Groups needed to recover the secret
    pub group_threshold: u8,
    /// Total number of groups
    pub group_count: u8,
    /// Member index within group (0-indexed)
    pub member_index: u8,
    /// Members needed to recover this group's share
    pub member_threshold: u8,
    /// Share value (same length as the encrypted master secret)
    pub value: Vec<u8>,
}

/// Parameters every share of one split must agree on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonParameters {
    pub identifier: u16,
    pub extendable: bool,
    pub iteration_exponent: u8,
    pub group_threshold: u8,
    pub group_count: u8,
    /// Share values of one split all have the encrypted secret's length
    pub value_length: usize,
}

impl Share {
    /// Parameters shared by every mnemonic of the same split
    pub fn common_parameters(&self) -> CommonParameters {
        CommonParameters {
            identifier: self.identifier,
            extendable: self.extendable,
            iteration_exponent: self.iteration_exponent,
            group_threshold: self.group_threshold,
            group_count: self.group_count,
            value_length: self.value.len(),
        }
    }

    /// Check that every field fits its encoding
    pub fn validate(&self) -> Result<(), ShamirError> {
        let malformed = |msg: &str| Err(ShamirError::MalformedMnemonic(msg.into()));

        if self.identifier >= 1 << ID_LENGTH_BITS {
            return malformed("identifier exceeds 15 bits");
        }
        if self.iteration_exponent >= 1 << ITERATION_EXP_LENGTH_BITS {
            return malformed("iteration exponent exceeds 4 bits");
        }
        if self.group_count == 0 || self.group_count > MAX_SHARE_COUNT {
            return malformed("group count out of range");
        }
        if self.group_threshold == 0 || self.group_threshold > self.group_count {
            return malformed("group threshold out of range");
        }
        if self.group_index >= self.group_count {
            return malformed("group index out of range");
        }
        if self.member_threshold == 0 || self.member_threshold > MAX_SHARE_COUNT {
            return malformed("member threshold out of range");
        }
        if self.member_index >= MAX_SHARE_COUNT {
            return malformed("member index out of range");
        }
        if self.value.len() < MIN_STRENGTH_BYTES || self.value.len() % 2 != 0 {
            return malformed("share value must be an even number of bytes, at least 16");
        }
        Ok(())
    }

    /// Encode as mnemonic words, checksum included
    pub fn to_words(&self) -> Result<Vec<&'static str>, ShamirError> {
        self.validate()?;

        let mut indices = self.data_indices();
        let checksum = create_checksum(self.extendable, &indices);
        indices.extend_from_slice(&checksum);

        indices
            .iter()
            .map(|&i| {
                index_to_word(i).ok_or_else(|| {
                    ShamirError::MalformedMnemonic("word index out of range".into())
                })
            })
            .collect()
    }

    /// Encode as a single space-separated mnemonic
    pub fn to_mnemonic(&self) -> Result<String, ShamirError> {
        Ok(self.to_words()?.join(" "))
    }

    /// Parse a space-separated mnemonic (case-insensitive)
    pub fn from_mnemonic(mnemonic: &str) -> Result<Share, ShamirError> {
        let words: Vec<&str> = mnemonic.split_whitespace().collect();
        Self::from_words(&words)
    }

    /// Parse mnemonic words back to a share, verifying the checksum first
    pub fn from_words<S: AsRef<str>>(words: &[S]) -> Result<Share, ShamirError> {
        if words.len() < MIN_MNEMONIC_WORDS {
            return Err(ShamirError::MalformedMnemonic(format!(
                "mnemonic must be at least {} words, got {}",
                MIN_MNEMONIC_WORDS,
                words.len()
            )));
        }

        let value_words = words.len() - METADATA_WORDS - CHECKSUM_WORDS;
        let padding_len = (RADIX_BITS * value_words) % 16;
        if padding_len > 8 {
            return Err(ShamirError::MalformedMnemonic(format!(
                "invalid mnemonic length: {} words",
                words.len()
            )));
        }

        let mut indices: Zeroizing<Vec<u16>> = Zeroizing::new(Vec::with_capacity(words.len()));
        for (position, word) in words.iter().enumerate() {
            let word = word.as_ref().trim().to_lowercase();
            let index = word_to_index(&word).ok_or_else(|| {
                ShamirError::MalformedMnemonic(format!("unknown word at position {}", position + 1))
            })?;
            indices.push(index);
        }

        let extendable = (indices[1] >> 4) & 1 == 1;
        if !verify_checksum(extendable, &indices) {
            return Err(ShamirError::ChecksumError);
        }

        let mut bits: Zeroizing<Vec<bool>> = Zeroizing::new(Vec::new());
        for &index in &indices[..indices.len() - CHECKSUM_WORDS] {
            push_bits(&mut bits, index.into(), RADIX_BITS);
        }

        let identifier = bits_to_u16(&bits[0..15]);
        let iteration_exponent = bits_to_u8(&bits[16..20]);
        let group_index = bits_to_u8(&bits[20..24]);
        let group_threshold = bits_to_u8(&bits[24..28]) + 1;
        let group_count = bits_to_u8(&bits[28..32]) + 1;
        let member_index = bits_to_u8(&bits[32..36]);
        let member_threshold = bits_to_u8(&bits[36..40]) + 1;

        let value_bits = &bits[METADATA_BITS..];
        if value_bits[..padding_len].iter().any(|&b| b) {
            return Err(ShamirError::MalformedMnemonic("padding bits are not zero".into()));
        }
        let value: Vec<u8> = value_bits[padding_len..].chunks(8).map(bits_to_u8).collect();

        if value.len() < MIN_STRENGTH_BYTES {
            return Err(ShamirError::MalformedMnemonic(format!(
                "share value must be at least {} bits",
                MIN_STRENGTH_BYTES * 8
            )));
        }
        if group_threshold > group_count {
            return Err(ShamirError::MalformedMnemonic(
                "group threshold cannot be greater than group count".into(),
            ));
        }

        Ok(Share {
            identifier,
            extendable,
            iteration_exponent,
            group_index,
            group_threshold,
            group_count,
            member_index,
            member_threshold,
            value,
        })
    }

    /// Word indices of the metadata and padded value, without checksum
    fn data_indices(&self) -> Zeroizing<Vec<u16>> {
        let mut bits: Zeroizing<Vec<bool>> = Zeroizing::new(Vec::new());

        push_bits(&mut bits, self.identifier.into(), ID_LENGTH_BITS);
        push_bits(&mut bits, self.extendable.into(), 1);
        push_bits(&mut bits, self.iteration_exponent.into(), ITERATION_EXP_LENGTH_BITS);
        push_bits(&mut bits, self.group_index.into(), 4);
        push_bits(&mut bits, self.group_threshold.saturating_sub(1).into(), 4);
        push_bits(&mut bits, self.group_count.saturating_sub(1).into(), 4);
        push_bits(&mut bits, self.member_index.into(), 4);
        push_bits(&mut bits, self.member_threshold.saturating_sub(1).into(), 4);

        // Left-pad the value to a 10-bit boundary
        let value_bits = self.value.len() * 8;
        let padding = value_bits.div_ceil(RADIX_BITS) * RADIX_BITS - value_bits;
        push_bits(&mut bits, 0, padding);
        for &byte in &self.value {
            push_bits(&mut bits, byte.into(), 8);
        }

        Zeroizing::new(bits.chunks(RADIX_BITS).map(bits_to_u16).collect())
    }
}

impl FromStr for Share {
    type Err = ShamirError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Share::from_mnemonic(s)
    }
}

impl fmt::Debug for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Share")
            .field("identifier", &self.identifier)
            .field("extendable", &self.extendable)
            .field("iteration_exponent", &self.iteration_exponent)
            .field("group_index", &self.group_index)
            .field("group_threshold", &self.group_threshold)
            .field("group_count", &self.group_count)
            .field("member_index", &self.member_index)
            .field("member_threshold", &self.member_threshold)
            .field("value_len", &self.value.len())
            .finish()
    }
}

/// Push `num_bits` bits of a value to the bit vector (MSB first)
fn push_bits(bits: &mut Vec<bool>, value: u32, num_bits: usize) {
    for i in (0..num_bits).rev() {
        bits.push((value >> i) & 1 != 0);
    }
}

/// Convert a slice of bits to an integer (generic over output type)
fn bits_to_int<T>(bits: &[bool]) -> T
where
    T: From<u8> + std::ops::BitOrAssign + std::ops::Shl<usize, Output = T> + Default + Copy,
{
    let mut val = T::default();
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            val |= T::from(1) << (bits.len() - 1 - i);
        }
    }
    val
}

#[inline]
fn bits_to_u16(bits: &[bool]) -> u16 {
    bits_to_int(bits)
}

#[inline]
fn bits_to_u8(bits: &[bool]) -> u8 {
    bits_to_int(bits)
}
