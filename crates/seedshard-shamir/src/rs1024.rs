//! RS1024: Reed-Solomon checksum for SLIP-39
//!
//! A Reed-Solomon code over GF(1024) that guarantees detection of any error
//! affecting at most 3 words and has less than 1 in 10^9 chance of failing
//! to detect more errors.
//!
//! The customization string is fed ahead of the data so that checksums
//! created for one share format never verify under the other.
//!
//! Reference: https://github.com/satoshilabs/slips/blob/master/slip-0039.md

/// Number of checksum words appended to every mnemonic
pub const CHECKSUM_WORDS: usize = 3;

/// Generator polynomial coefficients for RS1024
const GEN: [u32; 10] = [
    0xe0e040, 0x1c1c080, 0x3838100, 0x7070200, 0xe0e0009, 0x1c0c2412, 0x38086c24, 0x3090fc48,
    0x21b1f890, 0x3f3f120,
];

/// Customization string for non-extendable shares
pub const CS_SHAMIR: &[u8] = b"shamir";

/// Customization string for extendable shares
pub const CS_SHAMIR_EXTENDABLE: &[u8] = b"shamir_extendable";

/// Customization string selected by the share's extendable flag
pub fn customization(extendable: bool) -> &'static [u8] {
    if extendable {
        CS_SHAMIR_EXTENDABLE
    } else {
        CS_SHAMIR
    }
}

fn polymod<I: IntoIterator<Item = u16>>(values: I) -> u32 {
    let mut chk: u32 = 1;

    for v in values {
        let b = chk >> 20;
        chk = ((chk & 0xfffff) << 10) ^ u32::from(v);
        for (i, g) in GEN.iter().enumerate() {
            if (b >> i) & 1 != 0 {
                chk ^= g;
            }
        }
    }

    chk
}

fn with_customization<'a>(
    extendable: bool,
    data: &'a [u16],
) -> impl Iterator<Item = u16> + 'a {
    customization(extendable)
        .iter()
        .map(|&b| u16::from(b))
        .chain(data.iter().copied())
}

/// Verify an RS1024 checksum
///
/// `data` holds 10-bit word indices with the 3 checksum words at the end.
pub fn verify_checksum(extendable: bool, data: &[u16]) -> bool {
    polymod(with_customization(extendable, data)) == 1
}

/// Create the three 10-bit checksum words for `data`
pub fn create_checksum(extendable: bool, data: &[u16]) -> [u16; CHECKSUM_WORDS] {
    let padded = with_customization(extendable, data).chain([0u16; CHECKSUM_WORDS]);
    let polymod = polymod(padded) ^ 1;

    [
        ((polymod >> 20) & 0x3ff) as u16,
        ((polymod >> 10) & 0x3ff) as u16,
        (polymod & 0x3ff) as u16,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checksummed(extendable: bool, data: &[u16]) -> Vec<u16> {
        let mut full = data.to_vec();
        full.extend_from_slice(&create_checksum(extendable, data));
        full
    }

    #[test]
    fn test_polymod_identity() {
        assert_eq!(polymod(std::iter::empty()), 1);
    }

    #[test]
    fn test_create_and_verify() {
        let full = checksummed(false, &[100, 200, 300, 400, 500, 600]);
        assert!(verify_checksum(false, &full));
    }

    #[test]
    fn test_wrong_checksum_fails() {
        let mut full = checksummed(false, &[100, 200, 300, 400, 500, 600]);
        let last = full.len() - 1;
        full[last] ^= 1;
        assert!(!verify_checksum(false, &full));
    }

    #[test]
    fn test_customization_strings_do_not_cross_verify() {
        let full = checksummed(true, &[512, 256, 128, 64, 32, 16, 8]);
        assert!(verify_checksum(true, &full));
        assert!(!verify_checksum(false, &full));

        let full = checksummed(false, &[100, 200, 300]);
        assert!(!verify_checksum(true, &full));
    }

    #[test]
    fn test_every_single_word_substitution_detected() {
        let data: Vec<u16> = (0..17).map(|i| (i * 61 + 7) % 1024).collect();
        let full = checksummed(true, &data);

        for pos in 0..full.len() {
            for delta in [1u16, 2, 511, 1023] {
                let mut corrupted = full.clone();
                corrupted[pos] ^= delta;
                assert!(
                    !verify_checksum(true, &corrupted),
                    "undetected change at word {} (xor {})",
                    pos,
                    delta
                );
            }
        }
    }

    #[test]
    fn test_three_word_error_detection() {
        let data: Vec<u16> = vec![100, 200, 300, 400, 500, 600, 700, 800];
        let full = checksummed(false, &data);

        let mut corrupted = full.clone();
        corrupted[0] = (corrupted[0] + 1) % 1024;
        corrupted[3] = (corrupted[3] + 1) % 1024;
        assert!(!verify_checksum(false, &corrupted));

        corrupted[6] = (corrupted[6] + 1) % 1024;
        assert!(!verify_checksum(false, &corrupted));
    }

    #[test]
    fn test_transposed_words_detected() {
        let full = checksummed(false, &[1, 2, 3, 4, 5, 6]);
        let mut swapped = full.clone();
        swapped.swap(1, 2);
        assert!(!verify_checksum(false, &swapped));
    }
}
