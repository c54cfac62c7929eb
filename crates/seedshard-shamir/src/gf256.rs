//! Galois Field GF(256) arithmetic for Shamir's Secret Sharing
//!
//! Uses the irreducible polynomial x^8 + x^4 + x^3 + x + 1 (0x11B) with
//! generator 3. This is the same field used by AES and SLIP-39.

use crate::ShamirError;

/// Discrete logarithms base 3 (`LOG[0]` is unused)
static LOG: [u8; 256] = [
    0, 0, 25, 1, 50, 2, 26, 198, 75, 199, 27, 104, 51, 238, 223, 3, 100, 4, 224, 14, 52, 141, 129,
    239, 76, 113, 8, 200, 248, 105, 28, 193, 125, 194, 29, 181, 249, 185, 39, 106, 77, 228, 166,
    114, 154, 201, 9, 120, 101, 47, 138, 5, 33, 15, 225, 36, 18, 240, 130, 69, 53, 147, 218, 142,
    150, 143, 219, 189, 54, 208, 206, 148, 19, 92, 210, 241, 64, 70, 131, 56, 102, 221, 253, 48,
    191, 6, 139, 98, 179, 37, 226, 152, 34, 136, 145, 16, 126, 110, 72, 195, 163, 182, 30, 66, 58,
    107, 40, 84, 250, 133, 61, 186, 43, 121, 10, 21, 155, 159, 94, 202, 78, 212, 172, 229, 243,
    115, 167, 87, 175, 88, 168, 80, 244, 234, 214, 116, 79, 174, 233, 213, 231, 230, 173, 232, 44,
    215, 117, 122, 235, 22, 11, 245, 89, 203, 95, 176, 156, 169, 81, 160, 127, 12, 246, 111, 23,
    196, 73, 236, 216, 67, 31, 45, 164, 118, 123, 183, 204, 187, 62, 90, 251, 96, 177, 134, 59, 82,
    161, 108, 170, 85, 41, 157, 151, 178, 135, 144, 97, 190, 220, 252, 188, 149, 207, 205, 55, 63,
    91, 209, 83, 57, 132, 60, 65, 162, 109, 71, 20, 42, 158, 93, 86, 242, 211, 171, 68, 17, 146,
    217, 35, 32, 46, 137, 180, 124, 184, 38, 119, 153, 227, 165, 103, 74, 237, 222, 197, 49, 254,
    24, 13, 99, 140, 128, 192, 247, 112, 7,
];

/// Powers of the generator: `EXP[i] = 3^i`
static EXP: [u8; 255] = [
    1, 3, 5, 15, 17, 51, 85, 255, 26, 46, 114, 150, 161, 248, 19, 53, 95, 225, 56, 72, 216, 115,
    149, 164, 247, 2, 6, 10, 30, 34, 102, 170, 229, 52, 92, 228, 55, 89, 235, 38, 106, 190, 217,
    112, 144, 171, 230, 49, 83, 245, 4, 12, 20, 60, 68, 204, 79, 209, 104, 184, 211, 110, 178, 205,
    76, 212, 103, 169, 224, 59, 77, 215, 98, 166, 241, 8, 24, 40, 120, 136, 131, 158, 185, 208,
    107, 189, 220, 127, 129, 152, 179, 206, 73, 219, 118, 154, 181, 196, 87, 249, 16, 48, 80, 240,
    11, 29, 39, 105, 187, 214, 97, 163, 254, 25, 43, 125, 135, 146, 173, 236, 47, 113, 147, 174,
    233, 32, 96, 160, 251, 22, 58, 78, 210, 109, 183, 194, 93, 231, 50, 86, 250, 21, 63, 65, 195,
    94, 226, 61, 71, 201, 64, 192, 91, 237, 44, 116, 156, 191, 218, 117, 159, 186, 213, 100, 172,
    239, 42, 126, 130, 157, 188, 223, 122, 142, 137, 128, 155, 182, 193, 88, 232, 35, 101, 175,
    234, 37, 111, 177, 200, 67, 197, 84, 252, 31, 33, 99, 165, 244, 7, 9, 27, 45, 119, 153, 176,
    203, 70, 202, 69, 207, 74, 222, 121, 139, 134, 145, 168, 227, 62, 66, 198, 81, 243, 14, 18, 54,
    90, 238, 41, 123, 141, 140, 143, 138, 133, 148, 167, 242, 13, 23, 57, 75, 221, 124, 132, 151,
    162, 253, 28, 36, 108, 180, 199, 82, 246,
];

/// Add two elements in GF(256) (XOR)
#[inline]
pub fn gf_add(a: u8, b: u8) -> u8 {
    a ^ b
}

/// Subtract two elements in GF(256) (same as add in characteristic 2)
#[inline]
pub fn gf_sub(a: u8, b: u8) -> u8 {
    a ^ b
}

/// Multiply two elements in GF(256)
#[inline]
pub fn gf_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let log_sum = LOG[a as usize] as usize + LOG[b as usize] as usize;
    EXP[log_sum % 255]
}

/// Divide two elements in GF(256)
#[inline]
pub fn gf_div(a: u8, b: u8) -> Result<u8, ShamirError> {
    if b == 0 {
        return Err(ShamirError::ArithmeticError);
    }
    if a == 0 {
        return Ok(0);
    }
    let log_diff = LOG[a as usize] as usize + 255 - LOG[b as usize] as usize;
    Ok(EXP[log_diff % 255])
}

/// Compute the multiplicative inverse of an element in GF(256)
#[inline]
pub fn gf_inv(a: u8) -> Result<u8, ShamirError> {
    gf_div(1, a)
}

/// Evaluate a polynomial at a given x value
/// coefficients[0] is the constant term, coefficients[n-1] is the highest degree
pub fn poly_eval(coefficients: &[u8], x: u8) -> u8 {
    coefficients
        .iter()
        .rev()
        .fold(0u8, |acc, &coef| gf_add(gf_mul(acc, x), coef))
}

/// Evaluate, at `x`, the unique polynomial of minimal degree passing
/// through `points`, byte-wise across equal-length values.
///
/// Points are `(x_i, y_i)` pairs with distinct `x_i`. If `x` is one of the
/// `x_i` its value is returned as is.
pub fn interpolate(points: &[(u8, &[u8])], x: u8) -> Result<Vec<u8>, ShamirError> {
    let Some(&(_, first)) = points.first() else {
        return Err(ShamirError::InsufficientShares);
    };
    if let Some(&(_, y)) = points.iter().find(|&&(xi, _)| xi == x) {
        return Ok(y.to_vec());
    }

    let len = first.len();
    let mut result = vec![0u8; len];

    for (i, &(xi, yi)) in points.iter().enumerate() {
        if yi.len() != len {
            return Err(ShamirError::MalformedMnemonic(
                "share values have different lengths".into(),
            ));
        }

        // Lagrange basis L_i(x) = prod_{j != i} (x - x_j) / (x_i - x_j)
        let mut numerator = 1u8;
        let mut denominator = 1u8;
        for (j, &(xj, _)) in points.iter().enumerate() {
            if i != j {
                numerator = gf_mul(numerator, gf_sub(x, xj));
                denominator = gf_mul(denominator, gf_sub(xi, xj));
            }
        }
        let basis = gf_div(numerator, denominator)?;

        for (out, &y) in result.iter_mut().zip(yi) {
            *out = gf_add(*out, gf_mul(y, basis));
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gf_add() {
        assert_eq!(gf_add(0x53, 0xCA), 0x99);
        assert_eq!(gf_add(0, 0x53), 0x53);
        assert_eq!(gf_add(0x53, 0x53), 0); // a + a = 0 in GF(2^n)
    }

    #[test]
    fn test_gf_mul() {
        assert_eq!(gf_mul(0, 0x53), 0);
        assert_eq!(gf_mul(0x53, 0), 0);
        assert_eq!(gf_mul(1, 0x53), 0x53);
        // AES field: 0x53 and 0xCA are inverses
        assert_eq!(gf_mul(0x53, 0xCA), 1);
        // 0x80 * 2 = 0x100, reduced by 0x11B = 0x1B
        assert_eq!(gf_mul(0x80, 2), 0x1B);
        // FIPS-197 worked example
        assert_eq!(gf_mul(0x57, 0x83), 0xC1);
    }

    #[test]
    fn test_gf_div() {
        assert_eq!(gf_div(0x53, 0x53).unwrap(), 1);
        assert_eq!(gf_div(0, 0x53).unwrap(), 0);
        let a = 0x53u8;
        let b = 0xCAu8;
        assert_eq!(gf_mul(gf_div(a, b).unwrap(), b), a);
    }

    #[test]
    fn test_division_by_zero_is_an_error() {
        assert!(matches!(gf_div(7, 0), Err(ShamirError::ArithmeticError)));
        assert!(matches!(gf_inv(0), Err(ShamirError::ArithmeticError)));
    }

    #[test]
    fn test_gf_inv() {
        for a in 1..=255u8 {
            assert_eq!(gf_mul(a, gf_inv(a).unwrap()), 1, "Failed for a={}", a);
        }
    }

    #[test]
    fn test_tables_are_consistent() {
        for i in 0..255usize {
            assert_eq!(LOG[EXP[i] as usize] as usize, i);
        }
    }

    #[test]
    fn test_poly_eval() {
        // p(x) = 5 + 3x + 2x^2
        let coeffs = [5u8, 3, 2];
        assert_eq!(poly_eval(&coeffs, 0), 5);
        // p(1) = 5 ^ 3 ^ 2
        assert_eq!(poly_eval(&coeffs, 1), 4);
        assert_eq!(poly_eval(&[], 9), 0);
    }

    #[test]
    fn test_interpolate_recovers_polynomial() {
        // p(x) = 42 + 7x + 19x^2, evaluated byte-wise for two "bytes"
        let p = |x: u8| vec![poly_eval(&[42, 7, 19], x), poly_eval(&[1, 2, 3], x)];
        let ys: Vec<Vec<u8>> = (1..=4).map(|x| p(x)).collect();
        let points: Vec<(u8, &[u8])> = (1..=4u8).zip(ys.iter().map(Vec::as_slice)).collect();

        assert_eq!(interpolate(&points[0..3], 0).unwrap(), vec![42, 1]);
        assert_eq!(interpolate(&points[1..4], 0).unwrap(), vec![42, 1]);
        assert_eq!(interpolate(&points[1..4], 200).unwrap(), p(200));
    }

    #[test]
    fn test_interpolate_at_known_point() {
        let y = [9u8, 9];
        let z = [1u8, 2];
        assert_eq!(interpolate(&[(3, &y[..]), (4, &z[..])], 4).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_interpolate_rejects_mismatched_lengths() {
        let y = [9u8, 9];
        let z = [1u8];
        assert!(interpolate(&[(3, &y[..]), (4, &z[..])], 0).is_err());
        assert!(matches!(interpolate(&[], 0), Err(ShamirError::InsufficientShares)));
    }
}
