/// [Szudzik pairing function][szudzik-pairing], with wrapping arithmetic.
///
/// ```text
/// (a, b) -> if (a<b) then (b^2 + a) else (a^2 + a + b)
/// ```
///
/// Only used for bucket selection, so overflow just folds the value.
///
/// [szudzik-pairing]: http://szudzik.com/ElegantPairing.pdf
pub fn pairing_szudzik(a: u64, b: u64) -> u64 {
    if a < b {
        b.wrapping_mul(b).wrapping_add(a)
    } else {
        a.wrapping_mul(a).wrapping_add(a).wrapping_add(b)
    }
}

/// Pairing function for two `u64` values.
pub fn pairing2(a: u64, b: u64) -> u64 {
    mix(pairing_szudzik(a, b))
}

/// Pairing function for three `u64` values.
pub fn pairing3(a: u64, b: u64, c: u64) -> u64 {
    pairing2(pairing2(a, b), c)
}

/// Finalizer from SplitMix64. Spreads the pairing result over all bits,
/// since tables only look at the low bits.
fn mix(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Index of the unordered pair `{a, b}` (with `a != b`) in a strict
/// lower-triangular table.
///
/// ```text
/// {a, b} with lo < hi  ->  hi * (hi - 1) / 2 + lo
/// ```
///
/// `(a, b)` and `(b, a)` map to the same slot, and pairs drawn from
/// `0..n` fill exactly `0..triangular_size(n)`.
pub fn triangular_index(a: usize, b: usize) -> usize {
    assert_ne!(a, b, "Diagonal pairs have no triangular slot");
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    hi * (hi - 1) / 2 + lo
}

/// Number of slots needed by [`triangular_index`] for elements `0..n`.
pub fn triangular_size(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

/// Number of bits needed to distinguish `range` values (0 for `range <= 1`).
pub fn bits_for_range(range: usize) -> u32 {
    let mut bits = 0;
    while (1usize << bits) < range {
        bits += 1;
    }
    bits
}

pub trait MyHash {
    /// Hash used for bucket selection in the node table and computed table.
    fn hash(&self) -> u64;
}

impl MyHash for (u64, u64) {
    fn hash(&self) -> u64 {
        pairing2(self.0, self.1)
    }
}

impl MyHash for (u64, u64, u64) {
    fn hash(&self) -> u64 {
        pairing3(self.0, self.1, self.2)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_szudzik() {
        // a\b  0  1  2  3  4
        // ------------------
        // 0    0  1  4  9 16
        // 1    2  3  5 10 17
        // 2    6  7  8 11 18
        assert_eq!(pairing_szudzik(0, 0), 0);
        assert_eq!(pairing_szudzik(0, 1), 1);
        assert_eq!(pairing_szudzik(1, 0), 2);
        assert_eq!(pairing_szudzik(1, 1), 3);
        assert_eq!(pairing_szudzik(0, 2), 4);
        assert_eq!(pairing_szudzik(2, 1), 7);
        assert_eq!(pairing_szudzik(0, 4), 16);
    }

    #[test]
    fn test_szudzik_does_not_overflow() {
        let x = pairing_szudzik(u64::MAX, 1);
        let y = pairing_szudzik(1, u64::MAX);
        assert_ne!(x, y);
    }

    #[test]
    fn test_triangular_index_symmetric() {
        for a in 0..20 {
            for b in 0..20 {
                if a != b {
                    assert_eq!(triangular_index(a, b), triangular_index(b, a));
                }
            }
        }
    }

    #[test]
    fn test_triangular_index_dense() {
        let n = 13;
        let mut seen = HashSet::new();
        for a in 0..n {
            for b in (a + 1)..n {
                let i = triangular_index(a, b);
                assert!(i < triangular_size(n));
                assert!(seen.insert(i), "slot {} used twice", i);
            }
        }
        assert_eq!(seen.len(), triangular_size(n));
    }

    #[test]
    #[should_panic(expected = "Diagonal pairs")]
    fn test_triangular_index_diagonal() {
        triangular_index(3, 3);
    }

    #[test]
    fn test_bits_for_range() {
        assert_eq!(bits_for_range(0), 0);
        assert_eq!(bits_for_range(1), 0);
        assert_eq!(bits_for_range(2), 1);
        assert_eq!(bits_for_range(3), 2);
        assert_eq!(bits_for_range(4), 2);
        assert_eq!(bits_for_range(5), 3);
        assert_eq!(bits_for_range(256), 8);
        assert_eq!(bits_for_range(257), 9);
    }
}
