pub mod perceptual;

use serde::{Deserialize, Serialize};

/// Bit length of every fingerprint.
pub const FINGERPRINT_BITS: u32 = 64;

/// A 64-bit perceptual digest of an image, compared by Hamming distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    /// Number of differing bits.
    pub fn distance(&self, other: &Fingerprint) -> u32 {
        hamming_distance(self.0, other.0)
    }

    /// Hamming distance divided by the bit length, in `[0, 1]`.
    pub fn normalized_distance(&self, other: &Fingerprint) -> f64 {
        self.distance(other) as f64 / FINGERPRINT_BITS as f64
    }

    /// Near-duplicate under `threshold` iff the distance is at most `threshold`.
    pub fn is_near_duplicate(&self, other: &Fingerprint, threshold: u32) -> bool {
        self.distance(other) <= threshold
    }

    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.0)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Compute the Hamming distance between two hash values.
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hamming_distance_identical() {
        assert_eq!(hamming_distance(0, 0), 0);
        assert_eq!(hamming_distance(u64::MAX, u64::MAX), 0);
    }

    #[test]
    fn test_hamming_distance_different() {
        assert_eq!(hamming_distance(0, 1), 1);
        assert_eq!(hamming_distance(0, 3), 2);
        assert_eq!(hamming_distance(0, u64::MAX), 64);
    }

    #[test]
    fn test_distance_symmetric_and_reflexive() {
        let samples = [0u64, 1, 0xdead_beef, 0x0f0f_0f0f_0f0f_0f0f, u64::MAX];
        for &a in &samples {
            let fa = Fingerprint(a);
            assert_eq!(fa.distance(&fa), 0);
            for &b in &samples {
                let fb = Fingerprint(b);
                assert_eq!(fa.distance(&fb), fb.distance(&fa));
            }
        }
    }

    #[test]
    fn test_normalized_distance() {
        let a = Fingerprint(0);
        assert_eq!(a.normalized_distance(&Fingerprint(u64::MAX)), 1.0);
        assert_eq!(a.normalized_distance(&Fingerprint(0xffff_ffff)), 0.5);
        assert_eq!(a.normalized_distance(&a), 0.0);
    }

    #[test]
    fn test_near_duplicate_threshold_is_inclusive() {
        let a = Fingerprint(0);
        assert!(a.is_near_duplicate(&Fingerprint(0b11111), 5));
        assert!(!a.is_near_duplicate(&Fingerprint(0b111111), 5));
    }

    #[test]
    fn test_hex_is_zero_padded() {
        let fp = Fingerprint(0x00ab_cdef_0123_4567);
        assert_eq!(fp.to_hex(), "00abcdef01234567");
        assert_eq!(Fingerprint(1).to_string(), "0000000000000001");
    }
}
