use crate::domain::Confidence;

/// Perceptual hash Hamming distance thresholds (for 64-bit hashes).
/// Beyond ~5 bits false positives climb quickly at collection scale.
pub const PHASH_NEAR_CERTAIN_THRESHOLD: u32 = 2;
pub const PHASH_HIGH_THRESHOLD: u32 = 3;
pub const PHASH_PROBABLE_THRESHOLD: u32 = 5;

/// Label a cluster by the Hamming distance of its loosest link.
pub fn confidence_from_hamming(distance: u32) -> Confidence {
    if distance <= PHASH_NEAR_CERTAIN_THRESHOLD {
        Confidence::NearCertain
    } else if distance <= PHASH_HIGH_THRESHOLD {
        Confidence::High
    } else if distance <= PHASH_PROBABLE_THRESHOLD {
        Confidence::Probable
    } else {
        Confidence::Low
    }
}
