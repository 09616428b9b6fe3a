use image::imageops::FilterType;
use image::DynamicImage;

use super::Fingerprint;

/// Side of the grayscale thumbnail the DCT runs on.
const DCT_SIZE: usize = 32;
/// Side of the low-frequency block kept from the DCT.
const HASH_SIZE: usize = 8;

/// Compute the DCT-based perceptual hash (pHash) of an image.
///
/// The image is reduced to a 32x32 grayscale thumbnail, transformed with a
/// 2D DCT-II, and the top-left 8x8 block of coefficients is compared against
/// its median. Bit 63 holds the DC term, then row-major order. The result
/// depends only on pixel content.
pub fn compute_fingerprint(img: &DynamicImage) -> Fingerprint {
    let thumb = img
        .grayscale()
        .resize_exact(DCT_SIZE as u32, DCT_SIZE as u32, FilterType::Lanczos3)
        .to_luma8();
    let pixels: Vec<f64> = thumb.pixels().map(|p| p.0[0] as f64).collect();
    Fingerprint(pack_above_median(&low_frequencies(&pixels)))
}

/// The `HASH_SIZE x HASH_SIZE` lowest-frequency DCT-II coefficients of a
/// `DCT_SIZE x DCT_SIZE` plane, row-major.
fn low_frequencies(pixels: &[f64]) -> Vec<f64> {
    let cos: Vec<Vec<f64>> = (0..HASH_SIZE)
        .map(|k| {
            (0..DCT_SIZE)
                .map(|n| {
                    (std::f64::consts::PI * k as f64 * (2 * n + 1) as f64 / (2 * DCT_SIZE) as f64)
                        .cos()
                })
                .collect()
        })
        .collect();

    // Rows first, keeping only the frequencies we need.
    let rows: Vec<[f64; HASH_SIZE]> = pixels
        .chunks(DCT_SIZE)
        .map(|row| {
            let mut out = [0.0; HASH_SIZE];
            for (v, slot) in out.iter_mut().enumerate() {
                *slot = row.iter().zip(&cos[v]).map(|(p, c)| p * c).sum();
            }
            out
        })
        .collect();

    let mut coeffs = Vec::with_capacity(HASH_SIZE * HASH_SIZE);
    for basis in &cos {
        for v in 0..HASH_SIZE {
            coeffs.push(rows.iter().zip(basis).map(|(r, c)| r[v] * c).sum());
        }
    }
    coeffs
}

/// One bit per coefficient, set when it lies above the median. Coefficients
/// within rounding noise of the median count as below it.
fn pack_above_median(coeffs: &[f64]) -> u64 {
    let mut sorted = coeffs.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };
    let tolerance = coeffs.iter().fold(0.0f64, |m, c| m.max(c.abs())) * 1e-9;

    coeffs
        .iter()
        .take(64)
        .enumerate()
        .filter(|&(_, &c)| c - median > tolerance)
        .fold(0u64, |bits, (i, _)| bits | 1 << (63 - i))
}
