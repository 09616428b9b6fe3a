//! Pure image-quality metrics.
//!
//! Spatial filters use 3x3 kernels with reflect-101 borders (`dcb|abcd|cba`)
//! and grayscale uses the BT.601 luma weights, so values line up with what
//! OpenCV-based tooling reports for the same file.

use image::RgbImage;

use crate::error::ExtractError;

type Kernel = [[f64; 3]; 3];

const LAPLACIAN: Kernel = [[0.0, 1.0, 0.0], [1.0, -4.0, 1.0], [0.0, 1.0, 0.0]];
const SOBEL_X: Kernel = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
const SOBEL_Y: Kernel = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];
const GAUSSIAN: Kernel = [
    [1.0 / 16.0, 2.0 / 16.0, 1.0 / 16.0],
    [2.0 / 16.0, 4.0 / 16.0, 2.0 / 16.0],
    [1.0 / 16.0, 2.0 / 16.0, 1.0 / 16.0],
];

/// 8-bit grayscale plane.
pub struct GrayPlane {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl GrayPlane {
    pub fn from_rgb(img: &RgbImage) -> Self {
        let (width, height) = img.dimensions();
        let data = img
            .pixels()
            .map(|p| {
                let [r, g, b] = p.0;
                (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64).round() as u8
            })
            .collect();
        Self {
            width: width as usize,
            height: height as usize,
            data,
        }
    }

    fn value(&self, x: isize, y: isize) -> f64 {
        let x = reflect101(x, self.width);
        let y = reflect101(y, self.height);
        self.data[y * self.width + x] as f64
    }

    pub fn histogram(&self) -> Histogram {
        let mut counts = [0u64; 256];
        for &v in &self.data {
            counts[v as usize] += 1;
        }
        Histogram { counts }
    }
}

fn reflect101(i: isize, len: usize) -> usize {
    let n = len as isize;
    if n <= 1 {
        return 0;
    }
    let mut i = i;
    while i < 0 || i >= n {
        i = if i < 0 { -i } else { 2 * n - 2 - i };
    }
    i as usize
}

fn convolve(plane: &GrayPlane, kernel: &Kernel) -> Vec<f64> {
    let mut out = Vec::with_capacity(plane.width * plane.height);
    for y in 0..plane.height as isize {
        for x in 0..plane.width as isize {
            let mut acc = 0.0;
            for (ky, row) in kernel.iter().enumerate() {
                for (kx, weight) in row.iter().enumerate() {
                    if *weight != 0.0 {
                        acc += weight * plane.value(x + kx as isize - 1, y + ky as isize - 1);
                    }
                }
            }
            out.push(acc);
        }
    }
    out
}

/// Population mean and standard deviation. NaN for an empty slice.
fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

// ── Sharpness / noise ────────────────────────────────────────────

/// Variance of the Laplacian response. 0 for a perfectly flat image.
pub fn laplacian_variance(plane: &GrayPlane) -> f64 {
    let (_, std) = mean_std(&convolve(plane, &LAPLACIAN));
    std * std
}

/// Sum of squared horizontal plus vertical Sobel gradients.
pub fn sobel_energy(plane: &GrayPlane) -> f64 {
    let gx: f64 = convolve(plane, &SOBEL_X).iter().map(|v| v * v).sum();
    let gy: f64 = convolve(plane, &SOBEL_Y).iter().map(|v| v * v).sum();
    gx + gy
}

/// Mean absolute deviation from a 3x3 Gaussian-blurred copy.
pub fn noise_level(plane: &GrayPlane) -> f64 {
    let blurred = convolve(plane, &GAUSSIAN);
    if blurred.is_empty() {
        return f64::NAN;
    }
    let total: f64 = plane
        .data
        .iter()
        .zip(&blurred)
        .map(|(&v, b)| (v as f64 - b.round()).abs())
        .sum();
    total / blurred.len() as f64
}

// ── Histogram statistics ─────────────────────────────────────────

/// 256-bin intensity histogram of a grayscale plane.
pub struct Histogram {
    counts: [u64; 256],
}

impl Histogram {
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn mean(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return f64::NAN;
        }
        let sum: f64 = self
            .counts
            .iter()
            .enumerate()
            .map(|(v, &c)| v as f64 * c as f64)
            .sum();
        sum / total as f64
    }

    /// Median intensity; the mean of the two middle values for even counts.
    pub fn median(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return f64::NAN;
        }
        if total % 2 == 1 {
            self.value_at_rank(total / 2) as f64
        } else {
            (self.value_at_rank(total / 2 - 1) as f64 + self.value_at_rank(total / 2) as f64) / 2.0
        }
    }

    fn value_at_rank(&self, rank: u64) -> u8 {
        let mut seen = 0u64;
        for (v, &c) in self.counts.iter().enumerate() {
            seen += c;
            if seen > rank {
                return v as u8;
            }
        }
        u8::MAX
    }

    pub fn std(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return f64::NAN;
        }
        let mean = self.mean();
        let var: f64 = self
            .counts
            .iter()
            .enumerate()
            .map(|(v, &c)| (v as f64 - mean).powi(2) * c as f64)
            .sum::<f64>()
            / total as f64;
        var.sqrt()
    }

    /// `max - min` over the occupied bins.
    pub fn range(&self) -> f64 {
        let min = self.counts.iter().position(|&c| c > 0);
        let max = self.counts.iter().rposition(|&c| c > 0);
        match (min, max) {
            (Some(min), Some(max)) => (max - min) as f64,
            _ => f64::NAN,
        }
    }

    /// Shannon entropy in bits. Empty bins are skipped, so a flat image is 0.
    pub fn entropy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return f64::NAN;
        }
        let total = total as f64;
        -self
            .counts
            .iter()
            .filter(|&&c| c > 0)
            .map(|&c| {
                let p = c as f64 / total;
                p * p.log2()
            })
            .sum::<f64>()
    }
}

// ── Colour ───────────────────────────────────────────────────────

/// Mean and standard deviation of the 8-bit HSV saturation channel.
pub fn saturation_stats(img: &RgbImage) -> (f64, f64) {
    let saturation: Vec<f64> = img
        .pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            let max = r.max(g).max(b) as f64;
            let min = r.min(g).min(b) as f64;
            if max == 0.0 {
                0.0
            } else {
                (255.0 * (max - min) / max).round()
            }
        })
        .collect();
    mean_std(&saturation)
}

/// Hasler–Süsstrunk colourfulness over the red-green and yellow-blue
/// opponent channels.
pub fn colorfulness(img: &RgbImage) -> f64 {
    let mut rg = Vec::with_capacity(img.len() / 3);
    let mut yb = Vec::with_capacity(img.len() / 3);
    for p in img.pixels() {
        let [r, g, b] = p.0.map(|c| c as f64);
        rg.push((r - g).abs());
        yb.push((0.5 * (r + g) - b).abs());
    }
    let (rg_mean, rg_std) = mean_std(&rg);
    let (yb_mean, yb_std) = mean_std(&yb);
    (rg_mean.powi(2) + yb_mean.powi(2)).sqrt() + 0.3 * (rg_std + yb_std)
}

// ── Geometry ─────────────────────────────────────────────────────

/// Width over height. Fails for a zero-height image.
pub fn aspect_ratio(width: u32, height: u32) -> Result<f64, ExtractError> {
    if height == 0 {
        return Err(ExtractError::InvalidGeometry { width, height });
    }
    Ok(width as f64 / height as f64)
}
