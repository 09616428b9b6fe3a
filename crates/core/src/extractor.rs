use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use image::{DynamicImage, GenericImageView, RgbImage};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::control::CancelToken;
use crate::domain::{PhotoId, Skipped};
use crate::error::ExtractError;
use crate::hasher::{perceptual, Fingerprint};
use crate::scoring::metrics::{self, GrayPlane};
use crate::scoring::{Metric, MetricVector};

/// One file's outcome from `FeatureExtractor::extract_paths`.
pub type PathExtraction<'a> = (PhotoId, &'a Path, Option<Result<Features, ExtractError>>);

pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(10);
pub const DEFAULT_CHUNK_SIZE: usize = 32;

/// Settings for feature extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorConfig {
    /// Per-photo budget; a photo that exceeds it is skipped.
    pub time_budget: Duration,
    /// Photos decoded and held in memory at once.
    pub chunk_size: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            time_budget: DEFAULT_TIME_BUDGET,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Everything derived from one photo's pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Features {
    pub metrics: MetricVector,
    pub fingerprint: Fingerprint,
    pub width: u32,
    pub height: u32,
    /// Metrics that evaluated to a non-finite value and were left out.
    pub unavailable: Vec<Metric>,
}

/// Result of extracting a batch of in-memory images.
#[derive(Debug, Default)]
pub struct ExtractionBatch {
    pub extracted: Vec<(PhotoId, Features)>,
    pub skipped: Vec<Skipped>,
    pub cancelled: bool,
}

struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    fn start(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    fn check(&self) -> Result<(), ExtractError> {
        if self.started.elapsed() > self.budget {
            return Err(ExtractError::Timeout {
                budget_ms: self.budget.as_millis() as u64,
            });
        }
        Ok(())
    }
}

/// Wrap a raw interleaved RGB8 buffer as an image.
pub fn pixels_from_raw(width: u32, height: u32, rgb: Vec<u8>) -> Result<DynamicImage, ExtractError> {
    if width == 0 || height == 0 {
        return Err(ExtractError::InvalidGeometry { width, height });
    }
    let expected = width as usize * height as usize * 3;
    let actual = rgb.len();
    RgbImage::from_raw(width, height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| {
            ExtractError::Decode(format!(
                "buffer holds {actual} bytes, {width}x{height} RGB needs {expected}"
            ))
        })
}

/// Computes the metric vector and fingerprint of a photo. Holds no state
/// across calls.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    config: ExtractorConfig,
}

impl FeatureExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract features from a decoded image.
    pub fn extract(&self, img: &DynamicImage) -> Result<Features, ExtractError> {
        self.extract_within(img, &Deadline::start(self.config.time_budget))
    }

    /// Extract features from a raw RGB8 buffer.
    pub fn extract_raw(&self, width: u32, height: u32, rgb: Vec<u8>) -> Result<Features, ExtractError> {
        self.extract(&pixels_from_raw(width, height, rgb)?)
    }

    /// Decode a file and extract its features. Decoding counts against the
    /// time budget.
    pub fn extract_path(&self, path: &Path) -> Result<Features, ExtractError> {
        let deadline = Deadline::start(self.config.time_budget);
        let img = image::open(path).map_err(|e| ExtractError::Decode(e.to_string()))?;
        deadline.check()?;
        self.extract_within(&img, &deadline)
    }

    fn extract_within(&self, img: &DynamicImage, deadline: &Deadline) -> Result<Features, ExtractError> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(ExtractError::InvalidGeometry { width, height });
        }
        let aspect_ratio = metrics::aspect_ratio(width, height)?;

        let rgb: Cow<'_, RgbImage> = match img.as_rgb8() {
            Some(rgb) => Cow::Borrowed(rgb),
            None => Cow::Owned(img.to_rgb8()),
        };
        let gray = GrayPlane::from_rgb(&rgb);
        let histogram = gray.histogram();

        let mut vector = MetricVector::new();
        let mut unavailable = Vec::new();
        let mut record = |metric: Metric, value: f64| {
            if !vector.insert(metric, value) {
                debug!(%metric, value, "metric unavailable");
                unavailable.push(metric);
            }
        };

        record(Metric::Width, width as f64);
        record(Metric::Height, height as f64);
        record(Metric::AspectRatio, aspect_ratio);
        record(Metric::BrightnessMean, histogram.mean());
        record(Metric::BrightnessMedian, histogram.median());
        record(Metric::ContrastStd, histogram.std());
        record(Metric::ContrastRange, histogram.range());
        record(Metric::Entropy, histogram.entropy());
        deadline.check()?;

        record(Metric::LaplacianVar, metrics::laplacian_variance(&gray));
        deadline.check()?;
        record(Metric::SobelEnergy, metrics::sobel_energy(&gray));
        deadline.check()?;
        record(Metric::Noise, metrics::noise_level(&gray));
        deadline.check()?;

        let (saturation_mean, saturation_std) = metrics::saturation_stats(&rgb);
        record(Metric::SaturationMean, saturation_mean);
        record(Metric::SaturationStd, saturation_std);
        record(Metric::Colorfulness, metrics::colorfulness(&rgb));
        deadline.check()?;

        let fingerprint = perceptual::compute_fingerprint(img);
        deadline.check()?;

        Ok(Features {
            metrics: vector,
            fingerprint,
            width,
            height,
            unavailable,
        })
    }

    /// Extract features for files, decoding each one lazily. Runs in
    /// parallel and returns one entry per item, in input order. Photos not
    /// yet started when `cancel` fires come back as `None`.
    pub fn extract_paths<'a>(
        &self,
        items: &'a [(PhotoId, PathBuf)],
        cancel: &CancelToken,
    ) -> Vec<PathExtraction<'a>> {
        items
            .par_iter()
            .map(|(photo_id, path)| {
                if cancel.is_cancelled() {
                    return (*photo_id, path.as_path(), None);
                }
                let result = self.extract_path(path);
                if let Err(ref err) = result {
                    warn!(photo = %photo_id, path = %path.display(), %err, "extraction failed");
                }
                (*photo_id, path.as_path(), Some(result))
            })
            .collect()
    }

    /// Extract features for already-decoded images, `chunk_size` at a time.
    pub fn extract_batch(&self, items: Vec<(PhotoId, DynamicImage)>, cancel: &CancelToken) -> ExtractionBatch {
        let mut batch = ExtractionBatch::default();
        let chunk_size = self.config.chunk_size.max(1);

        for chunk in items.chunks(chunk_size) {
            if cancel.is_cancelled() {
                batch.cancelled = true;
                break;
            }
            let results: Vec<(PhotoId, Result<Features, ExtractError>)> = chunk
                .par_iter()
                .map(|(photo_id, img)| (*photo_id, self.extract(img)))
                .collect();

            for (photo_id, result) in results {
                match result {
                    Ok(features) => batch.extracted.push((photo_id, features)),
                    Err(err) => {
                        warn!(photo = %photo_id, %err, "extraction failed");
                        batch.skipped.push(Skipped {
                            photo_id: Some(photo_id),
                            path: None,
                            reason: err.into(),
                        });
                    }
                }
            }
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SkipReason;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb(rgb)))
    }

    fn textured(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 7 % 256) as u8, (y * 3 % 256) as u8, ((x ^ y) % 256) as u8])
        }))
    }

    #[test]
    fn test_solid_gray_scenario() {
        let features = FeatureExtractor::default()
            .extract(&solid(100, 100, [128, 128, 128]))
            .unwrap();
        assert_eq!(features.metrics.get(Metric::ContrastStd), Some(0.0));
        assert_eq!(features.metrics.get(Metric::Entropy), Some(0.0));
        assert_eq!(features.metrics.get(Metric::AspectRatio), Some(1.0));
        assert_eq!(features.metrics.get(Metric::LaplacianVar), Some(0.0));
        assert_eq!(features.metrics.get(Metric::Colorfulness), Some(0.0));
    }

    #[test]
    fn test_every_metric_present_and_finite() {
        let features = FeatureExtractor::default().extract(&textured(64, 48)).unwrap();
        assert!(features.metrics.is_complete());
        assert!(features.unavailable.is_empty());
        for (_, value) in features.metrics.iter() {
            assert!(value.is_finite());
        }
        assert_eq!(features.metrics.get(Metric::Width), Some(64.0));
        assert_eq!(features.metrics.get(Metric::Height), Some(48.0));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let extractor = FeatureExtractor::default();
        let a = extractor.extract(&textured(40, 30)).unwrap();
        let b = extractor.extract(&textured(40, 30)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_one_pixel_image() {
        let features = FeatureExtractor::default()
            .extract(&solid(1, 1, [10, 200, 30]))
            .unwrap();
        assert!(features.metrics.is_complete());
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let err = FeatureExtractor::default()
            .extract(&DynamicImage::new_rgb8(0, 10))
            .unwrap_err();
        assert_eq!(err, ExtractError::InvalidGeometry { width: 0, height: 10 });
    }

    #[test]
    fn test_raw_buffer_validation() {
        let extractor = FeatureExtractor::default();
        assert!(matches!(
            extractor.extract_raw(4, 0, Vec::new()),
            Err(ExtractError::InvalidGeometry { width: 4, height: 0 })
        ));
        assert!(matches!(
            extractor.extract_raw(4, 4, vec![0; 10]),
            Err(ExtractError::Decode(_))
        ));
        assert!(extractor.extract_raw(2, 2, vec![50; 12]).is_ok());
    }

    #[test]
    fn test_zero_budget_times_out() {
        let extractor = FeatureExtractor::new(ExtractorConfig {
            time_budget: Duration::ZERO,
            ..Default::default()
        });
        let err = extractor.extract(&textured(256, 256)).unwrap_err();
        assert_eq!(err, ExtractError::Timeout { budget_ms: 0 });
    }

    #[test]
    fn test_extract_path_decodes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("photo.png");
        textured(32, 32).save(&path).unwrap();

        let from_file = FeatureExtractor::default().extract_path(&path).unwrap();
        let in_memory = FeatureExtractor::default().extract(&textured(32, 32)).unwrap();
        assert_eq!(from_file, in_memory);
    }

    #[test]
    fn test_extract_path_corrupt_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.jpg");
        std::fs::write(&path, b"this is not a jpeg").unwrap();

        let err = FeatureExtractor::default().extract_path(&path).unwrap_err();
        assert!(matches!(err, ExtractError::Decode(_)));
    }

    #[test]
    fn test_batch_reports_skips_without_aborting() {
        let extractor = FeatureExtractor::new(ExtractorConfig {
            chunk_size: 2,
            ..Default::default()
        });
        let items = vec![
            (PhotoId(1), textured(16, 16)),
            (PhotoId(2), DynamicImage::new_rgb8(0, 0)),
            (PhotoId(3), solid(8, 8, [1, 2, 3])),
        ];
        let batch = extractor.extract_batch(items, &CancelToken::new());
        assert_eq!(batch.extracted.len(), 2);
        assert_eq!(batch.skipped.len(), 1);
        assert_eq!(batch.skipped[0].photo_id, Some(PhotoId(2)));
        assert_eq!(
            batch.skipped[0].reason,
            SkipReason::InvalidGeometry { width: 0, height: 0 }
        );
        assert!(!batch.cancelled);
    }

    #[test]
    fn test_extract_paths_keeps_order_and_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let good = tmp.path().join("good.png");
        let bad = tmp.path().join("bad.png");
        textured(16, 16).save(&good).unwrap();
        std::fs::write(&bad, b"garbage").unwrap();
        let items = vec![(PhotoId(7), bad.clone()), (PhotoId(3), good.clone())];

        let results = FeatureExtractor::default().extract_paths(&items, &CancelToken::new());

        assert_eq!(results.len(), 2);
        assert_eq!((results[0].0, results[0].1), (PhotoId(7), bad.as_path()));
        assert!(matches!(results[0].2, Some(Err(ExtractError::Decode(_)))));
        assert_eq!((results[1].0, results[1].1), (PhotoId(3), good.as_path()));
        assert!(matches!(results[1].2, Some(Ok(_))));
    }

    #[test]
    fn test_extract_paths_reports_unstarted_photos() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let items = vec![
            (PhotoId(1), PathBuf::from("/nowhere/a.png")),
            (PhotoId(2), PathBuf::from("/nowhere/b.png")),
        ];

        let results = FeatureExtractor::default().extract_paths(&items, &cancel);

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, _, outcome)| outcome.is_none()));
    }

    #[test]
    fn test_batch_honours_cancel() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let batch = FeatureExtractor::default().extract_batch(vec![(PhotoId(1), textured(8, 8))], &cancel);
        assert!(batch.cancelled);
        assert!(batch.extracted.is_empty());
    }
}
