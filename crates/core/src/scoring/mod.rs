pub mod metrics;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::PhotoId;
use crate::error::Result;
use crate::store::ScoreStore;

/// The fixed vocabulary of quality metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Metric {
    LaplacianVar,
    SobelEnergy,
    Noise,
    BrightnessMean,
    BrightnessMedian,
    SaturationMean,
    SaturationStd,
    ContrastStd,
    ContrastRange,
    Colorfulness,
    Entropy,
    Width,
    Height,
    AspectRatio,
}

impl Metric {
    pub const ALL: [Metric; 14] = [
        Metric::LaplacianVar,
        Metric::SobelEnergy,
        Metric::Noise,
        Metric::BrightnessMean,
        Metric::BrightnessMedian,
        Metric::SaturationMean,
        Metric::SaturationStd,
        Metric::ContrastStd,
        Metric::ContrastRange,
        Metric::Colorfulness,
        Metric::Entropy,
        Metric::Width,
        Metric::Height,
        Metric::AspectRatio,
    ];

    /// Storage key of the metric.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LaplacianVar => "laplacian_var",
            Self::SobelEnergy => "sobel_energy",
            Self::Noise => "noise",
            Self::BrightnessMean => "brightness_mean",
            Self::BrightnessMedian => "brightness_median",
            Self::SaturationMean => "saturation_mean",
            Self::SaturationStd => "saturation_std",
            Self::ContrastStd => "contrast_std",
            Self::ContrastRange => "contrast_range",
            Self::Colorfulness => "colorfulness",
            Self::Entropy => "entropy",
            Self::Width => "width",
            Self::Height => "height",
            Self::AspectRatio => "aspect_ratio",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.name() == name)
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Named quality measurements for one photo. Only finite values are held.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricVector {
    values: BTreeMap<Metric, f64>,
}

impl MetricVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value. Returns false (and stores nothing) for NaN or infinity.
    pub fn insert(&mut self, metric: Metric, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        self.values.insert(metric, value);
        true
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.values.get(&metric).copied()
    }

    pub fn contains(&self, metric: Metric) -> bool {
        self.values.contains_key(&metric)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether every metric of the vocabulary is present.
    pub fn is_complete(&self) -> bool {
        self.values.len() == Metric::ALL.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        self.values.iter().map(|(&m, &v)| (m, v))
    }
}

impl FromIterator<(Metric, f64)> for MetricVector {
    fn from_iter<I: IntoIterator<Item = (Metric, f64)>>(iter: I) -> Self {
        let mut vector = MetricVector::new();
        for (metric, value) in iter {
            vector.insert(metric, value);
        }
        vector
    }
}

/// Persist a photo's full metric vector. Readers see either the previous
/// vector or this one, never a mix of the two.
pub fn score_and_store<S: ScoreStore + ?Sized>(
    store: &S,
    photo: PhotoId,
    vector: &MetricVector,
) -> Result<()> {
    store.put_vector(photo, vector)?;
    debug!(%photo, metrics = vector.len(), "stored metric vector");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_roundtrip() {
        for metric in Metric::ALL {
            assert_eq!(Metric::from_name(metric.name()), Some(metric));
        }
        assert_eq!(Metric::from_name("sharpness"), None);
    }

    #[test]
    fn test_metric_names_unique() {
        let mut names: Vec<&str> = Metric::ALL.iter().map(|m| m.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Metric::ALL.len());
    }

    #[test]
    fn test_vector_rejects_non_finite() {
        let mut vector = MetricVector::new();
        assert!(!vector.insert(Metric::Noise, f64::NAN));
        assert!(!vector.insert(Metric::Entropy, f64::INFINITY));
        assert!(vector.insert(Metric::Width, 640.0));
        assert_eq!(vector.len(), 1);
        assert!(!vector.contains(Metric::Noise));
    }

    #[test]
    fn test_vector_completeness() {
        let full: MetricVector = Metric::ALL.iter().map(|&m| (m, 1.0)).collect();
        assert!(full.is_complete());

        let partial: MetricVector = [(Metric::Width, 1.0)].into_iter().collect();
        assert!(!partial.is_complete());
    }
}
