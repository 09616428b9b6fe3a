use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::hasher::Fingerprint;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Stable photo identity, assigned once at import.
    PhotoId
);
id_type!(
    /// Identity of a persisted near-duplicate group.
    GroupId
);
id_type!(
    /// Identity of a collection (the unit a clustering batch is scoped to).
    CollectionId
);

/// A photo imported into a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub id: PhotoId,
    pub collection_id: CollectionId,
    pub path: PathBuf,
    pub file_name: String,
    pub format: PhotoFormat,
    pub fingerprint: Option<Fingerprint>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub imported_at: i64,
}

/// Image formats the importer accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhotoFormat {
    Jpeg,
    Tiff,
    Png,
    Webp,
}

impl PhotoFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Tiff => "TIFF",
            Self::Png => "PNG",
            Self::Webp => "WebP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "JPEG" => Some(Self::Jpeg),
            "TIFF" => Some(Self::Tiff),
            "PNG" => Some(Self::Png),
            "WebP" => Some(Self::Webp),
            _ => None,
        }
    }
}

impl std::fmt::Display for PhotoFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named partition of photos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    pub created_at: i64,
}

/// A persisted near-duplicate group and its members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub id: GroupId,
    pub collection_id: CollectionId,
    pub method: String,
    pub members: Vec<PhotoId>,
    pub created_at: i64,
}

/// How tightly a cluster's members are linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Confidence {
    Low = 0,
    Probable = 1,
    High = 2,
    NearCertain = 3,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Probable => "Probable",
            Self::High => "High",
            Self::NearCertain => "Near-Certain",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a photo was left out of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SkipReason {
    UnsupportedFormat,
    Decode(String),
    InvalidGeometry { width: u32, height: u32 },
    Timeout { budget_ms: u64 },
    MissingFingerprint,
    /// Registered, but the batch was cancelled before extraction started.
    Cancelled,
}

impl From<crate::error::ExtractError> for SkipReason {
    fn from(err: crate::error::ExtractError) -> Self {
        use crate::error::ExtractError;
        match err {
            ExtractError::Decode(reason) => Self::Decode(reason),
            ExtractError::InvalidGeometry { width, height } => {
                Self::InvalidGeometry { width, height }
            }
            ExtractError::Timeout { budget_ms } => Self::Timeout { budget_ms },
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedFormat => f.write_str("unsupported file type"),
            Self::Decode(reason) => write!(f, "cannot decode: {reason}"),
            Self::InvalidGeometry { width, height } => {
                write!(f, "invalid geometry {width}x{height}")
            }
            Self::Timeout { budget_ms } => write!(f, "timed out after {budget_ms} ms"),
            Self::MissingFingerprint => f.write_str("no fingerprint"),
            Self::Cancelled => f.write_str("cancelled before extraction"),
        }
    }
}

/// A photo (or file, before it has an id) skipped by a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skipped {
    pub photo_id: Option<PhotoId>,
    pub path: Option<PathBuf>,
    pub reason: SkipReason,
}

/// A cluster whose members already belong to more than one persisted group.
/// Its photos are left unassigned for the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConflict {
    pub groups: Vec<GroupId>,
    pub photos: Vec<PhotoId>,
}

/// One photo's group membership as decided by a clustering pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub photo_id: PhotoId,
    pub group_id: GroupId,
    pub method: String,
    /// Whether this pass added the membership (false when it already existed).
    pub changed: bool,
    /// Label of the cluster that produced the assignment; `None` for a
    /// photo that clustered alone.
    pub confidence: Option<Confidence>,
}

/// Outcome of a clustering batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterReport {
    pub assignments: Vec<Assignment>,
    pub created_groups: Vec<GroupId>,
    pub conflicts: Vec<GroupConflict>,
    pub skipped: Vec<Skipped>,
    pub cancelled: bool,
}

impl ClusterReport {
    /// Number of memberships this pass actually wrote.
    pub fn changed_count(&self) -> usize {
        self.assignments.iter().filter(|a| a.changed).count()
    }

    /// Photos assigned and cluster confidence per touched group.
    pub fn group_summary(&self) -> BTreeMap<GroupId, (usize, Option<Confidence>)> {
        let mut summary = BTreeMap::new();
        for a in &self.assignments {
            summary
                .entry(a.group_id)
                .and_modify(|(count, _)| *count += 1)
                .or_insert((1, a.confidence));
        }
        summary
    }
}

/// Outcome of an import batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: Vec<PhotoId>,
    pub scored: usize,
    pub skipped: Vec<Skipped>,
    pub cancelled: bool,
}

/// Summary counts for one collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionStats {
    pub total_photos: usize,
    pub scored_photos: usize,
    pub fingerprinted_photos: usize,
    pub total_groups: usize,
    pub grouped_photos: usize,
}

/// A file discovered during scanning (before decoding).
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub format: PhotoFormat,
}
