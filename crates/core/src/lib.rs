pub mod catalog;
pub mod config;
pub mod control;
pub mod domain;
pub mod error;
pub mod extractor;
pub mod hasher;
pub mod matching;
pub mod ranking;
pub mod scanner;
pub mod scoring;
pub mod store;

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use catalog::Catalog;
use config::EngineConfig;
use control::{CancelToken, CollectionLocks};
use domain::*;
use error::{ExtractError, Result};
use extractor::{FeatureExtractor, Features};
use matching::{DetectorConfig, DuplicateClusterer};
use scoring::MetricVector;
use store::ScoreStore;

pub use error::Error;

/// Progress of an import batch.
pub enum ImportProgress {
    /// Files found and about to be processed.
    Started { total: usize },
    /// A file has been registered and, if readable, scored.
    FileProcessed { path: PathBuf },
    /// Import phase completed.
    Finished,
}

/// Photos sharing a group with a given photo.
#[derive(Debug, Clone)]
pub struct SimilarPhotos {
    pub group: DuplicateGroup,
    /// The group's other members.
    pub photos: Vec<Photo>,
}

/// The main entry point for the autocull library.
pub struct Library {
    catalog: Catalog,
    locks: CollectionLocks,
}

impl Library {
    /// Open or create a library at the given catalog path.
    pub fn open(catalog_path: &Path) -> Result<Self> {
        Ok(Self::with_locks(Catalog::open(catalog_path)?, CollectionLocks::new()))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::with_locks(Catalog::open_in_memory()?, CollectionLocks::new()))
    }

    /// Build a library whose clustering passes are serialized with every
    /// other library sharing `locks`.
    pub fn with_locks(catalog: Catalog, locks: CollectionLocks) -> Self {
        Self { catalog, locks }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn locks(&self) -> &CollectionLocks {
        &self.locks
    }

    // ── Config ───────────────────────────────────────────────────────

    /// Defaults with the catalog's stored overrides applied.
    pub fn config(&self) -> Result<EngineConfig> {
        let mut config = EngineConfig::default();
        for (key, value) in self.catalog.list_config()? {
            config.apply(&key, &value)?;
        }
        Ok(config)
    }

    /// Validate and store an override.
    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        EngineConfig::default().apply(key, value)?;
        self.catalog.set_config(key, value.trim())
    }

    // ── Collections ──────────────────────────────────────────────────

    pub fn add_collection(&self, name: &str) -> Result<Collection> {
        self.catalog.add_collection(name)
    }

    pub fn collections(&self) -> Result<Vec<Collection>> {
        self.catalog.list_collections()
    }

    pub fn collection_named(&self, name: &str) -> Result<Collection> {
        self.catalog.collection_by_name(name)
    }

    pub fn photos(&self, collection: CollectionId) -> Result<Vec<Photo>> {
        self.catalog.collection(collection)?;
        self.catalog.list_photos(collection)
    }

    pub fn stats(&self, collection: CollectionId) -> Result<CollectionStats> {
        self.catalog.collection(collection)?;
        self.catalog.stats(collection)
    }

    // ── Import ───────────────────────────────────────────────────────

    /// Scan a folder recursively and import every supported photo.
    pub fn import_folder(
        &self,
        collection: CollectionId,
        folder: &Path,
        progress_cb: Option<&mut dyn FnMut(ImportProgress)>,
        cancel: &CancelToken,
    ) -> Result<ImportReport> {
        self.catalog.collection(collection)?;
        let scan = scanner::scan_directory(folder)?;
        let skipped = scan.unsupported.into_iter().map(unsupported).collect();
        self.import_scanned(collection, scan.files, skipped, progress_cb, cancel)
    }

    /// Import the given files. Unsupported extensions are reported as skips.
    pub fn import_files(
        &self,
        collection: CollectionId,
        paths: &[PathBuf],
        progress_cb: Option<&mut dyn FnMut(ImportProgress)>,
        cancel: &CancelToken,
    ) -> Result<ImportReport> {
        self.catalog.collection(collection)?;
        let mut files = Vec::new();
        let mut skipped = Vec::new();
        for path in paths {
            match scanner::formats::format_of(path) {
                Some(format) => files.push(ScannedFile {
                    path: path.clone(),
                    format,
                }),
                None => skipped.push(unsupported(path.clone())),
            }
        }
        self.import_scanned(collection, files, skipped, progress_cb, cancel)
    }

    /// Register files, then decode and score them `chunk_size` at a time.
    /// Per-photo failures become skips; store failures abort.
    fn import_scanned(
        &self,
        collection: CollectionId,
        files: Vec<ScannedFile>,
        skipped: Vec<Skipped>,
        mut progress_cb: Option<&mut dyn FnMut(ImportProgress)>,
        cancel: &CancelToken,
    ) -> Result<ImportReport> {
        let config = self.config()?;
        let extractor = FeatureExtractor::new(config.extractor.clone());
        let mut report = ImportReport {
            skipped,
            ..Default::default()
        };
        for skip in &report.skipped {
            warn!(reason = %skip.reason, path = ?skip.path, "skipping file");
        }

        if let Some(ref mut cb) = progress_cb {
            cb(ImportProgress::Started { total: files.len() });
        }

        for chunk in files.chunks(config.extractor.chunk_size.max(1)) {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let mut items = Vec::with_capacity(chunk.len());
            for file in chunk {
                let id = self.catalog.upsert_photo(collection, file)?;
                report.imported.push(id);
                items.push((id, file.path.clone()));
            }

            // Parallel decode + extraction; no catalog access inside.
            let results = extractor.extract_paths(&items, cancel);

            for (photo_id, path, outcome) in results {
                let started = outcome.is_some();
                self.record_extraction(&mut report, photo_id, path, outcome)?;
                if !started {
                    continue;
                }
                if let Some(cb) = progress_cb.as_mut() {
                    cb(ImportProgress::FileProcessed {
                        path: path.to_path_buf(),
                    });
                }
            }

            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
        }

        if let Some(ref mut cb) = progress_cb {
            cb(ImportProgress::Finished);
        }

        info!(
            %collection,
            imported = report.imported.len(),
            scored = report.scored,
            skipped = report.skipped.len(),
            cancelled = report.cancelled,
            "import finished"
        );
        Ok(report)
    }

    /// Persist one photo's extraction outcome, or record why it has none.
    fn record_extraction(
        &self,
        report: &mut ImportReport,
        photo_id: PhotoId,
        path: &Path,
        outcome: Option<std::result::Result<Features, ExtractError>>,
    ) -> Result<()> {
        let reason = match outcome {
            Some(Ok(features)) => {
                scoring::score_and_store(&self.catalog, photo_id, &features.metrics)?;
                self.catalog.set_fingerprint(
                    photo_id,
                    features.fingerprint,
                    features.width,
                    features.height,
                )?;
                report.scored += 1;
                return Ok(());
            }
            Some(Err(err)) => err.into(),
            None => SkipReason::Cancelled,
        };
        report.skipped.push(Skipped {
            photo_id: Some(photo_id),
            path: Some(path.to_path_buf()),
            reason,
        });
        Ok(())
    }

    // ── Duplicates ───────────────────────────────────────────────────

    /// Cluster the collection's fingerprints with the configured detector.
    pub fn find_duplicates(
        &self,
        collection: CollectionId,
        cancel: &CancelToken,
    ) -> Result<ClusterReport> {
        let detector = self.config()?.detector;
        self.find_duplicates_with(collection, &detector, cancel)
    }

    /// The configured detector with one run's overrides applied. Overrides
    /// are validated like stored config.
    pub fn detector_with(
        &self,
        threshold: Option<u32>,
        method: Option<&str>,
    ) -> Result<DetectorConfig> {
        let mut engine = self.config()?;
        if let Some(threshold) = threshold {
            engine.apply(config::KEY_THRESHOLD, &threshold.to_string())?;
        }
        if let Some(method) = method {
            engine.apply(config::KEY_METHOD, method)?;
        }
        Ok(engine.detector)
    }

    /// Cluster the collection's fingerprints and reconcile the result with
    /// its persisted groups. Fails with `CollectionBusy` while another pass
    /// holds the collection.
    pub fn find_duplicates_with(
        &self,
        collection: CollectionId,
        detector: &DetectorConfig,
        cancel: &CancelToken,
    ) -> Result<ClusterReport> {
        self.catalog.collection(collection)?;
        let guard = self.locks.acquire(collection)?;

        let batch = self.catalog.fingerprint_batch(collection)?;
        let skipped: Vec<Skipped> = batch
            .missing
            .iter()
            .map(|&id| Skipped {
                photo_id: Some(id),
                path: None,
                reason: SkipReason::MissingFingerprint,
            })
            .collect();
        if !skipped.is_empty() {
            warn!(%collection, count = skipped.len(), "photos without fingerprint left out");
        }

        let clusterer = DuplicateClusterer::new(detector.clone());
        let store = self.catalog.groups(collection);
        let mut report = clusterer.cluster(&batch.pairs, &store, &guard, cancel)?;
        report.skipped = skipped;
        Ok(report)
    }

    // ── Browsing ─────────────────────────────────────────────────────

    pub fn groups(&self, collection: CollectionId) -> Result<Vec<DuplicateGroup>> {
        self.catalog.collection(collection)?;
        self.catalog.list_groups(collection)
    }

    pub fn group(&self, id: GroupId) -> Result<DuplicateGroup> {
        self.catalog.group(id)
    }

    pub fn photo(&self, id: PhotoId) -> Result<Photo> {
        self.catalog.photo(id)
    }

    /// For each group containing `photo`, the other members of that group.
    pub fn similar_photos(&self, photo: PhotoId) -> Result<Vec<SimilarPhotos>> {
        self.catalog.photo(photo)?;
        self.catalog
            .groups_for_photo(photo)?
            .into_iter()
            .map(|group| {
                let photos = group
                    .members
                    .iter()
                    .filter(|&&id| id != photo)
                    .map(|&id| self.catalog.photo(id))
                    .collect::<Result<Vec<_>>>()?;
                Ok(SimilarPhotos { group, photos })
            })
            .collect()
    }

    /// The stored metric vector of a photo; empty if it was never scored.
    pub fn scores(&self, photo: PhotoId) -> Result<MetricVector> {
        self.catalog.photo(photo)?;
        self.catalog.get_vector(photo)
    }

    /// The member of a group that best survives a cull.
    pub fn best_in_group(&self, group: GroupId) -> Result<Option<PhotoId>> {
        let group = self.catalog.group(group)?;
        let scored = group
            .members
            .iter()
            .map(|&id| Ok((id, self.catalog.get_vector(id)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(ranking::elect_best(&scored))
    }
}

fn unsupported(path: PathBuf) -> Skipped {
    Skipped {
        photo_id: None,
        path: Some(path),
        reason: SkipReason::UnsupportedFormat,
    }
}
