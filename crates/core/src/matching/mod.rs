pub mod confidence;
pub mod dbscan;
pub mod reconcile;

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::control::{CancelToken, CollectionGuard};
use crate::domain::{Assignment, ClusterReport, PhotoId};
use crate::error::Result;
use crate::hasher::Fingerprint;
use crate::store::GroupStore;

pub use reconcile::{Cluster, ClusterPlan, ExistingGroups, PlannedUnit, Target};

/// Default Hamming threshold, in bits of a 64-bit fingerprint.
pub const DEFAULT_THRESHOLD: u32 = 5;
pub const DEFAULT_MIN_CLUSTER_SIZE: usize = 2;
pub const DEFAULT_METHOD: &str = "phash";

/// Parameters of one detection regime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorConfig {
    /// Inclusive Hamming radius.
    pub threshold: u32,
    /// Points (self included) a core point needs within `threshold`.
    pub min_cluster_size: usize,
    /// Label stored on every group this regime creates.
    pub method: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            min_cluster_size: DEFAULT_MIN_CLUSTER_SIZE,
            method: DEFAULT_METHOD.to_string(),
        }
    }
}

/// Groups fingerprints into near-duplicate clusters and reconciles them
/// with persisted groups.
#[derive(Debug, Clone, Default)]
pub struct DuplicateClusterer {
    config: DetectorConfig,
}

impl DuplicateClusterer {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Partition the batch into clusters. Noise points come back as
    /// singletons. Members are ascending and clusters are ordered by their
    /// smallest member, so the result depends only on the set of pairs.
    pub fn partition(&self, batch: &[(PhotoId, Fingerprint)]) -> Vec<Cluster> {
        let batch = normalize(batch);
        let fingerprints: Vec<Fingerprint> = batch.iter().map(|(_, fp)| *fp).collect();

        let neighbors = dbscan::neighborhoods(&fingerprints, self.config.threshold);
        let labels = dbscan::dbscan(&neighbors, self.config.min_cluster_size.max(1));

        let mut by_label: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut clusters = Vec::new();
        for (i, label) in labels.iter().enumerate() {
            match label {
                Some(label) => by_label.entry(*label).or_default().push(i),
                None => clusters.push(Cluster {
                    members: vec![batch[i].0],
                    confidence: None,
                }),
            }
        }

        for indices in by_label.into_values() {
            let confidence = (indices.len() > 1).then(|| {
                confidence::confidence_from_hamming(dbscan::loosest_link(&indices, &neighbors))
            });
            clusters.push(Cluster {
                members: indices.iter().map(|&i| batch[i].0).collect(),
                confidence,
            });
        }

        clusters.sort_by_key(|c| c.members[0]);
        clusters
    }

    /// Compute the full decision for a batch without writing anything.
    pub fn plan(&self, batch: &[(PhotoId, Fingerprint)], existing: &ExistingGroups) -> ClusterPlan {
        reconcile::reconcile(&self.config.method, self.partition(batch), existing)
    }

    /// Cluster a batch and persist the result.
    ///
    /// Holding `guard` proves no other pass is writing groups for the same
    /// collection. Each group creation with its members, and each join, is
    /// one store unit; cancellation is checked between units. Any store
    /// error aborts the batch, leaving earlier units committed.
    pub fn cluster<S: GroupStore + ?Sized>(
        &self,
        batch: &[(PhotoId, Fingerprint)],
        store: &S,
        guard: &CollectionGuard,
        cancel: &CancelToken,
    ) -> Result<ClusterReport> {
        let mut report = ClusterReport::default();
        if batch.is_empty() {
            return Ok(report);
        }
        if cancel.is_cancelled() {
            report.cancelled = true;
            return Ok(report);
        }

        let method = self.config.method.as_str();
        let mut photos: Vec<PhotoId> = batch.iter().map(|(id, _)| *id).collect();
        photos.sort();
        photos.dedup();

        let existing = ExistingGroups::load(store, &photos, method)?;
        let plan = self.plan(batch, &existing);
        debug!(
            collection = %guard.collection(),
            photos = photos.len(),
            units = plan.units.len(),
            new_groups = plan.new_group_count(),
            conflicts = plan.conflicts.len(),
            "planned clustering batch"
        );

        for unit in plan.units {
            if cancel.is_cancelled() {
                info!(collection = %guard.collection(), "clustering cancelled");
                report.cancelled = true;
                break;
            }

            let group = match unit.target {
                Target::New => {
                    let group = store.create_group_with_members(method, &unit.to_add)?;
                    report.created_groups.push(group);
                    group
                }
                Target::Existing(group) => {
                    if !unit.to_add.is_empty() {
                        store.add_members(group, &unit.to_add)?;
                        debug!(%group, added = unit.to_add.len(), "joined existing group");
                    }
                    group
                }
            };

            report
                .assignments
                .extend(unit.members.iter().map(|&photo_id| Assignment {
                    photo_id,
                    group_id: group,
                    method: method.to_string(),
                    changed: unit.to_add.contains(&photo_id),
                    confidence: unit.confidence,
                }));
        }

        for conflict in &plan.conflicts {
            warn!(
                collection = %guard.collection(),
                groups = ?conflict.groups,
                photos = conflict.photos.len(),
                "cluster spans several existing groups, left unassigned"
            );
        }
        report.conflicts = plan.conflicts;

        info!(
            collection = %guard.collection(),
            created = report.created_groups.len(),
            changed = report.changed_count(),
            conflicts = report.conflicts.len(),
            "clustering finished"
        );
        Ok(report)
    }
}

/// Sort by photo id and keep the first fingerprint of a repeated id.
fn normalize(batch: &[(PhotoId, Fingerprint)]) -> Vec<(PhotoId, Fingerprint)> {
    let mut batch = batch.to_vec();
    batch.sort_by_key(|(id, _)| *id);
    batch.dedup_by_key(|(id, _)| *id);
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::CollectionLocks;
    use crate::domain::{CollectionId, Confidence, GroupConflict, GroupId};
    use crate::error::Error;
    use std::cell::{Cell, RefCell};
    use std::collections::BTreeSet;

    /// In-memory store that counts every call.
    #[derive(Default)]
    struct MemoryStore {
        groups: RefCell<BTreeMap<GroupId, (String, BTreeSet<PhotoId>)>>,
        calls: Cell<usize>,
        creates: Cell<usize>,
        fail: bool,
        /// Fail the nth `create_group` call (1-based).
        fail_on_create: Option<usize>,
        /// Cancel this token from inside the first `create_group` call.
        cancel_on_create: Option<CancelToken>,
    }

    impl MemoryStore {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn touch(&self) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(Error::StoreUnavailable("offline".into()));
            }
            Ok(())
        }

        fn seed(&self, method: &str, photos: &[i64]) -> GroupId {
            let id = GroupId(self.groups.borrow().len() as i64 + 1);
            let members = photos.iter().map(|&p| PhotoId(p)).collect();
            self.groups.borrow_mut().insert(id, (method.to_string(), members));
            id
        }

        fn members(&self, group: GroupId) -> Vec<PhotoId> {
            self.groups.borrow()[&group].1.iter().copied().collect()
        }

        fn group_count(&self) -> usize {
            self.groups.borrow().len()
        }
    }

    impl GroupStore for MemoryStore {
        fn create_group(&self, method: &str) -> Result<GroupId> {
            self.touch()?;
            self.creates.set(self.creates.get() + 1);
            if self.fail_on_create == Some(self.creates.get()) {
                return Err(Error::StoreUnavailable("down".into()));
            }
            if let Some(cancel) = &self.cancel_on_create {
                cancel.cancel();
            }
            Ok(self.seed(method, &[]))
        }

        fn add_member(&self, group: GroupId, photo: PhotoId) -> Result<()> {
            self.touch()?;
            if let Some((_, members)) = self.groups.borrow_mut().get_mut(&group) {
                members.insert(photo);
            }
            Ok(())
        }

        fn groups_for_photo(&self, photo: PhotoId) -> Result<Vec<GroupId>> {
            self.touch()?;
            Ok(self
                .groups
                .borrow()
                .iter()
                .filter(|(_, (_, members))| members.contains(&photo))
                .map(|(id, _)| *id)
                .collect())
        }

        fn members_of(&self, group: GroupId) -> Result<Vec<PhotoId>> {
            self.touch()?;
            Ok(self.members(group))
        }

        fn method_of(&self, group: GroupId) -> Result<String> {
            self.touch()?;
            Ok(self.groups.borrow()[&group].0.clone())
        }
    }

    fn batch(pairs: &[(i64, u64)]) -> Vec<(PhotoId, Fingerprint)> {
        pairs
            .iter()
            .map(|&(id, fp)| (PhotoId(id), Fingerprint(fp)))
            .collect()
    }

    fn scenario() -> Vec<(PhotoId, Fingerprint)> {
        batch(&[(1, 0), (2, 1), (3, 3), (4, 0xFFFF_FFFF_FF00_0000)])
    }

    fn run(
        clusterer: &DuplicateClusterer,
        batch: &[(PhotoId, Fingerprint)],
        store: &MemoryStore,
    ) -> Result<ClusterReport> {
        let locks = CollectionLocks::new();
        let guard = locks.acquire(CollectionId(1))?;
        clusterer.cluster(batch, store, &guard, &CancelToken::new())
    }

    #[test]
    fn test_partition_scenario() {
        let clusters = DuplicateClusterer::default().partition(&scenario());
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members, vec![PhotoId(1), PhotoId(2), PhotoId(3)]);
        assert_eq!(clusters[0].confidence, Some(Confidence::NearCertain));
        assert_eq!(clusters[1].members, vec![PhotoId(4)]);
        assert_eq!(clusters[1].confidence, None);
    }

    #[test]
    fn test_partition_ignores_input_order() {
        let clusterer = DuplicateClusterer::default();
        let mut reversed = scenario();
        reversed.reverse();
        assert_eq!(clusterer.partition(&scenario()), clusterer.partition(&reversed));
    }

    #[test]
    fn test_cluster_creates_groups() {
        let store = MemoryStore::default();
        let report = run(&DuplicateClusterer::default(), &scenario(), &store).unwrap();

        assert_eq!(report.created_groups.len(), 2);
        assert_eq!(report.assignments.len(), 4);
        assert_eq!(report.changed_count(), 4);
        assert!(report.conflicts.is_empty());
        assert_eq!(
            store.members(report.created_groups[0]),
            vec![PhotoId(1), PhotoId(2), PhotoId(3)]
        );
        assert_eq!(store.members(report.created_groups[1]), vec![PhotoId(4)]);
        assert!(report.assignments.iter().all(|a| a.method == "phash"));
    }

    #[test]
    fn test_recluster_is_idempotent() {
        let store = MemoryStore::default();
        let clusterer = DuplicateClusterer::default();
        run(&clusterer, &scenario(), &store).unwrap();

        let again = run(&clusterer, &scenario(), &store).unwrap();
        assert!(again.created_groups.is_empty());
        assert_eq!(again.changed_count(), 0);
        assert_eq!(again.assignments.len(), 4);
        assert_eq!(store.group_count(), 2);
    }

    #[test]
    fn test_new_photo_joins_existing_group() {
        let store = MemoryStore::default();
        let g1 = store.seed("phash", &[1]);

        let report = run(&DuplicateClusterer::default(), &batch(&[(1, 0), (2, 0b11)]), &store).unwrap();

        assert!(report.created_groups.is_empty());
        assert_eq!(store.members(g1), vec![PhotoId(1), PhotoId(2)]);
        let joined = report.assignments.iter().find(|a| a.photo_id == PhotoId(2)).unwrap();
        assert_eq!(joined.group_id, g1);
        assert!(joined.changed);
    }

    #[test]
    fn test_conflict_leaves_groups_untouched() {
        let store = MemoryStore::default();
        let g1 = store.seed("phash", &[1]);
        let g2 = store.seed("phash", &[2]);

        let report = run(&DuplicateClusterer::default(), &batch(&[(1, 0), (2, 1)]), &store).unwrap();

        assert_eq!(
            report.conflicts,
            vec![GroupConflict {
                groups: vec![g1, g2],
                photos: vec![PhotoId(1), PhotoId(2)],
            }]
        );
        assert!(report.assignments.is_empty());
        assert!(report.created_groups.is_empty());
        assert_eq!(store.members(g1), vec![PhotoId(1)]);
        assert_eq!(store.members(g2), vec![PhotoId(2)]);
    }

    #[test]
    fn test_other_method_groups_are_ignored() {
        let store = MemoryStore::default();
        let other = store.seed("dhash", &[1, 2]);

        let report = run(&DuplicateClusterer::default(), &batch(&[(1, 0), (2, 1)]), &store).unwrap();

        assert_eq!(report.created_groups.len(), 1);
        assert_eq!(store.members(other), vec![PhotoId(1), PhotoId(2)]);
    }

    #[test]
    fn test_empty_batch_makes_no_store_calls() {
        let store = MemoryStore::default();
        let report = run(&DuplicateClusterer::default(), &[], &store).unwrap();
        assert!(report.assignments.is_empty());
        assert_eq!(store.calls.get(), 0);
    }

    #[test]
    fn test_unavailable_store_aborts() {
        let store = MemoryStore::failing();
        let err = run(&DuplicateClusterer::default(), &scenario(), &store).unwrap_err();
        assert!(err.is_store_failure());
    }

    #[test]
    fn test_store_failure_mid_batch_keeps_committed_units() {
        let store = MemoryStore {
            fail_on_create: Some(2),
            ..Default::default()
        };
        let err = run(&DuplicateClusterer::default(), &scenario(), &store).unwrap_err();

        assert!(err.is_store_failure());
        assert_eq!(store.group_count(), 1);
        assert_eq!(
            store.members(GroupId(1)),
            vec![PhotoId(1), PhotoId(2), PhotoId(3)]
        );
    }

    #[test]
    fn test_cancel_between_units_stops_after_current_unit() {
        let cancel = CancelToken::new();
        let store = MemoryStore {
            cancel_on_create: Some(cancel.clone()),
            ..Default::default()
        };
        let locks = CollectionLocks::new();
        let guard = locks.acquire(CollectionId(1)).unwrap();

        let report = DuplicateClusterer::default()
            .cluster(&scenario(), &store, &guard, &cancel)
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.created_groups, vec![GroupId(1)]);
        assert_eq!(report.assignments.len(), 3);
        assert_eq!(store.group_count(), 1);
        assert_eq!(
            store.members(GroupId(1)),
            vec![PhotoId(1), PhotoId(2), PhotoId(3)]
        );
    }

    #[test]
    fn test_assignments_carry_cluster_confidence() {
        let store = MemoryStore::default();
        let report = run(&DuplicateClusterer::default(), &scenario(), &store).unwrap();

        let confidence_of = |photo| {
            report
                .assignments
                .iter()
                .find(|a| a.photo_id == PhotoId(photo))
                .map(|a| a.confidence)
                .unwrap()
        };
        assert_eq!(confidence_of(1), Some(Confidence::NearCertain));
        assert_eq!(confidence_of(3), Some(Confidence::NearCertain));
        assert_eq!(confidence_of(4), None);

        let summary = report.group_summary();
        assert_eq!(
            summary[&report.created_groups[0]],
            (3, Some(Confidence::NearCertain))
        );
    }

    #[test]
    fn test_cancelled_before_start_writes_nothing() {
        let store = MemoryStore::default();
        let locks = CollectionLocks::new();
        let guard = locks.acquire(CollectionId(1)).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = DuplicateClusterer::default()
            .cluster(&scenario(), &store, &guard, &cancel)
            .unwrap();
        assert!(report.cancelled);
        assert_eq!(store.calls.get(), 0);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let clusterer = DuplicateClusterer::new(DetectorConfig {
            threshold: 0,
            ..Default::default()
        });
        let clusters = clusterer.partition(&batch(&[(1, 0), (2, 1), (3, 0)]));
        assert_eq!(clusters[0].members, vec![PhotoId(1), PhotoId(3)]);
        assert_eq!(clusters[1].members, vec![PhotoId(2)]);
    }
}
