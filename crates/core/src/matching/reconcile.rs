//! Decide, per cluster, whether to create a group, join one, or report a conflict.

use std::collections::{BTreeSet, HashMap};

use crate::domain::{Confidence, GroupConflict, GroupId, PhotoId};
use crate::error::Result;
use crate::store::GroupStore;

/// Persisted memberships of the batch's photos under one method.
#[derive(Debug, Clone, Default)]
pub struct ExistingGroups {
    by_photo: HashMap<PhotoId, Vec<GroupId>>,
}

impl ExistingGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the current memberships of `photos`, keeping only groups whose
    /// method is `method`.
    pub fn load<S: GroupStore + ?Sized>(
        store: &S,
        photos: &[PhotoId],
        method: &str,
    ) -> Result<Self> {
        let mut methods: HashMap<GroupId, bool> = HashMap::new();
        let mut by_photo = HashMap::new();

        for &photo in photos {
            let mut groups = Vec::new();
            for group in store.groups_for_photo(photo)? {
                let same_method = match methods.get(&group) {
                    Some(&same) => same,
                    None => {
                        let same = store.method_of(group)? == method;
                        methods.insert(group, same);
                        same
                    }
                };
                if same_method {
                    groups.push(group);
                }
            }
            if !groups.is_empty() {
                groups.sort();
                groups.dedup();
                by_photo.insert(photo, groups);
            }
        }

        Ok(Self { by_photo })
    }

    /// Build from `(photo, group)` memberships already filtered by method.
    pub fn from_pairs<I: IntoIterator<Item = (PhotoId, GroupId)>>(pairs: I) -> Self {
        let mut by_photo: HashMap<PhotoId, Vec<GroupId>> = HashMap::new();
        for (photo, group) in pairs {
            let groups = by_photo.entry(photo).or_default();
            if !groups.contains(&group) {
                groups.push(group);
                groups.sort();
            }
        }
        Self { by_photo }
    }

    pub fn groups_of(&self, photo: PhotoId) -> &[GroupId] {
        self.by_photo.get(&photo).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_member(&self, photo: PhotoId, group: GroupId) -> bool {
        self.groups_of(photo).contains(&group)
    }

    pub fn is_empty(&self) -> bool {
        self.by_photo.is_empty()
    }
}

/// Where a unit's members end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Existing(GroupId),
    New,
}

/// One cluster (or noise point) together with its persistence decision.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedUnit {
    pub target: Target,
    /// Every photo of the cluster, ascending.
    pub members: Vec<PhotoId>,
    /// Members that are not yet in the target group.
    pub to_add: Vec<PhotoId>,
    /// `None` for singletons.
    pub confidence: Option<Confidence>,
}

impl PlannedUnit {
    pub fn is_noop(&self) -> bool {
        matches!(self.target, Target::Existing(_)) && self.to_add.is_empty()
    }
}

/// The full decision for a batch, computed before anything is written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterPlan {
    pub method: String,
    pub units: Vec<PlannedUnit>,
    pub conflicts: Vec<GroupConflict>,
}

impl ClusterPlan {
    pub fn new_group_count(&self) -> usize {
        self.units.iter().filter(|u| u.target == Target::New).count()
    }
}

/// A cluster as produced by the density pass: ascending members plus the
/// confidence of its loosest link.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub members: Vec<PhotoId>,
    pub confidence: Option<Confidence>,
}

/// Turn clusters into a plan against the persisted memberships.
///
/// No existing group: the cluster becomes a new group. Exactly one: the
/// missing members join it. Two or more: a conflict, and the cluster's
/// photos stay unassigned.
pub fn reconcile(method: &str, clusters: Vec<Cluster>, existing: &ExistingGroups) -> ClusterPlan {
    let mut plan = ClusterPlan {
        method: method.to_string(),
        ..Default::default()
    };

    for cluster in clusters {
        let touched: BTreeSet<GroupId> = cluster
            .members
            .iter()
            .flat_map(|&p| existing.groups_of(p).iter().copied())
            .collect();

        let mut groups = touched.into_iter();
        match (groups.next(), groups.next()) {
            (None, _) => plan.units.push(PlannedUnit {
                target: Target::New,
                to_add: cluster.members.clone(),
                members: cluster.members,
                confidence: cluster.confidence,
            }),
            (Some(group), None) => {
                let to_add = cluster
                    .members
                    .iter()
                    .copied()
                    .filter(|&p| !existing.is_member(p, group))
                    .collect();
                plan.units.push(PlannedUnit {
                    target: Target::Existing(group),
                    members: cluster.members,
                    to_add,
                    confidence: cluster.confidence,
                });
            }
            (Some(first), Some(second)) => plan.conflicts.push(GroupConflict {
                groups: [first, second].into_iter().chain(groups).collect(),
                photos: cluster.members,
            }),
        }
    }

    plan
}
