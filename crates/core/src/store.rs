//! Persistence interfaces consumed by the extractor and the clusterer.
//!
//! Implementations report an unreachable backend as `Error::Database` or
//! `Error::StoreUnavailable`; callers abort the batch on either.

use crate::domain::{GroupId, PhotoId};
use crate::error::Result;
use crate::scoring::MetricVector;

/// Authoritative near-duplicate group membership, scoped to one collection.
pub trait GroupStore {
    fn create_group(&self, method: &str) -> Result<GroupId>;

    /// Idempotent: adding an existing member is a no-op.
    fn add_member(&self, group: GroupId, photo: PhotoId) -> Result<()>;

    fn groups_for_photo(&self, photo: PhotoId) -> Result<Vec<GroupId>>;

    fn members_of(&self, group: GroupId) -> Result<Vec<PhotoId>>;

    fn method_of(&self, group: GroupId) -> Result<String>;

    /// Create a group and add its initial members as one unit.
    /// Backends with transactions should override this so a crash never
    /// leaves an empty or half-filled group behind.
    fn create_group_with_members(&self, method: &str, members: &[PhotoId]) -> Result<GroupId> {
        let group = self.create_group(method)?;
        self.add_members(group, members)?;
        Ok(group)
    }

    /// Add several members to an existing group as one unit.
    fn add_members(&self, group: GroupId, members: &[PhotoId]) -> Result<()> {
        for &photo in members {
            self.add_member(group, photo)?;
        }
        Ok(())
    }
}

/// Per-photo metric vectors. Writes are all-or-nothing per vector.
pub trait ScoreStore {
    /// Replace the photo's whole vector.
    fn put_vector(&self, photo: PhotoId, vector: &MetricVector) -> Result<()>;

    /// The stored vector, or an empty one if the photo was never scored.
    fn get_vector(&self, photo: PhotoId) -> Result<MetricVector>;
}
