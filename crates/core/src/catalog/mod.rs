pub mod schema;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::domain::*;
use crate::error::{Error, Result};
use crate::hasher::Fingerprint;
use crate::scoring::{Metric, MetricVector};
use crate::store::{GroupStore, ScoreStore};

const PHOTO_COLUMNS: &str =
    "id, collection_id, path, file_name, format, fingerprint, width, height, imported_at";

/// Fingerprints of a collection, split into usable pairs and photos that
/// have none yet.
#[derive(Debug, Clone, Default)]
pub struct FingerprintBatch {
    pub pairs: Vec<(PhotoId, Fingerprint)>,
    pub missing: Vec<PhotoId>,
}

/// SQLite-backed catalog of collections, photos, scores and duplicate groups.
pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    /// Open or create a catalog at the given path with WAL mode.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory catalog (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    // ── Collections ──────────────────────────────────────────────────

    pub fn add_collection(&self, name: &str) -> Result<Collection> {
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM collections WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(Error::CollectionAlreadyExists(name.to_string()));
        }

        let created_at = chrono::Utc::now().timestamp();
        self.conn.execute(
            "INSERT INTO collections (name, created_at) VALUES (?1, ?2)",
            params![name, created_at],
        )?;
        Ok(Collection {
            id: CollectionId(self.conn.last_insert_rowid()),
            name: name.to_string(),
            created_at,
        })
    }

    pub fn list_collections(&self) -> Result<Vec<Collection>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created_at FROM collections ORDER BY name")?;
        let collections = stmt
            .query_map([], collection_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(collections)
    }

    pub fn collection(&self, id: CollectionId) -> Result<Collection> {
        self.conn
            .query_row(
                "SELECT id, name, created_at FROM collections WHERE id = ?1",
                params![id.0],
                collection_from_row,
            )
            .optional()?
            .ok_or(Error::CollectionNotFound(id))
    }

    pub fn collection_by_name(&self, name: &str) -> Result<Collection> {
        self.conn
            .query_row(
                "SELECT id, name, created_at FROM collections WHERE name = ?1",
                params![name],
                collection_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::UnknownCollection(name.to_string()))
    }

    // ── Photos ───────────────────────────────────────────────────────

    /// Register a file in a collection. Importing the same path again
    /// returns the existing id and leaves the row untouched.
    pub fn upsert_photo(&self, collection: CollectionId, file: &ScannedFile) -> Result<PhotoId> {
        let path_str = file.path.to_string_lossy();

        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM photos WHERE collection_id = ?1 AND path = ?2",
                params![collection.0, path_str.as_ref()],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(PhotoId(id));
        }

        let file_name = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.conn.execute(
            "INSERT INTO photos (collection_id, path, file_name, format, imported_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                collection.0,
                path_str.as_ref(),
                file_name,
                file.format.as_str(),
                chrono::Utc::now().timestamp(),
            ],
        )?;
        Ok(PhotoId(self.conn.last_insert_rowid()))
    }

    pub fn photo(&self, id: PhotoId) -> Result<Photo> {
        self.conn
            .query_row(
                &format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ?1"),
                params![id.0],
                photo_from_row,
            )
            .optional()?
            .ok_or(Error::PhotoNotFound(id))
    }

    pub fn list_photos(&self, collection: CollectionId) -> Result<Vec<Photo>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE collection_id = ?1 ORDER BY id"
        ))?;
        let photos = stmt
            .query_map(params![collection.0], photo_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(photos)
    }

    /// Attach the fingerprint and decoded dimensions of a photo.
    pub fn set_fingerprint(
        &self,
        photo: PhotoId,
        fingerprint: Fingerprint,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE photos SET fingerprint = ?1, width = ?2, height = ?3 WHERE id = ?4",
            params![fingerprint.0 as i64, width, height, photo.0],
        )?;
        if updated == 0 {
            return Err(Error::PhotoNotFound(photo));
        }
        Ok(())
    }

    pub fn fingerprint_batch(&self, collection: CollectionId) -> Result<FingerprintBatch> {
        let mut stmt = self.conn.prepare(
            "SELECT id, fingerprint FROM photos WHERE collection_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![collection.0], |row| {
                Ok((PhotoId(row.get(0)?), row.get::<_, Option<i64>>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut batch = FingerprintBatch::default();
        for (id, fingerprint) in rows {
            match fingerprint {
                Some(fp) => batch.pairs.push((id, Fingerprint(fp as u64))),
                None => batch.missing.push(id),
            }
        }
        Ok(batch)
    }

    // ── Duplicate Groups ─────────────────────────────────────────────

    /// A `GroupStore` view whose groups all belong to `collection`.
    pub fn groups(&self, collection: CollectionId) -> CollectionGroups<'_> {
        CollectionGroups {
            catalog: self,
            collection,
        }
    }

    pub fn list_groups(&self, collection: CollectionId) -> Result<Vec<DuplicateGroup>> {
        let mut stmt = self.conn.prepare(
            "SELECT g.id, g.method, g.created_at, m.photo_id
             FROM near_duplicate_groups g
             LEFT JOIN near_duplicate_photos m ON m.group_id = g.id
             WHERE g.collection_id = ?1
             ORDER BY g.id, m.photo_id",
        )?;
        let rows = stmt
            .query_map(params![collection.0], |row| {
                Ok((
                    GroupId(row.get(0)?),
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut groups: BTreeMap<GroupId, DuplicateGroup> = BTreeMap::new();
        for (id, method, created_at, photo) in rows {
            let group = groups.entry(id).or_insert_with(|| DuplicateGroup {
                id,
                collection_id: collection,
                method,
                members: Vec::new(),
                created_at,
            });
            if let Some(photo) = photo {
                group.members.push(PhotoId(photo));
            }
        }
        Ok(groups.into_values().collect())
    }

    pub fn group(&self, id: GroupId) -> Result<DuplicateGroup> {
        let (collection_id, method, created_at) = self
            .conn
            .query_row(
                "SELECT collection_id, method, created_at FROM near_duplicate_groups WHERE id = ?1",
                params![id.0],
                |row| {
                    Ok((
                        CollectionId(row.get(0)?),
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?
            .ok_or(Error::GroupNotFound(id))?;

        Ok(DuplicateGroup {
            id,
            collection_id,
            method,
            members: self.group_members(id)?,
            created_at,
        })
    }

    /// Every group, under any method, that has `photo` as a member.
    pub fn groups_for_photo(&self, photo: PhotoId) -> Result<Vec<DuplicateGroup>> {
        let mut stmt = self.conn.prepare(
            "SELECT group_id FROM near_duplicate_photos WHERE photo_id = ?1 ORDER BY group_id",
        )?;
        let ids = stmt
            .query_map(params![photo.0], |row| Ok(GroupId(row.get(0)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        ids.into_iter().map(|id| self.group(id)).collect()
    }

    fn group_members(&self, group: GroupId) -> Result<Vec<PhotoId>> {
        let mut stmt = self.conn.prepare(
            "SELECT photo_id FROM near_duplicate_photos WHERE group_id = ?1 ORDER BY photo_id",
        )?;
        let members = stmt
            .query_map(params![group.0], |row| Ok(PhotoId(row.get(0)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(members)
    }

    // ── Stats ────────────────────────────────────────────────────────

    pub fn stats(&self, collection: CollectionId) -> Result<CollectionStats> {
        let stats = self.conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM photos WHERE collection_id = ?1),
                (SELECT COUNT(DISTINCT s.photo_id) FROM scores s
                 JOIN photos p ON p.id = s.photo_id WHERE p.collection_id = ?1),
                (SELECT COUNT(*) FROM photos WHERE collection_id = ?1 AND fingerprint IS NOT NULL),
                (SELECT COUNT(*) FROM near_duplicate_groups WHERE collection_id = ?1),
                (SELECT COUNT(DISTINCT m.photo_id) FROM near_duplicate_photos m
                 JOIN near_duplicate_groups g ON g.id = m.group_id WHERE g.collection_id = ?1)",
            params![collection.0],
            |row| {
                Ok(CollectionStats {
                    total_photos: row.get::<_, i64>(0)? as usize,
                    scored_photos: row.get::<_, i64>(1)? as usize,
                    fingerprinted_photos: row.get::<_, i64>(2)? as usize,
                    total_groups: row.get::<_, i64>(3)? as usize,
                    grouped_photos: row.get::<_, i64>(4)? as usize,
                })
            },
        )?;
        Ok(stats)
    }

    // ── Config ───────────────────────────────────────────────────────

    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO config (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM config WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn list_config(&self) -> Result<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM config ORDER BY key")?;
        let entries = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

impl ScoreStore for Catalog {
    fn put_vector(&self, photo: PhotoId, vector: &MetricVector) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM scores WHERE photo_id = ?1", params![photo.0])?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO scores (photo_id, metric, value) VALUES (?1, ?2, ?3)")?;
            for (metric, value) in vector.iter() {
                stmt.execute(params![photo.0, metric.name(), value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_vector(&self, photo: PhotoId) -> Result<MetricVector> {
        let mut stmt = self
            .conn
            .prepare("SELECT metric, value FROM scores WHERE photo_id = ?1")?;
        let rows = stmt
            .query_map(params![photo.0], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // Keys outside the current vocabulary are ignored.
        Ok(rows
            .into_iter()
            .filter_map(|(name, value)| Metric::from_name(&name).map(|m| (m, value)))
            .collect())
    }
}

/// Group membership of one collection, as seen by the clusterer.
pub struct CollectionGroups<'a> {
    catalog: &'a Catalog,
    collection: CollectionId,
}

impl CollectionGroups<'_> {
    pub fn collection(&self) -> CollectionId {
        self.collection
    }

    fn insert_group(conn: &Connection, collection: CollectionId, method: &str) -> Result<GroupId> {
        conn.execute(
            "INSERT INTO near_duplicate_groups (collection_id, method, created_at)
             VALUES (?1, ?2, ?3)",
            params![collection.0, method, chrono::Utc::now().timestamp()],
        )?;
        Ok(GroupId(conn.last_insert_rowid()))
    }

    fn insert_members(conn: &Connection, group: GroupId, members: &[PhotoId]) -> Result<()> {
        let mut stmt = conn.prepare(
            "INSERT OR IGNORE INTO near_duplicate_photos (group_id, photo_id) VALUES (?1, ?2)",
        )?;
        for photo in members {
            stmt.execute(params![group.0, photo.0])?;
        }
        Ok(())
    }
}

impl GroupStore for CollectionGroups<'_> {
    fn create_group(&self, method: &str) -> Result<GroupId> {
        Self::insert_group(&self.catalog.conn, self.collection, method)
    }

    fn add_member(&self, group: GroupId, photo: PhotoId) -> Result<()> {
        Self::insert_members(&self.catalog.conn, group, &[photo])
    }

    fn groups_for_photo(&self, photo: PhotoId) -> Result<Vec<GroupId>> {
        let mut stmt = self.catalog.conn.prepare(
            "SELECT m.group_id FROM near_duplicate_photos m
             JOIN near_duplicate_groups g ON g.id = m.group_id
             WHERE m.photo_id = ?1 AND g.collection_id = ?2
             ORDER BY m.group_id",
        )?;
        let groups = stmt
            .query_map(params![photo.0, self.collection.0], |row| {
                Ok(GroupId(row.get(0)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    fn members_of(&self, group: GroupId) -> Result<Vec<PhotoId>> {
        self.catalog.group_members(group)
    }

    fn method_of(&self, group: GroupId) -> Result<String> {
        self.catalog
            .conn
            .query_row(
                "SELECT method FROM near_duplicate_groups WHERE id = ?1 AND collection_id = ?2",
                params![group.0, self.collection.0],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(Error::GroupNotFound(group))
    }

    fn create_group_with_members(&self, method: &str, members: &[PhotoId]) -> Result<GroupId> {
        let tx = self.catalog.conn.unchecked_transaction()?;
        let group = Self::insert_group(&tx, self.collection, method)?;
        Self::insert_members(&tx, group, members)?;
        tx.commit()?;
        Ok(group)
    }

    fn add_members(&self, group: GroupId, members: &[PhotoId]) -> Result<()> {
        let tx = self.catalog.conn.unchecked_transaction()?;
        Self::insert_members(&tx, group, members)?;
        tx.commit()?;
        Ok(())
    }
}

fn collection_from_row(row: &Row<'_>) -> rusqlite::Result<Collection> {
    Ok(Collection {
        id: CollectionId(row.get(0)?),
        name: row.get(1)?,
        created_at: row.get(2)?,
    })
}

fn photo_from_row(row: &Row<'_>) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: PhotoId(row.get(0)?),
        collection_id: CollectionId(row.get(1)?),
        path: PathBuf::from(row.get::<_, String>(2)?),
        file_name: row.get(3)?,
        format: PhotoFormat::parse(&row.get::<_, String>(4)?).unwrap_or(PhotoFormat::Jpeg),
        fingerprint: row.get::<_, Option<i64>>(5)?.map(|v| Fingerprint(v as u64)),
        width: row.get(6)?,
        height: row.get(7)?,
        imported_at: row.get(8)?,
    })
}
