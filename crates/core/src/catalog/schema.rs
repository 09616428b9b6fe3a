use rusqlite::Connection;

use crate::error::Result;

/// Create every table and index if missing. Safe to call on every open.
pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS collections (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE,
            created_at  INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS photos (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            collection_id INTEGER NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
            path          TEXT NOT NULL,
            file_name     TEXT NOT NULL,
            format        TEXT NOT NULL,
            fingerprint   INTEGER,
            width         INTEGER,
            height        INTEGER,
            imported_at   INTEGER NOT NULL,
            UNIQUE(collection_id, path)
        );
        CREATE INDEX IF NOT EXISTS idx_photos_collection ON photos(collection_id);

        CREATE TABLE IF NOT EXISTS scores (
            photo_id  INTEGER NOT NULL REFERENCES photos(id) ON DELETE CASCADE,
            metric    TEXT NOT NULL,
            value     REAL NOT NULL,
            PRIMARY KEY (photo_id, metric)
        );

        CREATE TABLE IF NOT EXISTS near_duplicate_groups (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            collection_id INTEGER NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
            method        TEXT NOT NULL,
            created_at    INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_groups_collection
            ON near_duplicate_groups(collection_id, method);

        CREATE TABLE IF NOT EXISTS near_duplicate_photos (
            group_id  INTEGER NOT NULL REFERENCES near_duplicate_groups(id) ON DELETE CASCADE,
            photo_id  INTEGER NOT NULL REFERENCES photos(id) ON DELETE CASCADE,
            PRIMARY KEY (group_id, photo_id)
        );
        CREATE INDEX IF NOT EXISTS idx_group_photos_photo ON near_duplicate_photos(photo_id);

        CREATE TABLE IF NOT EXISTS config (
            key    TEXT PRIMARY KEY,
            value  TEXT NOT NULL
        );",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_is_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        initialize(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('collections', 'photos', 'scores', 'near_duplicate_groups',
                              'near_duplicate_photos', 'config')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 6);
    }
}
