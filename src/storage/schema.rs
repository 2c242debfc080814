//! Database schema definitions for the item store

/// SQL schema for the item database
pub const SCHEMA_SQL: &str = r#"
-- Harvested listings, one row per item id
CREATE TABLE IF NOT EXISTS items (
    item_id TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    leaf_key TEXT,
    title TEXT NOT NULL,
    description TEXT,
    creation_timestamp INTEGER NOT NULL,
    author_name TEXT NOT NULL,
    author_phone TEXT,
    price REAL NOT NULL,
    images TEXT NOT NULL,
    metadata TEXT NOT NULL,
    address TEXT,
    harvested_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_leaf ON items(leaf_key);
CREATE INDEX IF NOT EXISTS idx_items_created ON items(creation_timestamp);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
