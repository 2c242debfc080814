//! SQLite item sink
//!
//! This module provides a SQLite-based implementation of the ItemSink trait.

use crate::crawler::ItemRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ItemSink, StorageResult};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;

/// SQLite item sink
pub struct SqliteItemSink {
    conn: Connection,
}

impl SqliteItemSink {
    /// Opens or creates the item database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Loads a stored item by id
    pub fn get(&self, item_id: &str) -> StorageResult<Option<ItemRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT item_id, url, leaf_key, title, description, creation_timestamp,
                    author_name, author_phone, price, images, metadata, address
             FROM items WHERE item_id = ?1",
        )?;

        let mut rows = stmt.query(params![item_id])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let images: String = row.get(9)?;
        let metadata: String = row.get(10)?;

        Ok(Some(ItemRecord {
            item_id: row.get(0)?,
            url: row.get(1)?,
            leaf_key: row.get(2)?,
            title: row.get(3)?,
            description: row.get(4)?,
            creation_timestamp: row.get(5)?,
            author_name: row.get(6)?,
            author_phone: row.get(7)?,
            price: row.get(8)?,
            images: serde_json::from_str(&images)?,
            metadata: serde_json::from_str(&metadata)?,
            address: row.get(11)?,
        }))
    }
}

impl ItemSink for SqliteItemSink {
    fn store(&mut self, item: &ItemRecord) -> StorageResult<()> {
        let images = serde_json::to_string(&item.images)?;
        let metadata = serde_json::to_string(&item.metadata)?;
        let now = Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT INTO items (item_id, url, leaf_key, title, description, creation_timestamp,
                                author_name, author_phone, price, images, metadata, address,
                                harvested_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(item_id) DO UPDATE SET
                url = excluded.url,
                leaf_key = excluded.leaf_key,
                title = excluded.title,
                description = excluded.description,
                creation_timestamp = excluded.creation_timestamp,
                author_name = excluded.author_name,
                author_phone = excluded.author_phone,
                price = excluded.price,
                images = excluded.images,
                metadata = excluded.metadata,
                address = excluded.address,
                harvested_at = excluded.harvested_at",
            params![
                item.item_id,
                item.url,
                item.leaf_key,
                item.title,
                item.description,
                item.creation_timestamp,
                item.author_name,
                item.author_phone,
                item.price,
                images,
                metadata,
                item.address,
                now,
            ],
        )?;
        Ok(())
    }

    fn count(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
