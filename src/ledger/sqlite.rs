use anyhow::{anyhow, Result};
use rusqlite::{params, Connection};

use super::store::LedgerStore;
use super::wire::LedgerItem;

/// SQLite-backed ledger store.
pub struct SqliteLedgerStore {
    conn: Connection,
}

impl SqliteLedgerStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS cart_items (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              created_at INTEGER NOT NULL,
              name TEXT NOT NULL,
              price REAL NOT NULL,
              paid INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_cart_items_paid ON cart_items(paid);
            "#,
        )?;
        Ok(())
    }
}

impl LedgerStore for SqliteLedgerStore {
    fn insert_item(&mut self, name: &str, price: f64) -> Result<String> {
        if !price.is_finite() {
            return Err(anyhow!("price must be a finite number"));
        }
        let created_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)?
            .as_secs() as i64;
        self.conn.execute(
            "INSERT INTO cart_items(created_at, name, price, paid) VALUES (?1, ?2, ?3, 0)",
            params![created_at, name, price],
        )?;
        Ok(self.conn.last_insert_rowid().to_string())
    }

    fn list_items(&mut self, limit: usize) -> Result<Vec<LedgerItem>> {
        let limit = i64::try_from(limit).map_err(|_| anyhow!("limit exceeds i64 range"))?;
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, price, paid FROM cart_items ORDER BY id DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit], |row| {
            let id: i64 = row.get(0)?;
            let paid: i64 = row.get(3)?;
            Ok(LedgerItem {
                id: id.to_string(),
                name: row.get(1)?,
                price: row.get(2)?,
                paid: paid != 0,
            })
        })?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    fn mark_all_paid(&mut self) -> Result<usize> {
        let changed = self
            .conn
            .execute("UPDATE cart_items SET paid = 1 WHERE paid = 0", [])?;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let path = path.to_string_lossy().to_string();
        {
            let mut store = SqliteLedgerStore::open(&path).unwrap();
            store.insert_item("milk", 2.5).unwrap();
            store.insert_item("bread", 1.75).unwrap();
            assert_eq!(store.mark_all_paid().unwrap(), 2);
            store.insert_item("eggs", 3.0).unwrap();
        }
        let mut store = SqliteLedgerStore::open(&path).unwrap();
        let items = store.list_items(50).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].name, "eggs");
        assert!(!items[0].paid);
        assert!(items[1].paid && items[2].paid);
    }

    #[test]
    fn list_respects_limit() {
        let mut store = SqliteLedgerStore::open_in_memory().unwrap();
        for i in 0..5 {
            store.insert_item(&format!("item{}", i), 1.0).unwrap();
        }
        let items = store.list_items(2).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "item4");
    }
}
