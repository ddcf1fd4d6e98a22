use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::Result;
use rusqlite::{Connection, params};

use crate::domain::message::MessageId;
use crate::domain::purchase::Purchase;
use crate::store::repo::{ProcessedLog, PurchaseLedger};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.lock().unwrap().execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS purchases (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                order_date   TEXT NOT NULL,
                order_number TEXT NOT NULL,
                item_title   TEXT NOT NULL,
                order_total  REAL,
                message_id   TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS processed_messages (
                message_id TEXT PRIMARY KEY
            );
            "#,
        )?;
        Ok(())
    }
}

impl PurchaseLedger for SqliteStore {
    fn ledger_message_ids(&self) -> Result<HashSet<MessageId>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(r#"SELECT message_id FROM purchases"#)?;

        let mut rows = stmt.query([])?;
        let mut out = HashSet::new();
        while let Some(r) = rows.next()? {
            let id: String = r.get(0)?;
            let id = id.trim().to_string();
            if !id.is_empty() {
                out.insert(id);
            }
        }
        Ok(out)
    }

    fn append_purchase(&self, purchase: &Purchase) -> Result<()> {
        self.conn.lock().unwrap().execute(
            r#"
            INSERT INTO purchases (order_date, order_number, item_title, order_total, message_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                purchase.order_date,
                purchase.order_number,
                purchase.item_title,
                purchase.order_total,
                purchase.message_id,
            ],
        )?;
        Ok(())
    }
}

impl ProcessedLog for SqliteStore {
    fn load_processed(&self) -> Result<HashSet<MessageId>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(r#"SELECT message_id FROM processed_messages"#)?;

        let mut rows = stmt.query([])?;
        let mut out = HashSet::new();
        while let Some(r) = rows.next()? {
            let id: String = r.get(0)?;
            if !id.is_empty() {
                out.insert(id);
            }
        }
        Ok(out)
    }

    /// Full rewrite: the persisted set becomes exactly `ids`.
    fn save_processed(&self, ids: &HashSet<MessageId>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        {
            tx.execute(r#"DELETE FROM processed_messages"#, [])?;

            let mut stmt =
                tx.prepare(r#"INSERT INTO processed_messages (message_id) VALUES (?1)"#)?;
            for id in ids {
                stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("ledger.db")).unwrap();
        (dir, store)
    }

    fn purchase(message_id: &str) -> Purchase {
        Purchase {
            order_date: "2024-05-01".into(),
            order_number: "123-4567890-1234567".into(),
            item_title: "USB C Cable".into(),
            order_total: Some(45.67),
            message_id: message_id.into(),
        }
    }

    #[test]
    fn appended_purchases_feed_the_dedup_set() {
        let (_dir, store) = open_temp();
        assert!(store.ledger_message_ids().unwrap().is_empty());

        store.append_purchase(&purchase("<a@mail>")).unwrap();
        store.append_purchase(&purchase("<b@mail>")).unwrap();

        let ids = store.ledger_message_ids().unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("<a@mail>"));
        assert!(ids.contains("<b@mail>"));
    }

    #[test]
    fn append_never_updates_in_place() {
        let (_dir, store) = open_temp();
        store.append_purchase(&purchase("<a@mail>")).unwrap();
        store.append_purchase(&purchase("<a@mail>")).unwrap();

        // Two rows, one distinct id: dedup is the pipeline's job.
        let count: i64 = store
            .conn
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM purchases", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(store.ledger_message_ids().unwrap().len(), 1);
    }

    #[test]
    fn processed_log_round_trips() {
        let (_dir, store) = open_temp();
        let ids: HashSet<String> = ["<a@mail>".to_string(), "<b@mail>".to_string()]
            .into_iter()
            .collect();

        store.save_processed(&ids).unwrap();
        assert_eq!(store.load_processed().unwrap(), ids);
    }

    #[test]
    fn save_processed_fully_rewrites() {
        let (_dir, store) = open_temp();
        let first: HashSet<String> = ["<a@mail>".to_string(), "<b@mail>".to_string()]
            .into_iter()
            .collect();
        store.save_processed(&first).unwrap();

        let second: HashSet<String> = ["<c@mail>".to_string()].into_iter().collect();
        store.save_processed(&second).unwrap();

        let loaded = store.load_processed().unwrap();
        assert_eq!(loaded, second);
        assert!(!loaded.contains("<a@mail>"));
    }
}
