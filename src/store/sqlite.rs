use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use tracing::debug;

use super::{AccountStore, StoreError};
use crate::model::{InventoryEntry, PurchaseRecord, TransferRecord};
use crate::{Coins, Item};

const SCHEMA: &str = include_str!("../../migrations/001_init.sql");

/// Relational account store backed by SQLite.
///
/// Writes run inside `IMMEDIATE` transactions. The transaction guard rolls
/// back when dropped, so any early return leaves the database untouched.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        Self::init(conn)
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn account_id(conn: &Connection, username: &str) -> Result<i64, StoreError> {
    conn.query_row(
        "SELECT id FROM users WHERE username = ?1",
        [username],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| StoreError::AccountNotFound(username.to_string()))
}

/// Subtract `amount` only if the balance still covers it at write time.
fn debit(conn: &Connection, id: i64, username: &str, amount: Coins) -> Result<(), StoreError> {
    let updated = conn.execute(
        "UPDATE users SET balance = balance - ?1 WHERE id = ?2 AND balance >= ?1",
        params![amount, id],
    )?;
    if updated == 0 {
        let balance: Coins =
            conn.query_row("SELECT balance FROM users WHERE id = ?1", [id], |row| {
                row.get(0)
            })?;
        return Err(StoreError::InsufficientFunds {
            user: username.to_string(),
            balance,
            requested: amount,
        });
    }
    Ok(())
}

/// Add `amount` only if the result stays within [`Coins::MAX`].
fn credit(conn: &Connection, id: i64, username: &str, amount: Coins) -> Result<(), StoreError> {
    let updated = conn.execute(
        "UPDATE users SET balance = balance + ?1 WHERE id = ?2 AND balance <= ?3 - ?1",
        params![amount, id, Coins::MAX],
    )?;
    if updated == 0 {
        return Err(StoreError::Overflow(username.to_string()));
    }
    Ok(())
}

fn item_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Item> {
    let name: String = row.get(idx)?;
    name.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// rowids handed out by AUTOINCREMENT are always positive
fn record_id(rowid: i64) -> u64 {
    rowid as u64
}

impl AccountStore for SqliteStore {
    fn create_account(&self, username: &str, balance: Coins) -> Result<(), StoreError> {
        if balance > Coins::MAX {
            return Err(StoreError::Overflow(username.to_string()));
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let exists: bool = tx.query_row(
            "SELECT EXISTS (SELECT 1 FROM users WHERE username = ?1)",
            [username],
            |row| row.get(0),
        )?;
        if exists {
            return Err(StoreError::AccountExists(username.to_string()));
        }
        tx.execute(
            "INSERT INTO users (username, balance) VALUES (?1, ?2)",
            params![username, balance],
        )?;
        tx.commit()?;
        debug!(user = username, %balance, "account created");
        Ok(())
    }

    fn account_exists(&self, username: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let exists = conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM users WHERE username = ?1)",
            [username],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn accounts(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT username FROM users ORDER BY username")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn balance(&self, username: &str) -> Result<Coins, StoreError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT balance FROM users WHERE username = ?1",
            [username],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| StoreError::AccountNotFound(username.to_string()))
    }

    fn transfer(
        &self,
        sender: &str,
        recipient: &str,
        amount: Coins,
    ) -> Result<TransferRecord, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let sender_id = account_id(&tx, sender)?;
        let recipient_id = account_id(&tx, recipient)?;

        // rows are always touched in ascending id order
        if sender_id <= recipient_id {
            debit(&tx, sender_id, sender, amount)?;
            credit(&tx, recipient_id, recipient, amount)?;
        } else {
            credit(&tx, recipient_id, recipient, amount)?;
            debit(&tx, sender_id, sender, amount)?;
        }

        let at = Utc::now();
        tx.execute(
            "INSERT INTO transfers (from_user, to_user, amount, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![sender_id, recipient_id, amount, at],
        )?;
        let id = record_id(tx.last_insert_rowid());
        tx.commit()?;

        debug!(id, sender, recipient, %amount, "transfer committed");
        Ok(TransferRecord {
            id,
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            amount,
            at,
        })
    }

    fn purchase(
        &self,
        buyer: &str,
        item: Item,
        price: Coins,
    ) -> Result<PurchaseRecord, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let buyer_id = account_id(&tx, buyer)?;
        debit(&tx, buyer_id, buyer, price)?;

        let at = Utc::now();
        tx.execute(
            "INSERT INTO purchases (user_id, item_name, price, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![buyer_id, item.name(), price, at],
        )?;
        let id = record_id(tx.last_insert_rowid());
        let upserted = tx.execute(
            "INSERT INTO inventory (user_id, item_type, quantity) VALUES (?1, ?2, 1)
             ON CONFLICT (user_id, item_type) DO UPDATE SET quantity = inventory.quantity + 1
             WHERE inventory.quantity < ?3",
            params![buyer_id, item.name(), u32::MAX],
        )?;
        if upserted == 0 {
            return Err(StoreError::InventoryOverflow {
                user: buyer.to_string(),
                item,
            });
        }
        tx.commit()?;

        debug!(id, buyer, %item, %price, "purchase committed");
        Ok(PurchaseRecord {
            id,
            buyer: buyer.to_string(),
            item,
            price,
            at,
        })
    }

    fn inventory(&self, username: &str) -> Result<Vec<InventoryEntry>, StoreError> {
        let conn = self.conn.lock();
        let user_id = account_id(&conn, username)?;
        let mut stmt = conn.prepare(
            "SELECT item_type, quantity FROM inventory WHERE user_id = ?1 AND quantity > 0 ORDER BY id",
        )?;
        let entries = stmt
            .query_map([user_id], |row| {
                Ok(InventoryEntry {
                    item: item_column(row, 0)?,
                    quantity: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn received(&self, username: &str) -> Result<Vec<TransferRecord>, StoreError> {
        let conn = self.conn.lock();
        let user_id = account_id(&conn, username)?;
        let mut stmt = conn.prepare(
            "SELECT t.id, u.username, t.amount, t.created_at
             FROM transfers t JOIN users u ON t.from_user = u.id
             WHERE t.to_user = ?1 ORDER BY t.id",
        )?;
        let records = stmt
            .query_map([user_id], |row| {
                Ok(TransferRecord {
                    id: record_id(row.get(0)?),
                    sender: row.get(1)?,
                    recipient: username.to_string(),
                    amount: row.get(2)?,
                    at: row.get::<_, DateTime<Utc>>(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn sent(&self, username: &str) -> Result<Vec<TransferRecord>, StoreError> {
        let conn = self.conn.lock();
        let user_id = account_id(&conn, username)?;
        let mut stmt = conn.prepare(
            "SELECT t.id, u.username, t.amount, t.created_at
             FROM transfers t JOIN users u ON t.to_user = u.id
             WHERE t.from_user = ?1 ORDER BY t.id",
        )?;
        let records = stmt
            .query_map([user_id], |row| {
                Ok(TransferRecord {
                    id: record_id(row.get(0)?),
                    sender: username.to_string(),
                    recipient: row.get(1)?,
                    amount: row.get(2)?,
                    at: row.get::<_, DateTime<Utc>>(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn purchases(&self, username: &str) -> Result<Vec<PurchaseRecord>, StoreError> {
        let conn = self.conn.lock();
        let user_id = account_id(&conn, username)?;
        let mut stmt = conn.prepare(
            "SELECT id, item_name, price, created_at FROM purchases WHERE user_id = ?1 ORDER BY id",
        )?;
        let records = stmt
            .query_map([user_id], |row| {
                Ok(PurchaseRecord {
                    id: record_id(row.get(0)?),
                    buyer: username.to_string(),
                    item: item_column(row, 1)?,
                    price: row.get(2)?,
                    at: row.get::<_, DateTime<Utc>>(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
