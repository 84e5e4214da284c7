//! Core domain types for the coin shop.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{Coins, Item};

/// Identity of an already authenticated user.
///
/// The engine never validates credentials itself; whoever builds a `Caller`
/// vouches that the username belongs to the party making the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Caller(String);

impl Caller {
    pub fn new(username: impl Into<String>) -> Self {
        Caller(username.into())
    }

    pub fn username(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A committed coin movement between two accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRecord {
    pub id: u64,
    pub sender: String,
    pub recipient: String,
    pub amount: Coins,
    pub at: DateTime<Utc>,
}

/// A committed coin-for-item exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseRecord {
    pub id: u64,
    pub buyer: String,
    pub item: Item,
    pub price: Coins,
    pub at: DateTime<Utc>,
}

/// How many units of one item an account owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InventoryEntry {
    #[serde(rename = "type")]
    pub item: Item,
    pub quantity: u32,
}

/// A transfer seen from the recipient's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Received {
    pub from_user: String,
    pub amount: Coins,
}

impl From<TransferRecord> for Received {
    fn from(record: TransferRecord) -> Self {
        Received {
            from_user: record.sender,
            amount: record.amount,
        }
    }
}

/// A transfer seen from the sender's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sent {
    pub to_user: String,
    pub amount: Coins,
}

impl From<TransferRecord> for Sent {
    fn from(record: TransferRecord) -> Self {
        Sent {
            to_user: record.recipient,
            amount: record.amount,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoinHistory {
    pub received: Vec<Received>,
    pub sent: Vec<Sent>,
}

/// Optional parts of a [`UserSnapshot`] that may be replaced by an empty list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSection {
    Inventory,
    Received,
    Sent,
}

/// The user info view: balance, inventory and coin history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    pub coins: Coins,
    pub inventory: Vec<InventoryEntry>,
    pub coin_history: CoinHistory,
    /// Sections that failed to load and were substituted with empty lists.
    #[serde(skip)]
    pub degraded: Vec<SnapshotSection>,
}

impl UserSnapshot {
    pub fn is_complete(&self) -> bool {
        self.degraded.is_empty()
    }
}

/// A request made against the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create an account with the starting balance.
    Register { username: String },
    /// Move coins from the caller to another user.
    SendCoin {
        caller: Caller,
        recipient: String,
        amount: i64,
    },
    /// Spend coins on a catalog item, looked up by name.
    Buy { caller: Caller, item: String },
}
