use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::{Mutex, MutexGuard, RwLock};
use tracing::debug;

use super::{AccountStore, StoreError};
use crate::model::{InventoryEntry, PurchaseRecord, TransferRecord};
use crate::{Coins, Item};

/// In-memory account store.
///
/// Each account sits behind its own lock. A transfer holds both accounts'
/// locks, taken in ascending account id order, while it moves coins and
/// appends history, so no reader observes half of it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<String, Arc<AccountCell>>>,
    next_account_id: AtomicU64,
    next_record_id: AtomicU64,
}

#[derive(Debug)]
struct AccountCell {
    id: u64,
    username: String,
    ledger: Mutex<Ledger>,
}

/// Everything owned by one account.
#[derive(Debug, Default)]
struct Ledger {
    balance: Coins,
    inventory: Vec<InventoryEntry>,
    sent: Vec<TransferRecord>,
    received: Vec<TransferRecord>,
    purchases: Vec<PurchaseRecord>,
}

impl Ledger {
    fn debit(&mut self, username: &str, amount: Coins) -> Result<(), StoreError> {
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or_else(|| StoreError::InsufficientFunds {
                user: username.to_string(),
                balance: self.balance,
                requested: amount,
            })?;
        Ok(())
    }

    fn add_item(&mut self, username: &str, item: Item) -> Result<(), StoreError> {
        match self.inventory.iter_mut().find(|entry| entry.item == item) {
            Some(entry) => {
                entry.quantity = entry.quantity.checked_add(1).ok_or_else(|| {
                    StoreError::InventoryOverflow {
                        user: username.to_string(),
                        item,
                    }
                })?;
            }
            None => self.inventory.push(InventoryEntry { item, quantity: 1 }),
        }
        Ok(())
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, username: &str) -> Result<Arc<AccountCell>, StoreError> {
        self.accounts
            .read()
            .get(username)
            .cloned()
            .ok_or_else(|| StoreError::AccountNotFound(username.to_string()))
    }

    fn next_record_id(&self) -> u64 {
        self.next_record_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Lock two distinct accounts, lowest id first, returning the guards in
/// argument order.
fn lock_pair<'a>(
    first: &'a AccountCell,
    second: &'a AccountCell,
) -> (MutexGuard<'a, Ledger>, MutexGuard<'a, Ledger>) {
    if first.id < second.id {
        let a = first.ledger.lock();
        let b = second.ledger.lock();
        (a, b)
    } else {
        let b = second.ledger.lock();
        let a = first.ledger.lock();
        (a, b)
    }
}

impl AccountStore for MemoryStore {
    fn create_account(&self, username: &str, balance: Coins) -> Result<(), StoreError> {
        if balance > Coins::MAX {
            return Err(StoreError::Overflow(username.to_string()));
        }
        let mut accounts = self.accounts.write();
        match accounts.entry(username.to_string()) {
            Entry::Occupied(_) => Err(StoreError::AccountExists(username.to_string())),
            Entry::Vacant(slot) => {
                let id = self.next_account_id.fetch_add(1, Ordering::Relaxed) + 1;
                slot.insert(Arc::new(AccountCell {
                    id,
                    username: username.to_string(),
                    ledger: Mutex::new(Ledger {
                        balance,
                        ..Ledger::default()
                    }),
                }));
                debug!(user = username, id, %balance, "account created");
                Ok(())
            }
        }
    }

    fn account_exists(&self, username: &str) -> Result<bool, StoreError> {
        Ok(self.accounts.read().contains_key(username))
    }

    fn accounts(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<_> = self.accounts.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn balance(&self, username: &str) -> Result<Coins, StoreError> {
        Ok(self.cell(username)?.ledger.lock().balance)
    }

    fn transfer(
        &self,
        sender: &str,
        recipient: &str,
        amount: Coins,
    ) -> Result<TransferRecord, StoreError> {
        let from = self.cell(sender)?;
        let to = self.cell(recipient)?;

        if from.id == to.id {
            let mut ledger = from.ledger.lock();
            if ledger.balance < amount {
                return Err(StoreError::InsufficientFunds {
                    user: from.username.clone(),
                    balance: ledger.balance,
                    requested: amount,
                });
            }
            let record = TransferRecord {
                id: self.next_record_id(),
                sender: from.username.clone(),
                recipient: to.username.clone(),
                amount,
                at: Utc::now(),
            };
            ledger.sent.push(record.clone());
            ledger.received.push(record.clone());
            return Ok(record);
        }

        let (mut from_ledger, mut to_ledger) = lock_pair(&from, &to);
        let credited = to_ledger
            .balance
            .checked_add(amount)
            .ok_or_else(|| StoreError::Overflow(to.username.clone()))?;
        from_ledger.debit(&from.username, amount)?;
        to_ledger.balance = credited;

        let record = TransferRecord {
            id: self.next_record_id(),
            sender: from.username.clone(),
            recipient: to.username.clone(),
            amount,
            at: Utc::now(),
        };
        from_ledger.sent.push(record.clone());
        to_ledger.received.push(record.clone());

        debug!(
            id = record.id,
            sender,
            recipient,
            %amount,
            "transfer committed"
        );
        Ok(record)
    }

    fn purchase(
        &self,
        buyer: &str,
        item: Item,
        price: Coins,
    ) -> Result<PurchaseRecord, StoreError> {
        let cell = self.cell(buyer)?;
        let mut ledger = cell.ledger.lock();
        let before = ledger.balance;
        ledger.debit(&cell.username, price)?;
        if let Err(e) = ledger.add_item(&cell.username, item) {
            ledger.balance = before;
            return Err(e);
        }

        let record = PurchaseRecord {
            id: self.next_record_id(),
            buyer: cell.username.clone(),
            item,
            price,
            at: Utc::now(),
        };
        ledger.purchases.push(record.clone());

        debug!(id = record.id, buyer, %item, %price, "purchase committed");
        Ok(record)
    }

    fn inventory(&self, username: &str) -> Result<Vec<InventoryEntry>, StoreError> {
        Ok(self.cell(username)?.ledger.lock().inventory.clone())
    }

    fn received(&self, username: &str) -> Result<Vec<TransferRecord>, StoreError> {
        Ok(self.cell(username)?.ledger.lock().received.clone())
    }

    fn sent(&self, username: &str) -> Result<Vec<TransferRecord>, StoreError> {
        Ok(self.cell(username)?.ledger.lock().sent.clone())
    }

    fn purchases(&self, username: &str) -> Result<Vec<PurchaseRecord>, StoreError> {
        Ok(self.cell(username)?.ledger.lock().purchases.clone())
    }
}
