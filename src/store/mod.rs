//! Account storage.
//!
//! Every write path is a single all-or-nothing unit: the store re-checks the
//! sufficiency condition at write time, so a balance read by the engine is
//! only ever a fast-fail hint.

use thiserror::Error;

use crate::model::{InventoryEntry, PurchaseRecord, TransferRecord};
use crate::{Coins, Item};

mod memory;
pub use memory::MemoryStore;

mod sqlite;
pub use sqlite::SqliteStore;

/// Errors reported by an [`AccountStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("account '{0}' not found")]
    AccountNotFound(String),

    #[error("account '{0}' already exists")]
    AccountExists(String),

    #[error("insufficient funds for '{user}': balance {balance}, requested {requested}")]
    InsufficientFunds {
        user: String,
        balance: Coins,
        requested: Coins,
    },

    #[error("balance of '{0}' would overflow")]
    Overflow(String),

    #[error("'{user}' cannot hold more of {item}")]
    InventoryOverflow { user: String, item: Item },

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Transactional read/write contract against the account store.
pub trait AccountStore: Send + Sync {
    /// Create an account holding `balance` coins.
    ///
    /// Fails with [`StoreError::Overflow`] if `balance` exceeds [`Coins::MAX`].
    fn create_account(&self, username: &str, balance: Coins) -> Result<(), StoreError>;

    fn account_exists(&self, username: &str) -> Result<bool, StoreError>;

    /// All usernames, ascending.
    fn accounts(&self) -> Result<Vec<String>, StoreError>;

    fn balance(&self, username: &str) -> Result<Coins, StoreError>;

    /// Atomically debit `sender`, credit `recipient` and record the transfer.
    ///
    /// Fails with [`StoreError::InsufficientFunds`] without applying anything
    /// if the sender's balance is below `amount` at write time.
    fn transfer(
        &self,
        sender: &str,
        recipient: &str,
        amount: Coins,
    ) -> Result<TransferRecord, StoreError>;

    /// Atomically debit `buyer`, record the purchase and add one `item` to
    /// the buyer's inventory.
    fn purchase(&self, buyer: &str, item: Item, price: Coins)
    -> Result<PurchaseRecord, StoreError>;

    /// Inventory in first-acquisition order.
    fn inventory(&self, username: &str) -> Result<Vec<InventoryEntry>, StoreError>;

    /// Transfers where `username` is the recipient, oldest first.
    fn received(&self, username: &str) -> Result<Vec<TransferRecord>, StoreError>;

    /// Transfers where `username` is the sender, oldest first.
    fn sent(&self, username: &str) -> Result<Vec<TransferRecord>, StoreError>;

    /// Purchases made by `username`, oldest first.
    fn purchases(&self, username: &str) -> Result<Vec<PurchaseRecord>, StoreError>;
}

/// Shared behaviour both store implementations must show.
#[cfg(test)]
mod contract {
    use super::*;

    pub fn seeded<S: AccountStore>(store: S) -> S {
        store.create_account("sender", Coins::new(1000)).unwrap();
        store.create_account("receiver", Coins::new(500)).unwrap();
        store
    }

    pub fn transfer_moves_coins_and_records_history(store: impl AccountStore) {
        let store = seeded(store);
        let record = store.transfer("sender", "receiver", Coins::new(100)).unwrap();
        assert_eq!(record.sender, "sender");
        assert_eq!(record.recipient, "receiver");
        assert_eq!(record.amount, Coins::new(100));

        assert_eq!(store.balance("sender").unwrap(), Coins::new(900));
        assert_eq!(store.balance("receiver").unwrap(), Coins::new(600));

        let sent = store.sent("sender").unwrap();
        let received = store.received("receiver").unwrap();
        assert_eq!(sent, vec![record.clone()]);
        assert_eq!(received, vec![record]);
        assert!(store.sent("receiver").unwrap().is_empty());
        assert!(store.received("sender").unwrap().is_empty());
    }

    pub fn transfer_guard_leaves_everything_untouched(store: impl AccountStore) {
        let store = seeded(store);
        let err = store
            .transfer("receiver", "sender", Coins::new(501))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientFunds { ref user, balance, requested }
                if user == "receiver" && balance == Coins::new(500) && requested == Coins::new(501)
        ));

        assert_eq!(store.balance("sender").unwrap(), Coins::new(1000));
        assert_eq!(store.balance("receiver").unwrap(), Coins::new(500));
        assert!(store.sent("receiver").unwrap().is_empty());
        assert!(store.received("sender").unwrap().is_empty());
    }

    pub fn transfer_to_unknown_account_fails(store: impl AccountStore) {
        let store = seeded(store);
        let err = store.transfer("sender", "ghost", Coins::new(10)).unwrap_err();
        assert!(matches!(err, StoreError::AccountNotFound(ref name) if name == "ghost"));
        let err = store.transfer("ghost", "sender", Coins::new(10)).unwrap_err();
        assert!(matches!(err, StoreError::AccountNotFound(ref name) if name == "ghost"));
        assert_eq!(store.balance("sender").unwrap(), Coins::new(1000));
        assert!(store.sent("sender").unwrap().is_empty());
    }

    pub fn self_transfer_nets_to_zero(store: impl AccountStore) {
        let store = seeded(store);
        store.transfer("sender", "sender", Coins::new(300)).unwrap();
        assert_eq!(store.balance("sender").unwrap(), Coins::new(1000));
        assert_eq!(store.sent("sender").unwrap().len(), 1);
        assert_eq!(store.received("sender").unwrap().len(), 1);

        // still bounded by the balance
        assert!(matches!(
            store.transfer("sender", "sender", Coins::new(1001)),
            Err(StoreError::InsufficientFunds { .. })
        ));
    }

    pub fn purchase_debits_and_upserts_inventory(store: impl AccountStore) {
        let store = seeded(store);
        let record = store
            .purchase("sender", Item::TShirt, Item::TShirt.price())
            .unwrap();
        assert_eq!(record.buyer, "sender");
        assert_eq!(record.item, Item::TShirt);
        assert_eq!(record.price, Coins::new(80));
        assert_eq!(store.balance("sender").unwrap(), Coins::new(920));
        assert_eq!(
            store.inventory("sender").unwrap(),
            vec![InventoryEntry {
                item: Item::TShirt,
                quantity: 1
            }]
        );

        store.purchase("sender", Item::Cup, Item::Cup.price()).unwrap();
        store
            .purchase("sender", Item::TShirt, Item::TShirt.price())
            .unwrap();
        assert_eq!(store.balance("sender").unwrap(), Coins::new(820));
        assert_eq!(
            store.inventory("sender").unwrap(),
            vec![
                InventoryEntry {
                    item: Item::TShirt,
                    quantity: 2
                },
                InventoryEntry {
                    item: Item::Cup,
                    quantity: 1
                },
            ]
        );

        let purchases = store.purchases("sender").unwrap();
        let items: Vec<_> = purchases.iter().map(|p| p.item).collect();
        assert_eq!(items, vec![Item::TShirt, Item::Cup, Item::TShirt]);
        assert!(store.inventory("receiver").unwrap().is_empty());
    }

    pub fn purchase_guard_leaves_everything_untouched(store: impl AccountStore) {
        let store = seeded(store);
        store
            .purchase("receiver", Item::PinkHoody, Item::PinkHoody.price())
            .unwrap();
        assert_eq!(store.balance("receiver").unwrap(), Coins::ZERO);

        let err = store
            .purchase("receiver", Item::Pen, Item::Pen.price())
            .unwrap_err();
        assert!(matches!(err, StoreError::InsufficientFunds { .. }));
        assert_eq!(store.balance("receiver").unwrap(), Coins::ZERO);
        assert_eq!(store.purchases("receiver").unwrap().len(), 1);
        assert_eq!(
            store.inventory("receiver").unwrap(),
            vec![InventoryEntry {
                item: Item::PinkHoody,
                quantity: 1
            }]
        );
    }

    pub fn duplicate_account_is_rejected(store: impl AccountStore) {
        let store = seeded(store);
        assert!(matches!(
            store.create_account("sender", Coins::new(1000)),
            Err(StoreError::AccountExists(ref name)) if name == "sender"
        ));
        assert_eq!(store.accounts().unwrap(), vec!["receiver", "sender"]);
        assert!(store.account_exists("sender").unwrap());
        assert!(!store.account_exists("ghost").unwrap());
        assert!(matches!(
            store.balance("ghost"),
            Err(StoreError::AccountNotFound(_))
        ));
    }

    pub fn oversized_opening_balance_is_rejected(store: impl AccountStore) {
        let too_much = Coins::new(Coins::MAX.get() + 1);
        assert!(matches!(
            store.create_account("whale", too_much),
            Err(StoreError::Overflow(ref name)) if name == "whale"
        ));
        assert!(!store.account_exists("whale").unwrap());

        store.create_account("whale", Coins::MAX).unwrap();
        assert_eq!(store.balance("whale").unwrap(), Coins::MAX);
    }

    pub fn credit_past_max_balance_is_rejected(store: impl AccountStore) {
        let store = seeded(store);
        store.create_account("whale", Coins::MAX).unwrap();

        let err = store.transfer("sender", "whale", Coins::new(1)).unwrap_err();
        assert!(matches!(err, StoreError::Overflow(ref name) if name == "whale"));
        assert_eq!(store.balance("sender").unwrap(), Coins::new(1000));
        assert_eq!(store.balance("whale").unwrap(), Coins::MAX);
        assert!(store.sent("sender").unwrap().is_empty());
    }

    /// Twenty concurrent 80-coin purchases against 1000 coins: only 12 fit.
    pub fn concurrent_purchases_never_overdraw(store: impl AccountStore) {
        let store = seeded(store);
        let outcomes: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..20)
                .map(|_| {
                    scope.spawn(|| store.purchase("sender", Item::TShirt, Item::TShirt.price()))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let succeeded = outcomes.iter().filter(|o| o.is_ok()).count();
        assert_eq!(succeeded, 12);
        assert!(outcomes.iter().all(|o| matches!(
            o,
            Ok(_) | Err(StoreError::InsufficientFunds { .. })
        )));
        assert_eq!(store.balance("sender").unwrap(), Coins::new(40));
        assert_eq!(store.purchases("sender").unwrap().len(), 12);
        assert_eq!(
            store.inventory("sender").unwrap(),
            vec![InventoryEntry {
                item: Item::TShirt,
                quantity: 12
            }]
        );
    }

    /// Opposite-direction transfers over the same pair must not deadlock and
    /// must conserve the total supply.
    pub fn crossing_transfers_conserve_supply(store: impl AccountStore) {
        let store = seeded(store);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        let _ = store.transfer("sender", "receiver", Coins::new(7));
                    }
                });
                scope.spawn(|| {
                    for _ in 0..50 {
                        let _ = store.transfer("receiver", "sender", Coins::new(5));
                    }
                });
            }
        });

        let sender = store.balance("sender").unwrap();
        let receiver = store.balance("receiver").unwrap();
        assert_eq!(sender.get() + receiver.get(), 1500);

        let moved_out: u64 = store.sent("sender").unwrap().iter().map(|r| r.amount.get()).sum();
        let moved_in: u64 = store
            .received("sender")
            .unwrap()
            .iter()
            .map(|r| r.amount.get())
            .sum();
        assert_eq!(sender.get() + moved_out, 1000 + moved_in);
    }
}
