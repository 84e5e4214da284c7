use tracing::{error, warn};

use super::{Engine, QueryError};
use crate::model::{Caller, CoinHistory, Received, Sent, SnapshotSection, UserSnapshot};
use crate::store::{AccountStore, StoreError};

impl<S: AccountStore> Engine<S> {
    /// Compose the user info view.
    ///
    /// The balance is mandatory: failing to read it fails the snapshot.
    /// Inventory and coin history are optional and degrade to empty lists.
    pub fn user_snapshot(&self, caller: &Caller) -> Result<UserSnapshot, QueryError> {
        let user = caller.username();
        let coins = self.store.balance(user).inspect_err(|e| {
            error!(user, reason = %e, "balance unavailable");
        })?;

        let mut degraded = Vec::new();
        let inventory = or_empty(
            self.store.inventory(user),
            SnapshotSection::Inventory,
            user,
            &mut degraded,
        );
        let received = or_empty(
            self.store.received(user),
            SnapshotSection::Received,
            user,
            &mut degraded,
        );
        let sent = or_empty(
            self.store.sent(user),
            SnapshotSection::Sent,
            user,
            &mut degraded,
        );

        Ok(UserSnapshot {
            coins,
            inventory,
            coin_history: CoinHistory {
                received: received.into_iter().map(Received::from).collect(),
                sent: sent.into_iter().map(Sent::from).collect(),
            },
            degraded,
        })
    }
}

fn or_empty<T>(
    result: Result<Vec<T>, StoreError>,
    section: SnapshotSection,
    user: &str,
    degraded: &mut Vec<SnapshotSection>,
) -> Vec<T> {
    result.unwrap_or_else(|e| {
        warn!(user, ?section, reason = %e, "partial history unavailable, using empty list");
        degraded.push(section);
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ErrorClass;
    use crate::model::{InventoryEntry, PurchaseRecord, TransferRecord};
    use crate::store::MemoryStore;
    use crate::{Coins, Item};
    use rusqlite::ffi;

    /// Delegates to a [`MemoryStore`] but can be told to fail some reads.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_balance: bool,
        fail_inventory: bool,
        fail_history: bool,
    }

    fn outage() -> StoreError {
        StoreError::Sqlite(rusqlite::Error::SqliteFailure(
            ffi::Error::new(ffi::SQLITE_IOERR),
            Some("disk I/O error".to_string()),
        ))
    }

    impl AccountStore for FlakyStore {
        fn create_account(&self, username: &str, balance: Coins) -> Result<(), StoreError> {
            self.inner.create_account(username, balance)
        }

        fn account_exists(&self, username: &str) -> Result<bool, StoreError> {
            self.inner.account_exists(username)
        }

        fn accounts(&self) -> Result<Vec<String>, StoreError> {
            self.inner.accounts()
        }

        fn balance(&self, username: &str) -> Result<Coins, StoreError> {
            if self.fail_balance {
                return Err(outage());
            }
            self.inner.balance(username)
        }

        fn transfer(
            &self,
            sender: &str,
            recipient: &str,
            amount: Coins,
        ) -> Result<TransferRecord, StoreError> {
            self.inner.transfer(sender, recipient, amount)
        }

        fn purchase(
            &self,
            buyer: &str,
            item: Item,
            price: Coins,
        ) -> Result<PurchaseRecord, StoreError> {
            self.inner.purchase(buyer, item, price)
        }

        fn inventory(&self, username: &str) -> Result<Vec<InventoryEntry>, StoreError> {
            if self.fail_inventory {
                return Err(outage());
            }
            self.inner.inventory(username)
        }

        fn received(&self, username: &str) -> Result<Vec<TransferRecord>, StoreError> {
            if self.fail_history {
                return Err(outage());
            }
            self.inner.received(username)
        }

        fn sent(&self, username: &str) -> Result<Vec<TransferRecord>, StoreError> {
            if self.fail_history {
                return Err(outage());
            }
            self.inner.sent(username)
        }

        fn purchases(&self, username: &str) -> Result<Vec<PurchaseRecord>, StoreError> {
            self.inner.purchases(username)
        }
    }

    fn seeded(store: FlakyStore) -> Engine<FlakyStore> {
        let engine = Engine::new(store);
        engine.register("sender").unwrap();
        engine.register("receiver").unwrap();
        engine
            .transfer(&Caller::new("sender"), "receiver", 100)
            .unwrap();
        engine.buy(&Caller::new("sender"), "t-shirt").unwrap();
        engine
    }

    #[test]
    fn snapshot_composes_all_reads() {
        let engine = seeded(FlakyStore::default());
        let snapshot = engine.user_snapshot(&Caller::new("sender")).unwrap();

        assert!(snapshot.is_complete());
        assert_eq!(snapshot.coins, Coins::new(820));
        assert_eq!(
            snapshot.inventory,
            vec![InventoryEntry {
                item: Item::TShirt,
                quantity: 1
            }]
        );
        assert!(snapshot.coin_history.received.is_empty());
        assert_eq!(
            snapshot.coin_history.sent,
            vec![Sent {
                to_user: "receiver".to_string(),
                amount: Coins::new(100)
            }]
        );

        let receiver = engine.user_snapshot(&Caller::new("receiver")).unwrap();
        assert_eq!(receiver.coins, Coins::new(1100));
        assert_eq!(
            receiver.coin_history.received,
            vec![Received {
                from_user: "sender".to_string(),
                amount: Coins::new(100)
            }]
        );
    }

    #[test]
    fn history_outage_degrades_snapshot() {
        let engine = seeded(FlakyStore {
            fail_history: true,
            ..FlakyStore::default()
        });
        let snapshot = engine.user_snapshot(&Caller::new("sender")).unwrap();

        assert_eq!(snapshot.coins, Coins::new(820));
        assert_eq!(snapshot.inventory.len(), 1);
        assert!(snapshot.coin_history.sent.is_empty());
        assert!(snapshot.coin_history.received.is_empty());
        assert_eq!(
            snapshot.degraded,
            vec![SnapshotSection::Received, SnapshotSection::Sent]
        );
    }

    #[test]
    fn inventory_outage_degrades_snapshot() {
        let engine = seeded(FlakyStore {
            fail_inventory: true,
            ..FlakyStore::default()
        });
        let snapshot = engine.user_snapshot(&Caller::new("sender")).unwrap();

        assert!(snapshot.inventory.is_empty());
        assert_eq!(snapshot.coin_history.sent.len(), 1);
        assert_eq!(snapshot.degraded, vec![SnapshotSection::Inventory]);
    }

    #[test]
    fn balance_outage_fails_snapshot() {
        let engine = Engine::new(FlakyStore {
            fail_balance: true,
            ..FlakyStore::default()
        });
        engine.register("sender").unwrap();

        let err = engine.user_snapshot(&Caller::new("sender")).unwrap_err();
        assert!(matches!(err, QueryError::Storage(StoreError::Sqlite(_))));
        assert_eq!(err.class(), ErrorClass::Internal);
    }

    #[test]
    fn unknown_user_fails_snapshot() {
        let engine = Engine::in_memory();
        let err = engine.user_snapshot(&Caller::new("ghost")).unwrap_err();
        assert!(matches!(err, QueryError::AccountNotFound(ref name) if name == "ghost"));
    }
}
