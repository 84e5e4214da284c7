//! Transfer and purchase engine.
//!
//! The engine validates requests made on behalf of an authenticated
//! [`Caller`] and hands the atomic part of every mutation to an
//! [`AccountStore`]. Balance checks made here only fail fast; the store
//! repeats them at write time.
//! Also supports an async stream of commands.

use tokio_stream::{Stream, StreamExt};
use tracing::{error, info};

use crate::model::{Caller, Command, PurchaseRecord, Received, Sent, TransferRecord};
use crate::store::{AccountStore, MemoryStore};
use crate::{Coins, Item};

mod snapshot;

mod error;
pub use error::{
    EngineError, ErrorClass, PurchaseError, QueryError, RegisterError, TransferError,
};

/// Balance granted to every newly registered account.
pub const STARTING_BALANCE: Coins = Coins::new(1000);

/// The coin shop engine.
///
/// All operations take `&self`; share an engine between threads or tasks
/// behind an `Arc`.
#[derive(Debug)]
pub struct Engine<S> {
    store: S,
    starting_balance: Coins,
}

/// Public API
impl<S: AccountStore> Engine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            starting_balance: STARTING_BALANCE,
        }
    }

    pub fn with_starting_balance(mut self, balance: Coins) -> Self {
        self.starting_balance = balance;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run the engine with the given command stream
    pub async fn run(&self, mut stream: impl Stream<Item = Command> + Unpin) {
        while let Some(command) = stream.next().await {
            // any error should not stop the engine, so we just ignore the application result
            let _ = self.apply(command);
        }
    }

    /// Apply a single command and log its outcome.
    pub fn apply(&self, command: Command) -> Result<(), EngineError> {
        match &command {
            Command::Register { username } => {
                let result = self.register(username).map_err(EngineError::from);
                Self::log_result("register", username, None, None, &result);
                result?;
            }
            Command::SendCoin {
                caller,
                recipient,
                amount,
            } => {
                let result = self
                    .transfer(caller, recipient, *amount)
                    .map(|_| ())
                    .map_err(EngineError::from);
                Self::log_result(
                    "send",
                    caller.username(),
                    Some(recipient.as_str()),
                    Some(*amount),
                    &result,
                );
                result?;
            }
            Command::Buy { caller, item } => {
                let result = self
                    .buy(caller, item)
                    .map(|_| ())
                    .map_err(EngineError::from);
                Self::log_result("buy", caller.username(), Some(item.as_str()), None, &result);
                result?;
            }
        }
        Ok(())
    }

    /// Create an account holding the starting balance.
    pub fn register(&self, username: &str) -> Result<(), RegisterError> {
        if username.trim().is_empty() {
            return Err(RegisterError::InvalidUsername);
        }
        self.store.create_account(username, self.starting_balance)?;
        Ok(())
    }

    pub fn account_exists(&self, username: &str) -> Result<bool, QueryError> {
        Ok(self.store.account_exists(username)?)
    }

    /// Move `amount` coins from the caller to `recipient`:
    /// - Reject non-positive amounts
    /// - Resolve both accounts
    /// - Ensure the caller's balance covers the amount
    /// - Debit, credit and record the transfer as one atomic unit
    pub fn transfer(
        &self,
        caller: &Caller,
        recipient: &str,
        amount: i64,
    ) -> Result<TransferRecord, TransferError> {
        let amount = Coins::positive(amount).ok_or(TransferError::InvalidAmount(amount))?;
        let sender = caller.username();

        let balance = self.store.balance(sender)?;
        if !self.store.account_exists(recipient)? {
            return Err(TransferError::AccountNotFound(recipient.to_string()));
        }
        if balance < amount {
            return Err(TransferError::InsufficientFunds {
                user: sender.to_string(),
                balance,
                requested: amount,
            });
        }

        Ok(self.store.transfer(sender, recipient, amount)?)
    }

    /// Buy a catalog item by name. Unknown names are rejected before the
    /// store is touched.
    pub fn buy(&self, caller: &Caller, item_name: &str) -> Result<PurchaseRecord, PurchaseError> {
        let item: Item = item_name
            .parse()
            .map_err(|_| PurchaseError::InvalidItem(item_name.to_string()))?;
        self.purchase(caller, item, item.price())
    }

    /// Spend `price` coins on `item`:
    /// - Resolve the buyer and ensure the balance covers the price
    /// - Debit, record the purchase and add the item to the inventory as one
    ///   atomic unit
    pub fn purchase(
        &self,
        caller: &Caller,
        item: Item,
        price: Coins,
    ) -> Result<PurchaseRecord, PurchaseError> {
        let buyer = caller.username();

        let balance = self.store.balance(buyer)?;
        if balance < price {
            return Err(PurchaseError::InsufficientFunds {
                user: buyer.to_string(),
                balance,
                price,
            });
        }

        Ok(self.store.purchase(buyer, item, price)?)
    }

    pub fn balance(&self, caller: &Caller) -> Result<Coins, QueryError> {
        Ok(self.store.balance(caller.username())?)
    }

    /// Coins received by the caller, oldest first.
    pub fn received(&self, caller: &Caller) -> Result<Vec<Received>, QueryError> {
        let records = self.store.received(caller.username())?;
        Ok(records.into_iter().map(Received::from).collect())
    }

    /// Coins sent by the caller, oldest first.
    pub fn sent(&self, caller: &Caller) -> Result<Vec<Sent>, QueryError> {
        let records = self.store.sent(caller.username())?;
        Ok(records.into_iter().map(Sent::from).collect())
    }

    pub fn purchases(&self, caller: &Caller) -> Result<Vec<PurchaseRecord>, QueryError> {
        Ok(self.store.purchases(caller.username())?)
    }

    /// All registered usernames, ascending.
    pub fn accounts(&self) -> Result<Vec<String>, QueryError> {
        Ok(self.store.accounts()?)
    }
}

impl Engine<MemoryStore> {
    /// Engine over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }
}

/// Private API
impl<S: AccountStore> Engine<S> {
    /// Small helper to log `apply` results
    fn log_result(
        command: &str,
        user: &str,
        target: Option<&str>,
        amount: Option<i64>,
        result: &Result<(), EngineError>,
    ) {
        match result {
            Ok(()) => {
                info!(user, target, amount, "{command} applied");
            }
            Err(e) if e.class() == ErrorClass::Internal => {
                error!(user, target, amount, reason = %e, "{command} failed");
            }
            Err(e) => {
                info!(user, target, amount, reason = %e, "{command} skipped");
            }
        }
    }
}
