//! Error types for the shop engine.

use thiserror::Error;

use crate::Coins;
use crate::store::StoreError;

/// Who is to blame for a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request broke a business rule (4xx).
    Client,
    /// The store failed; nothing was applied (5xx).
    Internal,
}

/// Top-level error returned by [`Engine::apply`](super::Engine::apply).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("register failed: {0}")]
    Register(#[from] RegisterError),

    #[error("transfer failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("purchase failed: {0}")]
    Purchase(#[from] PurchaseError),

    #[error("query failed: {0}")]
    Query(#[from] QueryError),
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::Register(e) => e.class(),
            EngineError::Transfer(e) => e.class(),
            EngineError::Purchase(e) => e.class(),
            EngineError::Query(e) => e.class(),
        }
    }
}

/// Error during account registration.
#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("username must not be blank")]
    InvalidUsername,
    #[error("account '{0}' already exists")]
    AccountExists(String),
    #[error("storage failure: {0}")]
    Storage(#[source] StoreError),
}

impl RegisterError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RegisterError::Storage(_) => ErrorClass::Internal,
            _ => ErrorClass::Client,
        }
    }
}

impl From<StoreError> for RegisterError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AccountExists(name) => RegisterError::AccountExists(name),
            other => RegisterError::Storage(other),
        }
    }
}

/// Error during a coin transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("amount must be a positive number of coins, got {0}")]
    InvalidAmount(i64),
    #[error("account '{0}' not found")]
    AccountNotFound(String),
    #[error("insufficient funds for '{user}': balance {balance}, requested {requested}")]
    InsufficientFunds {
        user: String,
        balance: Coins,
        requested: Coins,
    },
    #[error("storage failure: {0}")]
    Storage(#[source] StoreError),
}

impl TransferError {
    pub fn class(&self) -> ErrorClass {
        match self {
            TransferError::Storage(_) => ErrorClass::Internal,
            _ => ErrorClass::Client,
        }
    }
}

impl From<StoreError> for TransferError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AccountNotFound(name) => TransferError::AccountNotFound(name),
            StoreError::InsufficientFunds {
                user,
                balance,
                requested,
            } => TransferError::InsufficientFunds {
                user,
                balance,
                requested,
            },
            other => TransferError::Storage(other),
        }
    }
}

/// Error during an item purchase.
#[derive(Debug, Error)]
pub enum PurchaseError {
    #[error("unknown item '{0}'")]
    InvalidItem(String),
    #[error("account '{0}' not found")]
    AccountNotFound(String),
    #[error("insufficient funds for '{user}': balance {balance}, price {price}")]
    InsufficientFunds {
        user: String,
        balance: Coins,
        price: Coins,
    },
    #[error("storage failure: {0}")]
    Storage(#[source] StoreError),
}

impl PurchaseError {
    pub fn class(&self) -> ErrorClass {
        match self {
            PurchaseError::Storage(_) => ErrorClass::Internal,
            _ => ErrorClass::Client,
        }
    }
}

impl From<StoreError> for PurchaseError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AccountNotFound(name) => PurchaseError::AccountNotFound(name),
            StoreError::InsufficientFunds {
                user,
                balance,
                requested,
            } => PurchaseError::InsufficientFunds {
                user,
                balance,
                price: requested,
            },
            other => PurchaseError::Storage(other),
        }
    }
}

/// Error from a read-only query, including the mandatory balance read of a
/// user snapshot.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("account '{0}' not found")]
    AccountNotFound(String),
    #[error("storage failure: {0}")]
    Storage(#[source] StoreError),
}

impl QueryError {
    pub fn class(&self) -> ErrorClass {
        match self {
            QueryError::AccountNotFound(_) => ErrorClass::Client,
            QueryError::Storage(_) => ErrorClass::Internal,
        }
    }
}

impl From<StoreError> for QueryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AccountNotFound(name) => QueryError::AccountNotFound(name),
            other => QueryError::Storage(other),
        }
    }
}
