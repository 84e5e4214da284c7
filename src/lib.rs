pub mod catalog;
pub mod coins;
pub mod config;
pub mod csv;
pub mod engine;
pub mod model;
pub mod report;
pub mod store;

pub use catalog::Item;
pub use coins::Coins;
pub use engine::Engine;
pub use model::{Caller, Command, UserSnapshot};
pub use store::{AccountStore, MemoryStore, SqliteStore, StoreError};
