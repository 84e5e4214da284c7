//! Command line and environment configuration.

use std::path::PathBuf;

use clap::Parser;

use crate::Coins;
use crate::engine::STARTING_BALANCE;

/// Apply coin shop commands from a csv file and print every user's snapshot.
#[derive(Debug, Parser)]
#[command(name = "coin-shop", version)]
pub struct Config {
    /// Commands csv with a `type,user,target,amount` header
    pub input: PathBuf,

    /// SQLite database file; an in-memory database is used when omitted
    #[arg(long, env = "COIN_SHOP_DATABASE", conflicts_with = "memory")]
    pub database: Option<PathBuf>,

    /// Use the in-memory store instead of SQLite
    #[arg(long)]
    pub memory: bool,

    /// Coins granted to every registered account
    #[arg(
        long,
        env = "COIN_SHOP_STARTING_BALANCE",
        default_value_t = STARTING_BALANCE.get(),
        value_parser = clap::value_parser!(u64).range(..=Coins::MAX.get())
    )]
    pub starting_balance: u64,
}

/// Which account store to run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Memory,
    SqliteInMemory,
    SqliteFile(PathBuf),
}

impl Config {
    pub fn backend(&self) -> Backend {
        match (&self.database, self.memory) {
            (_, true) => Backend::Memory,
            (Some(path), false) => Backend::SqliteFile(path.clone()),
            (None, false) => Backend::SqliteInMemory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["coin-shop", "commands.csv"]).unwrap();
        assert_eq!(config.input, PathBuf::from("commands.csv"));
        assert_eq!(config.starting_balance, 1000);
    }

    #[test]
    fn database_flag_selects_file_backend() {
        let config =
            Config::try_parse_from(["coin-shop", "--database", "shop.db", "commands.csv"]).unwrap();
        assert_eq!(
            config.backend(),
            Backend::SqliteFile(PathBuf::from("shop.db"))
        );
    }

    #[test]
    fn memory_flag_selects_memory_backend() {
        let config = Config::try_parse_from([
            "coin-shop",
            "--memory",
            "--starting-balance",
            "50",
            "commands.csv",
        ])
        .unwrap();
        assert_eq!(config.backend(), Backend::Memory);
        assert_eq!(config.starting_balance, 50);
    }

    #[test]
    fn database_and_memory_conflict() {
        let result = Config::try_parse_from([
            "coin-shop",
            "--memory",
            "--database",
            "shop.db",
            "commands.csv",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn starting_balance_must_fit_the_store() {
        let largest = Coins::MAX.get().to_string();
        let config = Config::try_parse_from([
            "coin-shop",
            "--starting-balance",
            largest.as_str(),
            "commands.csv",
        ])
        .unwrap();
        assert_eq!(config.starting_balance, Coins::MAX.get());

        let result = Config::try_parse_from([
            "coin-shop",
            "--starting-balance",
            "9223372036854775808",
            "commands.csv",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn input_is_required() {
        assert!(Config::try_parse_from(["coin-shop"]).is_err());
    }
}
