//! The fixed shop catalog.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::Coins;

/// An item that can be bought in the shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Item {
    TShirt,
    Cup,
    Book,
    Pen,
    Powerbank,
    Hoody,
    Umbrella,
    Socks,
    Wallet,
    PinkHoody,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown item '{0}'")]
pub struct UnknownItem(pub String);

impl Item {
    pub const ALL: [Item; 10] = [
        Item::TShirt,
        Item::Cup,
        Item::Book,
        Item::Pen,
        Item::Powerbank,
        Item::Hoody,
        Item::Umbrella,
        Item::Socks,
        Item::Wallet,
        Item::PinkHoody,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Item::TShirt => "t-shirt",
            Item::Cup => "cup",
            Item::Book => "book",
            Item::Pen => "pen",
            Item::Powerbank => "powerbank",
            Item::Hoody => "hoody",
            Item::Umbrella => "umbrella",
            Item::Socks => "socks",
            Item::Wallet => "wallet",
            Item::PinkHoody => "pink-hoody",
        }
    }

    pub const fn price(self) -> Coins {
        Coins::new(match self {
            Item::TShirt => 80,
            Item::Cup => 20,
            Item::Book => 50,
            Item::Pen => 10,
            Item::Powerbank => 200,
            Item::Hoody => 300,
            Item::Umbrella => 200,
            Item::Socks => 10,
            Item::Wallet => 50,
            Item::PinkHoody => 500,
        })
    }
}

impl FromStr for Item {
    type Err = UnknownItem;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Item::ALL
            .into_iter()
            .find(|item| item.name() == s)
            .ok_or_else(|| UnknownItem(s.to_string()))
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Item {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}
