// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::HistoryError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Continuation token handed back by the history endpoint after every page.
/// Replaced wholesale on each response, never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(alias = "wallet_txnid")]
    pub transaction_id: String,
    #[serde(alias = "timestamp_newest")]
    pub newest_timestamp: i64,
    #[serde(alias = "balance")]
    pub running_balance: String,
    #[serde(alias = "currency")]
    pub currency_code: i32,
}

/// One history line item as scraped, before classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransactionRow {
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: String,
    #[serde(default)]
    pub wallet: bool,
    #[serde(default)]
    pub currency: Option<String>,
    /// Signed wallet balance change as displayed, e.g. `+$1.20`.
    #[serde(default)]
    pub wallet_change: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPage {
    #[serde(default)]
    pub rows: Vec<RawTransactionRow>,
    #[serde(default)]
    pub cursor: Option<Cursor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    StorePurchase,
    StorePurchaseWallet,
    GiftPurchase,
    GiftPurchaseWallet,
    InGamePurchase,
    MarketPurchase,
    MarketSelling,
    WalletPurchase,
    Refund,
    RefundWallet,
    Other,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::StorePurchase,
        Category::StorePurchaseWallet,
        Category::GiftPurchase,
        Category::GiftPurchaseWallet,
        Category::InGamePurchase,
        Category::MarketPurchase,
        Category::MarketSelling,
        Category::WalletPurchase,
        Category::Refund,
        Category::RefundWallet,
        Category::Other,
    ];

    /// Wallet-funded counterpart, for the categories that track one.
    pub fn wallet_variant(self) -> Option<Category> {
        match self {
            Category::StorePurchase | Category::StorePurchaseWallet => {
                Some(Category::StorePurchaseWallet)
            }
            Category::GiftPurchase | Category::GiftPurchaseWallet => {
                Some(Category::GiftPurchaseWallet)
            }
            Category::Refund | Category::RefundWallet => Some(Category::RefundWallet),
            _ => None,
        }
    }

    /// The non-wallet category a wallet variant is a subset of.
    pub fn base(self) -> Category {
        match self {
            Category::StorePurchaseWallet => Category::StorePurchase,
            Category::GiftPurchaseWallet => Category::GiftPurchase,
            Category::RefundWallet => Category::Refund,
            other => other,
        }
    }

    pub fn is_wallet_variant(self) -> bool {
        self.base() != self
    }

    pub fn slug(self) -> &'static str {
        match self {
            Category::StorePurchase => "store-purchase",
            Category::StorePurchaseWallet => "store-purchase-wallet",
            Category::GiftPurchase => "gift-purchase",
            Category::GiftPurchaseWallet => "gift-purchase-wallet",
            Category::InGamePurchase => "in-game-purchase",
            Category::MarketPurchase => "market-purchase",
            Category::MarketSelling => "market-selling",
            Category::WalletPurchase => "wallet-purchase",
            Category::Refund => "refund",
            Category::RefundWallet => "refund-wallet",
            Category::Other => "other",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::StorePurchase => "Store purchase",
            Category::StorePurchaseWallet => "Store purchase (wallet)",
            Category::GiftPurchase => "Gift purchase",
            Category::GiftPurchaseWallet => "Gift purchase (wallet)",
            Category::InGamePurchase => "In-game purchase",
            Category::MarketPurchase => "Market purchase",
            Category::MarketSelling => "Market selling",
            Category::WalletPurchase => "Wallet top-up",
            Category::Refund => "Refund",
            Category::RefundWallet => "Refund (wallet)",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        Category::ALL
            .into_iter()
            .find(|c| c.slug() == wanted)
            .ok_or_else(|| format!("Unknown category '{}'", s.trim()))
    }
}

/// Classifier output for a single row. `wallet_cents` only lands in the
/// totals when `category` is a wallet variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedRow {
    pub category: Category,
    pub amount_cents: i64,
    pub wallet_cents: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateTotals {
    pub currency: String,
    pub cents: BTreeMap<Category, i64>,
}

impl AggregateTotals {
    pub fn new(currency: &str) -> Self {
        Self {
            currency: currency.to_uppercase(),
            cents: BTreeMap::new(),
        }
    }

    pub fn get(&self, category: Category) -> i64 {
        self.cents.get(&category).copied().unwrap_or(0)
    }

    /// Adds `cents` to one category. On overflow the total is left as it was.
    pub fn add(&mut self, category: Category, cents: i64) -> Result<(), HistoryError> {
        let total = self.get(category).checked_add(cents).ok_or_else(|| {
            HistoryError::MalformedAmount(format!(
                "{} cents overflows the {} total",
                cents, category
            ))
        })?;
        self.cents.insert(category, total);
        Ok(())
    }
}

/// Point-in-time rate table: `rates[x]` units of `x` per one unit of `base`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRateSnapshot {
    pub base: String,
    pub rates: HashMap<String, f64>,
    #[serde(alias = "time_last_updated")]
    pub updated_at: i64,
}

impl ExchangeRateSnapshot {
    pub fn rate(&self, code: &str) -> Option<f64> {
        self.rates.get(&code.to_uppercase()).copied()
    }

    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.updated_at, 0).single()
    }
}

/// Who the history belongs to. `currency` is the account's wallet currency,
/// the unit every row is folded in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountContext {
    pub name: String,
    pub currency: String,
    #[serde(default)]
    pub session: Option<String>,
}

impl AccountContext {
    pub fn new(name: &str, currency: &str) -> Self {
        Self {
            name: name.to_string(),
            currency: currency.to_uppercase(),
            session: None,
        }
    }
}
