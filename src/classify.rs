// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Row classification: free-text history labels to spend categories.
//!
//! User rules from the `label_rules` table are tried first (newest first),
//! then the built-in English / Simplified-Chinese taxonomy. Anything left
//! over is `Other`.

use crate::error::HistoryError;
use crate::models::{Category, ClassifiedRow, RawTransactionRow};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelClass {
    Fixed(Category),
    /// Generic market line; direction comes from the wallet change sign.
    Market,
}

static BUILTIN: Lazy<Vec<(Regex, LabelClass)>> = Lazy::new(|| {
    [
        (r"(?i)refund|退款", LabelClass::Fixed(Category::Refund)),
        (
            r"(?i)gift\s*(received|redeemed)|received\s+gift|收到.*礼物|礼物接收|接收礼物",
            LabelClass::Fixed(Category::Other),
        ),
        (
            r"(?i)gift\s*(purchase|sent)|礼物购买|赠送",
            LabelClass::Fixed(Category::GiftPurchase),
        ),
        (
            r"(?i)in[-\s]?game|游戏内购买",
            LabelClass::Fixed(Category::InGamePurchase),
        ),
        (
            r"(?i)wallet\s*(credit|top[-\s]?up|funds?)|purchased?\s+.*wallet|钱包资金|充值",
            LabelClass::Fixed(Category::WalletPurchase),
        ),
        (
            r"(?i)market\s*(sale|sell|selling|sold)",
            LabelClass::Fixed(Category::MarketSelling),
        ),
        (
            r"(?i)market\s*(purchase|buy|bought)",
            LabelClass::Fixed(Category::MarketPurchase),
        ),
        (r"(?i)market|市场", LabelClass::Market),
        (
            r"(?i)^\s*(store\s+)?purchase|^\s*购买",
            LabelClass::Fixed(Category::StorePurchase),
        ),
    ]
    .into_iter()
    .map(|(pat, class)| (Regex::new(pat).expect("built-in label pattern"), class))
    .collect()
});

#[derive(Debug, Clone)]
pub struct LabelRule {
    pub pattern: Regex,
    pub category: Category,
}

/// Stateless per row; holds only the user's label rules.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    custom: Vec<LabelRule>,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(custom: Vec<LabelRule>) -> Self {
        Self { custom }
    }

    pub fn classify(&self, row: &RawTransactionRow) -> Result<ClassifiedRow, HistoryError> {
        let base = match self.label_class(&row.kind) {
            LabelClass::Fixed(c) => c,
            LabelClass::Market => {
                let credited = row
                    .wallet_change
                    .as_deref()
                    .map(|w| w.trim_start().starts_with('+'))
                    .unwrap_or(false);
                if credited {
                    Category::MarketSelling
                } else {
                    Category::MarketPurchase
                }
            }
        };
        let amount_cents = parse_amount_cents(&row.amount)?.abs();

        if !row.wallet {
            return Ok(ClassifiedRow {
                category: base,
                amount_cents,
                wallet_cents: 0,
            });
        }
        Ok(ClassifiedRow {
            category: base.wallet_variant().unwrap_or(base),
            amount_cents,
            wallet_cents: amount_cents,
        })
    }

    fn label_class(&self, kind: &str) -> LabelClass {
        if let Some(rule) = self.custom.iter().find(|r| r.pattern.is_match(kind)) {
            return LabelClass::Fixed(rule.category.base());
        }
        BUILTIN
            .iter()
            .find(|(re, _)| re.is_match(kind))
            .map(|(_, class)| *class)
            .unwrap_or(LabelClass::Fixed(Category::Other))
    }
}

/// Loads user label rules, newest first. Rows with a broken pattern or an
/// unknown category are skipped with a warning.
pub fn load_label_rules(conn: &Connection) -> Result<Vec<LabelRule>, HistoryError> {
    let mut stmt = conn.prepare("SELECT id, pattern, category FROM label_rules ORDER BY id DESC")?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, pat, cat) = row?;
        let pattern = match Regex::new(&pat) {
            Ok(re) => re,
            Err(err) => {
                warn!(rule = id, "skipping label rule with invalid pattern: {}", err);
                continue;
            }
        };
        match Category::from_str(&cat) {
            Ok(category) => out.push(LabelRule { pattern, category }),
            Err(err) => warn!(rule = id, "skipping label rule: {}", err),
        }
    }
    Ok(out)
}

/// Largest magnitude a single row may carry (ten trillion major units).
/// Anything above it is treated as a scraping artifact, not a purchase.
pub const MAX_ROW_CENTS: i64 = 1_000_000_000_000_000;

/// Parses a displayed amount (`$1,234.56`, `1.234,56€`, `¥ 1,234`, `12,50 pуб.`)
/// into integer cents, rounding once, half away from zero.
pub fn parse_amount_cents(raw: &str) -> Result<i64, HistoryError> {
    let malformed = || HistoryError::MalformedAmount(raw.trim().to_string());

    let mut negative = false;
    let mut body = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '0'..='9' | '.' | ',' => body.push(ch),
            '-' | '\u{2212}' | '(' if body.is_empty() => negative = true,
            _ => {}
        }
    }
    let body = body.trim_matches(|c| c == '.' || c == ',');
    if !body.chars().any(|c| c.is_ascii_digit()) {
        return Err(malformed());
    }

    let normalized = match body.rfind(['.', ',']) {
        None => body.to_string(),
        Some(idx) => {
            let sep = if body.as_bytes()[idx] == b'.' { '.' } else { ',' };
            let other = if sep == '.' { ',' } else { '.' };
            let int_part = &body[..idx];
            let frac = &body[idx + 1..];
            let is_decimal = body.contains(other)
                || int_part.trim_start_matches('0').is_empty()
                || (body.matches(sep).count() == 1 && frac.len() != 3);
            let int_digits: String = int_part.chars().filter(|c| c.is_ascii_digit()).collect();
            if is_decimal {
                format!("{}.{}", int_digits, frac)
            } else {
                format!("{}{}", int_digits, frac)
            }
        }
    };

    let value = Decimal::from_str(&normalized).map_err(|_| malformed())?;
    let cents = value
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or_else(malformed)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .filter(|c| *c <= MAX_ROW_CENTS)
        .ok_or_else(malformed)?;
    Ok(if negative { -cents } else { cents })
}
