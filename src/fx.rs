// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::HistoryError;
use crate::models::ExchangeRateSnapshot;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

static CURRENCY_SYMBOLS: &[(&str, &str)] = &[
    ("AED", "AED"),
    ("ARS", "ARS$"),
    ("AUD", "A$"),
    ("BRL", "R$"),
    ("CAD", "CDN$"),
    ("CHF", "CHF"),
    ("CLP", "CLP$"),
    ("CNY", "¥"),
    ("COP", "COL$"),
    ("CRC", "₡"),
    ("EUR", "€"),
    ("GBP", "£"),
    ("HKD", "HK$"),
    ("IDR", "Rp"),
    ("ILS", "₪"),
    ("INR", "₹"),
    ("JPY", "¥"),
    ("KRW", "₩"),
    ("KZT", "₸"),
    ("MXN", "Mex$"),
    ("MYR", "RM"),
    ("NOK", "kr"),
    ("NZD", "NZ$"),
    ("PEN", "S/."),
    ("PHP", "₱"),
    ("PLN", "zł"),
    ("QAR", "QR"),
    ("RUB", "₽"),
    ("SAR", "SR"),
    ("SGD", "S$"),
    ("THB", "฿"),
    ("TRY", "₺"),
    ("TWD", "NT$"),
    ("UAH", "₴"),
    ("USD", "$"),
    ("UYU", "$U"),
    ("VND", "₫"),
    ("ZAR", "R"),
];

/// Display symbol for an ISO code; the code itself when there is no mapping.
pub fn currency_symbol(code: &str) -> String {
    let code = code.trim().to_uppercase();
    CURRENCY_SYMBOLS
        .iter()
        .find(|(iso, _)| *iso == code)
        .map(|(_, sym)| sym.to_string())
        .unwrap_or(code)
}

/// Converts cents between two currencies of one snapshot. Both codes must be
/// present in `rates`, even when they are equal.
pub fn convert(
    amount_cents: i64,
    from: &str,
    to: &str,
    snapshot: &ExchangeRateSnapshot,
) -> Result<i64, HistoryError> {
    let from_rate = lookup(snapshot, from)?;
    let to_rate = lookup(snapshot, to)?;
    if from.eq_ignore_ascii_case(to) {
        return Ok(amount_cents);
    }
    let overflow = || HistoryError::MalformedAmount(format!("{} {}", amount_cents, from));
    Decimal::from(amount_cents)
        .checked_mul(to_rate)
        .and_then(|v| v.checked_div(from_rate))
        .ok_or_else(overflow)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(overflow)
}

fn lookup(snapshot: &ExchangeRateSnapshot, code: &str) -> Result<Decimal, HistoryError> {
    snapshot
        .rate(code)
        .and_then(Decimal::from_f64)
        .filter(|r| !r.is_zero() && r.is_sign_positive())
        .ok_or_else(|| HistoryError::UnknownCurrency(code.to_uppercase()))
}
