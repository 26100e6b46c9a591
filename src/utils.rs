// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::ExchangeRateSnapshot;
use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::collections::HashMap;

const UA: &str = concat!(
    "spendscope/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/alphavelocity/spendscope)"
);

/// Shared blocking client; the timeout bounds every page and rate fetch.
pub fn http_client() -> Result<reqwest::blocking::Client> {
    let c = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(15))
        .user_agent(UA)
        .build()?;
    Ok(c)
}

pub fn parse_decimal(s: &str) -> Result<Decimal> {
    s.trim()
        .parse::<Decimal>()
        .with_context(|| format!("Invalid decimal '{}'", s))
}

pub fn format_cents(cents: i64, symbol: &str) -> String {
    let amount = Decimal::new(cents, 2);
    if symbol.chars().last().is_some_and(|c| c.is_alphabetic()) {
        format!("{} {}", symbol, amount)
    } else {
        format!("{}{}", symbol, amount)
    }
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // If v is an array, stream each element; else stream single line
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let v: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key=?1", params![key], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(v)
}

pub fn put_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub fn clear_setting(conn: &Connection, key: &str) -> Result<()> {
    conn.execute("DELETE FROM settings WHERE key=?1", params![key])?;
    Ok(())
}

/// Caches a snapshot; re-fetching the same (base, update time) is a no-op.
pub fn store_snapshot(conn: &Connection, snap: &ExchangeRateSnapshot) -> Result<bool> {
    let rates = serde_json::to_string(&snap.rates)?;
    let n = conn.execute(
        "INSERT OR IGNORE INTO fx_snapshots(base, updated_at, fetched_at, rates)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            snap.base.to_uppercase(),
            snap.updated_at,
            chrono::Utc::now().to_rfc3339(),
            rates
        ],
    )?;
    Ok(n > 0)
}

pub fn latest_snapshot(conn: &Connection) -> Result<Option<ExchangeRateSnapshot>> {
    let row: Option<(String, i64, String)> = conn
        .query_row(
            "SELECT base, updated_at, rates FROM fx_snapshots ORDER BY updated_at DESC, id DESC LIMIT 1",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    let Some((base, updated_at, raw)) = row else {
        return Ok(None);
    };
    let rates: HashMap<String, f64> = serde_json::from_str(&raw)
        .with_context(|| format!("Corrupt cached rates for {} @ {}", base, updated_at))?;
    Ok(Some(ExchangeRateSnapshot {
        base,
        rates,
        updated_at,
    }))
}
