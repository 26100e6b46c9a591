// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::classify::parse_amount_cents;
use crate::config;
use crate::fx::{convert, currency_symbol};
use crate::models::ExchangeRateSnapshot;
use crate::sources::{HttpRateSource, RateSource};
use crate::utils::{format_cents, http_client, latest_snapshot, pretty_table, store_snapshot};
use anyhow::{Context, Result, anyhow};
use chrono::{TimeZone, Utc};
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("fetch", sub)) => {
            let ccy = match sub.get_one::<String>("currency") {
                Some(c) => config::normalize_currency(c)?,
                None => config::load(conn)?.report.home_currency,
            };
            let source = HttpRateSource::new(http_client()?);
            let snap = fetch_snapshot(conn, &source, &ccy)?;
            println!(
                "Cached {} rates for {} currencies (updated {})",
                snap.base,
                snap.rates.len(),
                updated_label(snap.updated_at)
            );
        }
        Some(("list", _)) => list_snapshots(conn)?,
        Some(("convert", sub)) => {
            let line = convert_amount(
                conn,
                sub.get_one::<String>("amount").unwrap(),
                sub.get_one::<String>("from").unwrap(),
                sub.get_one::<String>("to").unwrap(),
            )?;
            println!("{}", line);
        }
        _ => {}
    }
    Ok(())
}

pub fn fetch_snapshot(
    conn: &Connection,
    source: &dyn RateSource,
    ccy: &str,
) -> Result<ExchangeRateSnapshot> {
    let snap = source
        .fetch_rates(ccy)
        .with_context(|| format!("Fetch exchange rates for {}", ccy))?;
    if snap.rate(ccy).is_none() {
        return Err(anyhow!("Rate table for {} does not list {} itself", snap.base, ccy));
    }
    store_snapshot(conn, &snap)?;
    Ok(snap)
}

fn list_snapshots(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT base, updated_at, fetched_at, rates FROM fx_snapshots ORDER BY updated_at DESC LIMIT 20",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, i64>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
        ))
    })?;
    let mut data = Vec::new();
    for row in rows {
        let (base, updated, fetched, rates) = row?;
        let count = serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&rates)
            .map(|m| m.len().to_string())
            .unwrap_or_else(|_| "corrupt".into());
        data.push(vec![base, updated_label(updated), fetched, count]);
    }
    println!(
        "{}",
        pretty_table(&["Base", "Updated", "Fetched", "Currencies"], data)
    );
    Ok(())
}

pub fn convert_amount(conn: &Connection, amount: &str, from: &str, to: &str) -> Result<String> {
    let from = config::normalize_currency(from)?;
    let to = config::normalize_currency(to)?;
    let cents = parse_amount_cents(amount)?;
    let snap = latest_snapshot(conn)?
        .context("No cached exchange rates; run `spendscope fx fetch` first")?;
    let converted = convert(cents, &from, &to, &snap)?;
    Ok(format!(
        "{} -> {}",
        format_cents(cents, &currency_symbol(&from)),
        format_cents(converted, &currency_symbol(&to))
    ))
}

fn updated_label(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}
