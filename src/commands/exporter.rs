// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::Category;
use crate::report::Report;
use anyhow::{Result, anyhow};
use rusqlite::Connection;
use rust_decimal::Decimal;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("report", sub)) => export_report(conn, sub),
        _ => Ok(()),
    }
}

fn export_report(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let fmt = sub.get_one::<String>("format").unwrap().trim().to_lowercase();
    let out = sub.get_one::<String>("out").unwrap().trim();
    if fmt != "csv" && fmt != "json" {
        return Err(anyhow!("Unknown format: {} (use csv|json)", fmt));
    }

    let reports = super::report::generate(conn, sub)?;
    match fmt.as_str() {
        "csv" => {
            let mut wtr = csv::Writer::from_path(out)?;
            wtr.write_record(["account", "currency", "metric", "amount", "truncated"])?;
            for r in &reports {
                for (metric, amount) in metric_rows(r) {
                    wtr.write_record([
                        r.account.clone(),
                        r.currency.clone(),
                        metric,
                        amount.to_string(),
                        r.truncated.to_string(),
                    ])?;
                }
            }
            wtr.flush()?;
        }
        _ => {
            std::fs::write(out, serde_json::to_string_pretty(&reports)?)?;
        }
    }
    println!("Exported {} report(s) to {}", reports.len(), out);
    Ok(())
}

/// Flat (metric, amount) pairs in major units: categories first, then the
/// derived figures.
pub fn metric_rows(r: &Report) -> Vec<(String, Decimal)> {
    let cents = |c: i64| Decimal::new(c, 2);
    let mut rows: Vec<(String, Decimal)> = Category::ALL
        .iter()
        .map(|c| (c.slug().to_string(), cents(r.totals.get(*c))))
        .collect();
    rows.push(("total-spend".into(), cents(r.total_spend)));
    rows.push(("total-external-spend".into(), cents(r.total_external_spend)));
    rows.push(("gifted-spend".into(), cents(r.gifted_spend)));
    rows.push(("credit-range-low".into(), r.credit_range_low));
    rows.push(("credit-range-high".into(), r.credit_range_high));
    rows.push(("external-range-low".into(), r.external_range_low));
    rows.push(("external-range-high".into(), r.external_range_high));
    rows
}
