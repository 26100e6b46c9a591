// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config;
use crate::models::Category;
use crate::utils::{get_setting, latest_snapshot, pretty_table};
use anyhow::Result;
use regex::Regex;
use rusqlite::Connection;
use std::str::FromStr;

const STALE_AFTER_SECS: i64 = 7 * 24 * 3600;

pub fn handle(conn: &Connection) -> Result<()> {
    let rows = check(conn)?;
    if rows.is_empty() {
        println!("doctor: no issues found");
    } else {
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}

pub fn check(conn: &Connection) -> Result<Vec<Vec<String>>> {
    let mut rows = Vec::new();

    // 1) Home currency
    let home = match get_setting(conn, config::HOME_CURRENCY)? {
        Some(h) => h,
        None => {
            rows.push(vec!["home_currency_unset".into(), "defaulting to USD".into()]);
            "USD".to_string()
        }
    };

    // 2) Rate cache: present, covers home currency, fresh
    match latest_snapshot(conn)? {
        None => rows.push(vec![
            "no_rate_cache".into(),
            "run `spendscope fx fetch` before using --rates cache".into(),
        ]),
        Some(snap) => {
            if snap.rate(&home).is_none() {
                rows.push(vec![
                    "home_not_in_rates".into(),
                    format!("{} missing from {} snapshot", home, snap.base),
                ]);
            }
            let age = chrono::Utc::now().timestamp() - snap.updated_at;
            if age > STALE_AFTER_SECS {
                rows.push(vec![
                    "stale_rates".into(),
                    format!("latest snapshot is {} days old", age / 86_400),
                ]);
            }
        }
    }

    // 3) Label rules that would be skipped at report time
    let mut stmt = conn.prepare("SELECT id, pattern, category FROM label_rules ORDER BY id")?;
    let mut cur = stmt.query([])?;
    while let Some(r) = cur.next()? {
        let id: i64 = r.get(0)?;
        let pat: String = r.get(1)?;
        let cat: String = r.get(2)?;
        if Regex::new(&pat).is_err() {
            rows.push(vec!["bad_rule_pattern".into(), format!("#{} /{}/", id, pat)]);
        }
        if Category::from_str(&cat).is_err() {
            rows.push(vec!["bad_rule_category".into(), format!("#{} {}", id, cat)]);
        }
    }

    Ok(rows)
}
