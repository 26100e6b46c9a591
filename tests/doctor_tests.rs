// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rusqlite::Connection;
use spendscope::commands::doctor;
use spendscope::models::ExchangeRateSnapshot;
use spendscope::utils::{put_setting, store_snapshot};
use spendscope::db;
use std::collections::HashMap;

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&mut conn).unwrap();
    conn
}

fn issues(conn: &Connection) -> Vec<String> {
    doctor::check(conn)
        .unwrap()
        .into_iter()
        .map(|row| row[0].clone())
        .collect()
}

#[test]
fn fresh_store_reports_missing_setup() {
    let conn = setup();
    let found = issues(&conn);
    assert!(found.contains(&"home_currency_unset".to_string()));
    assert!(found.contains(&"no_rate_cache".to_string()));
}

#[test]
fn configured_store_is_clean() {
    let conn = setup();
    put_setting(&conn, "home_currency", "USD").unwrap();
    store_snapshot(
        &conn,
        &ExchangeRateSnapshot {
            base: "USD".into(),
            rates: HashMap::from([("USD".to_string(), 1.0)]),
            updated_at: chrono::Utc::now().timestamp(),
        },
    )
    .unwrap();
    assert!(issues(&conn).is_empty());
    doctor::handle(&conn).unwrap();
}

#[test]
fn stale_rates_bad_rules_and_missing_home_are_flagged() {
    let conn = setup();
    put_setting(&conn, "home_currency", "EUR").unwrap();
    store_snapshot(
        &conn,
        &ExchangeRateSnapshot {
            base: "USD".into(),
            rates: HashMap::from([("USD".to_string(), 1.0)]),
            updated_at: 1_600_000_000,
        },
    )
    .unwrap();
    conn.execute(
        "INSERT INTO label_rules(pattern, category) VALUES ('(oops', 'other'), ('fine', 'misc')",
        [],
    )
    .unwrap();

    let found = issues(&conn);
    for expected in [
        "home_not_in_rates",
        "stale_rates",
        "bad_rule_pattern",
        "bad_rule_category",
    ] {
        assert!(found.contains(&expected.to_string()), "missing {}", expected);
    }
    assert!(!found.contains(&"home_currency_unset".to_string()));
}
