// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rusqlite::Connection;
use spendscope::classify::{Classifier, load_label_rules};
use spendscope::models::{Category, RawTransactionRow};
use spendscope::{cli, commands::rules, db};

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&mut conn).unwrap();
    conn
}

fn run(conn: &Connection, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["spendscope", "rules"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    if let Some(("rules", m)) = matches.subcommand() {
        rules::handle(conn, m)
    } else {
        panic!("no rules subcommand");
    }
}

#[test]
fn invalid_pattern_is_rejected() {
    let conn = setup();
    let err = run(
        &conn,
        &["add", "--pattern", "(unclosed", "--category", "other"],
    )
    .unwrap_err();
    assert!(err.to_string().contains("Invalid regex pattern"));

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM label_rules", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn unknown_category_is_rejected() {
    let conn = setup();
    let err = run(
        &conn,
        &["add", "--pattern", "bundle", "--category", "groceries"],
    )
    .unwrap_err();
    assert!(err.to_string().contains("store-purchase"));
}

#[test]
fn added_rules_feed_the_classifier_newest_first() {
    let conn = setup();
    run(
        &conn,
        &["add", "--pattern", "(?i)bundle", "--category", "in_game_purchase"],
    )
    .unwrap();
    run(
        &conn,
        &[
            "add",
            "--pattern",
            "(?i)season bundle",
            "--category",
            "gift-purchase",
            "--note",
            "  battle pass gifts ",
        ],
    )
    .unwrap();
    run(&conn, &["list"]).unwrap();

    let note: String = conn
        .query_row(
            "SELECT note FROM label_rules WHERE category='gift-purchase'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(note, "battle pass gifts");

    let classifier = Classifier::with_rules(load_label_rules(&conn).unwrap());
    let row = |kind: &str| RawTransactionRow {
        kind: kind.into(),
        amount: "$1.00".into(),
        ..Default::default()
    };
    assert_eq!(
        classifier.classify(&row("Season Bundle")).unwrap().category,
        Category::GiftPurchase
    );
    assert_eq!(
        classifier.classify(&row("Starter Bundle")).unwrap().category,
        Category::InGamePurchase
    );
}

#[test]
fn remove_rule_trims_id_and_reports_missing() {
    let conn = setup();
    run(
        &conn,
        &["add", "--pattern", "bundle", "--category", "other"],
    )
    .unwrap();
    let id: i64 = conn
        .query_row("SELECT id FROM label_rules", [], |r| r.get(0))
        .unwrap();
    let padded = format!(" {} ", id);

    run(&conn, &["rm", "--id", &padded]).unwrap();
    assert!(run(&conn, &["rm", "--id", &padded]).is_err());
}

#[test]
fn broken_stored_rules_are_skipped_when_loading() {
    let conn = setup();
    conn.execute(
        "INSERT INTO label_rules(pattern, category) VALUES ('(bad', 'other'), ('ok', 'nonsense'), ('fine', 'refund')",
        [],
    )
    .unwrap();
    let loaded = load_label_rules(&conn).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].category, Category::Refund);
}
