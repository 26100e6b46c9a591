// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rusqlite::Connection;
use spendscope::{cli, commands::exporter, db};
use tempfile::tempdir;

const RATES: &str = r#"{"base":"USD","rates":{"USD":1.0},"updated_at":1722470400}"#;
const DUMP: &str = r#"{"pages": [{"rows": [
    {"type": "Purchase", "amount": "$14.99"},
    {"type": "Gift Purchase", "amount": "$20.00"}
]}]}"#;

fn base_conn() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&mut conn).unwrap();
    conn
}

fn export(
    conn: &Connection,
    format: &str,
    out: &str,
    dump: &str,
    rates: &str,
) -> anyhow::Result<()> {
    let cli = cli::build_cli();
    let matches = cli.get_matches_from([
        "spendscope",
        "export",
        "report",
        "--format",
        format,
        "--out",
        out,
        "--account",
        "main",
        "--dump",
        dump,
        "--rates-file",
        rates,
    ]);
    if let Some(("export", export_m)) = matches.subcommand() {
        exporter::handle(conn, export_m)
    } else {
        panic!("no export subcommand");
    }
}

#[test]
fn export_report_writes_metric_rows_as_csv() {
    let conn = base_conn();
    let dir = tempdir().unwrap();
    let dump = dir.path().join("dump.json");
    let rates = dir.path().join("rates.json");
    std::fs::write(&dump, DUMP).unwrap();
    std::fs::write(&rates, RATES).unwrap();
    let out_path = dir.path().join("report.csv");

    export(
        &conn,
        "csv",
        &out_path.to_string_lossy(),
        &dump.to_string_lossy(),
        &rates.to_string_lossy(),
    )
    .unwrap();

    let mut rdr = csv::Reader::from_path(&out_path).unwrap();
    let headers = rdr.headers().unwrap().clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        vec!["account", "currency", "metric", "amount", "truncated"]
    );
    let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    let find = |metric: &str| {
        rows.iter()
            .find(|r| &r[2] == metric)
            .map(|r| r[3].to_string())
            .unwrap()
    };
    assert_eq!(find("store-purchase"), "14.99");
    assert_eq!(find("gift-purchase"), "20.00");
    assert_eq!(find("total-spend"), "14.99");
    assert_eq!(find("credit-range-low"), "-5");
    assert!(rows.iter().all(|r| &r[0] == "main" && &r[1] == "USD" && &r[4] == "false"));
}

#[test]
fn export_report_streams_pretty_json() {
    let conn = base_conn();
    let dir = tempdir().unwrap();
    let dump = dir.path().join("dump.json");
    let rates = dir.path().join("rates.json");
    std::fs::write(&dump, DUMP).unwrap();
    std::fs::write(&rates, RATES).unwrap();
    let out_path = dir.path().join("report.json");

    export(
        &conn,
        "JSON",
        &out_path.to_string_lossy(),
        &dump.to_string_lossy(),
        &rates.to_string_lossy(),
    )
    .unwrap();

    let contents = std::fs::read_to_string(&out_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
    let arr = parsed.as_array().unwrap();
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["account"], "main");
    assert_eq!(arr[0]["total_spend"], 1499);
    assert_eq!(arr[0]["truncated"], false);
    assert_eq!(arr[0]["stop"]["reason"], "cursor-exhausted");
}

#[test]
fn export_report_rejects_unknown_format() {
    let conn = base_conn();
    let dir = tempdir().unwrap();
    let out_path = dir.path().join("export.unknown");
    let missing = dir.path().join("missing.json");

    let res = export(
        &conn,
        "xml",
        &out_path.to_string_lossy(),
        &missing.to_string_lossy(),
        &missing.to_string_lossy(),
    );
    assert!(res.unwrap_err().to_string().contains("Unknown format"));
    assert!(!out_path.exists());
}
