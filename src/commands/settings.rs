// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config;
use crate::utils::pretty_table;
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("show", _)) => show(conn)?,
        Some(("set-home", sub)) => {
            let ccy = config::set_home_currency(conn, sub.get_one::<String>("currency").unwrap())?;
            println!("Home currency set to {}", ccy);
        }
        Some(("set-multiplier", sub)) => {
            let m = config::set_credit_multiplier(conn, sub.get_one::<String>("value").unwrap())?;
            println!("Credit multiplier set to {}", m);
        }
        Some(("set-page-limit", sub)) => {
            match config::set_page_limit(conn, sub.get_one::<String>("value").unwrap())? {
                Some(n) => println!("Page limit set to {}", n),
                None => println!("Page limit cleared"),
            }
        }
        Some(("set-rates", sub)) => {
            let mode = config::set_rate_mode(conn, sub.get_one::<String>("mode").unwrap())?;
            println!("Rate source set to {:?}", mode);
        }
        _ => {}
    }
    Ok(())
}

fn show(conn: &Connection) -> Result<()> {
    let s = config::load(conn)?;
    let rows = vec![
        vec![config::HOME_CURRENCY.to_string(), s.report.home_currency],
        vec![
            config::CREDIT_MULTIPLIER.to_string(),
            s.report.credit_multiplier.to_string(),
        ],
        vec![
            config::PAGE_LIMIT.to_string(),
            s.history
                .page_limit
                .map(|n| n.to_string())
                .unwrap_or_else(|| "none".into()),
        ],
        vec![
            config::RATE_SOURCE.to_string(),
            format!("{:?}", s.rate_mode).to_lowercase(),
        ],
    ];
    println!("{}", pretty_table(&["Setting", "Value"], rows));
    Ok(())
}
