// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::Category;
use crate::utils::pretty_table;
use anyhow::{Result, anyhow};
use regex::Regex;
use rusqlite::{Connection, params};
use std::str::FromStr;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let pattern_raw = sub.get_one::<String>("pattern").unwrap();
            let pattern = pattern_raw.trim();
            Regex::new(pattern)
                .map_err(|err| anyhow!("Invalid regex pattern '{}': {}", pattern, err))?;

            let category = Category::from_str(sub.get_one::<String>("category").unwrap())
                .map_err(|err| anyhow!("{} (expected one of: {})", err, category_slugs()))?;
            let note = sub
                .get_one::<String>("note")
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string());
            conn.execute(
                "INSERT INTO label_rules(pattern, category, note) VALUES (?1,?2,?3)",
                params![pattern, category.slug(), note],
            )?;
            println!("Added rule: /{}/ -> {}", pattern, category);
        }
        Some(("list", _)) => {
            let mut stmt = conn.prepare(
                "SELECT id, pattern, category, COALESCE(note,'') FROM label_rules ORDER BY id DESC",
            )?;
            let rows = stmt.query_map([], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                ))
            })?;
            let mut data = Vec::new();
            for row in rows {
                let (id, pat, cat, note) = row?;
                data.push(vec![id.to_string(), pat, cat, note]);
            }
            println!(
                "{}",
                pretty_table(&["ID", "Pattern", "Category", "Note"], data)
            );
        }
        Some(("rm", sub)) => {
            let raw = sub.get_one::<String>("id").unwrap();
            let id = raw.trim().parse::<i64>()?;
            let n = conn.execute("DELETE FROM label_rules WHERE id=?1", params![id])?;
            if n == 0 {
                return Err(anyhow!("No rule with id {}", id));
            }
            println!("Removed rule {}", id);
        }
        _ => {}
    }
    Ok(())
}

fn category_slugs() -> String {
    Category::ALL
        .iter()
        .map(|c| c.slug())
        .collect::<Vec<_>>()
        .join(", ")
}
