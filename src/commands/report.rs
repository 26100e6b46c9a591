// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::classify::{Classifier, load_label_rules};
use crate::config::{self, RateMode, Settings};
use crate::models::AccountContext;
use crate::report::{Report, SpendReporter, render_table};
use crate::sources::{
    DumpHistorySource, HistorySource, HttpHistorySource, HttpRateSource, RateSource,
    StaticRateSource,
};
use crate::utils::{http_client, maybe_print_json};
use anyhow::{Context, Result, anyhow};
use rusqlite::Connection;
use std::path::Path;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let json_flag = m.get_flag("json");
    let jsonl_flag = m.get_flag("jsonl");
    let reports = generate(conn, m)?;
    if !maybe_print_json(json_flag, jsonl_flag, &reports)? {
        for r in &reports {
            println!("{}", render_table(r));
        }
    }
    for r in reports.iter().filter(|r| r.truncated) {
        eprintln!(
            "warning: history for '{}' is incomplete ({} pages read)",
            r.account, r.pages_fetched
        );
    }
    Ok(())
}

/// Stored settings with this invocation's overrides applied.
pub fn resolve_settings(conn: &Connection, m: &clap::ArgMatches) -> Result<Settings> {
    let mut settings = config::load(conn)?;
    if let Some(home) = m.get_one::<String>("home") {
        settings.report.home_currency = config::normalize_currency(home)?;
    }
    if let Some(raw) = m.get_one::<String>("multiplier") {
        settings.report.credit_multiplier = config::parse_multiplier(raw)?;
    }
    if let Some(raw) = m.get_one::<String>("page_limit") {
        settings.history.page_limit = config::parse_page_limit(raw)?;
    }
    if let Some(raw) = m.get_one::<String>("rates") {
        settings.rate_mode = raw.parse()?;
    }
    Ok(settings)
}

/// Pulls every requested account, each on its own thread with its own
/// aggregator, and returns the reports in argument order.
pub fn generate(conn: &Connection, m: &clap::ArgMatches) -> Result<Vec<Report>> {
    let settings = resolve_settings(conn, m)?;
    let names: Vec<String> = m
        .get_many::<String>("account")
        .unwrap_or_default()
        .map(|s| s.trim().to_string())
        .collect();
    let currency = match m.get_one::<String>("currency") {
        Some(c) => config::normalize_currency(c)?,
        None => settings.report.home_currency.clone(),
    };
    let session = m.get_one::<String>("session").cloned();
    let accounts: Vec<AccountContext> = names
        .iter()
        .map(|name| AccountContext {
            session: session.clone(),
            ..AccountContext::new(name, &currency)
        })
        .collect();

    let sources = history_sources(m, accounts.len())?;
    let rates = rate_source(conn, m, &settings)?;
    let classifier = Classifier::with_rules(load_label_rules(conn)?);

    let results = std::thread::scope(|s| {
        let handles: Vec<_> = accounts
            .iter()
            .zip(sources.iter())
            .map(|(acct, src)| {
                let reporter = SpendReporter::new(
                    src.as_ref(),
                    rates.as_ref(),
                    &classifier,
                    settings.report.clone(),
                    settings.history.clone(),
                );
                s.spawn(move || reporter.build_account_spend_report(acct))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join())
            .collect::<Vec<_>>()
    });

    let mut reports = Vec::with_capacity(results.len());
    for (acct, joined) in accounts.iter().zip(results) {
        let outcome = joined.map_err(|_| anyhow!("Report worker for '{}' panicked", acct.name))?;
        reports.push(outcome.with_context(|| format!("Account '{}'", acct.name))?);
    }
    Ok(reports)
}

fn history_sources(m: &clap::ArgMatches, accounts: usize) -> Result<Vec<Box<dyn HistorySource>>> {
    if let Some(endpoint) = m.get_one::<String>("endpoint") {
        if accounts != 1 {
            return Err(anyhow!("--endpoint pulls exactly one --account"));
        }
        let src = HttpHistorySource::new(http_client()?, endpoint.trim());
        return Ok(vec![Box::new(src)]);
    }
    let dumps: Vec<&String> = m.get_many::<String>("dump").unwrap_or_default().collect();
    if dumps.len() != accounts {
        return Err(anyhow!(
            "Got {} --dump files for {} accounts; pass one per --account",
            dumps.len(),
            accounts
        ));
    }
    dumps
        .into_iter()
        .map(|p| {
            let src = DumpHistorySource::from_path(Path::new(p.trim()))?;
            Ok(Box::new(src) as Box<dyn HistorySource>)
        })
        .collect()
}

fn rate_source(
    conn: &Connection,
    m: &clap::ArgMatches,
    settings: &Settings,
) -> Result<Box<dyn RateSource>> {
    if let Some(path) = m.get_one::<String>("rates_file") {
        return Ok(Box::new(StaticRateSource::from_path(Path::new(path.trim()))?));
    }
    Ok(match settings.rate_mode {
        RateMode::Live => Box::new(HttpRateSource::new(http_client()?)),
        RateMode::Cache => Box::new(StaticRateSource::from_cache(conn)?),
    })
}
