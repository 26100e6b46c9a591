// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Settings persisted in the `settings` table, resolved into the plain
//! config structs the driver and report builder take.

use crate::history::HistoryConfig;
use crate::report::{DEFAULT_CREDIT_MULTIPLIER, ReportConfig};
use crate::utils::{clear_setting, get_setting, parse_decimal, put_setting};
use anyhow::{Context, Result, anyhow};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

pub const HOME_CURRENCY: &str = "home_currency";
pub const CREDIT_MULTIPLIER: &str = "credit_multiplier";
pub const PAGE_LIMIT: &str = "page_limit";
pub const RATE_SOURCE: &str = "rate_source";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RateMode {
    #[default]
    Live,
    Cache,
}

impl FromStr for RateMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(RateMode::Live),
            "cache" => Ok(RateMode::Cache),
            other => Err(anyhow!("Unknown rate source '{}' (use live|cache)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub report: ReportConfig,
    pub history: HistoryConfig,
    pub rate_mode: RateMode,
}

pub fn load(conn: &Connection) -> Result<Settings> {
    let home_currency = get_setting(conn, HOME_CURRENCY)?.unwrap_or_else(|| "USD".to_string());
    let credit_multiplier = match get_setting(conn, CREDIT_MULTIPLIER)? {
        Some(raw) => parse_multiplier(&raw)?,
        None => DEFAULT_CREDIT_MULTIPLIER,
    };
    let page_limit = match get_setting(conn, PAGE_LIMIT)? {
        Some(raw) => parse_page_limit(&raw)?,
        None => None,
    };
    let rate_mode = match get_setting(conn, RATE_SOURCE)? {
        Some(raw) => raw.parse()?,
        None => RateMode::default(),
    };
    Ok(Settings {
        report: ReportConfig {
            home_currency,
            credit_multiplier,
        },
        history: HistoryConfig { page_limit },
        rate_mode,
    })
}

pub fn normalize_currency(raw: &str) -> Result<String> {
    let ccy = raw.trim().to_uppercase();
    if ccy.len() != 3 || !ccy.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(anyhow!("Invalid currency code '{}', expected ISO 4217 like USD", raw.trim()));
    }
    Ok(ccy)
}

pub fn parse_multiplier(raw: &str) -> Result<Decimal> {
    let m = parse_decimal(raw).context("Credit multiplier")?;
    if m <= Decimal::ZERO {
        return Err(anyhow!("Credit multiplier must be positive, got {}", m));
    }
    Ok(m)
}

/// `none` (or empty) clears the limit.
pub fn parse_page_limit(raw: &str) -> Result<Option<usize>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let n: usize = raw
        .parse()
        .with_context(|| format!("Invalid page limit '{}'", raw))?;
    if n == 0 {
        return Err(anyhow!("Page limit must be at least 1"));
    }
    Ok(Some(n))
}

pub fn set_home_currency(conn: &Connection, raw: &str) -> Result<String> {
    let ccy = normalize_currency(raw)?;
    put_setting(conn, HOME_CURRENCY, &ccy)?;
    Ok(ccy)
}

pub fn set_credit_multiplier(conn: &Connection, raw: &str) -> Result<Decimal> {
    let m = parse_multiplier(raw)?;
    put_setting(conn, CREDIT_MULTIPLIER, &m.to_string())?;
    Ok(m)
}

pub fn set_page_limit(conn: &Connection, raw: &str) -> Result<Option<usize>> {
    let limit = parse_page_limit(raw)?;
    match limit {
        Some(n) => put_setting(conn, PAGE_LIMIT, &n.to_string())?,
        None => clear_setting(conn, PAGE_LIMIT)?,
    }
    Ok(limit)
}

pub fn set_rate_mode(conn: &Connection, raw: &str) -> Result<RateMode> {
    let mode: RateMode = raw.parse()?;
    let value = match mode {
        RateMode::Live => "live",
        RateMode::Cache => "cache",
    };
    put_setting(conn, RATE_SOURCE, value)?;
    Ok(mode)
}
