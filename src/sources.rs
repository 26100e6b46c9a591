// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Collaborators the core pulls data from: history pages and rate tables.

use crate::error::SourceError;
use crate::models::{AccountContext, Cursor, ExchangeRateSnapshot, HistoryPage};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::COOKIE;
use rusqlite::Connection;
use serde::Deserialize;
use std::path::Path;

pub const EXCHANGE_API_URL: &str = "https://api.exchangerate-api.com/v4/latest";

pub trait HistorySource: Send + Sync {
    fn first_page(&self, account: &AccountContext) -> Result<HistoryPage, SourceError>;
    fn next_page(
        &self,
        account: &AccountContext,
        cursor: &Cursor,
    ) -> Result<HistoryPage, SourceError>;
}

pub trait RateSource: Send + Sync {
    fn fetch_rates(&self, home_currency: &str) -> Result<ExchangeRateSnapshot, SourceError>;

    /// Where the rates come from, as shown in reports.
    fn origin(&self) -> String;
}

/// JSON history endpoint: `GET /account/history` for the first page, then
/// `POST /account/AjaxLoadMoreHistory/` with the cursor as form fields.
pub struct HttpHistorySource {
    client: Client,
    base_url: String,
}

impl HttpHistorySource {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl HistorySource for HttpHistorySource {
    fn first_page(&self, account: &AccountContext) -> Result<HistoryPage, SourceError> {
        let url = format!("{}/account/history", self.base_url);
        let mut req = self.client.get(url);
        if let Some(session) = &account.session {
            req = req.header(COOKIE, session);
        }
        let resp = req.send()?.error_for_status()?;
        Ok(resp.json()?)
    }

    fn next_page(
        &self,
        account: &AccountContext,
        cursor: &Cursor,
    ) -> Result<HistoryPage, SourceError> {
        let url = format!("{}/account/AjaxLoadMoreHistory/", self.base_url);
        let form = [
            ("cursor[wallet_txnid]", cursor.transaction_id.clone()),
            ("cursor[timestamp_newest]", cursor.newest_timestamp.to_string()),
            ("cursor[balance]", cursor.running_balance.clone()),
            ("cursor[currency]", cursor.currency_code.to_string()),
        ];
        let mut req = self.client.post(url).form(&form);
        if let Some(session) = &account.session {
            req = req.header(COOKIE, session);
        }
        let resp = req.send()?.error_for_status()?;
        Ok(resp.json()?)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct DumpPage {
    #[serde(default)]
    after: Option<String>,
    #[serde(flatten)]
    page: HistoryPage,
}

#[derive(Debug, Deserialize)]
struct DumpFile {
    pages: Vec<DumpPage>,
}

/// Offline history saved as JSON. Each page names the cursor transaction id
/// that leads to it in `after`; the first page has none.
pub struct DumpHistorySource {
    pages: Vec<DumpPage>,
}

impl DumpHistorySource {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Read history dump {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("Parse history dump {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let dump: DumpFile = serde_json::from_str(raw)?;
        Ok(Self { pages: dump.pages })
    }
}

impl HistorySource for DumpHistorySource {
    fn first_page(&self, _account: &AccountContext) -> Result<HistoryPage, SourceError> {
        self.pages
            .iter()
            .find(|p| p.after.is_none())
            .map(|p| p.page.clone())
            .ok_or_else(|| SourceError::Parse("dump has no first page".into()))
    }

    fn next_page(
        &self,
        _account: &AccountContext,
        cursor: &Cursor,
    ) -> Result<HistoryPage, SourceError> {
        Ok(self
            .pages
            .iter()
            .find(|p| p.after.as_deref() == Some(cursor.transaction_id.as_str()))
            .map(|p| p.page.clone())
            .unwrap_or_default())
    }
}

pub struct HttpRateSource {
    client: Client,
    base_url: String,
}

impl HttpRateSource {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, EXCHANGE_API_URL)
    }

    pub fn with_base_url(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl RateSource for HttpRateSource {
    fn fetch_rates(&self, home_currency: &str) -> Result<ExchangeRateSnapshot, SourceError> {
        let url = format!("{}/{}", self.base_url, home_currency.to_uppercase());
        let resp = self.client.get(url).send()?.error_for_status()?;
        Ok(resp.json()?)
    }

    fn origin(&self) -> String {
        let host = self
            .base_url
            .split_once("://")
            .map_or(self.base_url.as_str(), |(_, rest)| rest)
            .split('/')
            .next()
            .unwrap_or_default();
        format!("live ({})", host)
    }
}

/// A snapshot already in hand: read from a file or the local cache.
#[derive(Debug, Clone)]
pub struct StaticRateSource {
    snapshot: ExchangeRateSnapshot,
    origin: String,
}

impl StaticRateSource {
    pub fn new(snapshot: ExchangeRateSnapshot) -> Self {
        Self::with_origin(snapshot, "fixed snapshot")
    }

    pub fn with_origin(snapshot: ExchangeRateSnapshot, origin: &str) -> Self {
        Self {
            snapshot,
            origin: origin.to_string(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Read rate file {}", path.display()))?;
        let snapshot: ExchangeRateSnapshot = serde_json::from_str(&raw)
            .with_context(|| format!("Parse rate file {}", path.display()))?;
        Ok(Self::with_origin(snapshot, &format!("file {}", path.display())))
    }

    pub fn from_cache(conn: &Connection) -> Result<Self> {
        let snapshot = crate::utils::latest_snapshot(conn)?
            .context("No cached exchange rates; run `spendscope fx fetch <CCY>` first")?;
        Ok(Self::with_origin(snapshot, "local cache"))
    }
}

impl RateSource for StaticRateSource {
    fn fetch_rates(&self, _home_currency: &str) -> Result<ExchangeRateSnapshot, SourceError> {
        Ok(self.snapshot.clone())
    }

    fn origin(&self) -> String {
        self.origin.clone()
    }
}
