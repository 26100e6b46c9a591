// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Cursor-driven walk over an account's transaction history.
//!
//! Pages are fetched strictly one after another: every request needs the
//! cursor from the previous response. The first page must succeed; after
//! that a failure ends the walk and whatever was folded so far is kept.

use crate::aggregate::Aggregator;
use crate::classify::Classifier;
use crate::error::{HistoryError, SourceError};
use crate::fx;
use crate::models::{
    AccountContext, AggregateTotals, ClassifiedRow, ExchangeRateSnapshot, RawTransactionRow,
};
use crate::sources::HistorySource;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Hard stop after this many pages; `None` follows the cursor to the end.
    pub page_limit: Option<usize>,
}

/// Why the walk ended. `page` is the 1-based index of the page that ended it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum StopReason {
    CursorExhausted,
    EmptyPage { page: usize },
    ParseFailure { page: usize },
    TransportFailure { page: usize },
    PageLimit { pages: usize },
    Cancelled { page: usize },
}

impl StopReason {
    /// True when pages were left unread.
    pub fn truncates(self) -> bool {
        matches!(
            self,
            StopReason::TransportFailure { .. }
                | StopReason::PageLimit { .. }
                | StopReason::Cancelled { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryOutcome {
    pub totals: AggregateTotals,
    pub pages_fetched: usize,
    pub rows_seen: usize,
    pub malformed_rows: usize,
    pub skipped_rows: usize,
    /// Wallet-funded rows whose category has no wallet split; they count
    /// toward the base category only.
    pub unsplit_wallet_rows: usize,
    pub stop: StopReason,
}

impl HistoryOutcome {
    pub fn truncated(&self) -> bool {
        self.stop.truncates()
    }
}

#[derive(Debug, Default)]
struct RowTally {
    seen: usize,
    malformed: usize,
    skipped: usize,
    unsplit_wallet: usize,
}

pub struct PaginationDriver<'a> {
    source: &'a dyn HistorySource,
    classifier: &'a Classifier,
    config: HistoryConfig,
    cancel: CancelFlag,
    rates: Option<&'a ExchangeRateSnapshot>,
}

impl<'a> PaginationDriver<'a> {
    pub fn new(
        source: &'a dyn HistorySource,
        classifier: &'a Classifier,
        config: HistoryConfig,
    ) -> Self {
        Self {
            source,
            classifier,
            config,
            cancel: CancelFlag::new(),
            rates: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Rates used to bring foreign-currency rows into the account currency.
    pub fn with_rates(mut self, rates: &'a ExchangeRateSnapshot) -> Self {
        self.rates = Some(rates);
        self
    }

    pub fn fetch_full_history(
        &self,
        account: &AccountContext,
    ) -> Result<HistoryOutcome, HistoryError> {
        let mut agg = Aggregator::new(&account.currency);
        let mut tally = RowTally::default();

        let first = self.source.first_page(account).map_err(|err| match err {
            SourceError::Transport(detail) => HistoryError::Network {
                stage: format!("history page 1 of '{}'", account.name),
                detail,
            },
            SourceError::Parse(detail) => HistoryError::Parse { page: 1, detail },
        })?;
        info!(
            account = %account.name,
            page = 1,
            rows = first.rows.len(),
            "fetched history page"
        );
        self.fold_page(account, &first.rows, &mut agg, &mut tally);

        let mut pages = 1usize;
        let mut cursor = first.cursor;
        let stop = loop {
            let Some(current) = cursor.take() else {
                break StopReason::CursorExhausted;
            };
            let page = pages + 1;
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled { page };
            }
            if let Some(limit) = self.config.page_limit {
                if pages >= limit {
                    break StopReason::PageLimit { pages };
                }
            }

            debug!(
                account = %account.name,
                page,
                cursor = %current.transaction_id,
                "requesting next page"
            );
            let fetched = self.source.next_page(account, &current);
            pages = page;
            match fetched {
                Ok(next) if next.rows.is_empty() => break StopReason::EmptyPage { page },
                Ok(next) => {
                    info!(
                        account = %account.name,
                        page,
                        rows = next.rows.len(),
                        "fetched history page"
                    );
                    self.fold_page(account, &next.rows, &mut agg, &mut tally);
                    cursor = next.cursor;
                }
                Err(SourceError::Parse(detail)) => {
                    warn!(
                        account = %account.name,
                        page,
                        cursor = %current.transaction_id,
                        "unreadable page, stopping: {}",
                        detail
                    );
                    break StopReason::ParseFailure { page };
                }
                Err(SourceError::Transport(detail)) => {
                    warn!(
                        account = %account.name,
                        page,
                        cursor = %current.transaction_id,
                        "page fetch failed, keeping partial history: {}",
                        detail
                    );
                    break StopReason::TransportFailure { page };
                }
            }
        };

        info!(account = %account.name, pages, rows = tally.seen, ?stop, "history walk finished");
        Ok(HistoryOutcome {
            skipped_rows: tally.skipped + agg.rows_rejected(),
            totals: agg.into_totals(),
            pages_fetched: pages,
            rows_seen: tally.seen,
            malformed_rows: tally.malformed,
            unsplit_wallet_rows: tally.unsplit_wallet,
            stop,
        })
    }

    fn fold_page(
        &self,
        account: &AccountContext,
        rows: &[RawTransactionRow],
        agg: &mut Aggregator,
        tally: &mut RowTally,
    ) {
        let mut batch = Vec::with_capacity(rows.len());
        for row in rows {
            tally.seen += 1;
            let classified = match self.classifier.classify(row) {
                Ok(c) => c,
                Err(err) => {
                    warn!(account = %account.name, kind = %row.kind, "dropping row: {}", err);
                    tally.malformed += 1;
                    continue;
                }
            };
            if row.wallet && !classified.category.is_wallet_variant() {
                debug!(
                    account = %account.name,
                    kind = %row.kind,
                    category = %classified.category,
                    "wallet-funded row has no wallet split"
                );
                tally.unsplit_wallet += 1;
            }
            match self.to_account_currency(account, row, classified) {
                Ok(c) => batch.push(c),
                Err(err) => {
                    warn!(account = %account.name, kind = %row.kind, "skipping row: {}", err);
                    tally.skipped += 1;
                }
            }
        }
        agg.fold(&batch);
    }

    fn to_account_currency(
        &self,
        account: &AccountContext,
        row: &RawTransactionRow,
        classified: ClassifiedRow,
    ) -> Result<ClassifiedRow, HistoryError> {
        let from = match row.currency.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() && !code.eq_ignore_ascii_case(&account.currency) => {
                code
            }
            _ => return Ok(classified),
        };
        let rates = self
            .rates
            .ok_or_else(|| HistoryError::UnknownCurrency(from.to_uppercase()))?;
        Ok(ClassifiedRow {
            amount_cents: fx::convert(classified.amount_cents, from, &account.currency, rates)?,
            wallet_cents: fx::convert(classified.wallet_cents, from, &account.currency, rates)?,
            ..classified
        })
    }
}
