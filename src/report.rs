// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::classify::Classifier;
use crate::error::{HistoryError, SourceError};
use crate::fx;
use crate::history::{CancelFlag, HistoryConfig, HistoryOutcome, PaginationDriver, StopReason};
use crate::models::{AccountContext, AggregateTotals, Category, ExchangeRateSnapshot};
use crate::sources::{HistorySource, RateSource};
use crate::utils::{format_cents, pretty_table};
use chrono::{DateTime, Utc};
use comfy_table::Table;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Assumed markup between what was paid and the credit it can earn back.
pub const DEFAULT_CREDIT_MULTIPLIER: Decimal = Decimal::from_parts(18, 0, 0, false, 1);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    pub home_currency: String,
    pub credit_multiplier: Decimal,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            home_currency: "USD".to_string(),
            credit_multiplier: DEFAULT_CREDIT_MULTIPLIER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub account: String,
    pub currency: String,
    pub symbol: String,
    pub totals: AggregateTotals,
    pub total_spend: i64,
    pub total_external_spend: i64,
    pub gifted_spend: i64,
    pub credit_range_low: Decimal,
    pub credit_range_high: Decimal,
    pub external_range_low: Decimal,
    pub external_range_high: Decimal,
    pub credit_multiplier: Decimal,
    pub rate_base: String,
    pub rates_updated_at: Option<DateTime<Utc>>,
    pub rate_source: String,
    pub truncated: bool,
    pub stop: Option<StopReason>,
    pub pages_fetched: usize,
    pub rows_seen: usize,
    pub malformed_rows: usize,
    pub skipped_rows: usize,
    /// Wallet-funded rows whose category has no wallet split.
    pub unsplit_wallet_rows: usize,
}

pub struct ReportBuilder {
    config: ReportConfig,
}

impl ReportBuilder {
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }

    /// Derives the summary metrics from final totals. Totals kept in another
    /// currency are normalized into the home currency first.
    pub fn build(
        &self,
        totals: AggregateTotals,
        snapshot: &ExchangeRateSnapshot,
    ) -> Result<Report, HistoryError> {
        let home = self.config.home_currency.to_uppercase();
        fx::convert(0, &home, &home, snapshot)?;
        let totals = if totals.currency.eq_ignore_ascii_case(&home) {
            totals
        } else {
            let mut normalized = AggregateTotals::new(&home);
            for (category, cents) in &totals.cents {
                let converted = fx::convert(*cents, &totals.currency, &home, snapshot)?;
                normalized.add(*category, converted)?;
            }
            normalized
        };

        let out_of_range = || HistoryError::MalformedAmount("report totals out of range".into());
        let store = totals.get(Category::StorePurchase);
        let gift = totals.get(Category::GiftPurchase);
        let total_spend = store
            .checked_add(totals.get(Category::InGamePurchase))
            .ok_or_else(out_of_range)?;
        let total_external_spend = (store - totals.get(Category::StorePurchaseWallet))
            .checked_add(gift - totals.get(Category::GiftPurchaseWallet))
            .ok_or_else(out_of_range)?;
        let gifted_spend = gift;

        let mult = self.config.credit_multiplier;
        let low = |spend: i64| Decimal::from((spend - gifted_spend) / 100);
        let high = |spend: i64| {
            Decimal::from(spend)
                .checked_mul(mult)
                .and_then(|v| v.checked_sub(Decimal::from(gifted_spend)))
                .map(|v| (v / Decimal::ONE_HUNDRED).round_dp(2))
                .ok_or_else(out_of_range)
        };
        let credit_range_high = high(total_spend)?;
        let external_range_high = high(total_external_spend)?;

        Ok(Report {
            account: String::new(),
            symbol: fx::currency_symbol(&home),
            currency: home,
            credit_range_low: low(total_spend),
            credit_range_high,
            external_range_low: low(total_external_spend),
            external_range_high,
            totals,
            total_spend,
            total_external_spend,
            gifted_spend,
            credit_multiplier: mult,
            rate_base: snapshot.base.clone(),
            rates_updated_at: snapshot.updated_at_utc(),
            rate_source: String::new(),
            truncated: false,
            stop: None,
            pages_fetched: 0,
            rows_seen: 0,
            malformed_rows: 0,
            skipped_rows: 0,
            unsplit_wallet_rows: 0,
        })
    }

    pub fn build_from_history(
        &self,
        account: &str,
        outcome: HistoryOutcome,
        snapshot: &ExchangeRateSnapshot,
    ) -> Result<Report, HistoryError> {
        let truncated = outcome.truncated();
        let mut report = self.build(outcome.totals, snapshot)?;
        report.account = account.to_string();
        report.truncated = truncated;
        report.stop = Some(outcome.stop);
        report.pages_fetched = outcome.pages_fetched;
        report.rows_seen = outcome.rows_seen;
        report.malformed_rows = outcome.malformed_rows;
        report.skipped_rows = outcome.skipped_rows;
        report.unsplit_wallet_rows = outcome.unsplit_wallet_rows;
        Ok(report)
    }
}

/// Ties the collaborators together for one account: rates first, then the
/// history walk, then the report.
pub struct SpendReporter<'a> {
    history: &'a dyn HistorySource,
    rates: &'a dyn RateSource,
    classifier: &'a Classifier,
    report: ReportConfig,
    paging: HistoryConfig,
    cancel: CancelFlag,
}

impl<'a> SpendReporter<'a> {
    pub fn new(
        history: &'a dyn HistorySource,
        rates: &'a dyn RateSource,
        classifier: &'a Classifier,
        report: ReportConfig,
        paging: HistoryConfig,
    ) -> Self {
        Self {
            history,
            rates,
            classifier,
            report,
            paging,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn build_account_spend_report(
        &self,
        account: &AccountContext,
    ) -> Result<Report, HistoryError> {
        let snapshot = self
            .rates
            .fetch_rates(&self.report.home_currency)
            .map_err(|err| {
                let detail = match err {
                    SourceError::Transport(d) | SourceError::Parse(d) => d,
                };
                HistoryError::Network {
                    stage: format!("exchange rates for {}", self.report.home_currency),
                    detail,
                }
            })?;
        let home = self.report.home_currency.as_str();
        fx::convert(0, home, home, &snapshot)?;

        let outcome = PaginationDriver::new(self.history, self.classifier, self.paging.clone())
            .with_rates(&snapshot)
            .with_cancel(self.cancel.clone())
            .fetch_full_history(account)?;
        let mut report = ReportBuilder::new(self.report.clone()).build_from_history(
            &account.name,
            outcome,
            &snapshot,
        )?;
        report.rate_source = self.rates.origin();
        info!(
            account = %account.name,
            total_spend = report.total_spend,
            truncated = report.truncated,
            "report built"
        );
        Ok(report)
    }
}

pub fn render_table(report: &Report) -> Table {
    let sym = report.symbol.as_str();
    let money = |cents: i64| format_cents(cents, sym);
    let whole = |d: Decimal| format!("{} ({})", d, sym);
    let t = &report.totals;
    let split = |base: Category, wallet: Category| {
        vec![
            vec![base.label().to_string(), money(t.get(base))],
            vec!["  external".to_string(), money(t.get(base) - t.get(wallet))],
            vec!["  wallet".to_string(), money(t.get(wallet))],
        ]
    };

    let mut rows: Vec<Vec<String>> = vec![vec!["[Purchases]".into(), String::new()]];
    rows.extend(split(Category::StorePurchase, Category::StorePurchaseWallet));
    rows.extend(split(Category::GiftPurchase, Category::GiftPurchaseWallet));
    for c in [
        Category::InGamePurchase,
        Category::MarketPurchase,
        Category::MarketSelling,
    ] {
        rows.push(vec![c.label().to_string(), money(t.get(c))]);
    }

    rows.push(vec!["[Other]".into(), String::new()]);
    rows.push(vec![
        Category::WalletPurchase.label().to_string(),
        money(t.get(Category::WalletPurchase)),
    ]);
    rows.push(vec![
        Category::Other.label().to_string(),
        money(t.get(Category::Other)),
    ]);
    rows.extend(split(Category::Refund, Category::RefundWallet));

    rows.push(vec!["[Status]".into(), String::new()]);
    rows.push(vec!["Total spend".into(), money(report.total_spend)]);
    rows.push(vec![
        "Total external spend".into(),
        money(report.total_external_spend),
    ]);
    rows.push(vec!["Gifted spend".into(), money(report.gifted_spend)]);

    rows.push(vec![
        format!("[Credit x{}]", report.credit_multiplier),
        String::new(),
    ]);
    rows.push(vec!["Credit min".into(), whole(report.credit_range_low)]);
    rows.push(vec!["Credit max".into(), whole(report.credit_range_high)]);
    rows.push(vec!["External min".into(), whole(report.external_range_low)]);
    rows.push(vec!["External max".into(), whole(report.external_range_high)]);

    rows.push(vec!["[About]".into(), String::new()]);
    rows.push(vec!["Rate base".into(), report.rate_base.clone()]);
    rows.push(vec![
        "Rates updated".into(),
        report
            .rates_updated_at
            .map(|d| d.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "unknown".into()),
    ]);
    let source = if report.rate_source.is_empty() {
        "unknown"
    } else {
        report.rate_source.as_str()
    };
    rows.push(vec!["Rate source".into(), source.to_string()]);
    rows.push(vec!["Pages read".into(), report.pages_fetched.to_string()]);
    if report.truncated {
        rows.push(vec!["Truncated".into(), "yes (partial history)".into()]);
    }
    if report.unsplit_wallet_rows > 0 {
        rows.push(vec![
            "Wallet rows without a split".into(),
            report.unsplit_wallet_rows.to_string(),
        ]);
    }
    if report.malformed_rows > 0 || report.skipped_rows > 0 {
        rows.push(vec![
            "Rows dropped".into(),
            format!(
                "{} malformed, {} unconvertible",
                report.malformed_rows, report.skipped_rows
            ),
        ]);
    }

    let title = format!("{} ({})", report.account, report.currency);
    pretty_table(&[title.as_str(), "Amount"], rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cursor, HistoryPage, RawTransactionRow};
    use crate::sources::StaticRateSource;
    use std::collections::HashMap;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct DownRates;

    impl RateSource for DownRates {
        fn fetch_rates(&self, _home: &str) -> Result<ExchangeRateSnapshot, SourceError> {
            Err(SourceError::Transport("operation timed out".into()))
        }

        fn origin(&self) -> String {
            "live (rates.test)".into()
        }
    }

    /// One page of purchases, then the connection drops.
    #[derive(Default)]
    struct DropsAfterFirstPage {
        calls: AtomicUsize,
    }

    impl HistorySource for DropsAfterFirstPage {
        fn first_page(&self, _a: &AccountContext) -> Result<HistoryPage, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let row = |kind: &str, amount: &str| RawTransactionRow {
                kind: kind.into(),
                amount: amount.into(),
                ..Default::default()
            };
            Ok(HistoryPage {
                rows: vec![row("Purchase", "$9.99"), row("Gift Purchase", "$20.00")],
                cursor: Some(Cursor {
                    transaction_id: "42".into(),
                    newest_timestamp: 1_700_000_000,
                    running_balance: "0".into(),
                    currency_code: 1,
                }),
            })
        }

        fn next_page(
            &self,
            _a: &AccountContext,
            _c: &Cursor,
        ) -> Result<HistoryPage, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(SourceError::Transport("connection reset".into()))
        }
    }

    fn snapshot() -> ExchangeRateSnapshot {
        ExchangeRateSnapshot {
            base: "USD".into(),
            rates: HashMap::from([
                ("USD".to_string(), 1.0),
                ("CNY".to_string(), 7.0),
                ("XOF".to_string(), 600.0),
            ]),
            updated_at: 1_722_470_400,
        }
    }

    fn totals(entries: &[(Category, i64)]) -> AggregateTotals {
        let mut t = AggregateTotals::new("USD");
        for (c, v) in entries {
            t.add(*c, *v).unwrap();
        }
        t
    }

    #[test]
    fn derived_metrics_follow_formulas() {
        let t = totals(&[
            (Category::StorePurchase, 1499),
            (Category::StorePurchaseWallet, 500),
            (Category::GiftPurchase, 2000),
            (Category::WalletPurchase, 5000),
        ]);
        let r = ReportBuilder::new(ReportConfig::default())
            .build(t, &snapshot())
            .unwrap();
        assert_eq!(r.total_spend, 1499);
        assert_eq!(r.total_external_spend, 2999);
        assert_eq!(r.gifted_spend, 2000);
        assert_eq!(r.credit_range_low, Decimal::from(-5));
        assert_eq!(r.credit_range_high, Decimal::from_str("6.98").unwrap());
        assert_eq!(r.external_range_low, Decimal::from(9));
        assert_eq!(r.external_range_high, Decimal::from_str("33.98").unwrap());
        assert_eq!(r.symbol, "$");
        assert!(!r.truncated);
    }

    #[test]
    fn multiplier_is_configurable() {
        let t = totals(&[(Category::StorePurchase, 10000)]);
        let cfg = ReportConfig {
            home_currency: "USD".into(),
            credit_multiplier: Decimal::from(2),
        };
        let r = ReportBuilder::new(cfg).build(t, &snapshot()).unwrap();
        assert_eq!(r.credit_range_high, Decimal::from(200));
    }

    #[test]
    fn absurd_multiplier_is_an_error_not_a_panic() {
        let t = totals(&[(Category::StorePurchase, 1_000_000_000_000_000)]);
        let cfg = ReportConfig {
            home_currency: "USD".into(),
            credit_multiplier: Decimal::from_str("100000000000000000000").unwrap(),
        };
        let err = ReportBuilder::new(cfg).build(t, &snapshot()).unwrap_err();
        assert!(matches!(err, HistoryError::MalformedAmount(_)));
    }

    #[test]
    fn totals_are_normalized_into_home_currency() {
        let t = totals(&[(Category::StorePurchase, 1000)]);
        let cfg = ReportConfig {
            home_currency: "cny".into(),
            ..ReportConfig::default()
        };
        let r = ReportBuilder::new(cfg).build(t, &snapshot()).unwrap();
        assert_eq!(r.currency, "CNY");
        assert_eq!(r.symbol, "¥");
        assert_eq!(r.totals.get(Category::StorePurchase), 7000);
    }

    #[test]
    fn unknown_home_currency_is_fatal() {
        let cfg = ReportConfig {
            home_currency: "GBP".into(),
            ..ReportConfig::default()
        };
        let err = ReportBuilder::new(cfg)
            .build(totals(&[]), &snapshot())
            .unwrap_err();
        assert_eq!(err, HistoryError::UnknownCurrency("GBP".into()));
    }

    #[test]
    fn rendering_falls_back_to_iso_code() {
        let mut t = AggregateTotals::new("XOF");
        t.add(Category::StorePurchase, 1499).unwrap();
        let cfg = ReportConfig {
            home_currency: "XOF".into(),
            ..ReportConfig::default()
        };
        let r = ReportBuilder::new(cfg).build(t, &snapshot()).unwrap();
        assert_eq!(r.symbol, "XOF");
        let text = render_table(&r).to_string();
        assert!(text.contains("XOF 14.99"));
    }

    #[test]
    fn rate_fetch_failure_is_a_network_error_before_any_page() {
        let history = DropsAfterFirstPage::default();
        let classifier = Classifier::new();
        let err = SpendReporter::new(
            &history,
            &DownRates,
            &classifier,
            ReportConfig::default(),
            HistoryConfig::default(),
        )
        .build_account_spend_report(&AccountContext::new("main", "USD"))
        .unwrap_err();
        assert_eq!(
            err,
            HistoryError::Network {
                stage: "exchange rates for USD".into(),
                detail: "operation timed out".into(),
            }
        );
        assert_eq!(history.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn mid_stream_drop_yields_truncated_report_with_first_page_totals() {
        let history = DropsAfterFirstPage::default();
        let rates = StaticRateSource::new(snapshot());
        let classifier = Classifier::new();
        let r = SpendReporter::new(
            &history,
            &rates,
            &classifier,
            ReportConfig::default(),
            HistoryConfig::default(),
        )
        .build_account_spend_report(&AccountContext::new("main", "USD"))
        .unwrap();
        assert!(r.truncated);
        assert_eq!(r.stop, Some(StopReason::TransportFailure { page: 2 }));
        assert_eq!(r.pages_fetched, 2);
        assert_eq!(r.total_spend, 999);
        assert_eq!(r.gifted_spend, 2000);
        assert_eq!(r.credit_range_low, Decimal::from(-10));
        assert_eq!(r.rate_source, "fixed snapshot");
        assert_eq!(history.calls.load(Ordering::SeqCst), 2);

        let text = render_table(&r).to_string();
        assert!(text.contains("yes (partial history)"));
        assert!(text.contains("fixed snapshot"));
    }
}
