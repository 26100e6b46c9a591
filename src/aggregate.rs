// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::HistoryError;
use crate::models::{AggregateTotals, ClassifiedRow};
use tracing::warn;

/// Running per-category totals for one history pull.
#[derive(Debug, Clone)]
pub struct Aggregator {
    totals: AggregateTotals,
    rows: usize,
    rejected: usize,
}

impl Aggregator {
    pub fn new(currency: &str) -> Self {
        Self {
            totals: AggregateTotals::new(currency),
            rows: 0,
            rejected: 0,
        }
    }

    /// Wallet variants are credited alongside their base category, so a
    /// wallet total can never exceed the total it belongs to. A row that
    /// would overflow either total is left out whole and counted.
    pub fn fold(&mut self, rows: &[ClassifiedRow]) {
        for row in rows {
            match self.fold_row(row) {
                Ok(()) => self.rows += 1,
                Err(err) => {
                    warn!(category = %row.category, "row left out of totals: {}", err);
                    self.rejected += 1;
                }
            }
        }
    }

    fn fold_row(&mut self, row: &ClassifiedRow) -> Result<(), HistoryError> {
        let base = row.category.base();
        if !row.category.is_wallet_variant() {
            return self.totals.add(base, row.amount_cents);
        }
        let wallet = row.wallet_cents.min(row.amount_cents).max(0);
        let fits = self.totals.get(base).checked_add(row.amount_cents).is_some()
            && self.totals.get(row.category).checked_add(wallet).is_some();
        if !fits {
            return Err(HistoryError::MalformedAmount(format!(
                "{} cents overflows the {} total",
                row.amount_cents, base
            )));
        }
        self.totals.add(base, row.amount_cents)?;
        self.totals.add(row.category, wallet)
    }

    pub fn snapshot(&self) -> AggregateTotals {
        self.totals.clone()
    }

    pub fn rows_folded(&self) -> usize {
        self.rows
    }

    pub fn rows_rejected(&self) -> usize {
        self.rejected
    }

    pub fn into_totals(self) -> AggregateTotals {
        self.totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use proptest::prelude::*;

    fn row(category: Category, amount_cents: i64, wallet_cents: i64) -> ClassifiedRow {
        ClassifiedRow {
            category,
            amount_cents,
            wallet_cents,
        }
    }

    #[test]
    fn wallet_rows_credit_both_buckets() {
        let mut agg = Aggregator::new("usd");
        agg.fold(&[
            row(Category::StorePurchase, 999, 0),
            row(Category::StorePurchaseWallet, 500, 500),
            row(Category::GiftPurchase, 0, 0),
        ]);
        let t = agg.snapshot();
        assert_eq!(t.currency, "USD");
        assert_eq!(t.get(Category::StorePurchase), 1499);
        assert_eq!(t.get(Category::StorePurchaseWallet), 500);
        assert_eq!(t.get(Category::GiftPurchase), 0);
        assert_eq!(agg.rows_folded(), 3);
    }

    #[test]
    fn wallet_portion_is_capped_at_row_amount() {
        let mut agg = Aggregator::new("USD");
        agg.fold(&[row(Category::RefundWallet, 300, 900)]);
        let t = agg.snapshot();
        assert_eq!(t.get(Category::Refund), 300);
        assert_eq!(t.get(Category::RefundWallet), 300);
    }

    #[test]
    fn overflowing_rows_are_left_out_whole() {
        let big = i64::MAX / 2 + 1;
        let mut agg = Aggregator::new("USD");
        agg.fold(&[
            row(Category::StorePurchase, big, 0),
            row(Category::StorePurchase, big, 0),
            row(Category::StorePurchaseWallet, big, big),
            row(Category::StorePurchase, 100, 0),
        ]);
        let t = agg.snapshot();
        assert_eq!(t.get(Category::StorePurchase), big + 100);
        assert_eq!(t.get(Category::StorePurchaseWallet), 0);
        assert_eq!(agg.rows_folded(), 2);
        assert_eq!(agg.rows_rejected(), 2);
    }

    fn any_row() -> impl Strategy<Value = ClassifiedRow> {
        (0..Category::ALL.len(), 0i64..1_000_000, any::<bool>()).prop_map(|(i, amt, wallet)| {
            let category = Category::ALL[i];
            let wallet_cents = if wallet { amt } else { 0 };
            row(category, amt, wallet_cents)
        })
    }

    proptest! {
        #[test]
        fn batch_order_and_split_do_not_change_totals(
            rows in prop::collection::vec(any_row(), 0..60),
            split in 1usize..8,
            seed in any::<u64>(),
        ) {
            let mut whole = Aggregator::new("USD");
            whole.fold(&rows);

            let mut shuffled = rows.clone();
            // deterministic permutation
            let n = shuffled.len();
            if n > 1 {
                let mut s = seed;
                for i in (1..n).rev() {
                    s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                    let j = (s >> 33) as usize % (i + 1);
                    shuffled.swap(i, j);
                }
            }
            let mut paged = Aggregator::new("USD");
            for chunk in shuffled.chunks(split) {
                paged.fold(chunk);
            }
            prop_assert_eq!(whole.snapshot(), paged.snapshot());
        }

        #[test]
        fn wallet_totals_never_exceed_their_base(rows in prop::collection::vec(any_row(), 0..60)) {
            let mut agg = Aggregator::new("USD");
            for r in &rows {
                agg.fold(std::slice::from_ref(r));
                let t = agg.snapshot();
                prop_assert!(
                    t.get(Category::StorePurchaseWallet) <= t.get(Category::StorePurchase)
                );
                prop_assert!(t.get(Category::GiftPurchaseWallet) <= t.get(Category::GiftPurchase));
                prop_assert!(t.get(Category::RefundWallet) <= t.get(Category::Refund));
            }
        }
    }
}
