//! Read-only aggregation of payments, expenses and payroll over a window.

use crate::config::EngineConfig;
use crate::dedup::PayrollDeduplicator;
use crate::error::Result;
use crate::schema::{Expense, Payment, PayrollRecord, StudioId};
use crate::store::LedgerReader;
use crate::utils::{sum_amounts, DateWindow};
use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerTotals {
    pub payments: Decimal,
    pub expenses: Decimal,
    /// Net payroll after consolidated/individual deduplication.
    pub payroll: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Income,
    Expense,
    Payroll,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub date: NaiveDate,
    pub kind: MovementKind,
    pub amount: Decimal,
    pub reference: Uuid,
    pub description: String,
}

/// The settled rows of one window, payroll already deduplicated.
#[derive(Debug, Clone, Default)]
pub struct WindowRows {
    pub payments: Vec<Payment>,
    pub expenses: Vec<Expense>,
    pub payroll: Vec<PayrollRecord>,
}

pub struct LedgerQuery<'a, R: LedgerReader + ?Sized> {
    reader: &'a R,
    dedup: PayrollDeduplicator,
}

impl<'a, R: LedgerReader + ?Sized> LedgerQuery<'a, R> {
    pub fn new(reader: &'a R, config: &EngineConfig) -> Self {
        Self {
            reader,
            dedup: PayrollDeduplicator::new(config),
        }
    }

    pub fn rows(&self, studio: StudioId, window: &DateWindow) -> Result<WindowRows> {
        let payments: Vec<Payment> = self
            .reader
            .payments_in_window(studio, window)?
            .into_iter()
            .filter(|p| p.status.is_settled())
            .collect();

        let expenses = self.reader.expenses_in_window(studio, window)?;

        let raw_payroll = self.reader.paid_payroll_in_window(studio, window)?;
        let raw_count = raw_payroll.len();
        let payroll = self.dedup.filter(raw_payroll);

        debug!(
            "Window {} for studio {}: {} payments, {} expenses, {} of {} payroll rows after dedup",
            window,
            studio,
            payments.len(),
            expenses.len(),
            payroll.len(),
            raw_count
        );

        Ok(WindowRows {
            payments,
            expenses,
            payroll,
        })
    }

    pub fn totals(&self, studio: StudioId, window: &DateWindow) -> Result<LedgerTotals> {
        let rows = self.rows(studio, window)?;
        Ok(LedgerTotals {
            payments: sum_amounts(rows.payments.iter().map(|p| p.amount)),
            expenses: sum_amounts(rows.expenses.iter().map(|e| e.amount)),
            payroll: sum_amounts(rows.payroll.iter().map(|r| r.net_amount)),
        })
    }

    /// Unified income/outflow listing, sorted by date. Uses the same
    /// deduplicated payroll set as [`LedgerQuery::totals`].
    pub fn movements(&self, studio: StudioId, window: &DateWindow) -> Result<Vec<Movement>> {
        let rows = self.rows(studio, window)?;
        let mut movements = Vec::with_capacity(
            rows.payments.len() + rows.expenses.len() + rows.payroll.len(),
        );

        for payment in rows.payments {
            movements.push(Movement {
                date: payment.payment_date.unwrap_or(payment.created_at).date_naive(),
                kind: MovementKind::Income,
                amount: payment.amount,
                reference: payment.id.0,
                description: payment
                    .concept
                    .unwrap_or_else(|| "Payment received".to_string()),
            });
        }

        for expense in rows.expenses {
            movements.push(Movement {
                date: expense
                    .date
                    .unwrap_or_else(|| expense.created_at.date_naive()),
                kind: MovementKind::Expense,
                amount: expense.amount,
                reference: expense.id.0,
                description: format!("{} ({})", expense.concept, expense.category),
            });
        }

        for record in rows.payroll {
            movements.push(Movement {
                date: record.payment_date.unwrap_or(record.created_at).date_naive(),
                kind: MovementKind::Payroll,
                amount: record.net_amount,
                reference: record.id.0,
                description: record.concept,
            });
        }

        movements.sort_by(|a, b| (a.date, a.reference).cmp(&(b.date, b.reference)));
        Ok(movements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::*;
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn payment(studio: StudioId, amount: Decimal, status: PaymentStatus, day: u32) -> Payment {
        Payment {
            id: PaymentId::new(),
            studio_id: studio,
            amount,
            status,
            quote_id: None,
            promise_id: None,
            method: Some(PaymentMethod::Transfer),
            concept: None,
            payment_date: Some(Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap()),
            created_at: Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap(),
        }
    }

    fn expense(studio: StudioId, amount: Decimal, date: Option<NaiveDate>) -> Expense {
        Expense {
            id: ExpenseId::new(),
            studio_id: studio,
            concept: "Rent".to_string(),
            amount,
            category: "operations".to_string(),
            date,
            payee_id: None,
            recurring_source: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_totals_count_only_settled_payments() {
        let store = MemoryStore::new();
        let studio = StudioId::new();
        store
            .insert_payment(payment(studio, dec!(100), PaymentStatus::Paid, 3))
            .unwrap();
        store
            .insert_payment(payment(studio, dec!(50), PaymentStatus::Completed, 4))
            .unwrap();
        store
            .insert_payment(payment(studio, dec!(70), PaymentStatus::Pending, 5))
            .unwrap();
        let mut april = payment(studio, dec!(20), PaymentStatus::Paid, 1);
        april.payment_date = Some(Utc.with_ymd_and_hms(2024, 4, 2, 9, 0, 0).unwrap());
        store.insert_payment(april).unwrap();

        let config = EngineConfig::default();
        let window = DateWindow::month(2024, 3).unwrap();
        let totals = LedgerQuery::new(&store, &config).totals(studio, &window).unwrap();
        assert_eq!(totals.payments, dec!(170));
    }

    #[test]
    fn test_expense_without_date_uses_creation_time() {
        let store = MemoryStore::new();
        let studio = StudioId::new();
        store.insert_expense(expense(studio, dec!(30), None)).unwrap();
        store
            .insert_expense(expense(
                studio,
                dec!(99),
                NaiveDate::from_ymd_opt(2024, 4, 1),
            ))
            .unwrap();

        let config = EngineConfig::default();
        let query = LedgerQuery::new(&store, &config);
        let march = query
            .totals(studio, &DateWindow::month(2024, 3).unwrap())
            .unwrap();
        assert_eq!(march.expenses, dec!(30));

        let april = query
            .totals(studio, &DateWindow::month(2024, 4).unwrap())
            .unwrap();
        assert_eq!(april.expenses, dec!(99));
    }

    #[test]
    fn test_movements_sorted_and_consistent_with_totals() {
        let store = MemoryStore::new();
        let studio = StudioId::new();
        store
            .insert_payment(payment(studio, dec!(100), PaymentStatus::Paid, 20))
            .unwrap();
        store
            .insert_expense(expense(studio, dec!(40), NaiveDate::from_ymd_opt(2024, 3, 2)))
            .unwrap();

        let config = EngineConfig::default();
        let window = DateWindow::month(2024, 3).unwrap();
        let query = LedgerQuery::new(&store, &config);
        let movements = query.movements(studio, &window).unwrap();

        assert_eq!(movements.len(), 2);
        assert_eq!(movements[0].kind, MovementKind::Expense);
        assert_eq!(movements[1].kind, MovementKind::Income);
        assert_eq!(movements[1].description, "Payment received");
    }
}
