use crate::config::EngineConfig;
use crate::error::Result;
use crate::ledger::LedgerQuery;
use crate::receivables::ReceivablesResolver;
use crate::schema::{BillingType, QuoteItem, StudioId};
use crate::store::LedgerReader;
use crate::utils::{round_cents, sum_amounts, DateWindow};
use log::info;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionBreakdown {
    /// Effective totals of the quotes approved in the window.
    pub revenue: Decimal,
    pub production_cost: Decimal,
    pub production_expense: Decimal,
    pub margin: Decimal,
    /// Margin as a percentage of revenue, two decimals; zero without revenue.
    pub margin_pct: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSummary {
    pub window: DateWindow,
    pub income: Decimal,
    /// Operating expenses plus deduplicated payroll.
    pub expense: Decimal,
    pub operating_expense: Decimal,
    pub payroll_expense: Decimal,
    pub profit: Decimal,
    pub receivables: Decimal,
    pub payables: Decimal,
    pub production: ProductionBreakdown,
}

/// Quantity a line item is billed for: hour-based items scale with the
/// event duration, per-service and per-unit items use their own quantity.
pub fn effective_quantity(item: &QuoteItem, event_duration_hours: Option<Decimal>) -> Decimal {
    match item.billing_type {
        BillingType::Hour => match event_duration_hours {
            Some(hours) => item.quantity * hours,
            None => item.quantity,
        },
        BillingType::Service | BillingType::Unit => item.quantity,
    }
}

pub struct KpiAggregator<'a, R: LedgerReader + ?Sized> {
    reader: &'a R,
    config: &'a EngineConfig,
}

impl<'a, R: LedgerReader + ?Sized> KpiAggregator<'a, R> {
    pub fn new(reader: &'a R, config: &'a EngineConfig) -> Self {
        Self { reader, config }
    }

    pub fn summarize(&self, studio: StudioId, window: &DateWindow) -> Result<FinancialSummary> {
        let totals = LedgerQuery::new(self.reader, self.config).totals(studio, window)?;
        let receivables = ReceivablesResolver::new(self.config).resolve(self.reader, studio)?;
        let payables = self.payables(studio, window)?;
        let production = self.production_breakdown(studio, window)?;

        let expense = totals.expenses + totals.payroll;
        let summary = FinancialSummary {
            window: *window,
            income: totals.payments,
            expense,
            operating_expense: totals.expenses,
            payroll_expense: totals.payroll,
            profit: totals.payments - expense,
            receivables: receivables.total_outstanding,
            payables,
            production,
        };

        info!(
            "KPI summary for studio {} in {}: income {}, expense {}, profit {}, receivables {}, payables {}",
            studio,
            window,
            summary.income,
            summary.expense,
            summary.profit,
            summary.receivables,
            summary.payables
        );
        Ok(summary)
    }

    /// Pending payroll owed as of the end of the window. Pending rows are
    /// never linked to a consolidation, so no deduplication applies.
    pub fn payables(&self, studio: StudioId, window: &DateWindow) -> Result<Decimal> {
        let pending = self.reader.pending_payroll(studio)?;
        Ok(sum_amounts(
            pending
                .iter()
                .filter(|r| r.created_at.date_naive() <= window.end)
                .map(|r| r.net_amount),
        ))
    }

    pub fn production_breakdown(
        &self,
        studio: StudioId,
        window: &DateWindow,
    ) -> Result<ProductionBreakdown> {
        let mut breakdown = ProductionBreakdown::default();

        let quotes = self
            .reader
            .promises_with_quotes(studio)?
            .into_iter()
            .flat_map(|pq| pq.quotes)
            .filter(|q| self.config.is_approved(q.status))
            .filter(|q| window.contains(q.updated_at, q.created_at));

        for quote in quotes {
            breakdown.revenue += quote.effective_total();
            for item in &quote.items {
                let quantity = effective_quantity(item, quote.event_duration_hours);
                breakdown.production_cost += item.cost_snapshot * quantity;
                breakdown.production_expense += item.expense_snapshot * quantity;
            }
        }

        breakdown.margin =
            breakdown.revenue - breakdown.production_cost - breakdown.production_expense;
        breakdown.margin_pct = if breakdown.revenue > Decimal::ZERO {
            round_cents(breakdown.margin / breakdown.revenue * Decimal::ONE_HUNDRED)
        } else {
            Decimal::ZERO
        };
        Ok(breakdown)
    }
}

pub fn summarize_period<R: LedgerReader + ?Sized>(
    config: &EngineConfig,
    reader: &R,
    studio: StudioId,
    window: &DateWindow,
) -> Result<FinancialSummary> {
    KpiAggregator::new(reader, config).summarize(studio, window)
}
