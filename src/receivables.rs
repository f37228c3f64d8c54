use crate::config::EngineConfig;
use crate::error::Result;
use crate::schema::{Payment, PromiseId, Quote, QuoteId, StudioId};
use crate::store::{LedgerReader, PromiseQuotes};
use crate::utils::{round_cents, sum_amounts};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteReceivable {
    pub quote_id: QuoteId,
    pub promise_id: PromiseId,
    pub quote_name: String,
    pub effective_total: Decimal,
    pub attributed: Decimal,
    pub outstanding: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceivablesReport {
    /// Quotes with a positive outstanding balance, ordered by promise then quote.
    pub items: Vec<QuoteReceivable>,
    pub total_outstanding: Decimal,
    pub total_approved: Decimal,
    pub total_attributed: Decimal,
}

impl ReceivablesReport {
    pub fn outstanding_for(&self, quote: QuoteId) -> Decimal {
        self.items
            .iter()
            .find(|i| i.quote_id == quote)
            .map(|i| i.outstanding)
            .unwrap_or(Decimal::ZERO)
    }
}

// Per-quote running state while payments are attributed.
struct QuoteSlot {
    promise_id: PromiseId,
    name: String,
    effective_total: Decimal,
    attributed: Decimal,
}

pub struct ReceivablesResolver<'a> {
    config: &'a EngineConfig,
}

impl<'a> ReceivablesResolver<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    pub fn resolve<R: LedgerReader + ?Sized>(
        &self,
        reader: &R,
        studio: StudioId,
    ) -> Result<ReceivablesReport> {
        let approved = self.approved_promises(reader.promises_with_quotes(studio)?);

        let quote_ids: Vec<QuoteId> = approved
            .values()
            .flat_map(|quotes| quotes.iter().map(|q| q.id))
            .collect();
        let promise_ids: Vec<PromiseId> = approved.keys().copied().collect();

        let payments = reader.payments_referencing(studio, &quote_ids, &promise_ids)?;
        let report = self.compute(&approved, &payments);

        info!(
            "Receivables for studio {}: {} open quotes, {} outstanding",
            studio,
            report.items.len(),
            report.total_outstanding
        );
        Ok(report)
    }

    /// Promises with at least one approved-like quote, keeping only those quotes.
    /// Quotes are sorted by id so allocation never depends on storage order.
    pub fn approved_promises(
        &self,
        promises: Vec<PromiseQuotes>,
    ) -> BTreeMap<PromiseId, Vec<Quote>> {
        promises
            .into_iter()
            .filter_map(|pq| {
                let mut quotes: Vec<Quote> = pq
                    .quotes
                    .into_iter()
                    .filter(|q| self.config.is_approved(q.status))
                    .collect();
                if quotes.is_empty() {
                    return None;
                }
                quotes.sort_by_key(|q| q.id);
                Some((pq.promise.id, quotes))
            })
            .collect()
    }

    pub fn compute(
        &self,
        approved: &BTreeMap<PromiseId, Vec<Quote>>,
        payments: &[Payment],
    ) -> ReceivablesReport {
        let mut slots: BTreeMap<QuoteId, QuoteSlot> = BTreeMap::new();
        for quotes in approved.values() {
            for quote in quotes {
                slots.insert(
                    quote.id,
                    QuoteSlot {
                        promise_id: quote.promise_id,
                        name: quote.name.clone(),
                        effective_total: quote.effective_total(),
                        attributed: Decimal::ZERO,
                    },
                );
            }
        }

        for payment in payments.iter().filter(|p| p.status.is_settled()) {
            match (payment.quote_id, payment.promise_id) {
                // 1. Direct quote reference: the whole amount goes to that quote
                (Some(quote_id), _) => {
                    if let Some(slot) = slots.get_mut(&quote_id) {
                        slot.attributed += payment.amount;
                    }
                }
                // 2. Promise-only reference: split across the promise's approved quotes
                (None, Some(promise_id)) => {
                    let Some(quotes) = approved.get(&promise_id) else {
                        continue;
                    };
                    for (quote_id, share) in allocate_proportionally(payment.amount, quotes) {
                        if let Some(slot) = slots.get_mut(&quote_id) {
                            slot.attributed += share;
                        }
                    }
                }
                (None, None) => {}
            }
        }

        let mut report = ReceivablesReport::default();
        for (quote_id, slot) in slots {
            let outstanding = (slot.effective_total - slot.attributed).max(Decimal::ZERO);
            report.total_approved += slot.effective_total;
            report.total_attributed += slot.attributed;
            report.total_outstanding += outstanding;

            if outstanding > Decimal::ZERO {
                report.items.push(QuoteReceivable {
                    quote_id,
                    promise_id: slot.promise_id,
                    quote_name: slot.name,
                    effective_total: slot.effective_total,
                    attributed: slot.attributed,
                    outstanding,
                });
            } else {
                debug!("Quote {} fully covered ({} attributed)", quote_id, slot.attributed);
            }
        }
        report
            .items
            .sort_by(|a, b| (a.promise_id, a.quote_id).cmp(&(b.promise_id, b.quote_id)));
        report
    }
}

/// Splits `amount` across `quotes` weighted by effective total, or equally
/// when the promise carries no approved value. Shares are rounded to cents
/// and the last quote absorbs the residue, so shares always sum to `amount`.
pub fn allocate_proportionally(amount: Decimal, quotes: &[Quote]) -> Vec<(QuoteId, Decimal)> {
    if quotes.is_empty() {
        return Vec::new();
    }

    let mut ordered: Vec<&Quote> = quotes.iter().collect();
    ordered.sort_by_key(|q| q.id);

    let total_weight = sum_amounts(ordered.iter().map(|q| q.effective_total()));
    if total_weight.is_zero() {
        warn!(
            "Promise-level payment of {} split equally across {} zero-value quotes",
            amount,
            ordered.len()
        );
    }

    let count = Decimal::from(ordered.len() as u64);
    let mut shares = Vec::with_capacity(ordered.len());
    let mut allocated = Decimal::ZERO;

    for (i, quote) in ordered.iter().enumerate() {
        let share = if i + 1 == ordered.len() {
            amount - allocated
        } else if total_weight.is_zero() {
            round_cents(amount / count)
        } else {
            round_cents(amount * quote.effective_total() / total_weight)
        };
        allocated += share;
        shares.push((quote.id, share));
    }

    shares
}

pub fn resolve_receivables<R: LedgerReader + ?Sized>(
    config: &EngineConfig,
    reader: &R,
    studio: StudioId,
) -> Result<ReceivablesReport> {
    ReceivablesResolver::new(config).resolve(reader, studio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PaymentId, PaymentStatus, QuoteStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn quote(promise: PromiseId, price: Decimal, discount: Decimal) -> Quote {
        Quote {
            id: QuoteId::new(),
            promise_id: promise,
            studio_id: StudioId::new(),
            name: "Quote".to_string(),
            price,
            discount,
            status: QuoteStatus::Approved,
            event_duration_hours: None,
            items: vec![],
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn payment(
        amount: Decimal,
        status: PaymentStatus,
        quote_id: Option<QuoteId>,
        promise_id: Option<PromiseId>,
    ) -> Payment {
        Payment {
            id: PaymentId::new(),
            studio_id: StudioId::new(),
            amount,
            status,
            quote_id,
            promise_id,
            method: None,
            concept: None,
            payment_date: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_proportional_split_is_order_independent() {
        let promise = PromiseId::new();
        let small = quote(promise, dec!(100), dec!(0));
        let large = quote(promise, dec!(300), dec!(0));

        let forward = allocate_proportionally(dec!(200), &[small.clone(), large.clone()]);
        let backward = allocate_proportionally(dec!(200), &[large.clone(), small.clone()]);
        assert_eq!(forward, backward);

        let share = |id: QuoteId| forward.iter().find(|(q, _)| *q == id).unwrap().1;
        assert_eq!(share(small.id), dec!(50));
        assert_eq!(share(large.id), dec!(150));
    }

    #[test]
    fn test_rounding_residue_conserves_amount() {
        let promise = PromiseId::new();
        let quotes = vec![
            quote(promise, dec!(100), dec!(0)),
            quote(promise, dec!(100), dec!(0)),
            quote(promise, dec!(100), dec!(0)),
        ];
        let shares = allocate_proportionally(dec!(100), &quotes);
        let total: Decimal = shares.iter().map(|(_, s)| *s).sum();
        assert_eq!(total, dec!(100));
        assert!(shares.iter().all(|(_, s)| *s == dec!(33.33) || *s == dec!(33.34)));
    }

    #[test]
    fn test_zero_value_promise_splits_equally() {
        let promise = PromiseId::new();
        let quotes = vec![
            quote(promise, dec!(50), dec!(50)),
            quote(promise, dec!(0), dec!(0)),
        ];
        let shares = allocate_proportionally(dec!(10), &quotes);
        assert!(shares.iter().all(|(_, s)| *s == dec!(5)));
    }

    #[test]
    fn test_direct_and_promise_payments_reduce_outstanding() {
        let config = EngineConfig::default();
        let promise = PromiseId::new();
        let q = quote(promise, dec!(1000), dec!(100));
        let mut approved = BTreeMap::new();
        approved.insert(promise, vec![q.clone()]);

        let payments = vec![
            payment(dec!(400), PaymentStatus::Paid, Some(q.id), Some(promise)),
            payment(dec!(200), PaymentStatus::Completed, None, Some(promise)),
            payment(dec!(999), PaymentStatus::Pending, Some(q.id), None),
            payment(dec!(999), PaymentStatus::Cancelled, None, Some(promise)),
        ];

        let report = ReceivablesResolver::new(&config).compute(&approved, &payments);
        assert_eq!(report.outstanding_for(q.id), dec!(300));
        assert_eq!(report.total_outstanding, dec!(300));
        assert_eq!(report.total_attributed, dec!(600));
    }

    #[test]
    fn test_fully_paid_quotes_leave_itemized_list() {
        let config = EngineConfig::default();
        let promise = PromiseId::new();
        let paid_off = quote(promise, dec!(500), dec!(0));
        let open = quote(promise, dec!(200), dec!(0));
        let mut approved = BTreeMap::new();
        approved.insert(promise, vec![paid_off.clone(), open.clone()]);

        let payments = vec![payment(
            dec!(600),
            PaymentStatus::Paid,
            Some(paid_off.id),
            None,
        )];
        let report = ReceivablesResolver::new(&config).compute(&approved, &payments);

        assert_eq!(report.items.len(), 1);
        assert_eq!(report.items[0].quote_id, open.id);
        assert_eq!(report.total_outstanding, dec!(200));
    }

    #[test]
    fn test_only_approved_like_quotes_participate() {
        let config = EngineConfig::default();
        let promise = PromiseId::new();
        let approved_quote = quote(promise, dec!(100), dec!(0));
        let mut draft = quote(promise, dec!(900), dec!(0));
        draft.status = QuoteStatus::Draft;

        let pq = PromiseQuotes {
            promise: crate::schema::Promise {
                id: promise,
                studio_id: StudioId::new(),
                name: "Lead".to_string(),
                created_at: Utc::now(),
            },
            quotes: vec![draft, approved_quote.clone()],
        };
        let approved = ReceivablesResolver::new(&config).approved_promises(vec![pq]);
        assert_eq!(approved[&promise].len(), 1);
        assert_eq!(approved[&promise][0].id, approved_quote.id);
    }
}
