use crate::collaborators::{Clock, PayerResolver};
use crate::config::EngineConfig;
use crate::error::{ReconciliationError, Result};
use crate::schema::*;
use crate::store::{LedgerReader, LedgerStore, LedgerTx, LockScope};
use crate::utils::{sum_amounts, within_tolerance};
use chrono::{DateTime, Utc};
use log::{debug, info};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationOutcome {
    pub consolidated: PayrollRecord,
    pub partial_payments: Vec<PartialPayment>,
    pub settled_records: Vec<PayrollId>,
    /// True when the idempotency key matched an earlier consolidation and
    /// nothing was written.
    pub replayed: bool,
}

// Totals across the source records of one consolidation.
struct SourceTotals {
    gross: Decimal,
    net: Decimal,
    discounts: Decimal,
}

/// Folds pending payroll records of one payee into a single settled
/// consolidated record, atomically.
pub struct PayrollConsolidator<'a, S: LedgerStore> {
    store: &'a S,
    config: &'a EngineConfig,
    payers: &'a dyn PayerResolver,
    clock: &'a dyn Clock,
}

impl<'a, S: LedgerStore> PayrollConsolidator<'a, S> {
    pub fn new(
        store: &'a S,
        config: &'a EngineConfig,
        payers: &'a dyn PayerResolver,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            store,
            config,
            payers,
            clock,
        }
    }

    pub fn consolidate(&self, request: &ConsolidationRequest) -> Result<ConsolidationOutcome> {
        validate_request_shape(request)?;
        let payer = self.payers.resolve_payer(request.studio_id, &request.caller)?;
        let scope = LockScope::Payee(request.studio_id, request.payee_id);

        let outcome = self.store.transaction(request.studio_id, scope, |tx| {
            if let Some(key) = &request.idempotency_key {
                if let Some(existing) = tx.reader().consolidation_for_key(tx.studio(), key)? {
                    return replay(tx.reader(), request, key, existing);
                }
            }

            let sources = load_pending_sources(tx.reader(), request)?;
            let now = self.clock.now();
            self.stage_consolidation(tx, request, sources, payer, now)
        })?;

        if outcome.replayed {
            info!(
                "Replayed consolidation {} for payee {}",
                outcome.consolidated.id, request.payee_id
            );
        } else {
            info!(
                "Consolidated {} payroll records for payee {} into {} (net {})",
                outcome.settled_records.len(),
                request.payee_id,
                outcome.consolidated.id,
                outcome.consolidated.net_amount
            );
        }
        Ok(outcome)
    }

    fn stage_consolidation(
        &self,
        tx: &mut LedgerTx<'_>,
        request: &ConsolidationRequest,
        sources: Vec<PayrollRecord>,
        payer: PayerId,
        now: DateTime<Utc>,
    ) -> Result<ConsolidationOutcome> {
        // 1. Totals and payable amount
        let totals = SourceTotals {
            gross: sum_amounts(sources.iter().map(|r| r.gross_amount)),
            net: sum_amounts(sources.iter().map(|r| r.net_amount)),
            discounts: sum_amounts(sources.iter().map(|r| r.total_discounts)),
        };
        let discount = request.discount.unwrap_or(Decimal::ZERO);
        let payable = totals.net - discount;
        if payable < Decimal::ZERO {
            return Err(ReconciliationError::ValidationFailed(format!(
                "discount {} exceeds net total {}",
                discount, totals.net
            )));
        }

        if !request.partial_payments.is_empty() {
            let partial_sum = sum_amounts(request.partial_payments.iter().map(|p| p.amount));
            if !within_tolerance(partial_sum, payable, self.config.money_tolerance) {
                return Err(ReconciliationError::ValidationFailed(format!(
                    "partial payments sum to {} but {} is payable",
                    partial_sum, payable
                )));
            }
        }

        // 2. Auditable item breakdown
        let items = merge_payroll_items(&sources);

        // 3. The consolidated record and its split settlement
        let consolidated_id = PayrollId::new();
        let method = request
            .method
            .or_else(|| single_method(&request.partial_payments));
        let consolidated = PayrollRecord {
            id: consolidated_id,
            studio_id: request.studio_id,
            payee_id: request.payee_id,
            concept: request
                .concept
                .clone()
                .unwrap_or_else(|| format!("Consolidated payment ({} records)", sources.len())),
            gross_amount: totals.gross,
            net_amount: payable,
            total_discounts: totals.discounts + discount,
            status: PayrollStatus::Paid,
            payment_type: Some(PayrollPaymentType::Consolidated),
            consolidated_payment_id: None,
            payment_date: Some(now),
            paid_by: Some(payer),
            method,
            items,
            created_at: now,
        };

        let partial_payments: Vec<PartialPayment> = request
            .partial_payments
            .iter()
            .map(|p| PartialPayment {
                id: Uuid::new_v4(),
                consolidated_id,
                method: p.method,
                amount: p.amount,
                created_at: now,
            })
            .collect();

        tx.insert_payroll(consolidated.clone());
        tx.insert_partial_payments(partial_payments.clone());

        // 4. Settle and link every source; payment_type is left untouched
        let mut settled_records = Vec::with_capacity(sources.len());
        for mut record in sources {
            record.status = PayrollStatus::Paid;
            record.payment_date = Some(now);
            record.paid_by = Some(payer);
            record.method = method;
            record.consolidated_payment_id = Some(consolidated_id);
            debug!("Linking payroll record {} to {}", record.id, consolidated_id);
            settled_records.push(record.id);
            tx.update_payroll(record);
        }

        if let Some(key) = &request.idempotency_key {
            tx.record_idempotency_key(key.clone(), consolidated_id);
        }

        Ok(ConsolidationOutcome {
            consolidated,
            partial_payments,
            settled_records,
            replayed: false,
        })
    }

    /// Settles one pending individual record on its own.
    pub fn settle_individual(
        &self,
        studio: StudioId,
        record_id: PayrollId,
        method: PaymentMethod,
        caller: &str,
    ) -> Result<PayrollRecord> {
        let payer = self.payers.resolve_payer(studio, caller)?;
        let payee = self
            .store
            .payroll_record(studio, record_id)?
            .ok_or_else(|| ReconciliationError::not_found("payroll record", record_id))?
            .payee_id;

        let settled = self
            .store
            .transaction(studio, LockScope::Payee(studio, payee), |tx| {
                let mut record = tx
                    .reader()
                    .payroll_record(studio, record_id)?
                    .ok_or_else(|| ReconciliationError::not_found("payroll record", record_id))?;
                if record.is_consolidated() {
                    return Err(ReconciliationError::invalid_state(
                        "payroll record",
                        record_id,
                        "consolidated records are settled at creation",
                    ));
                }
                if record.status != PayrollStatus::Pending {
                    return Err(ReconciliationError::invalid_state(
                        "payroll record",
                        record_id,
                        "record is not pending",
                    ));
                }

                record.status = PayrollStatus::Paid;
                record.payment_date = Some(self.clock.now());
                record.paid_by = Some(payer);
                record.method = Some(method);
                tx.update_payroll(record.clone());
                Ok(record)
            })?;

        info!(
            "Settled payroll record {} for payee {} ({})",
            settled.id, settled.payee_id, settled.net_amount
        );
        Ok(settled)
    }
}

fn validate_request_shape(request: &ConsolidationRequest) -> Result<()> {
    if request.record_ids.is_empty() {
        return Err(ReconciliationError::ValidationFailed(
            "consolidation needs at least one payroll record".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for id in &request.record_ids {
        if !seen.insert(*id) {
            return Err(ReconciliationError::ValidationFailed(format!(
                "payroll record {} listed twice",
                id
            )));
        }
    }

    if let Some(discount) = request.discount {
        if discount < Decimal::ZERO {
            return Err(ReconciliationError::ValidationFailed(format!(
                "discount must not be negative, got {}",
                discount
            )));
        }
    }

    for partial in &request.partial_payments {
        if partial.amount <= Decimal::ZERO {
            return Err(ReconciliationError::ValidationFailed(format!(
                "partial payment amounts must be positive, got {}",
                partial.amount
            )));
        }
    }

    if request
        .idempotency_key
        .as_ref()
        .is_some_and(|k| k.trim().is_empty())
    {
        return Err(ReconciliationError::ValidationFailed(
            "idempotency key must not be blank".to_string(),
        ));
    }

    Ok(())
}

fn load_pending_sources(
    reader: &dyn LedgerReader,
    request: &ConsolidationRequest,
) -> Result<Vec<PayrollRecord>> {
    let mut sources = Vec::with_capacity(request.record_ids.len());
    for id in &request.record_ids {
        let record = reader
            .payroll_record(request.studio_id, *id)?
            .ok_or_else(|| ReconciliationError::not_found("payroll record", id))?;

        if record.payee_id != request.payee_id {
            return Err(ReconciliationError::ValidationFailed(format!(
                "payroll record {} belongs to another payee",
                id
            )));
        }
        if record.is_consolidated() {
            return Err(ReconciliationError::invalid_state(
                "payroll record",
                id,
                "record is itself a consolidated payment",
            ));
        }
        if record.status != PayrollStatus::Pending {
            return Err(ReconciliationError::invalid_state(
                "payroll record",
                id,
                "record is not pending",
            ));
        }
        sources.push(record);
    }
    Ok(sources)
}

fn replay(
    reader: &dyn LedgerReader,
    request: &ConsolidationRequest,
    key: &str,
    existing: PayrollId,
) -> Result<ConsolidationOutcome> {
    let consolidated = reader
        .payroll_record(request.studio_id, existing)?
        .ok_or_else(|| ReconciliationError::not_found("consolidated payment", existing))?;

    if consolidated.payee_id != request.payee_id {
        return Err(ReconciliationError::ValidationFailed(format!(
            "idempotency key '{}' was used for another payee",
            key
        )));
    }

    let partial_payments = reader.partial_payments(request.studio_id, existing)?;
    let linked = reader.linked_payroll_records(request.studio_id, existing)?;

    // A reused key must describe the same consolidation it produced.
    let requested: HashSet<PayrollId> = request.record_ids.iter().copied().collect();
    let settled: HashSet<PayrollId> = linked.iter().map(|r| r.id).collect();
    if requested != settled {
        return Err(ReconciliationError::ValidationFailed(format!(
            "idempotency key '{}' was used for a different set of payroll records",
            key
        )));
    }

    let payable = sum_amounts(linked.iter().map(|r| r.net_amount))
        - request.discount.unwrap_or(Decimal::ZERO);
    if payable != consolidated.net_amount {
        return Err(ReconciliationError::ValidationFailed(format!(
            "idempotency key '{}' was used with a different discount ({} payable, {} settled)",
            key, payable, consolidated.net_amount
        )));
    }

    let mut requested_split: Vec<Decimal> =
        request.partial_payments.iter().map(|p| p.amount).collect();
    let mut settled_split: Vec<Decimal> = partial_payments.iter().map(|p| p.amount).collect();
    requested_split.sort();
    settled_split.sort();
    if requested_split != settled_split {
        return Err(ReconciliationError::ValidationFailed(format!(
            "idempotency key '{}' was used with a different partial payment split",
            key
        )));
    }

    let settled_records = linked.into_iter().map(|r| r.id).collect();

    Ok(ConsolidationOutcome {
        consolidated,
        partial_payments,
        settled_records,
        replayed: true,
    })
}

fn single_method(partials: &[PartialPaymentInput]) -> Option<PaymentMethod> {
    let first = partials.first()?.method;
    partials
        .iter()
        .all(|p| p.method == first)
        .then_some(first)
}

/// Merges the item breakdowns of several records. Entries describing the
/// same service are combined by summing cost and quantity; order follows
/// first appearance.
pub fn merge_payroll_items(records: &[PayrollRecord]) -> Vec<PayrollItem> {
    let mut merged: Vec<PayrollItem> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for item in records.iter().flat_map(|r| r.items.iter()) {
        match index.get(&item.merge_key()) {
            Some(&i) => {
                merged[i].cost += item.cost;
                merged[i].quantity += item.quantity;
            }
            None => {
                index.insert(item.merge_key(), merged.len());
                merged.push(item.clone());
            }
        }
    }

    merged
}
