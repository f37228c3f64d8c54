//! Undo paths for payroll settlement.
//!
//! Each reversal restores every field consolidation or settlement touched
//! (status, payment date, payer, method, consolidated link) inside one
//! transaction.

use crate::error::{ReconciliationError, Result};
use crate::schema::{PayrollId, PayrollRecord, PayrollStatus, StudioId};
use crate::store::{LedgerReader, LedgerStore, LockScope};
use crate::utils::sum_amounts;
use log::info;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReversalOutcome {
    pub consolidated_id: PayrollId,
    pub restored_records: Vec<PayrollId>,
    /// Net amount returned to pending across the restored records.
    pub restored_net: Decimal,
    pub removed_partial_payments: usize,
}

pub struct ReversalEngine<'a, S: LedgerStore> {
    store: &'a S,
}

impl<'a, S: LedgerStore> ReversalEngine<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Deletes a consolidated payment and returns its linked records to pending.
    pub fn revert_consolidation(
        &self,
        studio: StudioId,
        consolidated_id: PayrollId,
    ) -> Result<ReversalOutcome> {
        let payee = self.load_consolidated(self.store, studio, consolidated_id)?.payee_id;

        let outcome = self
            .store
            .transaction(studio, LockScope::Payee(studio, payee), |tx| {
                // Re-read under the payee lock; a concurrent reversal may have won.
                self.load_consolidated(tx.reader(), studio, consolidated_id)?;

                let linked = tx.reader().linked_payroll_records(studio, consolidated_id)?;
                let partials = tx.reader().partial_payments(studio, consolidated_id)?;

                tx.delete_partial_payments(consolidated_id);
                tx.delete_payroll(consolidated_id);
                tx.release_idempotency_key(consolidated_id);

                let restored_net = sum_amounts(linked.iter().map(|r| r.net_amount));
                let mut restored_records = Vec::with_capacity(linked.len());
                for mut record in linked {
                    record.reset_to_pending();
                    restored_records.push(record.id);
                    tx.update_payroll(record);
                }

                Ok(ReversalOutcome {
                    consolidated_id,
                    restored_records,
                    restored_net,
                    removed_partial_payments: partials.len(),
                })
            })?;

        info!(
            "Reverted consolidation {}: {} records back to pending ({})",
            consolidated_id,
            outcome.restored_records.len(),
            outcome.restored_net
        );
        Ok(outcome)
    }

    /// Reopens a single settled record that is not part of a consolidation.
    pub fn revert_settlement(&self, studio: StudioId, record_id: PayrollId) -> Result<PayrollRecord> {
        let payee = self.load_standalone(self.store, studio, record_id)?.payee_id;

        let reopened = self
            .store
            .transaction(studio, LockScope::Payee(studio, payee), |tx| {
                let mut record = self.load_standalone(tx.reader(), studio, record_id)?;
                if record.status != PayrollStatus::Paid {
                    return Err(ReconciliationError::invalid_state(
                        "payroll record",
                        record_id,
                        "record is not settled",
                    ));
                }
                record.reset_to_pending();
                tx.update_payroll(record.clone());
                Ok(record)
            })?;

        info!("Reopened payroll record {}", record_id);
        Ok(reopened)
    }

    /// Deletes a standalone individual record. Records folded into a
    /// consolidation must be released by reverting it first.
    pub fn cancel_individual(&self, studio: StudioId, record_id: PayrollId) -> Result<PayrollRecord> {
        let payee = self.load_standalone(self.store, studio, record_id)?.payee_id;

        let cancelled = self
            .store
            .transaction(studio, LockScope::Payee(studio, payee), |tx| {
                let record = self.load_standalone(tx.reader(), studio, record_id)?;
                tx.delete_payroll(record.id);
                Ok(record)
            })?;

        info!(
            "Cancelled payroll record {} ({})",
            record_id, cancelled.net_amount
        );
        Ok(cancelled)
    }

    fn load_consolidated<R: LedgerReader + ?Sized>(
        &self,
        reader: &R,
        studio: StudioId,
        id: PayrollId,
    ) -> Result<PayrollRecord> {
        let record = reader.payroll_record(studio, id)?.ok_or_else(|| {
            ReconciliationError::invalid_state("consolidated payment", id, "no such consolidated payment")
        })?;
        if !record.is_consolidated() {
            return Err(ReconciliationError::invalid_state(
                "consolidated payment",
                id,
                "record is not a consolidated payment",
            ));
        }
        Ok(record)
    }

    fn load_standalone<R: LedgerReader + ?Sized>(
        &self,
        reader: &R,
        studio: StudioId,
        id: PayrollId,
    ) -> Result<PayrollRecord> {
        let record = reader
            .payroll_record(studio, id)?
            .ok_or_else(|| ReconciliationError::not_found("payroll record", id))?;
        if record.is_consolidated() {
            return Err(ReconciliationError::invalid_state(
                "payroll record",
                id,
                "consolidated payments are undone with revert_consolidation",
            ));
        }
        if record.is_linked() {
            return Err(ReconciliationError::invalid_state(
                "payroll record",
                id,
                "record is linked to a consolidated payment",
            ));
        }
        Ok(record)
    }
}
