use crate::config::EngineConfig;
use crate::schema::{PayeeId, PayrollId, PayrollPaymentType, PayrollRecord};
use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DedupDecision {
    /// A consolidated record; always counted.
    Consolidated,
    /// An individual record with no consolidation behind it.
    Individual,
    /// Linked to a consolidated record that is part of the same query.
    DroppedLinked,
    /// Linked to a consolidated record outside the query; this is the only
    /// place its money shows up.
    OrphanedLink,
    /// Legacy row matched to a consolidated record by payee and settlement time.
    DroppedLegacyMatch,
    /// Legacy row with no consolidated counterpart.
    Legacy,
}

impl DedupDecision {
    pub fn is_kept(self) -> bool {
        !matches!(self, Self::DroppedLinked | Self::DroppedLegacyMatch)
    }
}

/// Removes individual payroll records already represented by a consolidated
/// record, so each disbursement is counted exactly once per query.
///
/// Visibility depends on which consolidated records a query can see, so the
/// filter is re-derived for every window instead of being stored.
pub struct PayrollDeduplicator {
    legacy_timestamp_matching: bool,
    legacy_match_window: Duration,
}

impl PayrollDeduplicator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            legacy_timestamp_matching: config.legacy_timestamp_matching,
            legacy_match_window: config.legacy_match_window(),
        }
    }

    pub fn decide(&self, records: &[PayrollRecord]) -> Vec<DedupDecision> {
        let consolidated_ids: HashSet<PayrollId> = records
            .iter()
            .filter(|r| r.is_consolidated())
            .map(|r| r.id)
            .collect();

        let mut consolidated_times: HashMap<PayeeId, Vec<DateTime<Utc>>> = HashMap::new();
        for record in records.iter().filter(|r| r.is_consolidated()) {
            consolidated_times
                .entry(record.payee_id)
                .or_default()
                .push(settled_at(record));
        }

        records
            .iter()
            .map(|record| {
                let decision = self.decide_one(record, &consolidated_ids, &consolidated_times);
                if !decision.is_kept() {
                    debug!(
                        "Dropping payroll record {} ({:?}) from aggregation",
                        record.id, decision
                    );
                }
                decision
            })
            .collect()
    }

    fn decide_one(
        &self,
        record: &PayrollRecord,
        consolidated_ids: &HashSet<PayrollId>,
        consolidated_times: &HashMap<PayeeId, Vec<DateTime<Utc>>>,
    ) -> DedupDecision {
        if record.is_consolidated() {
            return DedupDecision::Consolidated;
        }

        if let Some(parent) = record.consolidated_payment_id {
            return if consolidated_ids.contains(&parent) {
                DedupDecision::DroppedLinked
            } else {
                DedupDecision::OrphanedLink
            };
        }

        match record.payment_type {
            Some(PayrollPaymentType::Individual) => DedupDecision::Individual,
            Some(PayrollPaymentType::Consolidated) => DedupDecision::Consolidated,
            None => {
                let matched = self.legacy_timestamp_matching
                    && consolidated_times
                        .get(&record.payee_id)
                        .is_some_and(|times| {
                            let at = settled_at(record);
                            times
                                .iter()
                                .any(|t| (*t - at).abs() <= self.legacy_match_window)
                        });
                if matched {
                    DedupDecision::DroppedLegacyMatch
                } else {
                    DedupDecision::Legacy
                }
            }
        }
    }

    /// Consolidated records plus every individual record not already
    /// represented by one, in input order.
    pub fn filter(&self, records: Vec<PayrollRecord>) -> Vec<PayrollRecord> {
        let decisions = self.decide(&records);
        records
            .into_iter()
            .zip(decisions)
            .filter(|(_, decision)| decision.is_kept())
            .map(|(record, _)| record)
            .collect()
    }
}

fn settled_at(record: &PayrollRecord) -> DateTime<Utc> {
    record.payment_date.unwrap_or(record.created_at)
}

pub fn deduplicate_payroll(
    config: &EngineConfig,
    records: Vec<PayrollRecord>,
) -> Vec<PayrollRecord> {
    PayrollDeduplicator::new(config).filter(records)
}
