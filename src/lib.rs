//! # Studio Reconciliation
//!
//! Financial reconciliation and payroll consolidation for studio management:
//! monthly KPIs reconciled against approved quotes, receivables with
//! proportional allocation of promise-level payments, and payroll
//! consolidation that never counts the same disbursement twice.
//!
//! ## Core Concepts
//!
//! - **Promise / Quote**: a sales commitment and its priced proposals; approved quotes are receivables
//! - **Payment**: income, attributed to a quote directly or split across a promise's quotes
//! - **Payroll record**: an obligation to a crew member, settled alone or folded into a consolidated record
//! - **Deduplication**: per-query filtering so consolidated and linked individual records count once
//! - **Reversal**: full, atomic undo of a consolidation or a single settlement
//!
//! ## Example
//!
//! ```rust,ignore
//! use studio_reconciliation::*;
//!
//! let store = MemoryStore::new();
//! let payers = StaticPayerResolver::new().with_payer(studio, "owner@studio", payer);
//! let engine = ReconciliationEngine::new(store, EngineConfig::default(), Box::new(payers));
//!
//! let outcome = engine.consolidate(&ConsolidationRequest {
//!     studio_id: studio,
//!     payee_id: payee,
//!     record_ids: vec![first, second],
//!     discount: None,
//!     partial_payments: vec![],
//!     method: Some(PaymentMethod::Transfer),
//!     concept: None,
//!     idempotency_key: Some("payroll-2024-03".to_string()),
//!     caller: "owner@studio".to_string(),
//! })?;
//!
//! let march = engine.summarize_period(studio, "2024-03")?;
//! assert_eq!(march.payroll_expense, outcome.consolidated.net_amount);
//! ```

pub mod collaborators;
pub mod config;
pub mod consolidation;
pub mod dedup;
pub mod error;
pub mod kpi;
pub mod ledger;
pub mod receivables;
pub mod recurring;
pub mod reversal;
pub mod schema;
pub mod store;
pub mod utils;

pub use collaborators::{Clock, FixedClock, PayerResolver, StaticPayerResolver, SystemClock};
pub use config::EngineConfig;
pub use consolidation::{merge_payroll_items, ConsolidationOutcome, PayrollConsolidator};
pub use dedup::{deduplicate_payroll, DedupDecision, PayrollDeduplicator};
pub use error::{ReconciliationError, Result};
pub use kpi::{
    effective_quantity, summarize_period, FinancialSummary, KpiAggregator, ProductionBreakdown,
};
pub use ledger::{LedgerQuery, LedgerTotals, Movement, MovementKind};
pub use receivables::{
    allocate_proportionally, resolve_receivables, QuoteReceivable, ReceivablesReport,
    ReceivablesResolver,
};
pub use recurring::{unify_charges, RecurringCharge, RecurringMaterializer};
pub use reversal::{ReversalEngine, ReversalOutcome};
pub use schema::*;
pub use store::{LedgerReader, LedgerStore, LedgerTx, LockScope, MemoryStore, Mutation, PromiseQuotes};
pub use utils::*;

use log::debug;

/// Entry point bundling a store with its collaborators. Every call takes
/// the studio and window explicitly; the engine keeps no per-request state.
pub struct ReconciliationEngine<S: LedgerStore> {
    store: S,
    config: EngineConfig,
    payers: Box<dyn PayerResolver>,
    clock: Box<dyn Clock>,
}

impl<S: LedgerStore> ReconciliationEngine<S> {
    pub fn new(store: S, config: EngineConfig, payers: Box<dyn PayerResolver>) -> Self {
        Self {
            store,
            config,
            payers,
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn summarize(&self, studio: StudioId, window: &DateWindow) -> Result<FinancialSummary> {
        KpiAggregator::new(&self.store, &self.config).summarize(studio, window)
    }

    /// Summary for a "YYYY-MM" or "YYYY-MM:YYYY-MM" period.
    pub fn summarize_period(&self, studio: StudioId, period: &str) -> Result<FinancialSummary> {
        let window = parse_period_string(period)?;
        debug!("Resolved period '{}' to {}", period, window);
        self.summarize(studio, &window)
    }

    pub fn totals(&self, studio: StudioId, window: &DateWindow) -> Result<LedgerTotals> {
        LedgerQuery::new(&self.store, &self.config).totals(studio, window)
    }

    pub fn movements(&self, studio: StudioId, window: &DateWindow) -> Result<Vec<Movement>> {
        LedgerQuery::new(&self.store, &self.config).movements(studio, window)
    }

    pub fn receivables(&self, studio: StudioId) -> Result<ReceivablesReport> {
        ReceivablesResolver::new(&self.config).resolve(&self.store, studio)
    }

    fn consolidator(&self) -> PayrollConsolidator<'_, S> {
        PayrollConsolidator::new(
            &self.store,
            &self.config,
            &*self.payers,
            &*self.clock,
        )
    }

    pub fn consolidate(&self, request: &ConsolidationRequest) -> Result<ConsolidationOutcome> {
        self.consolidator().consolidate(request)
    }

    pub fn settle_individual(
        &self,
        studio: StudioId,
        record_id: PayrollId,
        method: PaymentMethod,
        caller: &str,
    ) -> Result<PayrollRecord> {
        self.consolidator()
            .settle_individual(studio, record_id, method, caller)
    }

    pub fn revert_consolidation(
        &self,
        studio: StudioId,
        consolidated_id: PayrollId,
    ) -> Result<ReversalOutcome> {
        ReversalEngine::new(&self.store).revert_consolidation(studio, consolidated_id)
    }

    pub fn revert_settlement(&self, studio: StudioId, record_id: PayrollId) -> Result<PayrollRecord> {
        ReversalEngine::new(&self.store).revert_settlement(studio, record_id)
    }

    pub fn cancel_individual(&self, studio: StudioId, record_id: PayrollId) -> Result<PayrollRecord> {
        ReversalEngine::new(&self.store).cancel_individual(studio, record_id)
    }

    pub fn materialize_recurring(
        &self,
        studio: StudioId,
        window: &DateWindow,
    ) -> Result<Vec<Expense>> {
        RecurringMaterializer::new(&self.store, &*self.clock).materialize(studio, window)
    }
}
