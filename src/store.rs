//! Store collaborator: studio-scoped reads plus an all-or-nothing
//! transaction scope for the few writes the engine performs.
//!
//! Reads inside a transaction observe committed state; writes are staged on
//! the [`LedgerTx`] and only become visible when the whole batch commits.

use crate::error::{ReconciliationError, Result};
use crate::schema::*;
use crate::utils::DateWindow;
use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PromiseQuotes {
    pub promise: Promise,
    pub quotes: Vec<Quote>,
}

/// Serialization boundary for a transaction. Transactions sharing a scope
/// run one after another; different scopes never wait on each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockScope {
    Payee(StudioId, PayeeId),
    Studio(StudioId),
}

#[derive(Debug, Clone)]
pub enum Mutation {
    InsertPayroll(PayrollRecord),
    UpdatePayroll(PayrollRecord),
    DeletePayroll(PayrollId),
    InsertPartialPayments(Vec<PartialPayment>),
    DeletePartialPayments(PayrollId),
    InsertExpense(Expense),
    RecordIdempotencyKey {
        key: String,
        consolidated_id: PayrollId,
    },
    ReleaseIdempotencyKey(PayrollId),
}

pub trait LedgerReader: Send + Sync {
    /// Payments whose payment date (or creation time when unset) falls in the window.
    fn payments_in_window(&self, studio: StudioId, window: &DateWindow) -> Result<Vec<Payment>>;

    /// Every payment referencing one of the given quotes or promises.
    fn payments_referencing(
        &self,
        studio: StudioId,
        quotes: &[QuoteId],
        promises: &[PromiseId],
    ) -> Result<Vec<Payment>>;

    fn expenses_in_window(&self, studio: StudioId, window: &DateWindow) -> Result<Vec<Expense>>;

    /// Paid payroll records (individual, consolidated and legacy) matched by payment date.
    fn paid_payroll_in_window(
        &self,
        studio: StudioId,
        window: &DateWindow,
    ) -> Result<Vec<PayrollRecord>>;

    fn pending_payroll(&self, studio: StudioId) -> Result<Vec<PayrollRecord>>;

    fn payroll_record(&self, studio: StudioId, id: PayrollId) -> Result<Option<PayrollRecord>>;

    fn linked_payroll_records(
        &self,
        studio: StudioId,
        consolidated_id: PayrollId,
    ) -> Result<Vec<PayrollRecord>>;

    fn partial_payments(
        &self,
        studio: StudioId,
        consolidated_id: PayrollId,
    ) -> Result<Vec<PartialPayment>>;

    fn consolidation_for_key(&self, studio: StudioId, key: &str) -> Result<Option<PayrollId>>;

    fn promises_with_quotes(&self, studio: StudioId) -> Result<Vec<PromiseQuotes>>;

    fn recurring_expense_definitions(
        &self,
        studio: StudioId,
    ) -> Result<Vec<RecurringExpenseDefinition>>;

    fn crew_salary_definitions(&self, studio: StudioId) -> Result<Vec<CrewSalaryDefinition>>;

    /// Expenses already materialized from recurring definitions.
    fn materialized_expenses(&self, studio: StudioId) -> Result<Vec<Expense>>;
}

/// Staged writes of one transaction.
pub struct LedgerTx<'a> {
    studio: StudioId,
    reader: &'a dyn LedgerReader,
    staged: Vec<Mutation>,
}

impl<'a> LedgerTx<'a> {
    pub fn studio(&self) -> StudioId {
        self.studio
    }

    pub fn reader(&self) -> &'a dyn LedgerReader {
        self.reader
    }

    pub fn insert_payroll(&mut self, record: PayrollRecord) {
        self.staged.push(Mutation::InsertPayroll(record));
    }

    pub fn update_payroll(&mut self, record: PayrollRecord) {
        self.staged.push(Mutation::UpdatePayroll(record));
    }

    pub fn delete_payroll(&mut self, id: PayrollId) {
        self.staged.push(Mutation::DeletePayroll(id));
    }

    pub fn insert_partial_payments(&mut self, payments: Vec<PartialPayment>) {
        if !payments.is_empty() {
            self.staged.push(Mutation::InsertPartialPayments(payments));
        }
    }

    pub fn delete_partial_payments(&mut self, consolidated_id: PayrollId) {
        self.staged
            .push(Mutation::DeletePartialPayments(consolidated_id));
    }

    pub fn insert_expense(&mut self, expense: Expense) {
        self.staged.push(Mutation::InsertExpense(expense));
    }

    pub fn record_idempotency_key(&mut self, key: String, consolidated_id: PayrollId) {
        self.staged.push(Mutation::RecordIdempotencyKey {
            key,
            consolidated_id,
        });
    }

    pub fn release_idempotency_key(&mut self, consolidated_id: PayrollId) {
        self.staged
            .push(Mutation::ReleaseIdempotencyKey(consolidated_id));
    }
}

pub trait LedgerStore: LedgerReader + Sized {
    /// Lock object serializing transactions on `scope`.
    fn scope_lock(&self, scope: &LockScope) -> Arc<Mutex<()>>;

    /// Called once a transaction on `scope` has finished and dropped its
    /// lock handle. Stores that cache lock objects may forget idle ones here.
    fn release_scope_lock(&self, _scope: &LockScope) {}

    /// Applies every mutation or none of them.
    fn commit(&self, studio: StudioId, mutations: Vec<Mutation>) -> Result<()>;

    /// Runs `f` under the scope lock and commits its staged writes. An error
    /// from `f` or from the commit discards every staged write.
    fn transaction<T, F>(&self, studio: StudioId, scope: LockScope, f: F) -> Result<T>
    where
        F: FnOnce(&mut LedgerTx<'_>) -> Result<T>,
    {
        let lock = self.scope_lock(&scope);
        let result = {
            let _guard = lock.lock();
            run_staged(self, studio, &scope, f)
        };
        drop(lock);
        self.release_scope_lock(&scope);
        result
    }
}

fn run_staged<S, T, F>(store: &S, studio: StudioId, scope: &LockScope, f: F) -> Result<T>
where
    S: LedgerStore,
    F: FnOnce(&mut LedgerTx<'_>) -> Result<T>,
{
    let mut tx = LedgerTx {
        studio,
        reader: store,
        staged: Vec::new(),
    };

    let value = match f(&mut tx) {
        Ok(value) => value,
        Err(e) => {
            debug!(
                "Discarding {} staged writes for {:?}: {}",
                tx.staged.len(),
                scope,
                e
            );
            return Err(e);
        }
    };

    let staged = std::mem::take(&mut tx.staged);
    let count = staged.len();
    if let Err(e) = store.commit(studio, staged) {
        warn!("Rolled back transaction of {} writes for {:?}: {}", count, scope, e);
        return Err(e);
    }
    Ok(value)
}

#[derive(Debug, Clone, Default)]
struct StudioTables {
    promises: BTreeMap<PromiseId, Promise>,
    quotes: BTreeMap<QuoteId, Quote>,
    payments: BTreeMap<PaymentId, Payment>,
    payroll: BTreeMap<PayrollId, PayrollRecord>,
    partial_payments: Vec<PartialPayment>,
    expenses: BTreeMap<ExpenseId, Expense>,
    recurring: BTreeMap<RecurringExpenseId, RecurringExpenseDefinition>,
    crew_salaries: BTreeMap<PayeeId, CrewSalaryDefinition>,
    idempotency_keys: HashMap<String, PayrollId>,
}

impl StudioTables {
    fn apply(&mut self, mutation: Mutation) -> Result<()> {
        match mutation {
            Mutation::InsertPayroll(record) => {
                if self.payroll.contains_key(&record.id) {
                    return Err(ReconciliationError::StorageFailure(format!(
                        "duplicate payroll id {}",
                        record.id
                    )));
                }
                self.payroll.insert(record.id, record);
            }
            Mutation::UpdatePayroll(record) => {
                let slot = self.payroll.get_mut(&record.id).ok_or_else(|| {
                    ReconciliationError::StorageFailure(format!(
                        "update of missing payroll record {}",
                        record.id
                    ))
                })?;
                *slot = record;
            }
            Mutation::DeletePayroll(id) => {
                if self.payroll.remove(&id).is_none() {
                    return Err(ReconciliationError::StorageFailure(format!(
                        "delete of missing payroll record {}",
                        id
                    )));
                }
            }
            Mutation::InsertPartialPayments(payments) => {
                for payment in &payments {
                    if !self.payroll.contains_key(&payment.consolidated_id) {
                        return Err(ReconciliationError::StorageFailure(format!(
                            "partial payment references missing record {}",
                            payment.consolidated_id
                        )));
                    }
                }
                self.partial_payments.extend(payments);
            }
            Mutation::DeletePartialPayments(consolidated_id) => {
                self.partial_payments
                    .retain(|p| p.consolidated_id != consolidated_id);
            }
            Mutation::InsertExpense(expense) => {
                if self.expenses.contains_key(&expense.id) {
                    return Err(ReconciliationError::StorageFailure(format!(
                        "duplicate expense id {}",
                        expense.id
                    )));
                }
                self.expenses.insert(expense.id, expense);
            }
            Mutation::RecordIdempotencyKey {
                key,
                consolidated_id,
            } => {
                // Key committed meanwhile by a request on another payee.
                if self.idempotency_keys.contains_key(&key) {
                    return Err(ReconciliationError::ValidationFailed(format!(
                        "idempotency key '{}' is already used by another consolidation",
                        key
                    )));
                }
                self.idempotency_keys.insert(key, consolidated_id);
            }
            Mutation::ReleaseIdempotencyKey(consolidated_id) => {
                self.idempotency_keys.retain(|_, id| *id != consolidated_id);
            }
        }
        Ok(())
    }
}

/// In-process store. Upstream flows seed it through the `insert_*` methods;
/// the engine mutates it only through transactions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    studios: RwLock<HashMap<StudioId, StudioTables>>,
    scope_locks: Mutex<HashMap<LockScope, Arc<Mutex<()>>>>,
    fail_next_commit: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next commit fail with `StorageFailure` after staging.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    fn read<T>(&self, studio: StudioId, f: impl FnOnce(&StudioTables) -> T) -> T {
        let studios = self.studios.read();
        match studios.get(&studio) {
            Some(tables) => f(tables),
            None => f(&StudioTables::default()),
        }
    }

    fn write<T>(&self, studio: StudioId, f: impl FnOnce(&mut StudioTables) -> T) -> T {
        let mut studios = self.studios.write();
        f(studios.entry(studio).or_default())
    }

    pub fn insert_promise(&self, promise: Promise) {
        self.write(promise.studio_id, |t| {
            t.promises.insert(promise.id, promise);
        });
    }

    pub fn insert_quote(&self, quote: Quote) -> Result<()> {
        if quote.price < Decimal::ZERO || quote.discount < Decimal::ZERO {
            return Err(ReconciliationError::ValidationFailed(format!(
                "quote {} has negative price or discount",
                quote.id
            )));
        }
        if quote.discount > quote.price {
            return Err(ReconciliationError::ValidationFailed(format!(
                "quote {} discount {} exceeds price {}",
                quote.id, quote.discount, quote.price
            )));
        }
        self.write(quote.studio_id, |t| {
            if !t.promises.contains_key(&quote.promise_id) {
                return Err(ReconciliationError::not_found("promise", quote.promise_id));
            }
            t.quotes.insert(quote.id, quote);
            Ok(())
        })
    }

    pub fn insert_payment(&self, payment: Payment) -> Result<()> {
        if payment.amount <= Decimal::ZERO {
            return Err(ReconciliationError::ValidationFailed(format!(
                "payment {} amount must be positive, got {}",
                payment.id, payment.amount
            )));
        }
        self.write(payment.studio_id, |t| {
            t.payments.insert(payment.id, payment);
        });
        Ok(())
    }

    pub fn insert_expense(&self, expense: Expense) -> Result<()> {
        if expense.amount < Decimal::ZERO {
            return Err(ReconciliationError::ValidationFailed(format!(
                "expense {} amount must not be negative",
                expense.id
            )));
        }
        self.write(expense.studio_id, |t| {
            t.expenses.insert(expense.id, expense);
        });
        Ok(())
    }

    /// Inserts a payroll record as produced by the assignment process (or a
    /// legacy import). Settlement state is taken as given.
    pub fn insert_payroll_record(&self, record: PayrollRecord) -> Result<()> {
        if record.gross_amount < Decimal::ZERO
            || record.net_amount < Decimal::ZERO
            || record.total_discounts < Decimal::ZERO
        {
            return Err(ReconciliationError::ValidationFailed(format!(
                "payroll record {} has a negative amount",
                record.id
            )));
        }
        self.write(record.studio_id, |t| {
            t.payroll.insert(record.id, record);
        });
        Ok(())
    }

    pub fn insert_recurring_definition(&self, definition: RecurringExpenseDefinition) {
        self.write(definition.studio_id, |t| {
            t.recurring.insert(definition.id, definition);
        });
    }

    pub fn insert_crew_salary(&self, definition: CrewSalaryDefinition) {
        self.write(definition.studio_id, |t| {
            t.crew_salaries.insert(definition.payee_id, definition);
        });
    }

    pub fn payroll_count(&self, studio: StudioId) -> usize {
        self.read(studio, |t| t.payroll.len())
    }
}

impl LedgerReader for MemoryStore {
    fn payments_in_window(&self, studio: StudioId, window: &DateWindow) -> Result<Vec<Payment>> {
        Ok(self.read(studio, |t| {
            t.payments
                .values()
                .filter(|p| window.contains(p.payment_date, p.created_at))
                .cloned()
                .collect()
        }))
    }

    fn payments_referencing(
        &self,
        studio: StudioId,
        quotes: &[QuoteId],
        promises: &[PromiseId],
    ) -> Result<Vec<Payment>> {
        Ok(self.read(studio, |t| {
            t.payments
                .values()
                .filter(|p| {
                    p.quote_id.is_some_and(|q| quotes.contains(&q))
                        || p.promise_id.is_some_and(|pr| promises.contains(&pr))
                })
                .cloned()
                .collect()
        }))
    }

    fn expenses_in_window(&self, studio: StudioId, window: &DateWindow) -> Result<Vec<Expense>> {
        Ok(self.read(studio, |t| {
            t.expenses
                .values()
                .filter(|e| window.contains_naive(e.date, e.created_at))
                .cloned()
                .collect()
        }))
    }

    fn paid_payroll_in_window(
        &self,
        studio: StudioId,
        window: &DateWindow,
    ) -> Result<Vec<PayrollRecord>> {
        Ok(self.read(studio, |t| {
            t.payroll
                .values()
                .filter(|r| r.status == PayrollStatus::Paid)
                .filter(|r| window.contains(r.payment_date, r.created_at))
                .cloned()
                .collect()
        }))
    }

    fn pending_payroll(&self, studio: StudioId) -> Result<Vec<PayrollRecord>> {
        Ok(self.read(studio, |t| {
            t.payroll
                .values()
                .filter(|r| r.status == PayrollStatus::Pending)
                .cloned()
                .collect()
        }))
    }

    fn payroll_record(&self, studio: StudioId, id: PayrollId) -> Result<Option<PayrollRecord>> {
        Ok(self.read(studio, |t| t.payroll.get(&id).cloned()))
    }

    fn linked_payroll_records(
        &self,
        studio: StudioId,
        consolidated_id: PayrollId,
    ) -> Result<Vec<PayrollRecord>> {
        Ok(self.read(studio, |t| {
            t.payroll
                .values()
                .filter(|r| r.id != consolidated_id)
                .filter(|r| r.consolidated_payment_id == Some(consolidated_id))
                .cloned()
                .collect()
        }))
    }

    fn partial_payments(
        &self,
        studio: StudioId,
        consolidated_id: PayrollId,
    ) -> Result<Vec<PartialPayment>> {
        Ok(self.read(studio, |t| {
            t.partial_payments
                .iter()
                .filter(|p| p.consolidated_id == consolidated_id)
                .cloned()
                .collect()
        }))
    }

    fn consolidation_for_key(&self, studio: StudioId, key: &str) -> Result<Option<PayrollId>> {
        Ok(self.read(studio, |t| t.idempotency_keys.get(key).copied()))
    }

    fn promises_with_quotes(&self, studio: StudioId) -> Result<Vec<PromiseQuotes>> {
        Ok(self.read(studio, |t| {
            t.promises
                .values()
                .map(|promise| PromiseQuotes {
                    promise: promise.clone(),
                    quotes: t
                        .quotes
                        .values()
                        .filter(|q| q.promise_id == promise.id)
                        .cloned()
                        .collect(),
                })
                .collect()
        }))
    }

    fn recurring_expense_definitions(
        &self,
        studio: StudioId,
    ) -> Result<Vec<RecurringExpenseDefinition>> {
        Ok(self.read(studio, |t| t.recurring.values().cloned().collect()))
    }

    fn crew_salary_definitions(&self, studio: StudioId) -> Result<Vec<CrewSalaryDefinition>> {
        Ok(self.read(studio, |t| t.crew_salaries.values().cloned().collect()))
    }

    fn materialized_expenses(&self, studio: StudioId) -> Result<Vec<Expense>> {
        Ok(self.read(studio, |t| {
            t.expenses
                .values()
                .filter(|e| e.recurring_source.is_some())
                .cloned()
                .collect()
        }))
    }
}

impl LedgerStore for MemoryStore {
    fn scope_lock(&self, scope: &LockScope) -> Arc<Mutex<()>> {
        self.scope_locks
            .lock()
            .entry(scope.clone())
            .or_default()
            .clone()
    }

    fn release_scope_lock(&self, scope: &LockScope) {
        let mut locks = self.scope_locks.lock();
        if locks
            .get(scope)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(scope);
        }
    }

    fn commit(&self, studio: StudioId, mutations: Vec<Mutation>) -> Result<()> {
        let mut studios = self.studios.write();

        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(ReconciliationError::StorageFailure(
                "injected commit failure".to_string(),
            ));
        }

        let current = studios.entry(studio).or_default();
        let mut working = current.clone();
        for mutation in mutations {
            working.apply(mutation)?;
        }
        *current = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn pending(studio: StudioId, payee: PayeeId, net: Decimal) -> PayrollRecord {
        PayrollRecord {
            id: PayrollId::new(),
            studio_id: studio,
            payee_id: payee,
            concept: "Session".to_string(),
            gross_amount: net,
            net_amount: net,
            total_discounts: Decimal::ZERO,
            status: PayrollStatus::Pending,
            payment_type: Some(PayrollPaymentType::Individual),
            consolidated_payment_id: None,
            payment_date: None,
            paid_by: None,
            method: None,
            items: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_transaction_commits_all_staged_writes() {
        let store = MemoryStore::new();
        let studio = StudioId::new();
        let payee = PayeeId::new();
        let record = pending(studio, payee, dec!(100));
        store.insert_payroll_record(record.clone()).unwrap();

        store
            .transaction(studio, LockScope::Payee(studio, payee), |tx| {
                let mut updated = record.clone();
                updated.status = PayrollStatus::Paid;
                tx.update_payroll(updated);
                tx.insert_payroll(pending(studio, payee, dec!(5)));
                Ok(())
            })
            .unwrap();

        let stored = store.payroll_record(studio, record.id).unwrap().unwrap();
        assert_eq!(stored.status, PayrollStatus::Paid);
        assert_eq!(store.payroll_count(studio), 2);
    }

    #[test]
    fn test_closure_error_discards_staged_writes() {
        let store = MemoryStore::new();
        let studio = StudioId::new();
        let payee = PayeeId::new();

        let result: Result<()> = store.transaction(studio, LockScope::Studio(studio), |tx| {
            tx.insert_payroll(pending(studio, payee, dec!(5)));
            Err(ReconciliationError::ValidationFailed("nope".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(store.payroll_count(studio), 0);
    }

    #[test]
    fn test_failed_apply_leaves_prior_state() {
        let store = MemoryStore::new();
        let studio = StudioId::new();
        let payee = PayeeId::new();
        let record = pending(studio, payee, dec!(100));
        store.insert_payroll_record(record.clone()).unwrap();

        let result = store.transaction(studio, LockScope::Payee(studio, payee), |tx| {
            let mut updated = record.clone();
            updated.status = PayrollStatus::Paid;
            tx.update_payroll(updated);
            tx.delete_payroll(PayrollId::new());
            Ok(())
        });

        assert!(matches!(
            result,
            Err(ReconciliationError::StorageFailure(_))
        ));
        let stored = store.payroll_record(studio, record.id).unwrap().unwrap();
        assert_eq!(stored.status, PayrollStatus::Pending);
    }

    #[test]
    fn test_injected_commit_failure_fires_once() {
        let store = MemoryStore::new();
        let studio = StudioId::new();
        let payee = PayeeId::new();
        store.fail_next_commit();

        let first = store.transaction(studio, LockScope::Studio(studio), |tx| {
            tx.insert_payroll(pending(studio, payee, dec!(1)));
            Ok(())
        });
        assert!(first.is_err());
        assert_eq!(store.payroll_count(studio), 0);

        store
            .transaction(studio, LockScope::Studio(studio), |tx| {
                tx.insert_payroll(pending(studio, payee, dec!(1)));
                Ok(())
            })
            .unwrap();
        assert_eq!(store.payroll_count(studio), 1);
    }

    #[test]
    fn test_scope_locks_are_shared_per_scope() {
        let store = MemoryStore::new();
        let studio = StudioId::new();
        let a = LockScope::Payee(studio, PayeeId::new());
        let b = LockScope::Payee(studio, PayeeId::new());

        assert!(Arc::ptr_eq(&store.scope_lock(&a), &store.scope_lock(&a)));
        assert!(!Arc::ptr_eq(&store.scope_lock(&a), &store.scope_lock(&b)));
    }

    #[test]
    fn test_idle_scope_locks_are_pruned() {
        let store = MemoryStore::new();
        let studio = StudioId::new();
        for _ in 0..5 {
            let payee = PayeeId::new();
            store
                .transaction(studio, LockScope::Payee(studio, payee), |tx| {
                    tx.insert_payroll(pending(studio, payee, dec!(1)));
                    Ok(())
                })
                .unwrap();
        }
        let failed: Result<()> = store.transaction(studio, LockScope::Studio(studio), |_| {
            Err(ReconciliationError::ValidationFailed("nope".to_string()))
        });
        assert!(failed.is_err());

        assert!(store.scope_locks.lock().is_empty());
        assert_eq!(store.payroll_count(studio), 5);
    }

    #[test]
    fn test_held_scope_lock_survives_release() {
        let store = MemoryStore::new();
        let scope = LockScope::Studio(StudioId::new());
        let held = store.scope_lock(&scope);

        store.release_scope_lock(&scope);
        assert!(Arc::ptr_eq(&held, &store.scope_lock(&scope)));
    }

    #[test]
    fn test_duplicate_idempotency_key_is_validation_failure() {
        let store = MemoryStore::new();
        let studio = StudioId::new();
        let first_payee = PayeeId::new();
        let second_payee = PayeeId::new();

        store
            .transaction(studio, LockScope::Payee(studio, first_payee), |tx| {
                let record = pending(studio, first_payee, dec!(10));
                tx.record_idempotency_key("shared".to_string(), record.id);
                tx.insert_payroll(record);
                Ok(())
            })
            .unwrap();

        let second = store.transaction(studio, LockScope::Payee(studio, second_payee), |tx| {
            let record = pending(studio, second_payee, dec!(20));
            tx.record_idempotency_key("shared".to_string(), record.id);
            tx.insert_payroll(record);
            Ok(())
        });

        assert!(matches!(
            second,
            Err(ReconciliationError::ValidationFailed(_))
        ));
        assert_eq!(store.payroll_count(studio), 1);
    }

    #[test]
    fn test_seeding_validates_amounts() {
        let store = MemoryStore::new();
        let studio = StudioId::new();
        let payment = Payment {
            id: PaymentId::new(),
            studio_id: studio,
            amount: dec!(0),
            status: PaymentStatus::Paid,
            quote_id: None,
            promise_id: None,
            method: None,
            concept: None,
            payment_date: None,
            created_at: Utc::now(),
        };
        assert!(matches!(
            store.insert_payment(payment),
            Err(ReconciliationError::ValidationFailed(_))
        ));
    }
}
