use crate::collaborators::Clock;
use crate::error::{ReconciliationError, Result};
use crate::schema::*;
use crate::store::{LedgerReader, LedgerStore, LockScope};
use crate::utils::{clamp_day_in_month, DateWindow};
use chrono::{Datelike, Days, NaiveDate};
use log::{debug, info};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const CREW_SALARY_CATEGORY: &str = "crew_salary";

/// A recurring expense or a crew fixed salary, seen through one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringCharge {
    pub source: RecurringSource,
    pub name: String,
    pub amount: Decimal,
    pub frequency: Frequency,
    pub charge_day: u32,
    pub category: String,
    pub payee_id: Option<PayeeId>,
}

impl RecurringCharge {
    /// Concrete charge dates inside `window`.
    ///
    /// Monthly charges fall on `charge_day` clamped to the month's length.
    /// Weekly and biweekly charges read `charge_day` as an ISO weekday
    /// (1 = Monday); biweekly weeks alternate from a fixed epoch so the same
    /// dates come out whatever window is asked for.
    pub fn due_dates(&self, window: &DateWindow) -> Result<Vec<NaiveDate>> {
        match self.frequency {
            Frequency::Monthly => {
                let mut dates = Vec::new();
                for (year, month) in window.months() {
                    let date = clamp_day_in_month(year, month, self.charge_day)?;
                    if window.contains_date(date) {
                        dates.push(date);
                    }
                }
                Ok(dates)
            }
            Frequency::Weekly | Frequency::Biweekly => {
                if !(1..=7).contains(&self.charge_day) {
                    return Err(ReconciliationError::ValidationFailed(format!(
                        "weekly charge '{}' needs an ISO weekday 1-7, got {}",
                        self.name, self.charge_day
                    )));
                }
                let epoch = NaiveDate::from_ymd_opt(1970, 1, 5).ok_or_else(|| {
                    ReconciliationError::DateError("invalid epoch".to_string())
                })?;

                let mut dates = Vec::new();
                let mut day = window.start;
                while day <= window.end {
                    let weekday_matches = day.weekday().number_from_monday() == self.charge_day;
                    let week_matches = self.frequency == Frequency::Weekly
                        || ((day - epoch).num_days().div_euclid(7)) % 2 == 0;
                    if weekday_matches && week_matches {
                        dates.push(day);
                    }
                    day = day
                        .checked_add_days(Days::new(1))
                        .ok_or_else(|| ReconciliationError::DateError(format!("date overflow after {}", day)))?;
                }
                Ok(dates)
            }
        }
    }
}

/// Active recurring expenses and crew salaries as one list.
pub fn unify_charges(
    expenses: &[RecurringExpenseDefinition],
    salaries: &[CrewSalaryDefinition],
) -> Vec<RecurringCharge> {
    let expense_charges = expenses.iter().filter(|d| d.active).map(|d| RecurringCharge {
        source: RecurringSource::Expense(d.id),
        name: d.name.clone(),
        amount: d.amount,
        frequency: d.frequency,
        charge_day: d.charge_day,
        category: d.category.clone(),
        payee_id: None,
    });

    let salary_charges = salaries.iter().filter(|s| s.active).map(|s| RecurringCharge {
        source: RecurringSource::CrewSalary(s.payee_id),
        name: format!("Salary: {}", s.payee_name),
        amount: s.amount,
        frequency: s.frequency,
        charge_day: s.charge_day,
        category: CREW_SALARY_CATEGORY.to_string(),
        payee_id: Some(s.payee_id),
    });

    expense_charges.chain(salary_charges).collect()
}

/// Turns recurring definitions into concrete expenses, once per due date.
pub struct RecurringMaterializer<'a, S: LedgerStore> {
    store: &'a S,
    clock: &'a dyn Clock,
}

impl<'a, S: LedgerStore> RecurringMaterializer<'a, S> {
    pub fn new(store: &'a S, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    pub fn charges(&self, studio: StudioId) -> Result<Vec<RecurringCharge>> {
        Ok(unify_charges(
            &self.store.recurring_expense_definitions(studio)?,
            &self.store.crew_salary_definitions(studio)?,
        ))
    }

    /// Inserts the expenses due in `window` that do not exist yet. Running
    /// it again over the same window creates nothing.
    pub fn materialize(&self, studio: StudioId, window: &DateWindow) -> Result<Vec<Expense>> {
        let charges = self.charges(studio)?;

        let created = self
            .store
            .transaction(studio, LockScope::Studio(studio), |tx| {
                let existing: HashSet<(RecurringSource, NaiveDate)> = tx
                    .reader()
                    .materialized_expenses(studio)?
                    .into_iter()
                    .filter_map(|e| Some((e.recurring_source?, e.date?)))
                    .collect();

                let now = self.clock.now();
                let mut created = Vec::new();
                for charge in &charges {
                    for date in charge.due_dates(window)? {
                        if existing.contains(&(charge.source, date)) {
                            debug!("{} already materialized for {}", charge.name, date);
                            continue;
                        }
                        let expense = Expense {
                            id: ExpenseId::new(),
                            studio_id: studio,
                            concept: charge.name.clone(),
                            amount: charge.amount,
                            category: charge.category.clone(),
                            date: Some(date),
                            payee_id: charge.payee_id,
                            recurring_source: Some(charge.source),
                            created_at: now,
                        };
                        tx.insert_expense(expense.clone());
                        created.push(expense);
                    }
                }
                Ok(created)
            })?;

        info!(
            "Materialized {} recurring expenses for studio {} in {}",
            created.len(),
            studio,
            window
        );
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::FixedClock;
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc, Weekday};
    use rust_decimal_macros::dec;

    fn monthly(studio: StudioId, day: u32) -> RecurringExpenseDefinition {
        RecurringExpenseDefinition {
            id: RecurringExpenseId::new(),
            studio_id: studio,
            name: "Studio rent".to_string(),
            amount: dec!(1200),
            frequency: Frequency::Monthly,
            charge_day: day,
            category: "rent".to_string(),
            active: true,
        }
    }

    fn charge(frequency: Frequency, charge_day: u32) -> RecurringCharge {
        RecurringCharge {
            source: RecurringSource::Expense(RecurringExpenseId::new()),
            name: "Cleaning".to_string(),
            amount: dec!(30),
            frequency,
            charge_day,
            category: "ops".to_string(),
            payee_id: None,
        }
    }

    #[test]
    fn test_monthly_due_date_clamped() {
        let window = DateWindow::month(2024, 2).unwrap();
        let dates = charge(Frequency::Monthly, 31).due_dates(&window).unwrap();
        assert_eq!(dates, vec![NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()]);
    }

    #[test]
    fn test_weekly_and_biweekly_dates() {
        let window = DateWindow::month(2024, 3).unwrap();
        let weekly = charge(Frequency::Weekly, 5).due_dates(&window).unwrap();
        assert_eq!(weekly.len(), 5);
        assert!(weekly.iter().all(|d| d.weekday() == Weekday::Fri));

        let biweekly = charge(Frequency::Biweekly, 5).due_dates(&window).unwrap();
        assert!(biweekly.len() == 2 || biweekly.len() == 3);
        for pair in biweekly.windows(2) {
            assert_eq!((pair[1] - pair[0]).num_days(), 14);
        }

        // Same dates whether asked month by month or over a quarter.
        let quarter = crate::utils::parse_period_string("2024-03:2024-05").unwrap();
        let wide = charge(Frequency::Biweekly, 5).due_dates(&quarter).unwrap();
        let march: Vec<NaiveDate> = wide.into_iter().filter(|d| d.month() == 3).collect();
        assert_eq!(march, biweekly);

        assert!(charge(Frequency::Weekly, 9).due_dates(&window).is_err());
    }

    #[test]
    fn test_unify_skips_inactive() {
        let studio = StudioId::new();
        let mut inactive = monthly(studio, 1);
        inactive.active = false;
        let salary = CrewSalaryDefinition {
            payee_id: PayeeId::new(),
            studio_id: studio,
            payee_name: "Ana".to_string(),
            amount: dec!(900),
            frequency: Frequency::Monthly,
            charge_day: 15,
            active: true,
        };

        let charges = unify_charges(&[monthly(studio, 1), inactive], &[salary.clone()]);
        assert_eq!(charges.len(), 2);
        assert_eq!(charges[1].category, CREW_SALARY_CATEGORY);
        assert_eq!(charges[1].payee_id, Some(salary.payee_id));
    }

    #[test]
    fn test_materialize_is_idempotent() {
        let store = MemoryStore::new();
        let studio = StudioId::new();
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        store.insert_recurring_definition(monthly(studio, 5));

        let materializer = RecurringMaterializer::new(&store, &clock);
        let quarter = crate::utils::parse_period_string("2024-01:2024-03").unwrap();

        let first = materializer.materialize(studio, &quarter).unwrap();
        assert_eq!(first.len(), 3);
        let second = materializer.materialize(studio, &quarter).unwrap();
        assert!(second.is_empty());

        let march = store
            .expenses_in_window(studio, &DateWindow::month(2024, 3).unwrap())
            .unwrap();
        assert_eq!(march.len(), 1);
        assert_eq!(march[0].amount, dec!(1200));
    }
}
