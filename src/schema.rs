use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_type!(
    /// Tenant boundary: every read and write is scoped to one studio.
    StudioId
);
id_type!(PromiseId);
id_type!(QuoteId);
id_type!(PaymentId);
id_type!(
    /// Identifies a payroll record, including consolidated ones.
    PayrollId
);
id_type!(PayeeId);
id_type!(PayerId);
id_type!(ExpenseId);
id_type!(RecurringExpenseId);
id_type!(ServiceId);

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Promise {
    pub id: PromiseId,
    pub studio_id: StudioId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Pending,
    #[serde(alias = "aprobada", alias = "aprobado")]
    Approved,
    #[serde(alias = "autorizada", alias = "autorizado")]
    Authorized,
    #[serde(alias = "contratada", alias = "contratado")]
    Contracted,
    #[serde(alias = "rechazada")]
    Rejected,
    #[serde(alias = "cancelada", alias = "canceled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BillingType {
    #[schemars(description = "Charged per hour of event coverage; quantity is multiplied by the event duration.")]
    Hour,
    #[schemars(description = "Charged per service line, independent of event duration.")]
    Service,
    #[schemars(description = "Charged per delivered unit (prints, albums, extra edits).")]
    Unit,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QuoteItem {
    pub name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,

    #[schemars(description = "Per-unit production cost captured when the quote was priced.")]
    pub cost_snapshot: Decimal,

    #[schemars(description = "Per-unit operating expense captured when the quote was priced.")]
    pub expense_snapshot: Decimal,

    pub billing_type: BillingType,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Quote {
    pub id: QuoteId,
    pub promise_id: PromiseId,
    pub studio_id: StudioId,
    pub name: String,
    pub price: Decimal,
    pub discount: Decimal,
    pub status: QuoteStatus,

    #[serde(default)]
    pub event_duration_hours: Option<Decimal>,

    #[serde(default)]
    pub items: Vec<QuoteItem>,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    #[schemars(description = "Last status change; approval date for approved-like quotes.")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Quote {
    /// `price - discount`, never negative.
    pub fn effective_total(&self) -> Decimal {
        (self.price - self.discount).max(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Completed,
    Cancelled,
}

impl PaymentStatus {
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Paid | Self::Completed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Transfer,
    Cash,
    Card,
    Check,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Payment {
    pub id: PaymentId,
    pub studio_id: StudioId,
    pub amount: Decimal,
    pub status: PaymentStatus,

    #[serde(default)]
    pub quote_id: Option<QuoteId>,

    #[serde(default)]
    #[schemars(description = "Set when the payment was captured against the promise as a whole rather than one quote.")]
    pub promise_id: Option<PromiseId>,

    #[serde(default)]
    pub method: Option<PaymentMethod>,

    #[serde(default)]
    pub concept: Option<String>,

    #[serde(default)]
    pub payment_date: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PayrollStatus {
    Pending,
    Paid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PayrollPaymentType {
    Individual,
    Consolidated,
}

/// One line of the itemized cost breakdown a payroll record carries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct PayrollItem {
    #[serde(default)]
    pub service_id: Option<ServiceId>,
    pub description: String,
    pub quantity: Decimal,
    pub cost: Decimal,
}

impl PayrollItem {
    /// Entries with the same key describe the same underlying service.
    pub fn merge_key(&self) -> String {
        match self.service_id {
            Some(id) => id.to_string(),
            None => self.description.trim().to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PayrollRecord {
    pub id: PayrollId,
    pub studio_id: StudioId,
    pub payee_id: PayeeId,
    pub concept: String,
    pub gross_amount: Decimal,
    pub net_amount: Decimal,
    pub total_discounts: Decimal,
    pub status: PayrollStatus,

    #[serde(default)]
    #[schemars(description = "Null on legacy rows written before consolidation existed.")]
    pub payment_type: Option<PayrollPaymentType>,

    #[serde(default)]
    pub consolidated_payment_id: Option<PayrollId>,

    #[serde(default)]
    pub payment_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub paid_by: Option<PayerId>,

    #[serde(default)]
    pub method: Option<PaymentMethod>,

    #[serde(default)]
    pub items: Vec<PayrollItem>,

    pub created_at: DateTime<Utc>,
}

impl PayrollRecord {
    pub fn is_consolidated(&self) -> bool {
        self.payment_type == Some(PayrollPaymentType::Consolidated)
    }

    /// Settled, individual, and folded into a consolidated record.
    pub fn is_linked(&self) -> bool {
        !self.is_consolidated() && self.consolidated_payment_id.is_some()
    }

    /// Clears every settlement field back to the pending shape.
    pub fn reset_to_pending(&mut self) {
        self.status = PayrollStatus::Pending;
        self.payment_date = None;
        self.paid_by = None;
        self.method = None;
        self.consolidated_payment_id = None;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct PartialPayment {
    pub id: Uuid,
    pub consolidated_id: PayrollId,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RecurringSource {
    Expense(RecurringExpenseId),
    CrewSalary(PayeeId),
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Expense {
    pub id: ExpenseId,
    pub studio_id: StudioId,
    pub concept: String,
    pub amount: Decimal,
    pub category: String,

    #[serde(default)]
    pub date: Option<NaiveDate>,

    #[serde(default)]
    pub payee_id: Option<PayeeId>,

    #[serde(default)]
    #[schemars(description = "Definition this expense was materialized from, if any.")]
    pub recurring_source: Option<RecurringSource>,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Weekly,
    Biweekly,
    Monthly,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RecurringExpenseDefinition {
    pub id: RecurringExpenseId,
    pub studio_id: StudioId,
    pub name: String,
    pub amount: Decimal,
    pub frequency: Frequency,

    #[schemars(
        description = "Monthly: day of month, clamped to the month's last day. Weekly and biweekly: ISO weekday, 1 = Monday through 7 = Sunday."
    )]
    pub charge_day: u32,

    pub category: String,

    #[serde(default = "default_active")]
    pub active: bool,
}

/// Fixed salary owed to a crew member, tracked apart from operating
/// recurring expenses.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CrewSalaryDefinition {
    pub payee_id: PayeeId,
    pub studio_id: StudioId,
    pub payee_name: String,
    pub amount: Decimal,
    pub frequency: Frequency,

    #[schemars(description = "Same reading as on recurring expenses: day of month or ISO weekday.")]
    pub charge_day: u32,

    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PartialPaymentInput {
    pub method: PaymentMethod,
    pub amount: Decimal,
}

/// Write request folding several pending payroll records of one payee
/// into a single settled payment.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConsolidationRequest {
    pub studio_id: StudioId,
    pub payee_id: PayeeId,
    pub record_ids: Vec<PayrollId>,

    #[serde(default)]
    #[schemars(description = "Total discount applied on top of the summed net amounts.")]
    pub discount: Option<Decimal>,

    #[serde(default)]
    #[schemars(description = "Split settlement; amounts must add up to net total minus discount.")]
    pub partial_payments: Vec<PartialPaymentInput>,

    #[serde(default)]
    pub method: Option<PaymentMethod>,

    #[serde(default)]
    pub concept: Option<String>,

    #[serde(default)]
    #[schemars(description = "Client-generated key; a retried request with the same key returns the original consolidation.")]
    pub idempotency_key: Option<String>,

    #[schemars(description = "Opaque caller identity, resolved to a payer by the identity collaborator.")]
    pub caller: String,
}

impl ConsolidationRequest {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ConsolidationRequest)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote(price: Decimal, discount: Decimal) -> Quote {
        Quote {
            id: QuoteId::new(),
            promise_id: PromiseId::new(),
            studio_id: StudioId::new(),
            name: "Boda".to_string(),
            price,
            discount,
            status: QuoteStatus::Approved,
            event_duration_hours: None,
            items: vec![],
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_effective_total_never_negative() {
        assert_eq!(quote(dec!(1000), dec!(100)).effective_total(), dec!(900));
        assert_eq!(quote(dec!(100), dec!(250)).effective_total(), dec!(0));
    }

    #[test]
    fn test_quote_status_synonyms() {
        let status: QuoteStatus = serde_json::from_str("\"aprobada\"").unwrap();
        assert_eq!(status, QuoteStatus::Approved);
        let status: QuoteStatus = serde_json::from_str("\"autorizada\"").unwrap();
        assert_eq!(status, QuoteStatus::Authorized);
        let status: QuoteStatus = serde_json::from_str("\"contracted\"").unwrap();
        assert_eq!(status, QuoteStatus::Contracted);
    }

    #[test]
    fn test_merge_key_prefers_service_reference() {
        let service = ServiceId::new();
        let a = PayrollItem {
            service_id: Some(service),
            description: "Second shooter".to_string(),
            quantity: dec!(1),
            cost: dec!(50),
        };
        let b = PayrollItem {
            service_id: None,
            description: "  Second Shooter ".to_string(),
            quantity: dec!(1),
            cost: dec!(50),
        };
        assert_eq!(a.merge_key(), service.to_string());
        assert_eq!(b.merge_key(), "second shooter");
    }

    #[test]
    fn test_charge_day_schema_covers_weekly_reading() {
        let schema = schemars::schema_for!(RecurringExpenseDefinition);
        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.contains("ISO weekday"));
        assert!(json.contains("clamped"));
    }

    #[test]
    fn test_request_schema_generation() {
        let schema_json = ConsolidationRequest::schema_as_json().unwrap();
        assert!(schema_json.contains("record_ids"));
        assert!(schema_json.contains("idempotency_key"));
        assert!(schema_json.contains("partial_payments"));
    }
}
