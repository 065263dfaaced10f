use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Credit or debit applied to the account
///
/// Positive amounts are credits, negative amounts are debits.
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub transaction_id: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub amount: Decimal,
    /// Stamped on arrival; a client-supplied value is ignored
    #[serde(skip_deserializing, default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a transaction stamped with the current time
    pub fn new(transaction_id: impl Into<String>, amount: Decimal) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            amount,
            created_at: Utc::now(),
        }
    }

    /// Magnitude used for batch aggregation
    pub fn absolute_amount(&self) -> Decimal {
        self.amount.abs()
    }
}

/// Audit status of a ledger record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Pending,
    Processed,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Pending => "PENDING",
            AuditStatus::Processed => "PROCESSED",
        }
    }
}

impl std::str::FromStr for AuditStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(AuditStatus::Pending),
            "PROCESSED" => Ok(AuditStatus::Processed),
            other => Err(format!("unknown audit status: {}", other)),
        }
    }
}

/// A transaction together with its audit status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecord {
    pub transaction: Transaction,
    pub status: AuditStatus,
}

/// Group of transactions whose absolute amounts aggregate under the cap
///
/// Derived by the batch builder, never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub total_absolute_value: Decimal,
    pub count: usize,
}

impl Batch {
    pub(crate) fn open(first: &Transaction) -> Self {
        Self {
            total_absolute_value: first.absolute_amount(),
            count: 1,
        }
    }

    pub(crate) fn fits(&self, amount: Decimal, cap: Decimal) -> bool {
        self.total_absolute_value + amount <= cap
    }

    pub(crate) fn push(&mut self, amount: Decimal) {
        self.total_absolute_value += amount;
        self.count += 1;
    }
}

/// Ordered set of batches delivered to the audit sink in one call
///
/// The `id` is an idempotency key carried beside the payload, not inside it:
/// the serialized form is exactly `{ "batches": [...] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(skip)]
    pub id: Uuid,
    pub batches: Vec<Batch>,
}

impl Submission {
    pub fn new(batches: Vec<Batch>) -> Self {
        Self {
            id: Uuid::new_v4(),
            batches,
        }
    }

    /// Number of transactions across all batches
    pub fn transaction_count(&self) -> usize {
        self.batches.iter().map(|b| b.count).sum()
    }

    pub fn total_absolute_value(&self) -> Decimal {
        self.batches
            .iter()
            .fold(Decimal::ZERO, |acc, b| acc + b.total_absolute_value)
    }
}

/// Balance returned by the query boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub balance: Decimal,
}

/// Reasons a transaction is refused at the ingestion boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingTransactionId,
    AmountOutOfRange { min: Decimal, max: Decimal },
    CreditNotPositive,
    DebitNotNegative,
    ExceedsBatchCap { amount: Decimal, cap: Decimal },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingTransactionId => {
                write!(f, "Transaction ID must not be null or empty")
            }
            ValidationError::AmountOutOfRange { min, max } => {
                write!(f, "Amount must be between £{} and £{}", min, max)
            }
            ValidationError::CreditNotPositive => write!(f, "Credit must have positive amount"),
            ValidationError::DebitNotNegative => write!(f, "Debit must have negative amount"),
            ValidationError::ExceedsBatchCap { amount, cap } => {
                write!(f, "Amount {} exceeds the audit batch cap of {}", amount, cap)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_submission_payload_has_only_batches() {
        let submission = Submission::new(vec![Batch {
            total_absolute_value: Decimal::new(50000, 2),
            count: 2,
        }]);

        let value = serde_json::to_value(&submission).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert_eq!(value["batches"][0]["count"], 2);
        assert!(value["batches"][0].get("totalAbsoluteValue").is_some());
    }

    #[test]
    fn test_transaction_accepts_numeric_amount() {
        let json = r#"{"transactionId":"CRE-1","amount":250.52}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.transaction_id, "CRE-1");
        assert_eq!(tx.amount, Decimal::from_str("250.52").unwrap());
    }

    #[test]
    fn test_decimals_are_json_numbers() {
        let submission = Submission::new(vec![Batch {
            total_absolute_value: Decimal::new(50000, 2),
            count: 2,
        }]);
        let payload = serde_json::to_string(&submission).unwrap();
        assert_eq!(payload, r#"{"batches":[{"totalAbsoluteValue":500.00,"count":2}]}"#);

        let balance = serde_json::to_value(BalanceResponse {
            balance: Decimal::new(20000, 2),
        })
        .unwrap();
        assert!(balance["balance"].is_number());
    }

    #[test]
    fn test_amount_parses_without_float_rounding() {
        let json = r#"{"transactionId":"CRE-1","amount":250.123456789012345678}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(
            tx.amount,
            Decimal::from_str("250.123456789012345678").unwrap()
        );
    }

    #[test]
    fn test_client_timestamp_is_ignored() {
        let before = Utc::now();
        let json = r#"{"transactionId":"CRE-1","amount":300,"createdAt":"2000-01-01T00:00:00Z"}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert!(tx.created_at >= before);
    }

    #[test]
    fn test_audit_status_round_trips_through_str() {
        assert_eq!(AuditStatus::from_str("PENDING"), Ok(AuditStatus::Pending));
        assert_eq!(AuditStatus::Processed.as_str(), "PROCESSED");
        assert!(AuditStatus::from_str("DONE").is_err());
    }
}
