use crate::{Config, Transaction, ValidationError, config::OversizePolicy};
use rust_decimal::Decimal;
use tracing::{debug, warn};

const CREDIT_PREFIX: &str = "CRE";
const DEBIT_PREFIX: &str = "DEB";

/// Checks a transaction before it reaches the ledger
///
/// The ledger itself never re-validates, so every rule lives here.
#[derive(Debug, Clone)]
pub struct Validator {
    min_amount: Decimal,
    max_amount: Decimal,
    oversize_policy: OversizePolicy,
    batch_cap: Decimal,
}

impl Validator {
    pub fn new(
        min_amount: Decimal,
        max_amount: Decimal,
        oversize_policy: OversizePolicy,
        batch_cap: Decimal,
    ) -> Self {
        Self {
            min_amount,
            max_amount,
            oversize_policy,
            batch_cap,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.api.min_amount,
            config.api.max_amount,
            config.audit.oversize_policy,
            config.audit.max_amount_per_batch,
        )
    }

    /// Validate an incoming transaction
    /// Returns Ok(()) if valid, Err(ValidationError) if invalid
    pub fn validate(&self, tx: &Transaction) -> Result<(), ValidationError> {
        debug!("Validating transaction {}", tx.transaction_id);

        if tx.transaction_id.trim().is_empty() {
            return Err(ValidationError::MissingTransactionId);
        }

        self.check_range(tx)?;
        self.check_sign(tx)?;
        self.check_batch_cap(tx)?;

        Ok(())
    }

    /// Absolute amount must lie in `[min_amount, max_amount]`
    fn check_range(&self, tx: &Transaction) -> Result<(), ValidationError> {
        let amount = tx.absolute_amount();
        if amount < self.min_amount || amount > self.max_amount {
            warn!(
                "Amount {} of transaction {} outside [{}, {}]",
                tx.amount, tx.transaction_id, self.min_amount, self.max_amount
            );
            return Err(ValidationError::AmountOutOfRange {
                min: self.min_amount,
                max: self.max_amount,
            });
        }
        Ok(())
    }

    /// `CRE…` ids carry credits, `DEB…` ids carry debits; other ids are unchecked
    fn check_sign(&self, tx: &Transaction) -> Result<(), ValidationError> {
        if tx.transaction_id.starts_with(CREDIT_PREFIX) && tx.amount <= Decimal::ZERO {
            return Err(ValidationError::CreditNotPositive);
        }
        if tx.transaction_id.starts_with(DEBIT_PREFIX) && tx.amount >= Decimal::ZERO {
            return Err(ValidationError::DebitNotNegative);
        }
        Ok(())
    }

    fn check_batch_cap(&self, tx: &Transaction) -> Result<(), ValidationError> {
        if self.oversize_policy == OversizePolicy::Reject && tx.absolute_amount() > self.batch_cap {
            return Err(ValidationError::ExceedsBatchCap {
                amount: tx.absolute_amount(),
                cap: self.batch_cap,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn validator(policy: OversizePolicy) -> Validator {
        Validator::new(dec("200.00"), dec("500000.00"), policy, dec("1000"))
    }

    #[test]
    fn test_accepts_well_formed_credit_and_debit() {
        let v = validator(OversizePolicy::Singleton);
        assert!(v.validate(&Transaction::new("CRE-1", dec("250.52"))).is_ok());
        assert!(v.validate(&Transaction::new("DEB-1", dec("-200.00"))).is_ok());
        // Unknown prefixes only get the range check
        assert!(v.validate(&Transaction::new("ADJ-1", dec("-300"))).is_ok());
    }

    #[test]
    fn test_rejects_amount_outside_range() {
        let v = validator(OversizePolicy::Singleton);
        assert_eq!(
            v.validate(&Transaction::new("CRE-1", dec("199.99"))),
            Err(ValidationError::AmountOutOfRange {
                min: dec("200.00"),
                max: dec("500000.00"),
            })
        );
        assert!(v.validate(&Transaction::new("DEB-1", dec("-500000.01"))).is_err());
    }

    #[test]
    fn test_rejects_sign_mismatch() {
        let v = validator(OversizePolicy::Singleton);
        assert_eq!(
            v.validate(&Transaction::new("CRE-1", dec("-250"))),
            Err(ValidationError::CreditNotPositive)
        );
        assert_eq!(
            v.validate(&Transaction::new("DEB-1", dec("250"))),
            Err(ValidationError::DebitNotNegative)
        );
    }

    #[test]
    fn test_rejects_blank_id() {
        let v = validator(OversizePolicy::Singleton);
        assert_eq!(
            v.validate(&Transaction::new("  ", dec("250"))),
            Err(ValidationError::MissingTransactionId)
        );
    }

    #[test]
    fn test_oversize_policy() {
        let tx = Transaction::new("CRE-1", dec("1500"));
        assert!(validator(OversizePolicy::Singleton).validate(&tx).is_ok());
        assert!(matches!(
            validator(OversizePolicy::Reject).validate(&tx),
            Err(ValidationError::ExceedsBatchCap { .. })
        ));
    }
}
