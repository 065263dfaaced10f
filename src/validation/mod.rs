//! Transaction Validation Module
//!
//! This module validates incoming transactions before they reach the ledger.
//! Checks the amount range, the credit/debit sign convention and, when
//! configured, the batch cap.

mod validator;
pub use validator::Validator;
