use thiserror::Error;

use crate::{
    db_types::OrderId,
    traits::{LedgerError, PaymentGatewayError, PayoutError, VerificationError},
};

#[derive(Debug, Clone, Error)]
pub enum SqliteDatabaseError {
    #[error("Database error: {0}")]
    QueryError(String),
    #[error("Payment {0} not found")]
    PaymentNotFound(String),
    #[error("No payment exists for order {0}")]
    OrderNotFound(OrderId),
    #[error("Split {0} not found")]
    SplitNotFound(i64),
    #[error("Payout {0} not found")]
    PayoutNotFound(String),
}

impl From<sqlx::Error> for SqliteDatabaseError {
    fn from(e: sqlx::Error) -> Self {
        SqliteDatabaseError::QueryError(e.to_string())
    }
}

impl From<SqliteDatabaseError> for PaymentGatewayError {
    fn from(e: SqliteDatabaseError) -> Self {
        match e {
            SqliteDatabaseError::PaymentNotFound(s) => PaymentGatewayError::PaymentNotFound(s),
            SqliteDatabaseError::OrderNotFound(o) => PaymentGatewayError::OrderNotFound(o),
            other => PaymentGatewayError::DatabaseError(other.to_string()),
        }
    }
}

impl From<SqliteDatabaseError> for PayoutError {
    fn from(e: SqliteDatabaseError) -> Self {
        match e {
            SqliteDatabaseError::PayoutNotFound(s) => PayoutError::PayoutNotFound(s),
            other => PayoutError::DatabaseError(other.to_string()),
        }
    }
}

impl From<SqliteDatabaseError> for LedgerError {
    fn from(e: SqliteDatabaseError) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}

impl From<SqliteDatabaseError> for VerificationError {
    fn from(e: SqliteDatabaseError) -> Self {
        VerificationError::DatabaseError(e.to_string())
    }
}
