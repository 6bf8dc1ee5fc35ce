use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use marketplace_payment_engine::{
    gateway::GatewayError,
    traits::{PaymentGatewayError, PayoutError, VerificationError},
    WebhookError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error(transparent)]
    PaymentError(#[from] PaymentGatewayError),
    #[error(transparent)]
    PayoutError(#[from] PayoutError),
    #[error(transparent)]
    VerificationError(#[from] VerificationError),
    #[error(transparent)]
    WebhookError(#[from] WebhookError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InitializeError(_) |
            Self::BackendError(_) |
            Self::IOError(_) |
            Self::ConfigurationError(_) |
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PaymentError(e) => payment_error_code(e),
            Self::PayoutError(e) => payout_error_code(e),
            Self::VerificationError(e) => match e {
                VerificationError::NotFound(_) | VerificationError::BankAccountNotFound(_) => StatusCode::NOT_FOUND,
                VerificationError::IllegalStatusChange { .. } => StatusCode::CONFLICT,
                VerificationError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::WebhookError(e) => match e {
                WebhookError::MissingField(_) => StatusCode::BAD_REQUEST,
                WebhookError::UnknownPayment(_) | WebhookError::UnknownPayout(_) => StatusCode::NOT_FOUND,
                WebhookError::Payment(e) => payment_error_code(e),
                WebhookError::Payout(e) => payout_error_code(e),
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

fn payment_error_code(e: &PaymentGatewayError) -> StatusCode {
    match e {
        PaymentGatewayError::PaymentNotFound(_) | PaymentGatewayError::OrderNotFound(_) => StatusCode::NOT_FOUND,
        PaymentGatewayError::InvalidSignature => StatusCode::BAD_REQUEST,
        PaymentGatewayError::InvalidWebhookSignature => StatusCode::FORBIDDEN,
        PaymentGatewayError::AmountMismatch { .. } |
        PaymentGatewayError::NoOrderItems |
        PaymentGatewayError::InvalidAmount(_) |
        PaymentGatewayError::SplitError(_) => StatusCode::BAD_REQUEST,
        PaymentGatewayError::IllegalStatusChange { .. } => StatusCode::CONFLICT,
        PaymentGatewayError::RefundExceedsCaptured { .. } => StatusCode::CONFLICT,
        PaymentGatewayError::GatewayError(e) => gateway_error_code(e),
        PaymentGatewayError::UnsupportedAction(_) => StatusCode::NOT_IMPLEMENTED,
        PaymentGatewayError::DatabaseError(_) | PaymentGatewayError::LedgerError(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        },
    }
}

fn payout_error_code(e: &PayoutError) -> StatusCode {
    match e {
        PayoutError::KycNotVerified(_) | PayoutError::NoVerifiedBankAccount(_) => StatusCode::PRECONDITION_FAILED,
        PayoutError::InsufficientBalance { .. } | PayoutError::NothingToPayOut => StatusCode::CONFLICT,
        PayoutError::PayoutNotFound(_) => StatusCode::NOT_FOUND,
        PayoutError::IllegalStatusChange { .. } => StatusCode::CONFLICT,
        PayoutError::GatewayError(e) => gateway_error_code(e),
        PayoutError::LedgerError(_) | PayoutError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn gateway_error_code(e: &GatewayError) -> StatusCode {
    match e {
        GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        GatewayError::Declined { .. } => StatusCode::BAD_GATEWAY,
        GatewayError::Network(_) | GatewayError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
    }
}

#[cfg(test)]
mod test {
    use mpg_common::Money;

    use super::*;

    #[test]
    fn business_rejections_map_to_client_errors() {
        let e = ServerError::from(PayoutError::InsufficientBalance {
            requested: Money::from_major(600),
            available: Money::from_major(500),
        });
        assert_eq!(e.status_code(), StatusCode::CONFLICT);
        let e = ServerError::from(PayoutError::KycNotVerified("seller-1".into()));
        assert_eq!(e.status_code(), StatusCode::PRECONDITION_FAILED);
        let e = ServerError::from(PaymentGatewayError::InvalidSignature);
        assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn gateway_failures_surface_as_bad_gateway() {
        let e = ServerError::from(PaymentGatewayError::GatewayError(GatewayError::Timeout(
            std::time::Duration::from_secs(10),
        )));
        assert_eq!(e.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }
}
