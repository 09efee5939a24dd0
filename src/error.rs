use crate::domain::listing::ListingId;
use crate::domain::order::OrderStatus;
use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MarketError>;

#[derive(Error, Debug, Diagnostic)]
pub enum MarketError {
    #[error("Validation error: {0}")]
    #[diagnostic(code(farmart::validation))]
    ValidationError(String),

    #[error(
        "Insufficient stock for listing {listing}: requested {requested}, available {available}"
    )]
    #[diagnostic(code(farmart::stock))]
    StockError {
        listing: ListingId,
        requested: u32,
        available: u32,
    },

    #[error("Invalid status transition from {from} to {to}")]
    #[diagnostic(code(farmart::invalid_transition))]
    InvalidTransitionError { from: OrderStatus, to: OrderStatus },

    /// Deliberately carries no detail so callers cannot probe for objects.
    #[error("forbidden")]
    #[diagnostic(code(farmart::forbidden))]
    AuthorizationError,

    #[error("Payment gateway error: {0}")]
    #[diagnostic(code(farmart::payment_gateway), help("the request can be retried"))]
    PaymentGatewayError(String),

    #[error("Not found: {0}")]
    #[diagnostic(code(farmart::not_found))]
    NotFoundError(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(farmart::config))]
    ConfigError(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl MarketError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MarketError::PaymentGatewayError(_))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for MarketError {
    fn from(err: rocksdb::Error) -> Self {
        MarketError::InternalError(Box::new(err))
    }
}

impl From<reqwest::Error> for MarketError {
    fn from(err: reqwest::Error) -> Self {
        MarketError::PaymentGatewayError(err.to_string())
    }
}
