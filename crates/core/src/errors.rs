use thiserror::Error;

use crate::domain::order::OrderStatus;
use crate::domain::quotation::{QuotationId, QuotationStatus};
use crate::domain::request::RequestStatus;
use crate::domain::role::Role;

/// Failures raised by the requisition trail engine. Authorization failures
/// are explicit variants, never silently swallowed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("request is not waiting on {acting:?}")]
    OutOfTurn { acting: Role, expected: Option<Role> },
    #[error("only the creator may cancel a pending request")]
    NotCreator,
    #[error("request is {status:?}; the operation does not apply")]
    InvalidState { status: RequestStatus },
    #[error("approval trail is inconsistent: {0}")]
    TrailCorrupt(String),
}

/// Failures raised by the sales pipeline coordinator.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SalesError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid quotation transition from {from:?} to {to:?}")]
    InvalidQuotationTransition { from: QuotationStatus, to: QuotationStatus },
    #[error("invalid order transition from {from:?} to {to:?}")]
    InvalidOrderTransition { from: OrderStatus, to: OrderStatus },
    #[error("orders can only be created from accepted quotations; {id:?} is {status:?}")]
    QuotationNotAccepted { id: QuotationId, status: QuotationStatus },
    #[error("{role:?} is not allowed to {action}")]
    NotPermitted { role: Role, action: &'static str },
    #[error("only the originating agent may {action}")]
    NotOriginatingAgent { action: &'static str },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Sales(#[from] SalesError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Forbidden { .. } => "You are not allowed to perform this action.",
            Self::NotFound { .. } => "The record could not be found.",
            Self::Conflict { .. } => {
                "The record changed while you were working. Reload and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = || "unassigned".to_owned();
        match value {
            ApplicationError::Domain(DomainError::Request(error)) => match error {
                RequestError::OutOfTurn { .. } | RequestError::NotCreator => Self::Forbidden {
                    message: error.to_string(),
                    correlation_id: unassigned(),
                },
                RequestError::TrailCorrupt(_) => {
                    Self::Internal { message: error.to_string(), correlation_id: unassigned() }
                }
                RequestError::Validation(_) | RequestError::InvalidState { .. } => {
                    Self::BadRequest { message: error.to_string(), correlation_id: unassigned() }
                }
            },
            ApplicationError::Domain(DomainError::Sales(error)) => match error {
                SalesError::NotPermitted { .. } | SalesError::NotOriginatingAgent { .. } => {
                    Self::Forbidden { message: error.to_string(), correlation_id: unassigned() }
                }
                SalesError::Validation(_)
                | SalesError::InvalidQuotationTransition { .. }
                | SalesError::InvalidOrderTransition { .. }
                | SalesError::QuotationNotAccepted { .. } => {
                    Self::BadRequest { message: error.to_string(), correlation_id: unassigned() }
                }
            },
            ApplicationError::Domain(DomainError::InvariantViolation(message)) => {
                Self::Internal { message, correlation_id: unassigned() }
            }
            ApplicationError::NotFound(message) => {
                Self::NotFound { message, correlation_id: unassigned() }
            }
            ApplicationError::Conflict(message) => {
                Self::Conflict { message, correlation_id: unassigned() }
            }
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned() }
            }
        }
    }
}
