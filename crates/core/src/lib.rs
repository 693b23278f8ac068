pub mod audit;
pub mod chain;
pub mod config;
pub mod domain;
pub mod errors;
pub mod export;
pub mod requests;
pub mod sales;

pub use audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSubject};
pub use chain::{ChainPolicy, ChainPolicyError};
pub use domain::order::{Order, OrderId, OrderStatus};
pub use domain::quotation::{
    Quotation, QuotationId, QuotationLine, QuotationStatus, SignatureStatus,
};
pub use domain::request::{
    ApprovalStep, Request, RequestId, RequestItem, RequestStatus, RequestType, StepStatus,
};
pub use domain::role::{Principal, Role, StaffMember};
pub use errors::{ApplicationError, DomainError, InterfaceError, RequestError, SalesError};
pub use requests::{
    Decision, DecisionOutcome, Followup, IssueOutcome, NewRequest, RequestEvent,
};
pub use sales::{NewQuotation, SalesEvent, SalesFollowup};
