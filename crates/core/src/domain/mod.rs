pub mod order;
pub mod quotation;
pub mod request;
pub mod role;
