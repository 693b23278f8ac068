//! Deterministic CSV snapshots for requisitions and quotations.
//!
//! Exports are pure functions of their input: a fixed column set, records in
//! caller-supplied order, and no generated-at timestamps. Exporting the same
//! records twice yields byte-identical output, so downstream consumers can
//! diff or checksum the files.

use thiserror::Error;

use crate::domain::quotation::Quotation;
use crate::domain::request::Request;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv serialization failed")]
    Csv(#[from] csv::Error),
    #[error("csv buffer error: {0}")]
    Buffer(String),
    #[error("export output was not valid utf-8")]
    Encoding(#[from] std::string::FromUtf8Error),
}

const REQUEST_HEADER: [&str; 9] = [
    "id",
    "type",
    "title",
    "status",
    "amount",
    "current_stage",
    "approvals_recorded",
    "created_by",
    "created_at",
];

const QUOTATION_HEADER: [&str; 8] = [
    "id",
    "customer",
    "agent_id",
    "status",
    "signature_status",
    "total",
    "line_count",
    "created_at",
];

pub fn requests_to_csv(requests: &[Request]) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(REQUEST_HEADER)?;

    for request in requests {
        writer.write_record([
            request.id.0.as_str(),
            request.request_type.as_str(),
            request.title.as_str(),
            request.status.as_str(),
            &request.amount.to_string(),
            request.current_stage.map(|role| role.as_str()).unwrap_or(""),
            &request.approvals_recorded().to_string(),
            request.created_by.as_str(),
            &request.created_at.to_rfc3339(),
        ])?;
    }

    finish(writer)
}

pub fn quotations_to_csv(quotations: &[Quotation]) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(QUOTATION_HEADER)?;

    for quotation in quotations {
        writer.write_record([
            quotation.id.0.as_str(),
            quotation.customer_name.as_str(),
            quotation.agent_id.as_str(),
            quotation.status.as_str(),
            quotation.signature_status.as_str(),
            &quotation.total().to_string(),
            &quotation.lines.len().to_string(),
            &quotation.created_at.to_rfc3339(),
        ])?;
    }

    finish(writer)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let buffer = writer.into_inner().map_err(|err| ExportError::Buffer(err.to_string()))?;
    Ok(String::from_utf8(buffer)?)
}
