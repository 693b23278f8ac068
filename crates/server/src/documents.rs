//! Printable document rendering. Templates are compiled into the binary;
//! PDF conversion shells out to `wkhtmltopdf` when the binary is on PATH
//! and degrades to the HTML rendering when it is not, so a missing
//! converter never turns into a failed request.

use std::path::PathBuf;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use tera::{Context, Tera};
use thiserror::Error;
use tracing::warn;

use reqflow_core::{Quotation, QuotationLine, Request};

const REQUEST_TEMPLATE: &str = "request_summary";
const QUOTATION_TEMPLATE: &str = "quotation_summary";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("template rendering failed: {0}")]
    Template(#[from] tera::Error),
}

/// Requested output format. Defaults to PDF, which itself falls back to
/// HTML when conversion is unavailable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DocumentFormat {
    #[default]
    Pdf,
    Html,
}

impl DocumentFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "html" => Some(Self::Html),
            _ => None,
        }
    }
}

pub enum RenderedDocument {
    Pdf(Vec<u8>),
    Html(String),
}

impl RenderedDocument {
    /// Builds the download response. The filename extension follows the
    /// format actually produced, not the one requested.
    pub fn into_response(self, filename_stem: &str) -> Response {
        match self {
            Self::Pdf(bytes) => (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/pdf".to_owned()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{filename_stem}.pdf\""),
                    ),
                ],
                bytes,
            )
                .into_response(),
            Self::Html(html) => (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/html; charset=utf-8".to_owned()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("inline; filename=\"{filename_stem}.html\""),
                    ),
                ],
                html,
            )
                .into_response(),
        }
    }
}

pub struct DocumentRenderer {
    tera: Tera,
    wkhtmltopdf_path: Option<PathBuf>,
}

impl DocumentRenderer {
    pub fn new() -> Result<Self, DocumentError> {
        let mut tera = Tera::default();
        tera.add_raw_template(
            REQUEST_TEMPLATE,
            include_str!("../../../templates/documents/request_summary.html.tera"),
        )?;
        tera.add_raw_template(
            QUOTATION_TEMPLATE,
            include_str!("../../../templates/documents/quotation_summary.html.tera"),
        )?;

        let wkhtmltopdf_path = which::which("wkhtmltopdf").ok();
        if wkhtmltopdf_path.is_none() {
            warn!(
                event_name = "documents.pdf_unavailable",
                "wkhtmltopdf not found on PATH, documents will render as HTML"
            );
        }

        Ok(Self { tera, wkhtmltopdf_path })
    }

    pub async fn render_request(
        &self,
        request: &Request,
        format: DocumentFormat,
    ) -> Result<RenderedDocument, DocumentError> {
        let mut context = Context::new();
        context.insert("request", request);
        context.insert("generated_at", &Utc::now().to_rfc3339());

        let html = self.tera.render(REQUEST_TEMPLATE, &context)?;
        Ok(self.finish(html, format).await)
    }

    pub async fn render_quotation(
        &self,
        quotation: &Quotation,
        format: DocumentFormat,
    ) -> Result<RenderedDocument, DocumentError> {
        let line_totals: Vec<_> =
            quotation.lines.iter().map(QuotationLine::line_total).collect();

        let mut context = Context::new();
        context.insert("quotation", quotation);
        context.insert("line_totals", &line_totals);
        context.insert("total", &quotation.total());
        context.insert("generated_at", &Utc::now().to_rfc3339());

        let html = self.tera.render(QUOTATION_TEMPLATE, &context)?;
        Ok(self.finish(html, format).await)
    }

    async fn finish(&self, html: String, format: DocumentFormat) -> RenderedDocument {
        if format == DocumentFormat::Html {
            return RenderedDocument::Html(html);
        }

        let Some(converter) = &self.wkhtmltopdf_path else {
            return RenderedDocument::Html(html);
        };

        match convert_to_pdf(converter, &html).await {
            Ok(bytes) => RenderedDocument::Pdf(bytes),
            Err(reason) => {
                warn!(
                    event_name = "documents.pdf_conversion_failed",
                    %reason,
                    "falling back to HTML rendering"
                );
                RenderedDocument::Html(html)
            }
        }
    }
}

/// Runs `wkhtmltopdf` over a pair of scratch files. Any failure along the
/// way is reported as a string so the caller can fall back.
async fn convert_to_pdf(converter: &PathBuf, html: &str) -> Result<Vec<u8>, String> {
    let stem = uuid::Uuid::new_v4();
    let html_path = std::env::temp_dir().join(format!("reqflow-{stem}.html"));
    let pdf_path = std::env::temp_dir().join(format!("reqflow-{stem}.pdf"));

    tokio::fs::write(&html_path, html).await.map_err(|e| e.to_string())?;

    let result = async {
        let status = tokio::process::Command::new(converter)
            .arg("--quiet")
            .arg(&html_path)
            .arg(&pdf_path)
            .status()
            .await
            .map_err(|e| e.to_string())?;
        if !status.success() {
            return Err(format!("wkhtmltopdf exited with {status}"));
        }
        tokio::fs::read(&pdf_path).await.map_err(|e| e.to_string())
    }
    .await;

    let _ = tokio::fs::remove_file(&html_path).await;
    let _ = tokio::fs::remove_file(&pdf_path).await;

    result
}
