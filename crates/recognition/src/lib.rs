//! HTTP clients for the remote recognition services.
//!
//! - [`ocr::OcrClient`] submits whole work images to the OCR endpoint.
//! - [`vision::VisionClient`] sends a single character crop to a
//!   vision-capable chat completion endpoint.
//!
//! Neither client retries. Every failure is surfaced to the caller with
//! enough detail to tell a network failure from a malformed reply.

pub mod ocr;
pub mod vision;

/// Read a non-2xx body for diagnostics without failing on unreadable bytes.
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string())
}
