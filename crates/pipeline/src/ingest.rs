//! OCR ingestion: base64 image in, ordered boxes and an audit artifact out.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use inkstone_core::error::CoreError;
use inkstone_core::imaging::{probe_dimensions, ImageSize};
use inkstone_core::ocr::{decode_image_payload, flatten_response, OcrBox, OcrOptions};
use inkstone_recognition::ocr::OcrClient;
use serde::{Deserialize, Serialize};

use crate::artifacts::ArtifactStore;
use crate::dispatch::ExternalCallDispatcher;

/// An ingestion request as submitted by clients.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    /// Base64 image, optionally as a `data:` URL.
    #[serde(alias = "image_base64")]
    pub image: String,
    #[serde(flatten)]
    pub options: OcrOptions,
}

/// Result of one OCR call.
#[derive(Debug, Clone, Serialize)]
pub struct IngestResult {
    pub boxes: Vec<OcrBox>,
    /// Natural size of the submitted image, when it could be read.
    pub image_size: Option<ImageSize>,
    /// Where the raw response was persisted. Pass this to work creation to
    /// link the work to its recognition record.
    pub artifact_path: String,
}

/// Runs OCR through the shared dispatcher and records every response.
#[derive(Debug, Clone)]
pub struct OcrIngestionService {
    client: OcrClient,
    artifacts: ArtifactStore,
    dispatcher: ExternalCallDispatcher,
    timeout: Duration,
}

impl OcrIngestionService {
    pub fn new(
        client: OcrClient,
        artifacts: ArtifactStore,
        dispatcher: ExternalCallDispatcher,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            artifacts,
            dispatcher,
            timeout,
        }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Recognize an image.
    ///
    /// The raw response is written to the artifact store before boxes are
    /// derived, so a failure afterwards still leaves the audit copy.
    pub async fn ingest(
        &self,
        image_base64: &str,
        options: &OcrOptions,
    ) -> Result<IngestResult, CoreError> {
        let bytes = decode_image_payload(image_base64)?;
        let image_size = probe_dimensions(&bytes).map(|(width, height)| ImageSize { width, height });
        if image_size.is_none() {
            tracing::debug!(bytes = bytes.len(), "Could not read natural image size");
        }

        let encoded = STANDARD.encode(&bytes);
        let client = self.client.clone();
        let call_options = options.clone();
        let reply = self
            .dispatcher
            .dispatch("ocr_ingest", self.timeout, async move {
                client
                    .recognize(&encoded, &call_options)
                    .await
                    .map_err(CoreError::from)
            })
            .await
            .inspect_err(|e| tracing::error!(error = %e, "OCR call failed"))?;

        let path = self.artifacts.write(reply.body.as_bytes(), chrono::Utc::now()).await?;
        let artifact_path = path.to_string_lossy().into_owned();

        let boxes = flatten_response(&reply.value).inspect_err(|e| {
            tracing::error!(artifact_path = %artifact_path, error = %e, "OCR response could not be flattened");
        })?;

        tracing::info!(
            artifact_path = %artifact_path,
            boxes = boxes.len(),
            det_mode = %options.det_mode,
            "OCR ingestion complete",
        );

        Ok(IngestResult {
            boxes,
            image_size,
            artifact_path,
        })
    }
}
