//! Keypoint annotation of single-character crops by the vision model.

use std::path::Path;
use std::time::Duration;

use image::DynamicImage;
use inkstone_core::error::CoreError;
use inkstone_core::extraction::{validate_box_within, PixelBox};
use inkstone_core::imaging::{crop, decode_image, encode_png, normalize_for_analysis, ImageSize};
use inkstone_core::keypoints::{parse_analysis, AnalysisMetadata, KeypointAnalysis, ANALYSIS_PROMPT};
use inkstone_recognition::vision::VisionClient;

use crate::dispatch::ExternalCallDispatcher;

/// Sends character crops to the vision model and parses its guidance.
#[derive(Debug, Clone)]
pub struct KeypointAnnotator {
    client: VisionClient,
    dispatcher: ExternalCallDispatcher,
    timeout: Duration,
}

impl KeypointAnnotator {
    pub fn new(client: VisionClient, dispatcher: ExternalCallDispatcher, timeout: Duration) -> Self {
        Self {
            client,
            dispatcher,
            timeout,
        }
    }

    /// Annotate an uploaded crop given as encoded image bytes.
    pub async fn annotate_bytes(&self, bytes: Vec<u8>) -> Result<KeypointAnalysis, CoreError> {
        let image = run_blocking(move || decode_image(&bytes).map(|(image, _)| image)).await?;
        self.annotate(image).await
    }

    /// Annotate one character of a stored work image.
    pub async fn annotate_region(
        &self,
        image_path: &Path,
        region: PixelBox,
    ) -> Result<KeypointAnalysis, CoreError> {
        let bytes = tokio::fs::read(image_path).await.map_err(|e| {
            CoreError::Internal(format!("Failed to read {}: {e}", image_path.display()))
        })?;
        let image = run_blocking(move || crop_region(&bytes, region)).await?;
        self.annotate(image).await
    }

    /// Annotate a decoded crop.
    ///
    /// The crop is upscaled for analysis only; the result's metadata records
    /// the size actually sent to the model.
    pub async fn annotate(&self, image: DynamicImage) -> Result<KeypointAnalysis, CoreError> {
        let (png, size) = run_blocking(move || {
            let prepared = normalize_for_analysis(&image);
            let size = ImageSize {
                width: prepared.width(),
                height: prepared.height(),
            };
            encode_png(&prepared).map(|png| (png, size))
        })
        .await?;

        let client = self.client.clone();
        let reply = self
            .dispatcher
            .dispatch("vision_annotate", self.timeout, async move {
                client
                    .describe(ANALYSIS_PROMPT, &png, "image/png")
                    .await
                    .map_err(CoreError::from)
            })
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Vision call failed"))?;

        let mut analysis = parse_analysis(&reply).inspect_err(|e| {
            tracing::warn!(error = %e, reply_len = reply.len(), "Vision reply could not be parsed");
        })?;
        analysis.metadata = Some(AnalysisMetadata {
            image_size: size.to_string(),
            analysis_time: chrono::Utc::now(),
            model: self.client.model().to_string(),
        });

        tracing::info!(
            character = %analysis.character,
            keypoints = analysis.keypoints.len(),
            image_size = %size,
            "Keypoint analysis complete",
        );
        Ok(analysis)
    }
}

/// Decode a work image and cut out one character box.
fn crop_region(bytes: &[u8], region: PixelBox) -> Result<DynamicImage, CoreError> {
    let (image, _) = decode_image(bytes)?;
    validate_box_within(&region, image.width() as i32, image.height() as i32)?;
    Ok(crop(
        &image,
        region.x as u32,
        region.y as u32,
        region.width as u32,
        region.height as u32,
    ))
}

/// Run CPU-bound image work off the async executor.
async fn run_blocking<T, F>(work: F) -> Result<T, CoreError>
where
    F: FnOnce() -> Result<T, CoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| CoreError::Internal(format!("Image task failed: {e}")))?
}
