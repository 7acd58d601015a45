//! Image normalization for stored works and for vision-model analysis.
//!
//! Two independent transforms live here:
//!
//! - [`normalize_for_storage`] caps the width of an uploaded work image at
//!   [`STORAGE_MAX_WIDTH`]. Its output dimensions are the coordinate space
//!   every character box on the work is expressed in.
//! - [`normalize_for_analysis`] upscales a character crop so its shorter side
//!   is at least [`ANALYSIS_MIN_SIDE`]. The result is only ever sent to the
//!   vision model and never persisted.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use serde::Serialize;

use crate::error::CoreError;
use crate::extraction::ScaleFactor;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Stored work images are never wider than this many pixels.
pub const STORAGE_MAX_WIDTH: u32 = 800;

/// Crops sent to the vision model have a shorter side of at least this many pixels.
pub const ANALYSIS_MIN_SIDE: u32 = 300;

/// Extensions accepted for work uploads.
pub const WORK_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

/// Extensions accepted for single-character analysis uploads.
pub const ANALYSIS_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Default byte cap for work uploads (16 MiB).
pub const DEFAULT_WORK_MAX_BYTES: usize = 16 * 1024 * 1024;

/// Default byte cap for analysis uploads (10 MiB).
pub const DEFAULT_ANALYSIS_MAX_BYTES: usize = 10 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Upload policy
// ---------------------------------------------------------------------------

/// Size and extension limits applied to an uploaded file before decoding.
#[derive(Debug, Clone, Copy)]
pub struct UploadPolicy {
    pub max_bytes: usize,
    pub allowed_extensions: &'static [&'static str],
}

impl UploadPolicy {
    pub fn work(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            allowed_extensions: WORK_IMAGE_EXTENSIONS,
        }
    }

    pub fn analysis(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            allowed_extensions: ANALYSIS_IMAGE_EXTENSIONS,
        }
    }

    /// Check a file name and payload size, returning the lowercased extension.
    pub fn check(&self, file_name: &str, size: usize) -> Result<String, CoreError> {
        let ext = match file_name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => ext.to_lowercase(),
            _ => return Err(CoreError::InvalidExtension(file_name.to_string())),
        };
        if !self.allowed_extensions.contains(&ext.as_str()) {
            return Err(CoreError::InvalidExtension(ext));
        }
        if size > self.max_bytes {
            return Err(CoreError::FileTooLarge {
                size,
                max: self.max_bytes,
            });
        }
        Ok(ext)
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode raster bytes, sniffing the format from the content.
pub fn decode_image(bytes: &[u8]) -> Result<(DynamicImage, ImageFormat), CoreError> {
    let format = image::guess_format(bytes)
        .map_err(|e| CoreError::UnsupportedFormat(e.to_string()))?;
    let image = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| CoreError::UnsupportedFormat(e.to_string()))?;
    Ok((image, format))
}

/// Read pixel dimensions from the image header without a full decode.
///
/// Best-effort: returns `None` for anything that does not look like an image.
pub fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

// ---------------------------------------------------------------------------
// Storage normalization
// ---------------------------------------------------------------------------

/// An image ready to be written to the upload directory.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Dimensions of the image as uploaded.
    pub original_width: u32,
    pub original_height: u32,
    pub format: ImageFormat,
    /// Maps original-image coordinates into stored-image coordinates.
    pub scale: ScaleFactor,
}

impl NormalizedImage {
    /// File extension matching [`NormalizedImage::format`].
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("png")
    }
}

/// Compute the stored dimensions for an image of the given size.
///
/// Width is capped at [`STORAGE_MAX_WIDTH`]; height follows the aspect ratio
/// and never drops below one pixel.
pub fn storage_dimensions(width: u32, height: u32) -> (u32, u32) {
    if width <= STORAGE_MAX_WIDTH {
        return (width, height);
    }
    let ratio = STORAGE_MAX_WIDTH as f64 / width as f64;
    let new_height = ((height as f64) * ratio).round().max(1.0) as u32;
    (STORAGE_MAX_WIDTH, new_height)
}

/// Downscale an uploaded work image to the storage width cap.
///
/// Images already within the cap are returned byte-for-byte. Resized JPEGs
/// stay JPEG; every other resized format is re-encoded as PNG.
pub fn normalize_for_storage(bytes: &[u8]) -> Result<NormalizedImage, CoreError> {
    let (image, format) = decode_image(bytes)?;
    let (original_width, original_height) = (image.width(), image.height());
    let (width, height) = storage_dimensions(original_width, original_height);

    if (width, height) == (original_width, original_height) {
        return Ok(NormalizedImage {
            bytes: bytes.to_vec(),
            width,
            height,
            original_width,
            original_height,
            format,
            scale: ScaleFactor::IDENTITY,
        });
    }

    let resized = image.resize_exact(width, height, FilterType::Lanczos3);
    let (out_format, out_image) = match format {
        ImageFormat::Jpeg => (ImageFormat::Jpeg, DynamicImage::ImageRgb8(resized.to_rgb8())),
        _ => (ImageFormat::Png, DynamicImage::ImageRgba8(resized.to_rgba8())),
    };
    let encoded = encode(&out_image, out_format)?;

    Ok(NormalizedImage {
        bytes: encoded,
        width,
        height,
        original_width,
        original_height,
        format: out_format,
        scale: ScaleFactor::between((original_width, original_height), (width, height)),
    })
}

// ---------------------------------------------------------------------------
// Analysis normalization
// ---------------------------------------------------------------------------

/// Upscale a crop so its shorter side is at least [`ANALYSIS_MIN_SIDE`].
///
/// The result is always RGB. Crops that are already large enough keep their size.
pub fn normalize_for_analysis(image: &DynamicImage) -> DynamicImage {
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let (width, height) = (rgb.width(), rgb.height());
    let min_side = width.min(height);
    if min_side == 0 || min_side >= ANALYSIS_MIN_SIDE {
        return rgb;
    }
    let scale = ANALYSIS_MIN_SIDE as f64 / min_side as f64;
    let new_width = ((width as f64) * scale).ceil() as u32;
    let new_height = ((height as f64) * scale).ceil() as u32;
    rgb.resize_exact(new_width, new_height, FilterType::Lanczos3)
}

/// Encode an image as PNG bytes.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, CoreError> {
    encode(image, ImageFormat::Png)
}

fn encode(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, CoreError> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, format)
        .map_err(|e| CoreError::Internal(format!("image encoding failed: {e}")))?;
    Ok(buf.into_inner())
}

/// Crop a pixel region out of a stored work image.
pub fn crop(image: &DynamicImage, x: u32, y: u32, width: u32, height: u32) -> DynamicImage {
    image.crop_imm(x, y, width, height)
}

/// Dimensions formatted as `WIDTHxHEIGHT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
