//! Media pipeline
//!
//! Turns user-supplied image data into a stored reference:
//! 1. Validate the declared MIME type and sniff the bytes
//! 2. Downscale so neither side exceeds `max_dimension`
//! 3. Encode as JPEG, with at most one lower-quality retry
//! 4. Upload to the media host (or inline as a data URI when none is set)
//!
//! Decoding and encoding are CPU-bound and run on the blocking pool.

use super::media_host::{MediaError, MediaHost};
use aac_common::config::MediaConfig;
use aac_common::models::MediaRef;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use std::sync::Arc;
use tracing::{debug, warn};

const OUTPUT_MIME: &str = "image/jpeg";

/// Image input accepted by [`MediaPipeline::ingest`]
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Raw file contents with the MIME type the caller declared
    Bytes { data: Vec<u8>, mime: String },
    /// `data:<mime>;base64,<payload>`
    DataUri(String),
    /// Already hosted image, stored as-is
    Url(String),
}

/// Compressed image ready for upload
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub width: u32,
    pub height: u32,
    pub quality_used: u8,
}

/// Size and quality limits for processed images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaLimits {
    pub max_dimension: u32,
    pub target_bytes: usize,
    pub hard_ceiling_bytes: usize,
    pub quality: u8,
    pub fallback_quality: u8,
}

impl From<&MediaConfig> for MediaLimits {
    fn from(config: &MediaConfig) -> Self {
        Self {
            max_dimension: config.max_dimension,
            target_bytes: config.target_bytes,
            hard_ceiling_bytes: config.hard_ceiling_bytes,
            quality: config.quality,
            fallback_quality: config.fallback_quality,
        }
    }
}

impl Default for MediaLimits {
    fn default() -> Self {
        Self::from(&MediaConfig::default())
    }
}

/// Image ingestion front-end for the media host
#[derive(Clone)]
pub struct MediaPipeline {
    host: Option<Arc<dyn MediaHost>>,
    limits: MediaLimits,
    folder: String,
}

impl MediaPipeline {
    pub fn new(host: Option<Arc<dyn MediaHost>>, limits: MediaLimits, folder: impl Into<String>) -> Self {
        Self {
            host,
            limits,
            folder: folder.into(),
        }
    }

    /// Pipeline that compresses but keeps images inline
    pub fn without_host() -> Self {
        let config = MediaConfig::default();
        Self::new(None, MediaLimits::from(&config), config.folder)
    }

    pub fn has_host(&self) -> bool {
        self.host.is_some()
    }

    pub fn limits(&self) -> MediaLimits {
        self.limits
    }

    /// Validate, resize and compress on the blocking pool
    pub async fn process(&self, data: Vec<u8>, declared_mime: &str) -> Result<ProcessedImage, MediaError> {
        let limits = self.limits;
        let declared_mime = declared_mime.to_string();
        tokio::task::spawn_blocking(move || compress_image(&data, &declared_mime, &limits))
            .await
            .map_err(|e| MediaError::Encode(format!("image worker failed: {}", e)))?
    }

    /// Turn an image source into a stored reference
    ///
    /// With a media host the processed image is uploaded and the reference
    /// carries its deletion handle; without one it is inlined as a data URI.
    pub async fn ingest(&self, source: ImageSource) -> Result<MediaRef, MediaError> {
        let (data, mime) = match source {
            ImageSource::Url(url) => {
                if url.starts_with("https://") || url.starts_with("http://") || url.starts_with('/') {
                    return Ok(MediaRef::unhosted(url));
                }
                return Err(MediaError::InvalidSource(format!("unsupported URL scheme: {}", url)));
            }
            ImageSource::DataUri(uri) => decode_data_uri(&uri)?,
            ImageSource::Bytes { data, mime } => (data, mime),
        };

        let processed = self.process(data, &mime).await?;
        debug!(
            width = processed.width,
            height = processed.height,
            size = processed.bytes.len(),
            quality = processed.quality_used,
            "Image processed"
        );

        match &self.host {
            Some(host) => {
                let uploaded = host.upload(processed.bytes, processed.mime, &self.folder).await?;
                Ok(MediaRef {
                    url: uploaded.url,
                    public_id: Some(uploaded.public_id),
                })
            }
            None => Ok(MediaRef::unhosted(encode_data_uri(processed.mime, &processed.bytes))),
        }
    }

    /// Best-effort removal of a hosted image
    ///
    /// Failures are logged and reported as `false`; callers continue with
    /// their own record removal either way.
    pub async fn delete(&self, public_id: &str) -> bool {
        let Some(host) = &self.host else {
            warn!(public_id = %public_id, "No media host configured, leaving hosted image in place");
            return false;
        };

        match host.destroy(public_id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(public_id = %public_id, error = %e, "Media deletion failed, continuing");
                false
            }
        }
    }
}

/// Split a base64 data URI into MIME type and payload bytes
pub fn decode_data_uri(uri: &str) -> Result<(Vec<u8>, String), MediaError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| MediaError::InvalidSource("not a data URI".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| MediaError::InvalidSource("data URI has no payload".to_string()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| MediaError::InvalidSource("only base64 data URIs are supported".to_string()))?;

    let data = STANDARD
        .decode(payload.trim())
        .map_err(|e| MediaError::InvalidSource(format!("bad base64 payload: {}", e)))?;

    Ok((data, mime.to_string()))
}

pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// MIME type of `data` when its magic bytes name an image format
pub fn sniff_image_mime(data: &[u8]) -> Option<&'static str> {
    infer::get(data)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
        .map(|kind| kind.mime_type())
}

/// Synchronous validate + resize + encode
pub fn compress_image(data: &[u8], declared_mime: &str, limits: &MediaLimits) -> Result<ProcessedImage, MediaError> {
    if !declared_mime.to_ascii_lowercase().starts_with("image/") {
        return Err(MediaError::UnsupportedType(declared_mime.to_string()));
    }
    if data.is_empty() {
        return Err(MediaError::InvalidSource("empty image data".to_string()));
    }

    match infer::get(data) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => {}
        Some(kind) => return Err(MediaError::UnsupportedType(kind.mime_type().to_string())),
        None => return Err(MediaError::UnsupportedType("unrecognised content".to_string())),
    }

    let img = image::load_from_memory(data).map_err(|e| MediaError::Decode(e.to_string()))?;
    let img = fit_within(img, limits.max_dimension);

    let mut quality = limits.quality;
    let mut bytes = encode_jpeg(&img, quality)?;

    if bytes.len() > limits.target_bytes {
        debug!(
            size = bytes.len(),
            target = limits.target_bytes,
            "Over target size, re-encoding at fallback quality"
        );
        quality = limits.fallback_quality;
        bytes = encode_jpeg(&img, quality)?;
    }

    if bytes.len() > limits.hard_ceiling_bytes {
        return Err(MediaError::TooLarge {
            size: bytes.len(),
            limit: limits.hard_ceiling_bytes,
        });
    }

    Ok(ProcessedImage {
        bytes,
        mime: OUTPUT_MIME,
        width: img.width(),
        height: img.height(),
        quality_used: quality,
    })
}

/// Downscale preserving aspect ratio; smaller images are left untouched
fn fit_within(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    if img.width() <= max_dimension && img.height() <= max_dimension {
        return img;
    }
    img.resize(max_dimension, max_dimension, FilterType::Triangle)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, MediaError> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    img.to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| MediaError::Encode(e.to_string()))?;
    Ok(buffer)
}
