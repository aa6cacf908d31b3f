use super::{GalleryError, IMAGE_EXTENSIONS, UploadLimits};
use image::{DynamicImage, ImageEncoder, codecs::jpeg::JpegEncoder, imageops::FilterType};
use tracing::{debug, warn};

/// Media type stored verbatim so animation survives.
const PASSTHROUGH_MEDIA_TYPE: &str = "image/gif";
const RECOMPRESSED_EXTENSION: &str = "jpg";

/// Bytes ready to be written for one upload, with the extension matching
/// their actual encoding.
#[derive(Debug)]
pub(crate) struct ProcessedImage {
    pub bytes: Vec<u8>,
    pub extension: String,
    pub recompressed: bool,
}

/// Turn one uploaded payload into what gets stored.
///
/// GIFs pass through untouched. Everything else is re-encoded as JPEG,
/// shrunk to fit the bounding box when larger. When re-encoding fails the
/// original bytes are kept under an extension derived from their content;
/// `None` means the payload could not be identified as a gallery image.
pub(crate) fn process_upload(
    bytes: Vec<u8>,
    content_type: &str,
    limits: &UploadLimits,
    name: &str,
) -> Option<ProcessedImage> {
    if content_type.eq_ignore_ascii_case(PASSTHROUGH_MEDIA_TYPE) {
        debug!("Preserving GIF format for {}", name);
        return Some(ProcessedImage {
            bytes,
            extension: "gif".to_string(),
            recompressed: false,
        });
    }

    match recompress(&bytes, limits) {
        Ok(compressed) => Some(ProcessedImage {
            bytes: compressed,
            extension: RECOMPRESSED_EXTENSION.to_string(),
            recompressed: true,
        }),
        Err(e) => {
            warn!("Failed to compress {}, keeping original: {}", name, e);
            let extension = original_extension(&bytes, content_type)?;
            Some(ProcessedImage {
                bytes,
                extension,
                recompressed: false,
            })
        }
    }
}

fn recompress(bytes: &[u8], limits: &UploadLimits) -> Result<Vec<u8>, GalleryError> {
    let img = image::load_from_memory(bytes)?;
    let fitted = fit_within(img, limits.max_width, limits.max_height);

    // JPEG doesn't support alpha channel, so convert to RGB
    let rgb_image = fitted.to_rgb8();
    let mut output = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut output, limits.jpeg_quality);
    encoder.write_image(
        &rgb_image,
        rgb_image.width(),
        rgb_image.height(),
        image::ExtendedColorType::Rgb8,
    )?;

    Ok(output)
}

/// Shrink to fit the bounding box, preserving aspect ratio. Never upscales.
pub(crate) fn fit_within(img: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    if img.width() > max_width || img.height() > max_height {
        img.resize(max_width, max_height, FilterType::Lanczos3)
    } else {
        img
    }
}

/// Extension for bytes kept as uploaded: sniffed format first, then the
/// declared media type.
fn original_extension(bytes: &[u8], content_type: &str) -> Option<String> {
    let sniffed = image::guess_format(bytes)
        .ok()
        .map(|format| format.extensions_str())
        .unwrap_or_default();
    let declared = mime_guess::get_mime_extensions_str(content_type).unwrap_or_default();

    sniffed
        .iter()
        .chain(declared.iter())
        .map(|ext| ext.to_lowercase())
        .find(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}
