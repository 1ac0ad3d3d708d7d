//! Optional image recompression (§4.6), via the `image` crate as the
//! in-process stand-in for the spec's external image-processing
//! collaborator.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, GenericImageView, ImageEncoder};
use tracing::debug;

use crate::LOG_TARGET;

const JPEG_QUALITY: u8 = 85;
const PNG_CONVERT_THRESHOLD_BYTES: usize = 512 * 1024;
const MAX_DIMENSION: u32 = 1000;

fn clamp_dimensions(image: DynamicImage) -> DynamicImage {
    let (w, h) = image.dimensions();
    let longest = w.max(h);
    if longest <= MAX_DIMENSION {
        return image;
    }
    let scale = MAX_DIMENSION as f64 / longest as f64;
    let new_w = (w as f64 * scale).round().max(1.0) as u32;
    let new_h = (h as f64 * scale).round().max(1.0) as u32;
    image.resize(new_w, new_h, image::imageops::FilterType::Lanczos3)
}

fn encode_jpeg(image: &DynamicImage) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let rgb = image.to_rgb8();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), image::ExtendedColorType::Rgb8)
        .ok()?;
    Some(out)
}

fn encode_png(image: &DynamicImage) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let rgba = image.to_rgba8();
    PngEncoder::new_with_quality(
        &mut out,
        image::codecs::png::CompressionType::Best,
        image::codecs::png::FilterType::Adaptive,
    )
    .write_image(
        rgba.as_raw(),
        rgba.width(),
        rgba.height(),
        image::ExtendedColorType::Rgba8,
    )
    .ok()?;
    Some(out)
}

/// Recompresses `bytes` per §4.6's per-format table. Returns the
/// recompressed bytes along with their (possibly different) media type, or
/// `None` (keep the original) if decoding fails, or if the recompressed form
/// is not smaller than the input.
pub fn recompress(bytes: &[u8], content_type: &str) -> Option<(Vec<u8>, &'static str)> {
    let image = image::load_from_memory(bytes).ok()?;
    let image = clamp_dimensions(image);

    let (recompressed, out_content_type) = match content_type {
        "image/jpeg" => (encode_jpeg(&image)?, "image/jpeg"),
        "image/png" if bytes.len() > PNG_CONVERT_THRESHOLD_BYTES => (encode_jpeg(&image)?, "image/jpeg"),
        "image/png" => (encode_png(&image)?, "image/png"),
        // image's WebP encoder is lossless-only; approximate the spec's
        // "WebP quality 85" with the same lossy JPEG path used for large
        // PNGs, since a true lossy WebP re-encode isn't available here.
        "image/webp" => (encode_jpeg(&image)?, "image/jpeg"),
        _ => return None,
    };

    if recompressed.len() >= bytes.len() {
        debug!(target: LOG_TARGET, content_type, original = bytes.len(), recompressed = recompressed.len(), "recompression did not shrink, keeping original");
        return None;
    }
    Some((recompressed, out_content_type))
}

/// Decodes just enough of `bytes` to report its pixel dimensions; used by
/// tests to confirm the resize invariant.
pub fn decode_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::load_from_memory(bytes).ok().map(|img| img.dimensions())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn sample_jpeg(w: u32, h: u32) -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(w, h, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 100)
            .write_image(img.as_raw(), w, h, image::ExtendedColorType::Rgb8)
            .expect("encode");
        out
    }

    /// A noisy (low-compressibility) PNG, large enough to cross the
    /// convert-to-jpeg size threshold regardless of PNG's own compression.
    fn sample_large_png(w: u32, h: u32) -> Vec<u8> {
        let mut state: u32 = 0x1234_5678;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state
        };
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_fn(w, h, |_, _| Rgb([(next() % 256) as u8, (next() % 256) as u8, (next() % 256) as u8]));
        let mut out = Vec::new();
        PngEncoder::new_with_quality(
            &mut out,
            image::codecs::png::CompressionType::Best,
            image::codecs::png::FilterType::Adaptive,
        )
        .write_image(img.as_raw(), w, h, image::ExtendedColorType::Rgb8)
        .expect("encode");
        out
    }

    #[test]
    fn recompressing_a_high_quality_jpeg_shrinks_it() {
        let original = sample_jpeg(200, 200);
        let result = recompress(&original, "image/jpeg");
        assert!(result.is_some());
        let (bytes, content_type) = result.unwrap();
        assert!(bytes.len() < original.len());
        assert_eq!(content_type, "image/jpeg");
    }

    #[test]
    fn oversized_dimensions_are_clamped_to_1000px() {
        let original = sample_jpeg(2000, 500);
        let (bytes, _) = recompress(&original, "image/jpeg").expect("recompresses");
        let (w, h) = decode_dimensions(&bytes).expect("decodes");
        assert_eq!(w, 1000);
        assert_eq!(h, 250);
    }

    #[test]
    fn small_dimensions_are_not_enlarged() {
        let original = sample_jpeg(100, 50);
        let result = recompress(&original, "image/jpeg");
        if let Some((bytes, _)) = result {
            let (w, h) = decode_dimensions(&bytes).expect("decodes");
            assert_eq!(w, 100);
            assert_eq!(h, 50);
        }
    }

    #[test]
    fn large_png_converts_to_jpeg_and_is_labeled_accordingly() {
        let original = sample_large_png(600, 600);
        assert!(original.len() > PNG_CONVERT_THRESHOLD_BYTES);
        let (_, content_type) = recompress(&original, "image/png").expect("recompresses");
        assert_eq!(content_type, "image/jpeg");
    }

    #[test]
    fn webp_recompresses_to_jpeg_and_is_labeled_accordingly() {
        let original = sample_jpeg(200, 200);
        let (_, content_type) = recompress(&original, "image/webp").expect("recompresses");
        assert_eq!(content_type, "image/jpeg");
    }

    #[test]
    fn unrecognized_content_type_is_left_untouched() {
        assert!(recompress(b"not an image", "application/octet-stream").is_none());
    }
}
