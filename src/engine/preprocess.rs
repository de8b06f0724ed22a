//! Image preprocessing for the detection and embedding models.
//!
//! Converts decoded pixel buffers into the channel-first layouts each model
//! expects, and maps normalized bounding boxes back into pixel-space crop
//! rectangles. All functions here are pure over the provided buffers.

use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;

use crate::engine::tensor::Tensor;
use crate::error::InferenceError;

/// Fixed input size of the detection model.
pub const DETECTOR_INPUT_SIZE: (u32, u32) = (640, 640);

/// Fixed input size of the embedding model.
pub const EMBEDDER_INPUT_SIZE: (u32, u32) = (224, 224);

/// ImageNet per-channel normalization constants used by the embedder.
/// These are fixed configuration, never computed from the input.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Integer pixel rectangle inside the source image.
///
/// `width` and `height` are always at least 1 and never extend past the
/// image bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// Decode raw image bytes (JPEG, PNG, ...) into a pixel buffer.
pub fn decode_image(data: &[u8]) -> Result<DynamicImage, InferenceError> {
    image::load_from_memory(data).map_err(|e| InferenceError::decode("decode", e))
}

/// Encode an image for the detector: stretch to the fixed input size and
/// scale intensities to [0, 1].
///
/// The resize deliberately does not preserve aspect ratio ("fill" fit);
/// that matches the detector's training preprocessing.
pub fn encode_for_detector(image: &DynamicImage) -> Tensor {
    let (width, height) = DETECTOR_INPUT_SIZE;
    let resized = image.resize_exact(width, height, FilterType::Lanczos3);
    // to_rgb8 also strips any alpha channel.
    let rgb = resized.to_rgb8();

    let mut chw = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            chw[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }
    Tensor::from(chw)
}

/// Encode a cropped detection for the embedder: stretch to the fixed input
/// size, then standardize each channel with the ImageNet constants:
/// `(pixel/255 - mean[c]) / std[c]`.
pub fn encode_for_embedder(image: &DynamicImage) -> Tensor {
    let (width, height) = EMBEDDER_INPUT_SIZE;
    let resized = image.resize_exact(width, height, FilterType::Lanczos3);
    let rgb = resized.to_rgb8();

    let mut chw = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            chw[[0, c, y as usize, x as usize]] = (value - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }
    Tensor::from(chw)
}

/// Map a normalized `[x1, y1, x2, y2]` box into integer pixel coordinates
/// against the original image dimensions.
///
/// The rectangle is clamped into the image and floored to a 1x1 minimum,
/// so even a degenerate zero-area box yields a croppable rectangle.
pub fn denormalize_box(bbox: [f32; 4], orig_width: u32, orig_height: u32) -> PixelRect {
    let [x1, y1, x2, y2] = bbox;

    let left = ((x1 * orig_width as f32).floor().max(0.0) as u32).min(orig_width.saturating_sub(1));
    let top = ((y1 * orig_height as f32).floor().max(0.0) as u32).min(orig_height.saturating_sub(1));

    let right = (x2 * orig_width as f32).ceil().max(0.0) as u32;
    let bottom = (y2 * orig_height as f32).ceil().max(0.0) as u32;

    let max_width = orig_width - left;
    let max_height = orig_height - top;
    let width = right.saturating_sub(left).clamp(1, max_width.max(1));
    let height = bottom.saturating_sub(top).clamp(1, max_height.max(1));

    PixelRect {
        left,
        top,
        width,
        height,
    }
}

/// Crop the source image to a detection rectangle.
pub fn crop_detection(image: &DynamicImage, rect: PixelRect) -> DynamicImage {
    image.crop_imm(rect.left, rect.top, rect.width, rect.height)
}
