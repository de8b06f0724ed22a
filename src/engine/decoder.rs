//! Detector raw-output decoder.
//!
//! Interprets the detector's output tensor as `[1, N, 6]` rows of
//! `[x1, y1, x2, y2, score, class]`, already normalized to the detector's
//! input space, and applies the confidence threshold. Rows are emitted in
//! input order; overlapping or duplicate boxes are passed through as-is
//! (no non-max suppression; a known, accepted limitation).

use crate::engine::tensor::Tensor;
use crate::error::InferenceError;

/// Values per detection row.
const ROW_FIELDS: usize = 6;

/// One thresholded detector row, before embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    /// Normalized `[x1, y1, x2, y2]` in input-image space.
    pub bbox: [f32; 4],
    pub confidence: f32,
    pub class_id: u32,
}

/// Decode the detector output, keeping every row whose score is at or above
/// `confidence_threshold` (strict less-than discards).
pub fn decode(
    output: &Tensor,
    confidence_threshold: f32,
) -> Result<Vec<RawDetection>, InferenceError> {
    let shape = output.shape();
    if shape.len() != 3 || shape[0] != 1 || shape[2] != ROW_FIELDS {
        return Err(InferenceError::Run(format!(
            "unexpected detector output shape {shape:?}, expected [1, N, {ROW_FIELDS}]"
        )));
    }

    let mut detections = Vec::new();
    for row in output.data().chunks_exact(ROW_FIELDS) {
        let score = row[4];
        if score < confidence_threshold {
            continue;
        }
        detections.push(RawDetection {
            bbox: [row[0], row[1], row[2], row[3]],
            confidence: score,
            class_id: row[5].round().max(0.0) as u32,
        });
    }
    Ok(detections)
}
