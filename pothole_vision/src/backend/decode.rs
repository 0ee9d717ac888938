// Output decoding is model-specific, so it is a swappable strategy rather than
// a fixed function. A decoder knows one output layout and turns it into
// `DetectionBox`es in the coordinates of the original image.
//
// `YoloV8Decoder` handles the common single-head layout `[1, 4 + classes, N]`:
// for each of the N proposals, rows 0-3 hold `cx, cy, w, h` in input-tensor pixels
// and the remaining rows hold per-class scores. Overlaps are resolved with classic
// confidence-ordered non-maximum suppression (lower-scored boxes are dropped, not
// unioned).
//
// `UnsupportedDecoder` stands for "this model's layout is not known yet" and
// reports that as an error instead of silently returning nothing.

use crate::backend::engine::ModelOutput;
use crate::core_modules::detection_box::{DetectionBox, POTHOLE_LABEL};
use crate::error::{DetectorError, Result};
use ndarray::ArrayView2;
use std::cmp::Ordering;

/// What a decoder needs to map model space back to image space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeContext {
    pub image_width: u32,
    pub image_height: u32,
    /// Side of the square tensor the image was resampled to.
    pub input_size: u32,
}

pub trait OutputDecoder: Send + Sync {
    fn decode(&self, output: &ModelOutput, context: &DecodeContext) -> Result<Vec<DetectionBox>>;
}

/// Placeholder for models whose output layout has no decoder yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedDecoder;

impl OutputDecoder for UnsupportedDecoder {
    fn decode(&self, output: &ModelOutput, _context: &DecodeContext) -> Result<Vec<DetectionBox>> {
        log::warn!(
            "no decoder for model output of shape {:?} ({} values)",
            output.shape,
            output.data.len()
        );
        Err(DetectorError::DecodeUnsupported)
    }
}

/// Decoder for YOLOv8-style `[1, 4 + classes, N]` detection heads.
#[derive(Debug, Clone)]
pub struct YoloV8Decoder {
    /// Class row reported as a detection.
    pub class_index: usize,
    pub label: String,
    /// Minimum class score for a proposal to be considered.
    pub score_threshold: f64,
    /// IoU at or above which the lower-scored of two boxes is suppressed.
    pub nms_iou_threshold: f64,
}

impl Default for YoloV8Decoder {
    fn default() -> Self {
        Self {
            class_index: 0,
            label: POTHOLE_LABEL.to_string(),
            score_threshold: 0.25,
            nms_iou_threshold: 0.45,
        }
    }
}

impl YoloV8Decoder {
    fn proposals<'a>(&self, output: &'a ModelOutput) -> Result<ArrayView2<'a, f32>> {
        let (features, count) = match output.shape.as_slice() {
            [1, features, count] => (*features, *count),
            [features, count] => (*features, *count),
            other => {
                return Err(DetectorError::Decode(format!(
                    "expected a [1, 4 + classes, N] tensor, got {:?}",
                    other
                )));
            }
        };

        if features < 5 || self.class_index >= features - 4 {
            return Err(DetectorError::Decode(format!(
                "class {} not present in {} feature rows",
                self.class_index, features
            )));
        }

        ArrayView2::from_shape((features, count), &output.data)
            .map_err(|e| DetectorError::Decode(e.to_string()))
    }
}

impl OutputDecoder for YoloV8Decoder {
    fn decode(&self, output: &ModelOutput, context: &DecodeContext) -> Result<Vec<DetectionBox>> {
        let proposals = self.proposals(output)?;
        let class_row = 4 + self.class_index;

        let scale_x = context.image_width as f64 / context.input_size as f64;
        let scale_y = context.image_height as f64 / context.input_size as f64;
        let image_width = context.image_width as f64;
        let image_height = context.image_height as f64;

        let mut candidates = Vec::new();
        for proposal in proposals.columns() {
            let score = proposal[class_row] as f64;
            if !score.is_finite() || score < self.score_threshold {
                continue;
            }

            // Another class claims this proposal.
            let best_other = proposal
                .iter()
                .skip(4)
                .enumerate()
                .filter(|(class, _)| *class != self.class_index)
                .map(|(_, &s)| s as f64)
                .fold(f64::MIN, f64::max);
            if best_other > score {
                continue;
            }

            let (cx, cy) = (proposal[0] as f64, proposal[1] as f64);
            let (w, h) = (proposal[2] as f64, proposal[3] as f64);
            if ![cx, cy, w, h].iter().all(|v| v.is_finite()) {
                continue;
            }

            let x1 = ((cx - w / 2.0) * scale_x).max(0.0);
            let y1 = ((cy - h / 2.0) * scale_y).max(0.0);
            let x2 = ((cx + w / 2.0) * scale_x).min(image_width);
            let y2 = ((cy + h / 2.0) * scale_y).min(image_height);
            if x2 <= x1 || y2 <= y1 {
                continue;
            }

            candidates.push(DetectionBox::new(
                x1,
                y1,
                x2 - x1,
                y2 - y1,
                self.label.clone(),
                score.min(1.0),
            ));
        }

        log::debug!(
            "decoded {} candidates from {} proposals",
            candidates.len(),
            proposals.ncols()
        );
        Ok(non_maximum_suppression(candidates, self.nms_iou_threshold))
    }
}

/// Keeps the highest-confidence box of every overlapping group, dropping the rest.
pub fn non_maximum_suppression(mut boxes: Vec<DetectionBox>, iou_threshold: f64) -> Vec<DetectionBox> {
    boxes.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept: Vec<DetectionBox> = Vec::new();
    for candidate in boxes {
        if kept.iter().all(|best| best.iou(&candidate) < iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a `[1, 4 + classes, N]` output from per-proposal rows.
    fn output(proposals: &[Vec<f32>]) -> ModelOutput {
        let features = proposals[0].len();
        let count = proposals.len();
        let mut data = vec![0.0; features * count];
        for (i, proposal) in proposals.iter().enumerate() {
            for (f, &value) in proposal.iter().enumerate() {
                data[f * count + i] = value;
            }
        }
        ModelOutput::new(vec![1, features, count], data).expect("consistent output")
    }

    fn context() -> DecodeContext {
        DecodeContext {
            image_width: 1280,
            image_height: 320,
            input_size: 640,
        }
    }

    #[test]
    fn boxes_are_rescaled_to_image_space() {
        let out = output(&[vec![320.0, 320.0, 100.0, 200.0, 0.9]]);
        let boxes = YoloV8Decoder::default()
            .decode(&out, &context())
            .expect("decodes");
        assert_eq!(boxes.len(), 1);
        let b = &boxes[0];
        assert!((b.x - 540.0).abs() < 1e-3);
        assert!((b.y - 110.0).abs() < 1e-3);
        assert!((b.w - 200.0).abs() < 1e-3);
        assert!((b.h - 100.0).abs() < 1e-3);
        assert_eq!(b.label, POTHOLE_LABEL);
        assert!((b.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn low_scores_and_other_classes_are_skipped() {
        let out = output(&[
            vec![100.0, 100.0, 50.0, 50.0, 0.1, 0.0],
            vec![300.0, 300.0, 50.0, 50.0, 0.6, 0.8],
            vec![500.0, 500.0, 50.0, 50.0, 0.7, 0.2],
        ]);
        let boxes = YoloV8Decoder::default()
            .decode(&out, &context())
            .expect("decodes");
        assert_eq!(boxes.len(), 1);
        assert!((boxes[0].confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn overlapping_proposals_are_suppressed_by_confidence() {
        let out = output(&[
            vec![200.0, 200.0, 100.0, 100.0, 0.6],
            vec![205.0, 205.0, 100.0, 100.0, 0.9],
            vec![500.0, 200.0, 100.0, 100.0, 0.5],
        ]);
        let boxes = YoloV8Decoder::default()
            .decode(&out, &context())
            .expect("decodes");
        assert_eq!(boxes.len(), 2);
        assert!((boxes[0].confidence - 0.9).abs() < 1e-6);
        assert!((boxes[1].confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn boxes_are_clamped_to_the_image() {
        let out = output(&[vec![10.0, 10.0, 40.0, 40.0, 0.9]]);
        let boxes = YoloV8Decoder::default()
            .decode(&out, &context())
            .expect("decodes");
        assert_eq!((boxes[0].x, boxes[0].y), (0.0, 0.0));
    }

    #[test]
    fn wrong_layout_is_a_decode_error() {
        let out = ModelOutput::new(vec![2, 5, 1], vec![0.0; 10]).expect("consistent output");
        assert!(matches!(
            YoloV8Decoder::default().decode(&out, &context()),
            Err(DetectorError::Decode(_))
        ));

        let decoder = YoloV8Decoder {
            class_index: 3,
            ..YoloV8Decoder::default()
        };
        let out = output(&[vec![1.0, 1.0, 1.0, 1.0, 0.9]]);
        assert!(matches!(
            decoder.decode(&out, &context()),
            Err(DetectorError::Decode(_))
        ));
    }

    #[test]
    fn non_finite_proposals_are_skipped() {
        let out = output(&[
            vec![320.0, 320.0, 100.0, 100.0, f32::NAN],
            vec![320.0, 320.0, 100.0, 100.0, f32::INFINITY],
            vec![f32::NAN, 100.0, 50.0, 50.0, 0.9],
            vec![100.0, 100.0, f32::INFINITY, 50.0, 0.9],
        ]);
        let square = DecodeContext {
            image_width: 640,
            image_height: 640,
            input_size: 640,
        };
        let boxes = YoloV8Decoder::default()
            .decode(&out, &square)
            .expect("decodes");
        assert!(boxes.is_empty());
    }

    #[test]
    fn unsupported_decoder_reports_missing_layout() {
        let out = output(&[vec![1.0, 1.0, 1.0, 1.0, 0.9]]);
        assert!(matches!(
            UnsupportedDecoder.decode(&out, &context()),
            Err(DetectorError::DecodeUnsupported)
        ));
    }

    #[test]
    fn nms_keeps_disjoint_boxes() {
        let boxes = vec![
            DetectionBox::new(0.0, 0.0, 10.0, 10.0, POTHOLE_LABEL, 0.5),
            DetectionBox::new(50.0, 0.0, 10.0, 10.0, POTHOLE_LABEL, 0.8),
        ];
        assert_eq!(non_maximum_suppression(boxes, 0.45).len(), 2);
    }
}
