// THEORY:
// The `BoxMerger` collapses overlapping candidates into single covering boxes. It
// is NMS-like but unions instead of suppressing: a pothole that breaks into
// several neighboring blobs should be reported as one region.
//
// The sweep is greedy and single-pass:
// 1.  Candidates are sorted by area, largest first (stable for equal areas).
// 2.  Each still-active candidate becomes an anchor and scans every later active
//     candidate. Any candidate whose IoU with the anchor's *current* rectangle
//     exceeds the threshold is absorbed: the anchor grows to cover it and the
//     candidate is deactivated.
// 3.  Because the anchor grows mid-scan, later comparisons see the larger
//     rectangle. No second pass re-compares finished anchors against each other.
//
// The anchor keeps its own label and confidence whatever it absorbs.

use crate::core_modules::detection_box::DetectionBox;
use std::cmp::Ordering;

/// IoU above which two heuristic boxes are merged.
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.1;

/// Greedily unions overlapping boxes. See the module notes for the exact sweep.
pub fn merge_boxes(mut boxes: Vec<DetectionBox>, iou_threshold: f64) -> Vec<DetectionBox> {
    if boxes.is_empty() {
        return boxes;
    }

    boxes.sort_by(|a, b| b.area().partial_cmp(&a.area()).unwrap_or(Ordering::Equal));

    let mut active = vec![true; boxes.len()];
    let mut merged = Vec::with_capacity(boxes.len());

    for i in 0..boxes.len() {
        if !active[i] {
            continue;
        }

        let mut anchor = boxes[i].clone();
        let mut absorbed = 0usize;

        for j in (i + 1)..boxes.len() {
            if !active[j] {
                continue;
            }

            if anchor.iou(&boxes[j]) > iou_threshold {
                anchor.union_with(&boxes[j]);
                active[j] = false;
                absorbed += 1;
            }
        }

        if absorbed > 0 {
            log::trace!(
                "anchor at ({}, {}) absorbed {} boxes -> {}x{}",
                anchor.x,
                anchor.y,
                absorbed,
                anchor.w,
                anchor.h
            );
        }
        merged.push(anchor);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f64, y: f64, w: f64, h: f64, confidence: f64) -> DetectionBox {
        DetectionBox::new(x, y, w, h, "Pothole", confidence)
    }

    fn geometry(boxes: &[DetectionBox]) -> Vec<(f64, f64, f64, f64)> {
        let mut out: Vec<_> = boxes.iter().map(|b| (b.x, b.y, b.w, b.h)).collect();
        out.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        out
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(merge_boxes(Vec::new(), DEFAULT_IOU_THRESHOLD).is_empty());
    }

    #[test]
    fn non_overlapping_boxes_are_unchanged() {
        let boxes = vec![
            rect(0.0, 0.0, 10.0, 10.0, 0.9),
            rect(20.0, 0.0, 30.0, 30.0, 0.9),
            rect(0.0, 50.0, 20.0, 10.0, 0.9),
            // Slight overlap, IoU well under 0.1.
            rect(48.0, 28.0, 10.0, 10.0, 0.9),
        ];
        let merged = merge_boxes(boxes.clone(), DEFAULT_IOU_THRESHOLD);
        assert_eq!(geometry(&merged), geometry(&boxes));
    }

    #[test]
    fn overlapping_pair_becomes_covering_box() {
        let boxes = vec![
            rect(0.0, 0.0, 20.0, 20.0, 0.91),
            rect(10.0, 10.0, 20.0, 20.0, 0.88),
        ];
        let merged = merge_boxes(boxes, DEFAULT_IOU_THRESHOLD);
        assert_eq!(merged.len(), 1);
        assert_eq!(geometry(&merged), vec![(0.0, 0.0, 30.0, 30.0)]);
    }

    #[test]
    fn anchor_is_largest_box_and_keeps_its_confidence() {
        let boxes = vec![
            rect(5.0, 5.0, 10.0, 10.0, 0.5),
            rect(0.0, 0.0, 20.0, 20.0, 0.9),
        ];
        let merged = merge_boxes(boxes, DEFAULT_IOU_THRESHOLD);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].confidence, 0.9);
        assert_eq!(geometry(&merged), vec![(0.0, 0.0, 20.0, 20.0)]);
    }

    #[test]
    fn growing_anchor_reaches_boxes_it_did_not_originally_overlap() {
        // C does not overlap A at all, but overlaps A after A absorbs B.
        let a = rect(0.0, 0.0, 20.0, 20.0, 0.9);
        let b = rect(10.0, 0.0, 20.0, 20.0, 0.9);
        let c = rect(25.0, 0.0, 10.0, 20.0, 0.9);
        assert_eq!(a.iou(&c), 0.0);

        let merged = merge_boxes(vec![a, b, c], DEFAULT_IOU_THRESHOLD);
        assert_eq!(geometry(&merged), vec![(0.0, 0.0, 35.0, 20.0)]);
    }

    #[test]
    fn finished_anchors_are_not_recompared() {
        // B and D both survive A's sweep. B then grows by absorbing D and ends up
        // overlapping A above the threshold, but A is never revisited.
        let a = rect(0.0, 0.0, 30.0, 30.0, 0.9); // area 900
        let b = rect(31.0, 0.0, 20.0, 10.0, 0.9); // area 200
        let d = rect(10.0, 0.0, 40.0, 4.0, 0.9); // area 160
        assert_eq!(a.iou(&b), 0.0);
        assert!(a.iou(&d) <= DEFAULT_IOU_THRESHOLD);
        assert!(b.iou(&d) > DEFAULT_IOU_THRESHOLD);

        let merged = merge_boxes(vec![d, b, a.clone()], DEFAULT_IOU_THRESHOLD);
        assert_eq!(merged.len(), 2);
        assert_eq!(
            geometry(&merged),
            vec![(0.0, 0.0, 30.0, 30.0), (10.0, 0.0, 41.0, 10.0)]
        );
        assert!(a.iou(&merged[1]) > DEFAULT_IOU_THRESHOLD);
    }

    #[test]
    fn merging_is_idempotent_on_its_own_output() {
        let boxes = vec![
            rect(0.0, 0.0, 20.0, 20.0, 0.9),
            rect(10.0, 10.0, 20.0, 20.0, 0.9),
            rect(100.0, 100.0, 20.0, 20.0, 0.9),
        ];
        let once = merge_boxes(boxes, DEFAULT_IOU_THRESHOLD);
        let twice = merge_boxes(once.clone(), DEFAULT_IOU_THRESHOLD);
        assert_eq!(geometry(&once), geometry(&twice));
    }
}
