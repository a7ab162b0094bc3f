use crate::geometry::BoundingBox;

/// Perform non-max suppression on boxes & scores, return indices to keep.
///
/// Indices come back in descending score order. A box is dropped when its
/// IoU with an already kept box is strictly greater than `iou_thresh`.
pub fn nms(boxes: &[BoundingBox], scores: &[f32], iou_thresh: f32) -> Vec<usize> {
    debug_assert_eq!(boxes.len(), scores.len());
    let mut idxs: Vec<usize> = (0..boxes.len()).collect();
    idxs.sort_by(|&i, &j| scores[j].total_cmp(&scores[i]));

    let mut keep: Vec<usize> = Vec::new();
    for i in idxs {
        let suppressed = keep
            .iter()
            .any(|&k| compute_iou(&boxes[k], &boxes[i]) > iou_thresh);
        if !suppressed {
            keep.push(i);
        }
    }
    keep
}

/// Intersection-over-union of two pixel boxes.
pub fn compute_iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter_w = (i64::from(x2) - i64::from(x1)).max(0);
    let inter_h = (i64::from(y2) - i64::from(y1)).max(0);
    let inter_area = inter_w as f64 * inter_h as f64;
    let union_area = a.area() + b.area() - inter_area;

    if union_area <= 0.0 {
        return 0.0;
    }

    (inter_area / union_area) as f32
}

/// IoU of two `[x1, y1, x2, y2]` float boxes, used by the tracker.
pub fn compute_iou_tlbr(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter_area = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let a_area = (a[2] - a[0]) * (a[3] - a[1]);
    let b_area = (b[2] - b[0]) * (b[3] - b[1]);

    if a_area + b_area - inter_area <= 0.0 {
        return 0.0;
    }

    inter_area / (a_area + b_area - inter_area)
}
