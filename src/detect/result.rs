use crate::Point;

/// Result of running detection on a frame.
#[derive(Clone, Debug, Default)]
pub struct DetectionResult {
    /// Bounding boxes in frame pixel coordinates.
    pub detections: Vec<BoundingBox>,
}

impl DetectionResult {
    pub fn new(detections: Vec<BoundingBox>) -> Self {
        Self { detections }
    }

    /// Center points of every person box, in detection order.
    pub fn person_centers(&self) -> Vec<Point> {
        self.detections
            .iter()
            .filter(|det| det.class == ObjectClass::Person)
            .map(BoundingBox::center)
            .collect()
    }
}

/// Axis-aligned box in pixel coordinates (`x1,y1` top-left, `x2,y2` bottom-right).
#[derive(Clone, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class: ObjectClass,
}

impl BoundingBox {
    pub fn person(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class: ObjectClass::Person,
        }
    }

    /// Box midpoint, truncated toward zero.
    pub fn center(&self) -> Point {
        Point {
            x: ((self.x1 + self.x2) / 2.0) as i32,
            y: ((self.y1 + self.y2) / 2.0) as i32,
        }
    }

    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Intersection over union; 0 when the union is empty.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// COCO-style object class. Only `Person` is counted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectClass {
    Person,
    Other(u16),
}

impl ObjectClass {
    /// Map a COCO class id (0 = person).
    pub fn from_coco(class_id: usize) -> Self {
        if class_id == 0 {
            ObjectClass::Person
        } else {
            ObjectClass::Other(u16::try_from(class_id).unwrap_or(u16::MAX))
        }
    }
}

/// Greedy per-class non-maximum suppression. Highest confidence wins.
pub fn non_max_suppression(mut boxes: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    boxes.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<BoundingBox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        let suppressed = keep
            .iter()
            .any(|kept| kept.class == candidate.class && kept.iou(&candidate) >= iou_threshold);
        if !suppressed {
            keep.push(candidate);
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_truncates_toward_zero() {
        let b = BoundingBox::person(10.0, 20.0, 13.0, 25.0, 0.9);
        assert_eq!(b.center(), Point::new(11, 22));
    }

    #[test]
    fn person_centers_skip_other_classes() {
        let mut car = BoundingBox::person(0.0, 0.0, 10.0, 10.0, 0.9);
        car.class = ObjectClass::from_coco(2);
        let result = DetectionResult::new(vec![
            car,
            BoundingBox::person(0.0, 0.0, 4.0, 4.0, 0.8),
        ]);
        assert_eq!(result.person_centers(), vec![Point::new(2, 2)]);
    }

    #[test]
    fn iou_of_disjoint_and_identical_boxes() {
        let a = BoundingBox::person(0.0, 0.0, 10.0, 10.0, 0.5);
        let b = BoundingBox::person(20.0, 20.0, 30.0, 30.0, 0.5);
        assert_eq!(a.iou(&b), 0.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn nms_drops_overlapping_lower_scores() {
        let boxes = vec![
            BoundingBox::person(0.0, 0.0, 10.0, 10.0, 0.6),
            BoundingBox::person(1.0, 1.0, 11.0, 11.0, 0.9),
            BoundingBox::person(50.0, 50.0, 60.0, 60.0, 0.4),
        ];
        let kept = non_max_suppression(boxes, 0.5);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].confidence, 0.4);
    }

    #[test]
    fn nms_keeps_overlapping_boxes_of_different_classes() {
        let mut other = BoundingBox::person(0.0, 0.0, 10.0, 10.0, 0.6);
        other.class = ObjectClass::Other(3);
        let boxes = vec![BoundingBox::person(0.0, 0.0, 10.0, 10.0, 0.9), other];
        assert_eq!(non_max_suppression(boxes, 0.5).len(), 2);
    }
}
