use serde::{Deserialize, Serialize};
use usls::{Hbb, Y};

/// Axis-aligned bounding box in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BBox {
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    pub fn from_hbb(hbb: &Hbb) -> Self {
        Self::new(
            hbb.xmin(),
            hbb.ymin(),
            hbb.xmin() + hbb.width(),
            hbb.ymin() + hbb.height(),
        )
    }

    /// Returns a copy grown by `margin` pixels on every side.
    pub fn expanded(&self, margin: f32) -> Self {
        Self::new(
            self.x_min - margin,
            self.y_min - margin,
            self.x_max + margin,
            self.y_max + margin,
        )
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        self.x_min < other.x_max
            && other.x_min < self.x_max
            && self.y_min < other.y_max
            && other.y_min < self.y_max
    }
}

/// One detector output for one frame. Ephemeral: produced and consumed
/// within a single frame's processing.
#[derive(Clone, Debug)]
pub struct RawDetection {
    pub label: String,
    pub confidence: f32,
    pub bbox: BBox,
}

/// Returns a detection result reduced to the boxes matching the given
/// event bounding boxes, so an overlay draws only the accepted events and
/// not every box the detector saw on the frame.
pub fn event_overlay(detection: &Y, boxes: &[BBox]) -> Y {
    let hbbs: Vec<Hbb> = detection
        .hbbs()
        .map(|hbbs| {
            hbbs.iter()
                .filter(|hbb| boxes.contains(&BBox::from_hbb(hbb)))
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    Y::default().with_hbbs(&hbbs)
}

/// Extracts named, scored detections from a detector inference result.
/// Boxes without a class name or a confidence score are skipped.
pub fn raw_detections(detection: &Y) -> Vec<RawDetection> {
    if let Some(hbbs) = detection.hbbs() {
        hbbs.iter()
            .filter_map(|hbb| {
                let label = hbb.name()?.to_string();
                let confidence = hbb.confidence()?;
                Some(RawDetection {
                    label,
                    confidence,
                    bbox: BBox::from_hbb(hbb),
                })
            })
            .collect()
    } else {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hbb_converts_to_corner_coordinates() {
        let hbb = Hbb::from_xywh(10.0, 20.0, 30.0, 40.0);
        let bbox = BBox::from_hbb(&hbb);

        assert!((bbox.x_min - 10.0).abs() < 1e-3);
        assert!((bbox.y_min - 20.0).abs() < 1e-3);
        assert!((bbox.x_max - 40.0).abs() < 1e-3);
        assert!((bbox.y_max - 60.0).abs() < 1e-3);
    }

    #[test]
    fn test_intersects() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 5.0, 15.0, 15.0);
        let c = BBox::new(20.0, 20.0, 30.0, 30.0);

        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));

        // Touching edges do not count as overlap
        let d = BBox::new(10.0, 0.0, 20.0, 10.0);
        assert!(!a.intersects(&d));
    }

    #[test]
    fn test_event_overlay_keeps_only_event_boxes() {
        // A frame where only the bottle became an event; the bystander and
        // the car must not end up in the overlay.
        let bottle = Hbb::from_xywh(10.0, 10.0, 40.0, 70.0).with_confidence(0.6);
        let person = Hbb::from_xywh(200.0, 50.0, 60.0, 150.0).with_confidence(0.9);
        let car = Hbb::from_xywh(400.0, 80.0, 180.0, 120.0).with_confidence(0.8);
        let detection = Y::default().with_hbbs(&[bottle, person, car]);

        let event_box = BBox::new(10.0, 10.0, 50.0, 80.0);
        let overlay = event_overlay(&detection, &[event_box]);

        let hbbs = overlay.hbbs().unwrap_or_default();
        assert_eq!(hbbs.len(), 1);
        assert!((hbbs[0].xmin() - 10.0).abs() < 1e-3);
        assert!((hbbs[0].width() - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_event_overlay_with_no_events_is_empty() {
        let detection = Y::default()
            .with_hbbs(&[Hbb::from_xywh(0.0, 0.0, 10.0, 10.0).with_confidence(0.9)]);

        let overlay = event_overlay(&detection, &[]);

        assert!(overlay.hbbs().unwrap_or_default().is_empty());
    }

    #[test]
    fn test_expanded_reaches_nearby_boxes() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let nearby = BBox::new(15.0, 0.0, 25.0, 10.0);

        assert!(!a.intersects(&nearby));
        assert!(a.expanded(6.0).intersects(&nearby));
    }
}
