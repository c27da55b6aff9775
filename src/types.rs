use std::time::Instant;

use crate::proximity::ProximityReading;

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

/// Pixel-space coordinate in the camera frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn from_score(score: f32) -> Self {
        if score >= 0.5 {
            Handedness::Right
        } else {
            Handedness::Left
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Handedness::Left => "Left hand",
            Handedness::Right => "Right hand",
        }
    }
}

/// Axis-aligned box around a set of landmarks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    pub fn from_points(points: &[(f32, f32)]) -> Option<Self> {
        let (&(x0, y0), rest) = points.split_first()?;
        let mut bbox = BoundingBox {
            x_min: x0,
            y_min: y0,
            x_max: x0,
            y_max: y0,
        };
        for &(x, y) in rest {
            bbox.x_min = bbox.x_min.min(x);
            bbox.y_min = bbox.y_min.min(y);
            bbox.x_max = bbox.x_max.max(x);
            bbox.y_max = bbox.y_max.max(y);
        }
        Some(bbox)
    }

    /// Left and right extremes at the vertical centre, so their distance is
    /// the box width.
    pub fn horizontal_extremes(&self) -> (Point, Point) {
        let cy = (self.y_min + self.y_max) / 2.0;
        (Point::new(self.x_min, cy), Point::new(self.x_max, cy))
    }
}

#[derive(Clone, Debug)]
pub struct HandObservation {
    pub landmarks: Vec<(f32, f32)>,
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub handedness: Handedness,
}

#[derive(Clone, Debug)]
pub struct RecognizedFrame {
    pub frame: Frame,
    pub hand: Option<HandObservation>,
    pub reading: Option<ProximityReading>,
}

impl RecognizedFrame {
    pub fn status_text(&self) -> String {
        match (&self.hand, &self.reading) {
            (Some(hand), Some(reading)) => format!(
                "{} ({:.0}%) · {}",
                hand.handedness.label(),
                hand.confidence * 100.0,
                reading.display_text()
            ),
            _ => "No hand detected".to_string(),
        }
    }

    pub fn is_alerting(&self) -> bool {
        self.reading.map(|r| r.alert).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_spans_all_points() {
        let bbox =
            BoundingBox::from_points(&[(40.0, 90.0), (10.0, 120.0), (75.0, 60.0)]).unwrap();
        assert_eq!(
            bbox,
            BoundingBox {
                x_min: 10.0,
                y_min: 60.0,
                x_max: 75.0,
                y_max: 120.0,
            }
        );
    }

    #[test]
    fn empty_landmarks_have_no_box() {
        assert!(BoundingBox::from_points(&[]).is_none());
    }

    #[test]
    fn extremes_are_box_width_apart() {
        let bbox = BoundingBox {
            x_min: 100.0,
            y_min: 40.0,
            x_max: 150.0,
            y_max: 90.0,
        };
        let (left, right) = bbox.horizontal_extremes();
        assert_eq!(left, Point::new(100.0, 65.0));
        assert_eq!(right, Point::new(150.0, 65.0));
        assert_eq!(left.distance_to(right), 50.0);
    }

    #[test]
    fn handedness_threshold() {
        assert_eq!(Handedness::from_score(0.9), Handedness::Right);
        assert_eq!(Handedness::from_score(0.1), Handedness::Left);
    }
}
