//! Monocular distance estimation from the apparent width of a hand.
//!
//! Uses the pinhole-camera approximation: an object of known real width `W`
//! that spans `w` pixels sits at roughly `W * f / w` from a camera with focal
//! length `f` (in pixels).

use thiserror::Error;

use crate::types::Point;

/// Widths at or below this many pixels are treated as a lost hand.
pub const MIN_PIXEL_WIDTH: f32 = 1e-6;

/// Average adult palm width in centimetres.
pub const DEFAULT_KNOWN_WIDTH_CM: f32 = 8.0;
pub const DEFAULT_FOCAL_LENGTH_PX: f32 = 500.0;
pub const DEFAULT_THRESHOLD_CM: f32 = 20.0;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ProximityError {
    #[error("apparent width {pixel_width} px is too small to estimate a distance")]
    DegenerateInput { pixel_width: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Calibration {
    /// Real width of the tracked object, in the unit distances are reported in.
    pub known_width: f32,
    /// Focal length in pixels.
    pub focal_length: f32,
}

impl Calibration {
    pub fn new(known_width: f32, focal_length: f32) -> Self {
        Self {
            known_width,
            focal_length,
        }
    }

    /// Derives the focal length from one measurement: the object was
    /// `reference_distance` away and spanned `pixel_width` pixels.
    pub fn from_reference(reference_distance: f32, pixel_width: f32, known_width: f32) -> Self {
        Self {
            known_width,
            focal_length: reference_distance * pixel_width / known_width,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProximityReading {
    pub pixel_width: f32,
    /// `None` when the apparent width was degenerate.
    pub distance: Option<f32>,
    pub alert: bool,
}

impl ProximityReading {
    pub fn undefined(pixel_width: f32) -> Self {
        Self {
            pixel_width,
            distance: None,
            alert: false,
        }
    }

    pub fn display_text(&self) -> String {
        match self.distance {
            Some(distance) => format!("Distance: {distance:.2} cm"),
            None => "Distance: --".to_string(),
        }
    }
}

pub fn distance_from_width(
    pixel_width: f32,
    calibration: &Calibration,
) -> Result<f32, ProximityError> {
    if !pixel_width.is_finite() || pixel_width <= MIN_PIXEL_WIDTH {
        return Err(ProximityError::DegenerateInput { pixel_width });
    }

    let distance = (calibration.known_width * calibration.focal_length) / pixel_width;
    if !distance.is_finite() {
        return Err(ProximityError::DegenerateInput { pixel_width });
    }
    Ok(distance.max(0.0))
}

/// Estimates the distance of an object whose extremes are `p1` and `p2`.
///
/// Never fails: a degenerate width yields an undefined distance and no alert.
pub fn estimate(
    p1: Point,
    p2: Point,
    calibration: &Calibration,
    threshold: f32,
) -> ProximityReading {
    let pixel_width = p1.distance_to(p2);
    match distance_from_width(pixel_width, calibration) {
        Ok(distance) => ProximityReading {
            pixel_width,
            distance: Some(distance),
            alert: distance < threshold,
        },
        Err(err) => {
            log::debug!("{err}");
            ProximityReading::undefined(pixel_width)
        }
    }
}

/// Calibration and threshold bundled for the per-frame caller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProximityEstimator {
    pub calibration: Calibration,
    pub threshold: f32,
}

impl ProximityEstimator {
    pub fn new(calibration: Calibration, threshold: f32) -> Self {
        Self {
            calibration,
            threshold,
        }
    }

    pub fn estimate(&self, p1: Point, p2: Point) -> ProximityReading {
        estimate(p1, p2, &self.calibration, self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calibration() -> Calibration {
        Calibration::new(15.0, 500.0)
    }

    #[test]
    fn coincident_points_are_undefined() {
        let p = Point::new(120.0, 80.0);
        let reading = estimate(p, p, &calibration(), 200.0);
        assert_eq!(reading.distance, None);
        assert!(!reading.alert);
        assert_eq!(reading.pixel_width, 0.0);
    }

    #[test]
    fn sub_epsilon_width_is_degenerate() {
        let err = distance_from_width(1e-9, &calibration()).unwrap_err();
        assert!(matches!(err, ProximityError::DegenerateInput { .. }));
        assert!(distance_from_width(f32::NAN, &calibration()).is_err());
    }

    #[test]
    fn fifty_pixels_is_one_hundred_fifty() {
        let reading = estimate(
            Point::new(100.0, 100.0),
            Point::new(150.0, 100.0),
            &calibration(),
            200.0,
        );
        assert_eq!(reading.pixel_width, 50.0);
        assert_eq!(reading.distance, Some(150.0));
        assert!(reading.alert);
    }

    #[test]
    fn closer_hand_is_still_alerting() {
        let reading = estimate(
            Point::new(100.0, 100.0),
            Point::new(400.0, 100.0),
            &calibration(),
            200.0,
        );
        assert_eq!(reading.pixel_width, 300.0);
        assert_eq!(reading.distance, Some(25.0));
        assert!(reading.alert);
    }

    #[test]
    fn distance_above_threshold_does_not_alert() {
        let reading = estimate(
            Point::new(100.0, 100.0),
            Point::new(150.0, 100.0),
            &calibration(),
            10.0,
        );
        assert_eq!(reading.distance, Some(150.0));
        assert!(!reading.alert);
    }

    #[test]
    fn distance_shrinks_as_width_grows() {
        let cal = calibration();
        let mut previous = f32::INFINITY;
        for width in [1.0f32, 2.0, 10.0, 50.0, 120.0, 300.0, 640.0] {
            let distance = distance_from_width(width, &cal).unwrap();
            assert!(distance < previous, "{distance} !< {previous} at {width}px");
            previous = distance;
        }
    }

    #[test]
    fn diagonal_points_use_euclidean_width() {
        let reading = estimate(
            Point::new(0.0, 0.0),
            Point::new(30.0, 40.0),
            &calibration(),
            0.0,
        );
        assert_eq!(reading.pixel_width, 50.0);
        assert_eq!(reading.distance, Some(150.0));
        assert!(!reading.alert);
    }

    #[test]
    fn repeated_calls_are_bit_identical() {
        let estimator = ProximityEstimator::new(calibration(), 200.0);
        let p1 = Point::new(13.7, 251.3);
        let p2 = Point::new(97.1, 260.9);
        let a = estimator.estimate(p1, p2);
        let b = estimator.estimate(p1, p2);
        assert_eq!(a.pixel_width.to_bits(), b.pixel_width.to_bits());
        assert_eq!(
            a.distance.map(f32::to_bits),
            b.distance.map(f32::to_bits)
        );
        assert_eq!(a.alert, b.alert);
    }

    #[test]
    fn focal_length_from_reference_measurement() {
        // Palm 8 cm wide seen 160 px wide at 25 cm.
        let cal = Calibration::from_reference(25.0, 160.0, 8.0);
        assert_eq!(cal.focal_length, 500.0);
        assert_eq!(distance_from_width(160.0, &cal).unwrap(), 25.0);
    }

    #[test]
    fn display_text_formats_distance() {
        let reading = ProximityReading {
            pixel_width: 50.0,
            distance: Some(150.0),
            alert: true,
        };
        assert_eq!(reading.display_text(), "Distance: 150.00 cm");
        assert_eq!(ProximityReading::undefined(0.0).display_text(), "Distance: --");
    }
}
