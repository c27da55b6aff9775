use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::{
    alert::AlertKind,
    model_download::default_handpose_estimator_model_path,
    proximity::{
        Calibration, DEFAULT_FOCAL_LENGTH_PX, DEFAULT_KNOWN_WIDTH_CM, DEFAULT_THRESHOLD_CM,
        ProximityEstimator,
    },
};

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a positive finite number, got {value}")]
    NotPositive { name: &'static str, value: f32 },
    #[error("--reference-distance and --reference-width must be given together")]
    IncompleteReference,
}

/// Estimate how far your hand is from the camera and warn when it gets too close.
#[derive(Debug, Parser)]
#[command(name = "hand-proximity", version)]
pub struct Args {
    /// Camera index to open.
    #[arg(long, default_value_t = 0)]
    pub camera: u32,

    /// Real width of the palm in centimetres.
    #[arg(long, default_value_t = DEFAULT_KNOWN_WIDTH_CM)]
    pub known_width: f32,

    /// Focal length of the camera in pixels.
    #[arg(long, default_value_t = DEFAULT_FOCAL_LENGTH_PX)]
    pub focal_length: f32,

    /// Distance in centimetres of a reference measurement; derives the focal length.
    #[arg(long, requires = "reference_width")]
    pub reference_distance: Option<f32>,

    /// Palm width in pixels observed at --reference-distance.
    #[arg(long, requires = "reference_distance")]
    pub reference_width: Option<f32>,

    /// Alert when the hand is closer than this many centimetres.
    #[arg(long, default_value_t = DEFAULT_THRESHOLD_CM)]
    pub threshold: f32,

    /// How to signal a proximity alert: auto, silent, log, bell or beep.
    #[arg(long, default_value_t = AlertKind::Auto)]
    pub alert: AlertKind,

    /// Path of the handpose ONNX model (downloaded if missing).
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Run without a window and log every reading.
    #[arg(long)]
    pub headless: bool,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub camera_index: u32,
    pub estimator: ProximityEstimator,
    pub alert: AlertKind,
    pub model_path: PathBuf,
    pub headless: bool,
}

impl Args {
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        let known_width = positive("--known-width", self.known_width)?;
        let calibration = match (self.reference_distance, self.reference_width) {
            (Some(distance), Some(width)) => {
                let calibration = Calibration::from_reference(
                    positive("--reference-distance", distance)?,
                    positive("--reference-width", width)?,
                    known_width,
                );
                positive("--reference-*", calibration.focal_length)?;
                calibration
            }
            (None, None) => {
                Calibration::new(known_width, positive("--focal-length", self.focal_length)?)
            }
            _ => return Err(ConfigError::IncompleteReference),
        };
        let threshold = positive("--threshold", self.threshold)?;

        Ok(Settings {
            camera_index: self.camera,
            estimator: ProximityEstimator::new(calibration, threshold),
            alert: self.alert,
            model_path: self
                .model
                .clone()
                .unwrap_or_else(default_handpose_estimator_model_path),
            headless: self.headless,
        })
    }
}

fn positive(name: &'static str, value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("hand-proximity").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn defaults_match_palm_calibration() {
        let settings = parse(&[]).settings().unwrap();
        assert_eq!(settings.camera_index, 0);
        assert_eq!(settings.estimator.calibration, Calibration::new(8.0, 500.0));
        assert_eq!(settings.estimator.threshold, 20.0);
        assert_eq!(settings.alert, AlertKind::Auto);
        assert!(!settings.headless);
        assert_eq!(settings.model_path, default_handpose_estimator_model_path());
    }

    #[test]
    fn reference_measurement_overrides_focal_length() {
        let settings = parse(&[
            "--focal-length",
            "900",
            "--reference-distance",
            "25",
            "--reference-width",
            "160",
        ])
        .settings()
        .unwrap();
        assert_eq!(settings.estimator.calibration.focal_length, 500.0);
    }

    #[test]
    fn overflowing_reference_is_rejected() {
        let err = parse(&[
            "--known-width",
            "1e-30",
            "--reference-distance",
            "1e30",
            "--reference-width",
            "1e30",
        ])
        .settings()
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::NotPositive {
                name: "--reference-*",
                value: f32::INFINITY
            }
        );
    }

    #[test]
    fn reference_flags_require_each_other() {
        let result = Args::try_parse_from(["hand-proximity", "--reference-distance", "25"]);
        assert!(result.is_err());
    }

    #[test]
    fn non_positive_threshold_is_rejected() {
        let err = parse(&["--threshold=-3"]).settings().unwrap_err();
        assert_eq!(
            err,
            ConfigError::NotPositive {
                name: "--threshold",
                value: -3.0
            }
        );
    }

    #[test]
    fn alert_kind_flag() {
        let settings = parse(&["--alert", "log", "--headless"]).settings().unwrap();
        assert_eq!(settings.alert, AlertKind::Log);
        assert!(settings.headless);
    }
}
