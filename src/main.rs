mod alert;
mod config;
mod headless;
mod model_download;
mod pipeline;
mod proximity;
mod types;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::bounded;
use gpui::Application;
use nokhwa::utils::CameraIndex;

use alert::AlertDispatcher;
use config::Args;
use model_download::ensure_handpose_estimator_model_ready;
use pipeline::{RecognizerBackend, available_cameras, start_camera_stream, start_recognizer};

fn main() -> Result<()> {
    env_logger::init();

    let settings = Args::parse().settings()?;
    log::info!(
        "calibration: palm width {} cm, focal length {} px, alert below {} cm",
        settings.estimator.calibration.known_width,
        settings.estimator.calibration.focal_length,
        settings.estimator.threshold
    );

    ensure_handpose_estimator_model_ready(&settings.model_path, |_evt| {})
        .with_context(|| format!("could not prepare {}", settings.model_path.display()))?;

    let sink = settings.alert.build()?;
    let (alerts, _alert_handle) = AlertDispatcher::spawn(sink);

    let (frame_tx, frame_rx) = bounded(1);
    let (result_tx, result_rx) = bounded(1);

    let camera_label = camera_label(settings.camera_index);
    let camera = start_camera_stream(settings.camera_index, frame_tx).with_context(|| {
        format!("could not open webcam {camera_label}; is it connected and not in use?")
    })?;
    log::info!("webcam {camera_label} opened, hand distance measurement started");

    let recognizer = start_recognizer(
        RecognizerBackend {
            model_path: settings.model_path.clone(),
            estimator: settings.estimator,
            alerts,
        },
        frame_rx,
        result_tx,
    );

    if settings.headless {
        let outcome = headless::run(result_rx);
        camera.stop();
        return outcome;
    }

    let threshold = settings.estimator.threshold;
    let workers = ui::Workers::new(camera_label, camera, recognizer);
    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            if let Err(err) = ui::launch_ui(app, result_rx, workers, threshold) {
                log::error!("failed to launch ui: {err:?}");
            }
        });

    Ok(())
}

fn camera_label(index: u32) -> String {
    let wanted = CameraIndex::Index(index);
    match available_cameras() {
        Ok(cameras) => cameras
            .into_iter()
            .find(|c| c.index == wanted)
            .map(|c| c.label)
            .unwrap_or_else(|| format!("#{index}")),
        Err(err) => {
            log::warn!("{err:#}");
            format!("#{index}")
        }
    }
}
