mod common;
mod ort;

use std::{path::PathBuf, thread};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::{
    alert::AlertDispatcher,
    proximity::ProximityEstimator,
    types::{BoundingBox, Frame, HandObservation, Handedness, RecognizedFrame},
};

pub use self::common::HandposeOutput;
use self::ort::OrtEngine;

/// Presence score a hand must reach before it is measured.
const MIN_CONFIDENCE: f32 = 0.7;

pub(crate) trait HandposeEngine: Send + 'static {
    fn infer(&mut self, frame: &Frame) -> anyhow::Result<HandposeOutput>;
}

/// Everything the recognizer worker needs besides its channels. The model file
/// must already be on disk.
#[derive(Clone, Debug)]
pub struct RecognizerBackend {
    pub model_path: PathBuf,
    pub estimator: ProximityEstimator,
    pub alerts: AlertDispatcher,
}

pub fn start_recognizer(
    backend: RecognizerBackend,
    frame_rx: Receiver<Frame>,
    result_tx: Sender<RecognizedFrame>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let model_path = backend.model_path.clone();
        let engine = match OrtEngine::new(&model_path) {
            Ok(engine) => {
                log::info!("handpose ORT backend ready using {}", model_path.display());
                engine
            }
            Err(err) => {
                log::error!("failed to load ORT handpose model: {err:?}");
                return;
            }
        };

        run_worker_loop(engine, &backend, frame_rx, result_tx);
    })
}

fn run_worker_loop<E: HandposeEngine>(
    mut engine: E,
    backend: &RecognizerBackend,
    frame_rx: Receiver<Frame>,
    result_tx: Sender<RecognizedFrame>,
) {
    while let Some(frame) = recv_latest_frame(&frame_rx) {
        let output = match engine.infer(&frame) {
            Ok(output) => output,
            Err(err) => {
                log::warn!("handpose inference failed: {err:?}");
                continue;
            }
        };

        let recognized = build_recognized_frame(output, frame, &backend.estimator);
        if let Some(reading) = &recognized.reading {
            backend.alerts.dispatch(reading);
        }
        if let Err(TrySendError::Disconnected(_)) = result_tx.try_send(recognized) {
            log::info!("result consumer gone, stopping recognizer");
            break;
        }
    }
}

fn recv_latest_frame(frame_rx: &Receiver<Frame>) -> Option<Frame> {
    let mut frame = frame_rx.recv().ok()?;
    // Skip anything that queued up while we were busy.
    while let Ok(newer) = frame_rx.try_recv() {
        frame = newer;
    }
    Some(frame)
}

/// Turns model output into a hand observation and its proximity reading.
pub(crate) fn build_recognized_frame(
    output: HandposeOutput,
    frame: Frame,
    estimator: &ProximityEstimator,
) -> RecognizedFrame {
    let hand = if output.confidence >= MIN_CONFIDENCE {
        BoundingBox::from_points(&output.landmarks).map(|bbox| HandObservation {
            landmarks: output.landmarks,
            bbox,
            confidence: output.confidence,
            handedness: Handedness::from_score(output.handedness),
        })
    } else {
        None
    };

    let reading = hand.as_ref().map(|hand| {
        let (left, right) = hand.bbox.horizontal_extremes();
        estimator.estimate(left, right)
    });

    RecognizedFrame {
        frame,
        hand,
        reading,
    }
}
