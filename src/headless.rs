use crossbeam_channel::Receiver;

use crate::types::RecognizedFrame;

/// Logs readings until the recognizer shuts down.
pub fn run(result_rx: Receiver<RecognizedFrame>) -> anyhow::Result<()> {
    log::info!("running headless, press Ctrl+C to quit");

    let mut hand_visible = false;
    for recognized in result_rx.iter() {
        log::debug!(
            "frame processed {:?} after capture",
            recognized.frame.timestamp.elapsed()
        );
        match recognized.reading {
            Some(reading) => {
                hand_visible = true;
                log::info!("{}", recognized.status_text());
                if reading.distance.is_none() {
                    log::warn!(
                        "hand width {:.1} px is too small to measure",
                        reading.pixel_width
                    );
                }
            }
            None if hand_visible => {
                hand_visible = false;
                log::info!("No hand detected");
            }
            None => {}
        }
    }

    log::warn!("hand tracking stopped, exiting");
    Ok(())
}
