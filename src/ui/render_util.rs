use std::sync::Arc;

use gpui::RenderImage;
use image::{Frame as ImageFrame, ImageBuffer, Rgba};

use crate::{pipeline::overlay, types::RecognizedFrame};

/// Annotates the recognized frame and uploads it as a GPUI image.
pub(super) fn recognized_to_image(
    recognized: &RecognizedFrame,
    threshold: f32,
) -> Option<Arc<RenderImage>> {
    let frame = &recognized.frame;
    let mut pixels = frame.rgba.clone();
    if let Some(hand) = &recognized.hand {
        overlay::draw_hand(
            &mut pixels,
            frame.width,
            frame.height,
            hand,
            recognized.reading.as_ref(),
            threshold,
        );
    }

    // GPUI wants BGRA.
    for px in pixels.chunks_exact_mut(4) {
        px.swap(0, 2);
    }

    let buffer = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(frame.width, frame.height, pixels)?;
    Some(Arc::new(RenderImage::new(vec![ImageFrame::new(buffer)])))
}
