use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use ndarray::Array4;
use rayon::prelude::*;

use crate::types::Frame;

pub const INPUT_SIZE: u32 = 224;
pub const NUM_LANDMARKS: usize = 21;

/// Raw model output for one frame, landmarks already in frame pixels.
#[derive(Clone, Debug)]
pub struct HandposeOutput {
    pub landmarks: Vec<(f32, f32)>,
    pub confidence: f32,
    pub handedness: f32,
}

/// How a frame was scaled and padded into the square model input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub orig_w: u32,
    pub orig_h: u32,
}

impl Letterbox {
    pub fn fit(width: u32, height: u32, target: u32) -> Self {
        let scale = target as f32 / (width.max(height) as f32);
        let (new_w, new_h) = scaled_dims(width, height, scale);
        Self {
            scale,
            pad_x: ((target as i64 - new_w as i64) / 2).max(0) as f32,
            pad_y: ((target as i64 - new_h as i64) / 2).max(0) as f32,
            orig_w: width,
            orig_h: height,
        }
    }

    /// Maps a model-space coordinate back into the original frame, clamped to its bounds.
    pub fn unproject(&self, x: f32, y: f32) -> (f32, f32) {
        let fx = (x - self.pad_x) / self.scale;
        let fy = (y - self.pad_y) / self.scale;
        (
            fx.clamp(0.0, self.orig_w.saturating_sub(1) as f32),
            fy.clamp(0.0, self.orig_h.saturating_sub(1) as f32),
        )
    }
}

fn scaled_dims(width: u32, height: u32, scale: f32) -> (u32, u32) {
    (
        (width as f32 * scale).round().max(1.0) as u32,
        (height as f32 * scale).round().max(1.0) as u32,
    )
}

/// Resizes the frame into a black `target`×`target` canvas and normalises it
/// into an NHWC tensor with values in `[0, 1]`.
pub fn prepare_frame(frame: &Frame, target: u32) -> Result<(Array4<f32>, Letterbox)> {
    let expected_len = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(4);
    if frame.rgba.len() != expected_len || expected_len == 0 {
        return Err(anyhow!(
            "frame buffer size mismatch: got {}, expected {}",
            frame.rgba.len(),
            expected_len
        ));
    }

    let letterbox = Letterbox::fit(frame.width, frame.height, target);
    let (new_w, new_h) = scaled_dims(frame.width, frame.height, letterbox.scale);

    let src = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgba.clone(),
        fir::PixelType::U8x4,
    )?;
    let mut dst = fir::images::Image::new(new_w, new_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    fir::Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .context("frame resize failed")?;
    let resized = dst.into_vec();

    let side = target as usize;
    let (pad_x, pad_y) = (letterbox.pad_x as usize, letterbox.pad_y as usize);
    let row_len = new_w as usize * 4;
    let mut canvas = vec![0f32; side * side * 3];
    canvas
        .par_chunks_mut(side * 3)
        .enumerate()
        .for_each(|(y, row)| {
            let Some(src_y) = y.checked_sub(pad_y).filter(|sy| *sy < new_h as usize) else {
                return;
            };
            let src_row = &resized[src_y * row_len..(src_y + 1) * row_len];
            for (x, px) in src_row.chunks_exact(4).enumerate() {
                let dst = (pad_x + x) * 3;
                if dst + 3 > row.len() {
                    break;
                }
                row[dst] = px[0] as f32 / 255.0;
                row[dst + 1] = px[1] as f32 / 255.0;
                row[dst + 2] = px[2] as f32 / 255.0;
            }
        });

    let input = Array4::<f32>::from_shape_vec((1, side, side, 3), canvas)
        .map_err(|err| anyhow!("failed to build input tensor: {err}"))?;
    Ok((input, letterbox))
}

/// Reads the first [`NUM_LANDMARKS`] `(x, y, z)` triples and unprojects them.
pub fn decode_landmarks(flat: &[f32], letterbox: &Letterbox) -> Result<Vec<(f32, f32)>> {
    if flat.len() < NUM_LANDMARKS * 3 {
        return Err(anyhow!(
            "unexpected landmarks length: got {}, need {}",
            flat.len(),
            NUM_LANDMARKS * 3
        ));
    }

    Ok(flat
        .chunks_exact(3)
        .take(NUM_LANDMARKS)
        .map(|xyz| letterbox.unproject(xyz[0], xyz[1]))
        .collect())
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn frame(width: u32, height: u32, value: u8) -> Frame {
        Frame {
            rgba: vec![value; (width * height * 4) as usize],
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn wide_frame_is_padded_vertically() {
        let lb = Letterbox::fit(448, 224, INPUT_SIZE);
        assert_eq!(lb.scale, 0.5);
        assert_eq!(lb.pad_x, 0.0);
        assert_eq!(lb.pad_y, 56.0);
    }

    #[test]
    fn unproject_inverts_letterbox_and_clamps() {
        let lb = Letterbox::fit(448, 224, INPUT_SIZE);
        assert_eq!(lb.unproject(100.0, 106.0), (200.0, 100.0));
        assert_eq!(lb.unproject(-10.0, 500.0), (0.0, 223.0));
    }

    #[test]
    fn decode_needs_all_landmarks() {
        let lb = Letterbox::fit(224, 224, INPUT_SIZE);
        assert!(decode_landmarks(&[0.0; 10], &lb).is_err());
        let points = decode_landmarks(&[1.0; NUM_LANDMARKS * 3 + 6], &lb).unwrap();
        assert_eq!(points.len(), NUM_LANDMARKS);
        assert_eq!(points[0], (1.0, 1.0));
    }

    #[test]
    fn prepared_tensor_has_black_padding() {
        let (input, lb) = prepare_frame(&frame(8, 4, 255), 8).unwrap();
        assert_eq!(input.shape(), &[1, 8, 8, 3]);
        assert_eq!(lb.pad_y, 2.0);
        assert_eq!(input[[0, 0, 0, 0]], 0.0);
        assert_eq!(input[[0, 3, 4, 1]], 1.0);
        assert_eq!(input[[0, 7, 7, 2]], 0.0);
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        let mut bad = frame(4, 4, 0);
        bad.rgba.truncate(10);
        assert!(prepare_frame(&bad, INPUT_SIZE).is_err());
    }
}
