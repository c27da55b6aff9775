//! Draws the hand skeleton, its bounding box and a proximity gauge into an
//! RGBA frame buffer.

use crate::{
    proximity::ProximityReading,
    types::{BoundingBox, HandObservation},
};

/// MediaPipe hand topology: wrist, then four joints per finger.
pub const CONNECTIONS: &[(usize, usize)] = &[
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (0, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (0, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
    (5, 9),
    (9, 13),
    (13, 17),
];

const SKELETON_THICKNESS: i32 = 3;
const BOX_THICKNESS: i32 = 2;
const GAUGE_HEIGHT: u32 = 10;

pub const SAFE_COLOR: [u8; 4] = [0, 255, 0, 255];
pub const ALERT_COLOR: [u8; 4] = [239, 68, 68, 255];
const SKELETON_COLOR: [u8; 4] = [56, 189, 248, 255];
const JOINT_COLOR: [u8; 4] = [248, 113, 113, 255];
const GAUGE_TRACK_COLOR: [u8; 4] = [30, 41, 59, 255];

struct Canvas<'a> {
    buffer: &'a mut [u8],
    width: u32,
    height: u32,
}

pub fn box_color(reading: Option<&ProximityReading>) -> [u8; 4] {
    match reading {
        Some(r) if r.alert => ALERT_COLOR,
        _ => SAFE_COLOR,
    }
}

/// Fraction of the gauge to fill: full at zero distance, empty at twice the threshold.
pub fn gauge_fill(reading: &ProximityReading, threshold: f32) -> f32 {
    match reading.distance {
        Some(distance) if threshold > 0.0 => (1.0 - distance / (2.0 * threshold)).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

pub fn draw_hand(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    hand: &HandObservation,
    reading: Option<&ProximityReading>,
    threshold: f32,
) {
    let mut canvas = Canvas {
        buffer,
        width,
        height,
    };

    let color = box_color(reading);
    canvas.rect(&hand.bbox, color, BOX_THICKNESS);

    for &(a, b) in CONNECTIONS {
        if let (Some(&pa), Some(&pb)) = (hand.landmarks.get(a), hand.landmarks.get(b)) {
            canvas.line(pa, pb, SKELETON_COLOR, SKELETON_THICKNESS);
        }
    }
    for &(x, y) in &hand.landmarks {
        canvas.circle((x as i32, y as i32), SKELETON_THICKNESS + 1, JOINT_COLOR);
    }

    if let Some(reading) = reading {
        canvas.gauge(gauge_fill(reading, threshold), color);
    }
}

impl Canvas<'_> {
    fn rect(&mut self, bbox: &BoundingBox, color: [u8; 4], thickness: i32) {
        let corners = [
            (bbox.x_min, bbox.y_min),
            (bbox.x_max, bbox.y_min),
            (bbox.x_max, bbox.y_max),
            (bbox.x_min, bbox.y_max),
        ];
        for i in 0..corners.len() {
            self.line(corners[i], corners[(i + 1) % corners.len()], color, thickness);
        }
    }

    fn gauge(&mut self, fill: f32, color: [u8; 4]) {
        if self.height < GAUGE_HEIGHT {
            return;
        }
        let filled = (self.width as f32 * fill).round() as u32;
        for y in self.height - GAUGE_HEIGHT..self.height {
            for x in 0..self.width {
                let c = if x < filled { color } else { GAUGE_TRACK_COLOR };
                self.put(x as i32, y as i32, c);
            }
        }
    }

    // Bresenham with a diamond brush for thickness.
    fn line(&mut self, p0: (f32, f32), p1: (f32, f32), color: [u8; 4], thickness: i32) {
        let (mut x0, mut y0) = (p0.0 as i32, p0.1 as i32);
        let (x1, y1) = (p1.0 as i32, p1.1 as i32);
        let dx = (x1 - x0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let dy = -(y1 - y0).abs();
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let radius = (thickness.max(1) - 1) / 2;

        loop {
            for ox in -radius..=radius {
                for oy in -radius..=radius {
                    if ox.abs() + oy.abs() <= radius {
                        self.put(x0 + ox, y0 + oy, color);
                    }
                }
            }
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    fn circle(&mut self, (cx, cy): (i32, i32), radius: i32, color: [u8; 4]) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.put(cx + dx, cy + dy, color);
                }
            }
        }
    }

    fn put(&mut self, x: i32, y: i32, color: [u8; 4]) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return;
        }
        let idx = ((y as u32 * self.width + x as u32) as usize) * 4;
        if let Some(px) = self.buffer.get_mut(idx..idx + 4) {
            px.copy_from_slice(&color);
        }
    }
}
