//! Draw detection boxes and captions onto frames

use fieldbot_core::Detection;

use crate::frame::Frame;

/// BGR red, used for the target label
pub const TARGET_COLOR: [u8; 3] = [0, 0, 255];
/// BGR green, used for everything else
pub const OTHER_COLOR: [u8; 3] = [0, 255, 0];

const GLYPH_WIDTH: i32 = 5;
const GLYPH_HEIGHT: i32 = 7;
const GLYPH_ADVANCE: i32 = 6;
/// Gap between the caption baseline and the box top
const CAPTION_OFFSET: i32 = 10;

/// Draws boxes and `"<label> <confidence>"` captions in place
#[derive(Debug, Clone)]
pub struct Annotator {
    target_label: String,
    thickness: i32,
}

impl Annotator {
    pub fn new(target_label: impl Into<String>) -> Self {
        Self {
            target_label: target_label.into(),
            thickness: 2,
        }
    }

    pub fn with_thickness(mut self, thickness: u32) -> Self {
        self.thickness = thickness.max(1) as i32;
        self
    }

    pub fn color_for(&self, detection: &Detection) -> [u8; 3] {
        if detection.class_label == self.target_label {
            TARGET_COLOR
        } else {
            OTHER_COLOR
        }
    }

    pub fn annotate(&self, frame: &mut Frame, detections: &[Detection]) {
        for detection in detections {
            let color = self.color_for(detection);
            let bbox = detection.bbox;
            if ![bbox.x1, bbox.y1, bbox.x2, bbox.y2].iter().all(|c| c.is_finite()) {
                continue;
            }
            let (x1, y1) = (bbox.x1 as i32, bbox.y1 as i32);
            let (x2, y2) = (bbox.x2 as i32, bbox.y2 as i32);

            for t in 0..self.thickness {
                draw_rectangle(frame, x1 + t, y1 + t, x2 - t, y2 - t, color);
            }

            let caption = format!("{} {:.2}", detection.class_label, detection.confidence);
            let caption_y = (y1 - CAPTION_OFFSET - GLYPH_HEIGHT / 2).max(0);
            draw_text(frame, x1.max(0), caption_y, &caption, color);
        }
    }
}

fn put_pixel(frame: &mut Frame, x: i32, y: i32, color: [u8; 3]) {
    if x < 0 || y < 0 || x >= frame.width() as i32 || y >= frame.height() as i32 {
        return;
    }
    let idx = (y as usize * frame.width() as usize + x as usize) * Frame::CHANNELS;
    frame.data_mut()[idx..idx + Frame::CHANNELS].copy_from_slice(&color);
}

fn draw_rectangle(frame: &mut Frame, left: i32, top: i32, right: i32, bottom: i32, color: [u8; 3]) {
    if right < left || bottom < top {
        return;
    }
    let max_x = frame.width() as i32 - 1;
    let max_y = frame.height() as i32 - 1;

    for x in left.max(0)..=right.min(max_x) {
        put_pixel(frame, x, top, color);
        put_pixel(frame, x, bottom, color);
    }
    for y in top.max(0)..=bottom.min(max_y) {
        put_pixel(frame, left, y, color);
        put_pixel(frame, right, y, color);
    }
}

fn draw_text(frame: &mut Frame, mut x: i32, y: i32, text: &str, color: [u8; 3]) {
    for ch in text.chars().flat_map(char::to_uppercase) {
        if let Some(rows) = glyph(ch) {
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 1 {
                        put_pixel(frame, x + col, y + row as i32, color);
                    }
                }
            }
        }
        x += GLYPH_ADVANCE;
        if x >= frame.width() as i32 {
            break;
        }
    }
}

/// 5x7 bitmap rows, most significant of the low five bits is the left column
fn glyph(ch: char) -> Option<[u8; 7]> {
    let rows = match ch {
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        '%' => [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        _ => return None,
    };
    Some(rows)
}
