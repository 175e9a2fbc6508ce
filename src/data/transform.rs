use image::imageops::{self, FilterType};
use image::RgbImage;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{MagnifierError, Result};
use crate::label::{Direction, FrameLabel, HeadPosition};

/// Probability and strength of the brightness/contrast jitter applied when
/// augmentation is on.
const JITTER_PROB: f64 = 0.5;
const JITTER_STRENGTH: f64 = 0.2;

/// How a raw lane image is brought to the common training shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadingParams {
    /// Pixels per meter after resizing.
    pub scale: f64,
    /// Final `[vertical, horizontal]` size; lanes are padded on the right.
    pub dimensions: [u32; 2],
    /// Standardize every sub-window before it reaches the model.
    pub standardize: bool,
    /// Random brightness/contrast jitter.
    pub augmentation: bool,
    /// Mirror lanes where the swimmer heads left so every swimmer heads right.
    pub flip: bool,
}

impl Default for LoadingParams {
    fn default() -> Self {
        LoadingParams {
            scale: 35.0,
            dimensions: [108, 1820],
            standardize: true,
            augmentation: true,
            flip: true,
        }
    }
}

impl LoadingParams {
    /// `(width, height)` of every transformed lane.
    pub fn lane_size(&self) -> (u32, u32) {
        (self.dimensions[1], self.dimensions[0])
    }
}

/// Resizes a lane to `scale` pixels per meter, optionally flips and jitters
/// it, then pads it with black on the right to `dimensions`. The label
/// follows every geometric step.
pub fn transform_lane<R: Rng + ?Sized>(
    image: &RgbImage,
    label: &FrameLabel,
    video_length: f64,
    params: &LoadingParams,
    rng: &mut R,
) -> Result<(RgbImage, FrameLabel)> {
    let (lane_width, lane_height) = params.lane_size();
    let width = (params.scale * video_length).round();
    if !(width >= 1.0) || lane_height == 0 {
        return Err(MagnifierError::DataShape(format!(
            "cannot resize a lane of {} m at scale {} to height {}",
            video_length, params.scale, lane_height
        )));
    }
    if width > lane_width as f64 {
        return Err(MagnifierError::DataShape(format!(
            "resized lane is {} px wide, padding only allows {}",
            width, lane_width
        )));
    }
    let width = width as u32;

    let (src_width, src_height) = image.dimensions();
    let mut resized = imageops::resize(image, width, lane_height, FilterType::Triangle);
    let (rx, ry) = (width as f64 / src_width as f64, lane_height as f64 / src_height as f64);
    // Shrinking can map the last source column past the last resized pixel.
    let (max_x, max_y) = ((width - 1) as f64, (lane_height - 1) as f64);
    let mut label = FrameLabel {
        head: label
            .head
            .map(|h| HeadPosition::new((h.x * rx).clamp(0.0, max_x), (h.y * ry).clamp(0.0, max_y))),
        direction: label.direction,
    };

    if params.flip && label.direction == Some(Direction::Left) {
        imageops::flip_horizontal_in_place(&mut resized);
        label.head = label.head.map(|h| HeadPosition::new(max_x - h.x, h.y));
        label.direction = Some(Direction::Right);
    }

    if params.augmentation {
        jitter(&mut resized, rng);
    }

    let mut lane = RgbImage::new(lane_width, lane_height);
    imageops::replace(&mut lane, &resized, 0, 0);
    Ok((lane, label))
}

fn jitter<R: Rng + ?Sized>(image: &mut RgbImage, rng: &mut R) {
    if rng.gen::<f64>() >= JITTER_PROB {
        return;
    }
    let bright = 1.0 + rng.gen_range(-JITTER_STRENGTH..JITTER_STRENGTH);
    let contrast = 1.0 + rng.gen_range(-JITTER_STRENGTH..JITTER_STRENGTH);
    for pixel in image.pixels_mut() {
        for c in pixel.0.iter_mut() {
            let v = ((*c as f64 / 255.0 - 0.5) * contrast + 0.5) * bright;
            *c = (v.clamp(0.0, 1.0) * 255.0) as u8;
        }
    }
}
