use image::{imageops, RgbImage};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MagnifierError, Result};
use crate::label::{FrameLabel, WindowLabel, WindowSize};

/// How sub-windows are drawn from a lane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub window: WindowSize,
    /// Sub-windows drawn per lane.
    pub nb_samples: usize,
    /// Spread of the head inside the window, in `[0, 1]`: 0 always centres
    /// the head, 1 spreads it over every margin-respecting position.
    pub distribution: f64,
    /// Minimum clearance between the head and the window border.
    pub margin: u32,
    /// Bias windows toward the head; otherwise windows are uniform over the lane.
    pub close_to_head: bool,
}

impl Default for SamplingParams {
    fn default() -> Self {
        SamplingParams {
            window: WindowSize::square(150),
            nb_samples: 3,
            distribution: 0.3,
            margin: 10,
            close_to_head: true,
        }
    }
}

impl SamplingParams {
    pub fn validate(&self) -> Result<()> {
        if self.nb_samples == 0 {
            return Err(MagnifierError::InvalidParameter("nb_samples must be at least 1".into()));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(MagnifierError::InvalidParameter(format!(
                "window must be non-empty, got {:?}",
                self.window
            )));
        }
        if !(0.0..=1.0).contains(&self.distribution) {
            return Err(MagnifierError::InvalidParameter(format!(
                "distribution must lie in [0, 1], got {}",
                self.distribution
            )));
        }
        Ok(())
    }
}

/// Cuts `nb_samples` sub-windows out of every lane and re-bases each label
/// into its own window.
///
/// # Arguments
/// - `lanes`: transformed lane images
/// - `labels`: one per lane, in lane pixel coordinates
/// - `params`: window size, samples per lane, placement policy
/// - `rng`: the only source of randomness; equal seeds give equal windows
///
/// # Ordering
/// Output is grouped by input: all samples of lane `i` precede those of lane
/// `i + 1`. A window larger than a lane is clamped to the lane on that axis.
///
/// # Errors
/// `InvalidParameter` for invalid `params`, `DataShape` when `lanes` and
/// `labels` differ in length or a head lies outside its lane.
pub fn sample_lanes<R: Rng + ?Sized>(
    lanes: &[RgbImage],
    labels: &[FrameLabel],
    params: &SamplingParams,
    rng: &mut R,
) -> Result<(Vec<RgbImage>, Vec<WindowLabel>)> {
    params.validate()?;
    if lanes.len() != labels.len() {
        return Err(MagnifierError::DataShape(format!(
            "{} lanes but {} labels",
            lanes.len(),
            labels.len()
        )));
    }

    let total = lanes.len() * params.nb_samples;
    let mut sub_lanes = Vec::with_capacity(total);
    let mut sub_labels = Vec::with_capacity(total);
    let mut fallbacks = 0usize;

    for (idx, (lane, label)) in lanes.iter().zip(labels.iter()).enumerate() {
        let (width, height) = lane.dimensions();
        let window = params.window.clamped_to(width, height);
        let head = head_pixel(label, width, height, idx)?;

        for _ in 0..params.nb_samples {
            let origin = match head {
                Some((hx, hy)) if params.close_to_head => {
                    let (ox, fx) = close_to_head_origin(width, window.width, hx, params, rng);
                    let (oy, fy) = close_to_head_origin(height, window.height, hy, params, rng);
                    fallbacks += usize::from(fx || fy);
                    (ox, oy)
                }
                _ => (
                    uniform_origin(width, window.width, rng),
                    uniform_origin(height, window.height, rng),
                ),
            };

            let local_head = head.and_then(|(hx, hy)| {
                let inside_x = hx >= origin.0 && hx < origin.0 + window.width;
                let inside_y = hy >= origin.1 && hy < origin.1 + window.height;
                (inside_x && inside_y).then(|| (hx - origin.0, hy - origin.1))
            });

            sub_lanes.push(
                imageops::crop_imm(lane, origin.0, origin.1, window.width, window.height).to_image(),
            );
            sub_labels.push(WindowLabel {
                head: local_head,
                direction: label.direction,
                window,
                origin,
            });
        }
    }

    if fallbacks > 0 {
        debug!(fallbacks, "margin could not be honoured, windows centred on the head");
    }
    Ok((sub_lanes, sub_labels))
}

/// Pixel holding the head, or `None` for an unlabeled frame.
fn head_pixel(label: &FrameLabel, width: u32, height: u32, idx: usize) -> Result<Option<(u32, u32)>> {
    let Some(head) = label.head else {
        return Ok(None);
    };
    let (x, y) = (head.x.floor(), head.y.floor());
    if x < 0.0 || y < 0.0 || x >= width as f64 || y >= height as f64 {
        return Err(MagnifierError::DataShape(format!(
            "head ({}, {}) of lane {} lies outside its {}x{} image",
            head.x, head.y, idx, width, height
        )));
    }
    Ok(Some((x as u32, y as u32)))
}

/// Window origin on one axis keeping the head `margin` pixels from both
/// borders. Returns `(origin, fell_back)`; when no origin satisfies the
/// margin the window is centred on the head instead.
fn close_to_head_origin<R: Rng + ?Sized>(
    extent: u32,
    window: u32,
    head: u32,
    params: &SamplingParams,
    rng: &mut R,
) -> (u32, bool) {
    let (extent, window, head, margin) =
        (extent as i64, window as i64, head as i64, params.margin as i64);

    // Feasible head positions inside the window.
    let lo = margin.max(head - (extent - window));
    let hi = (window - 1 - margin).min(head);
    if lo > hi {
        return (centred_origin(extent, window, head), true);
    }

    let centre = (window - 1) as f64 / 2.0;
    let half_range = (centre - margin as f64).max(0.0);
    let u: f64 = rng.gen_range(-1.0..=1.0);
    let local = ((centre + params.distribution * u * half_range).round() as i64).clamp(lo, hi);
    ((head - local) as u32, false)
}

fn centred_origin(extent: i64, window: i64, head: i64) -> u32 {
    (head - (window - 1) / 2).clamp(0, extent - window) as u32
}

fn uniform_origin<R: Rng + ?Sized>(extent: u32, window: u32, rng: &mut R) -> u32 {
    rng.gen_range(0..=extent - window)
}
