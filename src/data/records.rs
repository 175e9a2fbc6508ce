use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{MagnifierError, Result};
use crate::label::{Direction, FrameLabel, FrameRecord, HeadPosition};

/// One row of a `<video>.csv` label file.
#[derive(Debug, Deserialize)]
struct LabelRow {
    lane: u32,
    frame: u32,
    x_head: f64,
    y_head: f64,
    swimming_way: f64,
}

/// Name of the lane image holding `frame` of `lane`.
pub fn image_name(lane: u32, frame: u32) -> String {
    format!("l{}_f{:04}.jpg", lane, frame)
}

/// Collects the labeled frames of every video whose label file is listed.
///
/// For `<video>.csv` the images are looked up in `lanes_root/<video>` and the
/// lane length in `calibration_root/<video>.txt`. Frames whose image is not on
/// disk are skipped. Unlabeled frames (negative `x_head`) are kept only with
/// `take_all`, and `lane_number` restricts the output to a single lane.
pub fn generate_records(
    label_paths: &[PathBuf],
    lanes_root: &Path,
    calibration_root: &Path,
    take_all: bool,
    lane_number: Option<u32>,
) -> Result<Vec<FrameRecord>> {
    let mut sources = Vec::with_capacity(label_paths.len());
    for label_path in label_paths {
        let video = label_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| MagnifierError::DataShape(format!("bad label file name {}", label_path.display())))?;
        let images = lanes_root.join(video);
        let calibration = calibration_root.join(format!("{}.txt", video));
        for path in [label_path, &images, &calibration] {
            if !path.exists() {
                return Err(MagnifierError::MissingInput { path: path.clone() });
            }
        }
        sources.push((label_path, images, calibration));
    }

    let mut records = Vec::new();
    for (label_path, images, calibration) in sources {
        let video_length = read_video_length(&calibration)?;
        let before = records.len();
        read_labels(label_path, &images, video_length, take_all, lane_number, &mut records)?;
        debug!(labels = %label_path.display(), frames = records.len() - before, video_length, "read label file");
    }
    Ok(records)
}

fn read_labels(
    label_path: &Path,
    images: &Path,
    video_length: f64,
    take_all: bool,
    lane_number: Option<u32>,
    records: &mut Vec<FrameRecord>,
) -> Result<()> {
    let mut reader = csv::Reader::from_path(label_path).map_err(|e| MagnifierError::csv(label_path, e))?;
    let headers = reader.headers().map_err(|e| MagnifierError::csv(label_path, e))?;
    if !headers.iter().any(|h| h == "swimming_way") {
        return Err(MagnifierError::DataShape(format!(
            "{} has no swimming_way column",
            label_path.display()
        )));
    }

    let mut missing = 0usize;
    for row in reader.deserialize::<LabelRow>() {
        let row = row.map_err(|e| MagnifierError::csv(label_path, e))?;
        if lane_number.map_or(false, |lane| lane != row.lane) {
            continue;
        }
        let head = HeadPosition::from_raw(row.x_head, row.y_head);
        if head.is_none() && !take_all {
            continue;
        }
        let image_path = images.join(image_name(row.lane, row.frame));
        if !image_path.exists() {
            missing += 1;
            continue;
        }
        records.push(FrameRecord {
            image_path,
            label: FrameLabel::new(head, Direction::from_way(row.swimming_way)),
            video_length,
        });
    }
    if missing > 0 {
        warn!(labels = %label_path.display(), missing, "skipped labeled frames without an image");
    }
    Ok(())
}

/// Lane length in meters: the last non-empty line of a calibration file holds
/// the extreme points `x0,y0,x1,y1`.
pub fn read_video_length(path: &Path) -> Result<f64> {
    let text = fs::read_to_string(path).map_err(|e| MagnifierError::io(path, e))?;
    let malformed = || MagnifierError::DataShape(format!("malformed calibration file {}", path.display()));

    let line = text.lines().rev().find(|l| !l.trim().is_empty()).ok_or_else(malformed)?;
    let values = line
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<f64>, _>>()
        .map_err(|_| malformed())?;
    if values.len() != 4 {
        return Err(malformed());
    }
    Ok((values[2] - values[0]).abs())
}
