use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which way the swimmer is heading along the lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    /// Parses the `swimming_way` column (-1 / 1). Anything else is unset.
    pub fn from_way(way: f64) -> Option<Direction> {
        if way == -1.0 {
            Some(Direction::Left)
        } else if way == 1.0 {
            Some(Direction::Right)
        } else {
            None
        }
    }

    pub fn value(self) -> f64 {
        match self {
            Direction::Left => -1.0,
            Direction::Right => 1.0,
        }
    }
}

/// Regression target of an optional direction: unset regresses to 0.
pub fn direction_value(direction: Option<Direction>) -> f64 {
    direction.map_or(0.0, Direction::value)
}

/// Head position in full-image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadPosition {
    pub x: f64,
    pub y: f64,
}

impl HeadPosition {
    pub fn new(x: f64, y: f64) -> Self {
        HeadPosition { x, y }
    }

    /// Label files mark unlabeled frames with negative coordinates.
    pub fn from_raw(x: f64, y: f64) -> Option<HeadPosition> {
        if x < 0.0 || y < 0.0 {
            None
        } else {
            Some(HeadPosition { x, y })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameLabel {
    pub head: Option<HeadPosition>,
    pub direction: Option<Direction>,
}

impl FrameLabel {
    pub fn new(head: Option<HeadPosition>, direction: Option<Direction>) -> Self {
        FrameLabel { head, direction }
    }
}

/// One labeled lane image on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub image_path: PathBuf,
    pub label: FrameLabel,
    /// Length of the filmed lane in meters.
    pub video_length: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl WindowSize {
    pub fn new(width: u32, height: u32) -> Self {
        WindowSize { width, height }
    }

    pub fn square(side: u32) -> Self {
        WindowSize { width: side, height: side }
    }

    /// The window actually cut from an image of the given size.
    pub fn clamped_to(self, image_width: u32, image_height: u32) -> WindowSize {
        WindowSize {
            width: self.width.min(image_width),
            height: self.height.min(image_height),
        }
    }

    /// `150` for a square window, `150x108` otherwise; used in artifact names.
    pub fn tag(self) -> String {
        if self.width == self.height {
            self.width.to_string()
        } else {
            format!("{}x{}", self.width, self.height)
        }
    }

    /// Length of a zoom model's output for this window:
    /// `width + 1` x-classes, `height + 1` y-classes, one direction scalar.
    pub fn output_len(self) -> usize {
        self.width as usize + 1 + self.height as usize + 1 + 1
    }

    /// Length of the flattened RGB input for this window.
    pub fn input_len(self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Label of a sub-window, expressed in that sub-window's own frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowLabel {
    /// Crop-local head pixel; `None` when the head is not inside the crop.
    pub head: Option<(u32, u32)>,
    pub direction: Option<Direction>,
    /// Effective size of the crop.
    pub window: WindowSize,
    /// Top-left corner of the crop in the parent image.
    pub origin: (u32, u32),
}

impl WindowLabel {
    /// Maps the crop-local head back into the parent image.
    pub fn to_image_space(&self) -> Option<HeadPosition> {
        self.head.map(|(x, y)| {
            HeadPosition::new((x + self.origin.0) as f64, (y + self.origin.1) as f64)
        })
    }

    /// Class pair used by the loss: index `width` / `height` means "absent".
    pub fn classes(&self) -> (usize, usize) {
        match self.head {
            Some((x, y)) => (x as usize, y as usize),
            None => (self.window.width as usize, self.window.height as usize),
        }
    }

    pub fn direction_value(&self) -> f64 {
        direction_value(self.direction)
    }
}
