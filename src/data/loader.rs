use image::RgbImage;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};

use crate::data::transform::{transform_lane, LoadingParams};
use crate::error::{MagnifierError, Result};
use crate::label::{FrameLabel, FrameRecord};

/// A batch of full lanes with their image-space labels.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub lanes: Vec<RgbImage>,
    pub labels: Vec<FrameLabel>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }
}

/// Indexed source of lane batches.
///
/// Ordering only changes through [`reshuffle`](BatchProvider::reshuffle), so
/// a training loop decides when an epoch boundary happens.
pub trait BatchProvider {
    /// Number of batches.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&mut self, index: usize) -> Result<Batch>;

    fn reshuffle(&mut self, rng: &mut dyn RngCore);
}

/// Loads and transforms lane images from disk, one batch at a time.
#[derive(Debug, Clone)]
pub struct LaneLoader {
    records: Vec<FrameRecord>,
    batch_size: usize,
    params: LoadingParams,
    augment_rng: StdRng,
}

impl LaneLoader {
    /// `seed` drives the augmentation jitter only.
    pub fn new(records: Vec<FrameRecord>, batch_size: usize, params: LoadingParams, seed: u64) -> Result<Self> {
        if batch_size == 0 {
            return Err(MagnifierError::InvalidParameter("batch_size must be at least 1".into()));
        }
        Ok(LaneLoader {
            records,
            batch_size,
            params,
            augment_rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    pub fn params(&self) -> &LoadingParams {
        &self.params
    }
}

impl BatchProvider for LaneLoader {
    fn len(&self) -> usize {
        (self.records.len() + self.batch_size - 1) / self.batch_size
    }

    fn get(&mut self, index: usize) -> Result<Batch> {
        if index >= self.len() {
            return Err(MagnifierError::InvalidParameter(format!(
                "batch {} out of range, loader has {}",
                index,
                self.len()
            )));
        }
        let start = index * self.batch_size;
        let end = (start + self.batch_size).min(self.records.len());

        let mut batch = Batch::default();
        for record in &self.records[start..end] {
            let image = image::open(&record.image_path)
                .map_err(|source| MagnifierError::Image {
                    path: record.image_path.clone(),
                    source,
                })?
                .to_rgb8();
            let (lane, label) = transform_lane(
                &image,
                &record.label,
                record.video_length,
                &self.params,
                &mut self.augment_rng,
            )?;
            batch.lanes.push(lane);
            batch.labels.push(label);
        }
        Ok(batch)
    }

    fn reshuffle(&mut self, rng: &mut dyn RngCore) {
        self.records.shuffle(rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{Direction, HeadPosition};
    use image::Rgb;
    use std::path::PathBuf;

    fn write_lane(dir: &std::path::Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(20, 5, Rgb([90, 120, 150])).save(&path).unwrap();
        path
    }

    #[test]
    fn batches_cover_every_record_once() {
        let dir = tempfile::tempdir().unwrap();
        let records: Vec<FrameRecord> = (0..5)
            .map(|i| FrameRecord {
                image_path: write_lane(dir.path(), &format!("l1_f000{}.png", i)),
                label: FrameLabel::new(Some(HeadPosition::new(i as f64, 1.0)), Some(Direction::Right)),
                video_length: 1.0,
            })
            .collect();
        let params = LoadingParams {
            scale: 20.0,
            dimensions: [5, 30],
            standardize: false,
            augmentation: false,
            flip: true,
        };
        let mut loader = LaneLoader::new(records, 2, params, 0).unwrap();
        assert_eq!(loader.len(), 3);

        let sizes: Vec<usize> = (0..3).map(|i| loader.get(i).unwrap().len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(loader.get(0).unwrap().lanes[0].dimensions(), (30, 5));
        assert!(loader.get(3).is_err());

        let mut rng = StdRng::seed_from_u64(3);
        loader.reshuffle(&mut rng);
        assert_eq!(loader.records().len(), 5);
    }
}
