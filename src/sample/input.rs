use image::RgbImage;

/// Flattens a sub-window as R, G, B, ... scaled to [0, 1].
///
/// With `standardize`, the values are additionally shifted to zero mean and
/// scaled to unit variance (a flat window is only centred).
pub fn lane_to_input(lane: &RgbImage, standardize: bool) -> Vec<f64> {
    let mut values: Vec<f64> = lane
        .pixels()
        .flat_map(|p| p.0.iter().map(|&c| c as f64 / 255.0))
        .collect();
    if standardize && !values.is_empty() {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std_dev = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        let scale = if std_dev > 0.0 { 1.0 / std_dev } else { 1.0 };
        values.iter_mut().for_each(|v| *v = (*v - mean) * scale);
    }
    values
}
