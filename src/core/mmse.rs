use crate::types::{ElementGrid, PixelCoord, Rect};

/// Mean and unbiased sample variance; variance is 0 for fewer than two samples
fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }

    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = if values.len() > 1 {
        values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (values.len() - 1) as f64
    } else {
        0.0
    };

    (mean, variance)
}

/// MMSE weight from span samples.
///
/// 0 keeps the neighbourhood mean (homogeneous area), 1 keeps the pixel's
/// own value (edge or point target).
pub fn mmse_weight(span_values: &[f64], sigma_v_sqr: f64) -> f64 {
    let (mean, variance) = mean_and_variance(span_values);
    if variance == 0.0 {
        return 0.0;
    }

    ((variance - mean * mean * sigma_v_sqr) / variance).clamp(0.0, 1.0)
}

/// MMSE weight over the span of an adaptive neighbourhood
pub fn filter_scale(neighbourhood: &[PixelCoord], rect: &Rect, span: &ElementGrid, sigma_v_sqr: f64) -> f64 {
    let span_values: Vec<f64> = neighbourhood
        .iter()
        .map(|p| span[rect.local_index(p.x, p.y)])
        .collect();

    mmse_weight(&span_values, sigma_v_sqr)
}

/// Shrinks one element at (x, y) towards its neighbourhood mean.
/// `neighbourhood` must not be empty.
pub fn filtered_value(
    x: usize,
    y: usize,
    neighbourhood: &[PixelCoord],
    rect: &Rect,
    grid: &ElementGrid,
    b: f64,
) -> f64 {
    let mut mean = 0.0;
    for pixel in neighbourhood {
        mean += grid[rect.local_index(pixel.x, pixel.y)];
    }
    mean /= neighbourhood.len() as f64;

    mean + b * (grid[rect.local_index(x, y)] - mean)
}
