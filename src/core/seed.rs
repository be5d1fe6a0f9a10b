//! Seed estimation and the normalized seed distance used by region growing

use crate::types::{ElementGrid, PixelCoord, Rect};

/// Representative diagonal-channel vector of an adaptive neighbourhood
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Seed<const N: usize> {
    pub value: [f64; N],
    pub abs_value: [f64; N],
}

impl<const N: usize> Seed<N> {
    pub fn new(value: [f64; N]) -> Self {
        Self {
            value,
            abs_value: value.map(f64::abs),
        }
    }

    /// Marginal median of the 3x3 window around (xc, yc), clipped to `rect`
    pub fn initial(xc: usize, yc: usize, rect: &Rect, diagonals: &[&ElementGrid; N]) -> Self {
        let mut samples = [[0.0f64; 9]; N];
        let mut k = 0;

        for y in yc.saturating_sub(1)..=yc + 1 {
            for x in xc.saturating_sub(1)..=xc + 1 {
                if !rect.contains(x, y) {
                    continue;
                }
                let idx = rect.local_index(x, y);
                for (channel, grid) in samples.iter_mut().zip(diagonals.iter()) {
                    channel[k] = grid[idx];
                }
                k += 1;
            }
        }

        let med = k / 2;
        let value = std::array::from_fn(|i| {
            let window = &mut samples[i][..k];
            window.sort_by(f64::total_cmp);
            window[med]
        });
        Self::new(value)
    }

    /// Channel means over `members`; keeps `self` when `members` is empty
    pub fn updated(&self, members: &[PixelCoord], rect: &Rect, diagonals: &[&ElementGrid; N]) -> Self {
        if members.is_empty() {
            return *self;
        }

        let mut sums = [0.0f64; N];
        for pixel in members {
            let idx = rect.local_index(pixel.x, pixel.y);
            for (sum, grid) in sums.iter_mut().zip(diagonals.iter()) {
                *sum += grid[idx];
            }
        }
        let count = members.len() as f64;
        Self::new(sums.map(|s| s / count))
    }

    /// Sum over channels of |p - seed| / |seed|.
    ///
    /// A zero seed channel contributes nothing when the pixel matches it
    /// exactly and makes the distance infinite otherwise.
    pub fn distance(&self, pixel: &[f64; N]) -> f64 {
        let mut dist = 0.0;
        for i in 0..N {
            let diff = (pixel[i] - self.value[i]).abs();
            if self.abs_value[i] == 0.0 {
                if diff != 0.0 {
                    return f64::INFINITY;
                }
            } else {
                dist += diff / self.abs_value[i];
            }
        }
        dist
    }
}

/// Diagonal channel values of one pixel
pub(crate) fn channel_vector<const N: usize>(
    diagonals: &[&ElementGrid; N],
    idx: [usize; 2],
) -> [f64; N] {
    std::array::from_fn(|i| diagonals[i][idx])
}
