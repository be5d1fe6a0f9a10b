use serde::{Deserialize, Serialize};

/// Real-valued matrix element grid (rows = y, cols = x)
pub type ElementGrid = ndarray::Array2<f64>;

/// Complex scattering sample (I + jQ)
pub type ScatteringSample = num_complex::Complex<f64>;

/// Complex scattering channel over a window
pub type ScatteringGrid = ndarray::Array2<ScatteringSample>;

/// Pixel position in absolute image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelCoord {
    pub x: usize,
    pub y: usize,
}

impl PixelCoord {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned pixel rectangle in absolute image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rect {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self { x, y, width, height }
    }

    /// Exclusive right edge
    pub fn max_x(&self) -> usize {
        self.x + self.width
    }

    /// Exclusive bottom edge
    pub fn max_y(&self) -> usize {
        self.y + self.height
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && x < self.max_x() && y >= self.y && y < self.max_y()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.max_x() <= self.max_x()
            && other.max_y() <= self.max_y()
    }

    /// Grow by `margin` on every side, clipped to `bounds`
    pub fn expand_within(&self, margin: usize, bounds: &Rect) -> Rect {
        let x0 = self.x.saturating_sub(margin).max(bounds.x);
        let y0 = self.y.saturating_sub(margin).max(bounds.y);
        let x1 = self.max_x().saturating_add(margin).min(bounds.max_x());
        let y1 = self.max_y().saturating_add(margin).min(bounds.max_y());
        Rect::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }

    /// Local (row, col) of an absolute pixel; caller guarantees containment
    pub fn local_index(&self, x: usize, y: usize) -> [usize; 2] {
        [y - self.y, x - self.x]
    }

    /// Split into row-major tiles of at most `tile_size` x `tile_size`
    pub fn tiles(&self, tile_size: usize) -> Vec<Rect> {
        let step = tile_size.max(1);
        let mut tiles = Vec::new();
        for ty in (self.y..self.max_y()).step_by(step) {
            let th = step.min(self.max_y() - ty);
            for tx in (self.x..self.max_x()).step_by(step) {
                let tw = step.min(self.max_x() - tx);
                tiles.push(Rect::new(tx, ty, tw, th));
            }
        }
        tiles
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}, {}x{}]", self.x, self.y, self.width, self.height)
    }
}

/// Error types for IDAN filtering
#[derive(Debug, thiserror::Error)]
pub enum IdanError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported matrix type: {0}")]
    UnsupportedMatrix(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

/// Result type for IDAN operations
pub type IdanResult<T> = Result<T, IdanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_within_clips_to_bounds() {
        let image = Rect::new(0, 0, 100, 80);
        let target = Rect::new(10, 70, 20, 10);

        let source = target.expand_within(15, &image);
        assert_eq!(source, Rect::new(0, 55, 45, 25));
        assert!(source.contains_rect(&target));
    }

    #[test]
    fn test_expand_within_saturates_large_margin() {
        let image = Rect::new(0, 0, 100, 80);
        let target = Rect::new(10, 70, 20, 10);

        assert_eq!(target.expand_within(usize::MAX, &image), image);
    }

    #[test]
    fn test_tiles_cover_rect_exactly() {
        let rect = Rect::new(3, 5, 10, 7);
        let tiles = rect.tiles(4);

        assert_eq!(tiles.len(), 6);
        assert_eq!(tiles.iter().map(Rect::area).sum::<usize>(), rect.area());
        assert_eq!(tiles[0], Rect::new(3, 5, 4, 4));
        assert_eq!(tiles[5], Rect::new(11, 9, 2, 3));
    }

    #[test]
    fn test_contains() {
        let rect = Rect::new(2, 2, 3, 3);
        assert!(rect.contains(2, 4));
        assert!(!rect.contains(5, 2));
        assert!(!rect.contains(1, 3));
    }
}
