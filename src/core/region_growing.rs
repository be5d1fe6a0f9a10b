//! Two-pass adaptive neighbourhood search.
//!
//! Pass 1 grows an 8-connected region breadth-first from the target pixel,
//! accepting pixels whose seed distance is below the pass-1 threshold and
//! remembering the rejected ones. Pass 2 re-tests only those rejected pixels
//! against the mean of the accepted region with the relaxed threshold.

use crate::core::seed::{channel_vector, Seed};
use crate::types::{ElementGrid, PixelCoord, Rect};

/// Neighbour offsets in scan order: NW, N, NE, W, E, SW, S, SE
const NEIGHBOUR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Scratch visited flags over one source rectangle.
///
/// Owned by a single worker and cleared between pixels; only the flags set
/// by the last search are reset.
#[derive(Debug, Clone)]
pub struct VisitedGrid {
    width: usize,
    flags: Vec<bool>,
    touched: Vec<usize>,
}

impl VisitedGrid {
    pub fn new(rect: &Rect) -> Self {
        Self {
            width: rect.width,
            flags: vec![false; rect.area()],
            touched: Vec::new(),
        }
    }

    /// Marks a local (row, col) as visited; false if it already was
    fn visit(&mut self, idx: [usize; 2]) -> bool {
        let flat = idx[0] * self.width + idx[1];
        if self.flags[flat] {
            return false;
        }
        self.flags[flat] = true;
        self.touched.push(flat);
        true
    }

    pub fn clear(&mut self) {
        for flat in self.touched.drain(..) {
            self.flags[flat] = false;
        }
    }
}

/// Result of the pass-1 region growing
#[derive(Debug, Clone, Default)]
pub struct GrowthResult {
    /// Accepted pixels in BFS order
    pub neighbourhood: Vec<PixelCoord>,
    /// Rejected pixels in BFS order
    pub background: Vec<PixelCoord>,
}

/// Breadth-first region growing from (xc, yc).
///
/// Stops once the neighbourhood reaches `target_size` at the end of a round,
/// or mid-round as soon as it exceeds `target_size` after a frontier pixel's
/// neighbours are scanned. `visited` is cleared before returning.
#[allow(clippy::too_many_arguments)]
pub fn grow_region<const N: usize>(
    xc: usize,
    yc: usize,
    rect: &Rect,
    diagonals: &[&ElementGrid; N],
    seed: &Seed<N>,
    threshold: f64,
    target_size: usize,
    visited: &mut VisitedGrid,
) -> GrowthResult {
    let capacity = target_size.min(rect.area());
    let mut result = GrowthResult {
        neighbourhood: Vec::with_capacity(capacity + 8),
        background: Vec::with_capacity(capacity),
    };

    let centre = PixelCoord::new(xc, yc);
    let centre_idx = rect.local_index(xc, yc);
    visited.visit(centre_idx);
    if seed.distance(&channel_vector(diagonals, centre_idx)) < threshold {
        result.neighbourhood.push(centre);
    } else {
        result.background.push(centre);
    }

    let mut front = vec![centre];
    let mut next_front = Vec::with_capacity(capacity);

    while result.neighbourhood.len() < target_size && !front.is_empty() {
        next_front.clear();

        for p in &front {
            for (dx, dy) in NEIGHBOUR_OFFSETS {
                let (Some(x), Some(y)) = (p.x.checked_add_signed(dx), p.y.checked_add_signed(dy)) else {
                    continue;
                };
                if !rect.contains(x, y) {
                    continue;
                }
                let idx = rect.local_index(x, y);
                if !visited.visit(idx) {
                    continue;
                }

                let pixel = PixelCoord::new(x, y);
                if seed.distance(&channel_vector(diagonals, idx)) < threshold {
                    result.neighbourhood.push(pixel);
                    next_front.push(pixel);
                } else {
                    result.background.push(pixel);
                }
            }
            if result.neighbourhood.len() > target_size {
                break;
            }
        }

        std::mem::swap(&mut front, &mut next_front);
    }

    visited.clear();
    result
}

/// Appends background pixels closer than `threshold` to the updated seed
pub fn reexamine_background<const N: usize>(
    background: &[PixelCoord],
    rect: &Rect,
    diagonals: &[&ElementGrid; N],
    seed: &Seed<N>,
    threshold: f64,
    neighbourhood: &mut Vec<PixelCoord>,
) {
    neighbourhood.extend(background.iter().copied().filter(|pixel| {
        let idx = rect.local_index(pixel.x, pixel.y);
        seed.distance(&channel_vector(diagonals, idx)) < threshold
    }));
}

/// Full two-pass search; never returns an empty neighbourhood
#[allow(clippy::too_many_arguments)]
pub fn adaptive_neighbourhood<const N: usize>(
    xc: usize,
    yc: usize,
    rect: &Rect,
    diagonals: &[&ElementGrid; N],
    pass1_threshold: f64,
    pass2_threshold: f64,
    an_size: usize,
    visited: &mut VisitedGrid,
) -> Vec<PixelCoord> {
    let seed = Seed::initial(xc, yc, rect, diagonals);
    let GrowthResult {
        mut neighbourhood,
        background,
    } = grow_region(xc, yc, rect, diagonals, &seed, pass1_threshold, an_size, visited);

    let updated_seed = seed.updated(&neighbourhood, rect, diagonals);
    reexamine_background(&background, rect, diagonals, &updated_seed, pass2_threshold, &mut neighbourhood);

    if neighbourhood.is_empty() {
        neighbourhood.push(PixelCoord::new(xc, yc));
    }
    neighbourhood
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use std::collections::HashSet;

    fn constant(height: usize, width: usize, value: f64) -> ElementGrid {
        Array2::from_elem((height, width), value)
    }

    #[test]
    fn test_first_round_follows_scan_order() {
        let rect = Rect::new(0, 0, 5, 5);
        let d11 = constant(5, 5, 4.0);
        let d22 = constant(5, 5, 9.0);
        let seed = Seed::new([4.0, 9.0]);
        let mut visited = VisitedGrid::new(&rect);

        let result = grow_region(2, 2, &rect, &[&d11, &d22], &seed, 0.5, 9, &mut visited);

        let expected: Vec<PixelCoord> = [(2, 2), (1, 1), (2, 1), (3, 1), (1, 2), (3, 2), (1, 3), (2, 3), (3, 3)]
            .iter()
            .map(|&(x, y)| PixelCoord::new(x, y))
            .collect();
        assert_eq!(result.neighbourhood, expected);
        assert!(result.background.is_empty());
    }

    #[test]
    fn test_growth_overshoots_within_round() {
        let rect = Rect::new(0, 0, 7, 7);
        let d11 = constant(7, 7, 1.0);
        let d22 = constant(7, 7, 1.0);
        let seed = Seed::new([1.0, 1.0]);
        let mut visited = VisitedGrid::new(&rect);

        // Round 1 gives 9 (< 10); round 2 stops after the first frontier
        // pixel pushes the count past 10.
        let result = grow_region(3, 3, &rect, &[&d11, &d22], &seed, 0.5, 10, &mut visited);
        assert_eq!(result.neighbourhood.len(), 14);

        let unique: HashSet<_> = result.neighbourhood.iter().collect();
        assert_eq!(unique.len(), result.neighbourhood.len());
    }

    #[test]
    fn test_growth_is_bounded_by_window() {
        let rect = Rect::new(4, 4, 3, 3);
        let d11 = constant(3, 3, 1.0);
        let d22 = constant(3, 3, 1.0);
        let seed = Seed::new([1.0, 1.0]);
        let mut visited = VisitedGrid::new(&rect);

        let result = grow_region(4, 4, &rect, &[&d11, &d22], &seed, 0.5, 100, &mut visited);
        assert_eq!(result.neighbourhood.len(), 9);
        assert!(result.neighbourhood.iter().all(|p| rect.contains(p.x, p.y)));
    }

    #[test]
    fn test_huge_target_size_is_bounded_by_window() {
        let rect = Rect::new(0, 0, 5, 5);
        let d11 = constant(5, 5, 1.0);
        let seed = Seed::new([1.0]);
        let mut visited = VisitedGrid::new(&rect);

        let result = grow_region(2, 2, &rect, &[&d11], &seed, 0.5, usize::MAX, &mut visited);
        assert_eq!(result.neighbourhood.len(), 25);
    }

    #[test]
    fn test_rejected_pixels_do_not_expand() {
        // A ring of bright pixels around the centre blocks growth entirely
        let rect = Rect::new(0, 0, 5, 5);
        let mut d11 = constant(5, 5, 1.0);
        for r in 1..4 {
            for c in 1..4 {
                if (r, c) != (2, 2) {
                    d11[[r, c]] = 50.0;
                }
            }
        }
        let d22 = d11.clone();
        let seed = Seed::new([1.0, 1.0]);
        let mut visited = VisitedGrid::new(&rect);

        let result = grow_region(2, 2, &rect, &[&d11, &d22], &seed, 0.5, 9, &mut visited);
        assert_eq!(result.neighbourhood, vec![PixelCoord::new(2, 2)]);
        assert_eq!(result.background.len(), 8);
    }

    #[test]
    fn test_visited_grid_is_reset_between_searches() {
        let rect = Rect::new(0, 0, 4, 4);
        let d11 = constant(4, 4, 2.0);
        let seed = Seed::new([2.0]);
        let mut visited = VisitedGrid::new(&rect);

        let first = grow_region(0, 0, &rect, &[&d11], &seed, 0.5, 16, &mut visited);
        let second = grow_region(0, 0, &rect, &[&d11], &seed, 0.5, 16, &mut visited);
        assert_eq!(first.neighbourhood, second.neighbourhood);
        assert!(visited.flags.iter().all(|f| !f));
    }

    #[test]
    fn test_reexamination_only_appends() {
        let rect = Rect::new(0, 0, 3, 1);
        let d11 = Array2::from_shape_vec((1, 3), vec![1.0, 1.5, 9.0]).unwrap();
        let seed = Seed::new([1.0]);

        let mut neighbourhood = vec![PixelCoord::new(0, 0)];
        let background = [PixelCoord::new(2, 0), PixelCoord::new(1, 0)];
        reexamine_background(&background, &rect, &[&d11], &seed, 1.0, &mut neighbourhood);

        assert_eq!(neighbourhood, vec![PixelCoord::new(0, 0), PixelCoord::new(1, 0)]);
    }

    #[test]
    fn test_empty_neighbourhood_falls_back_to_centre() {
        // The marginal median (100, 100) is no pixel's vector, and every
        // pixel stays outside both thresholds around it
        let rect = Rect::new(0, 0, 3, 1);
        let d11 = Array2::from_shape_vec((1, 3), vec![1.0, 100.0, 1000.0]).unwrap();
        let d22 = Array2::from_shape_vec((1, 3), vec![1000.0, 1.0, 100.0]).unwrap();
        let mut visited = VisitedGrid::new(&rect);

        let an = adaptive_neighbourhood(1, 0, &rect, &[&d11, &d22], 0.5, 0.9, 9, &mut visited);
        assert_eq!(an, vec![PixelCoord::new(1, 0)]);
    }
}
