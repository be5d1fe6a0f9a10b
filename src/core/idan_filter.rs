use crate::core::matrix::{MatrixElement, MatrixVariant, PolMatrixType, PolarimetricWindow};
use crate::core::mmse::{filter_scale, filtered_value};
use crate::core::region_growing::{adaptive_neighbourhood, VisitedGrid};
use crate::types::{ElementGrid, IdanError, IdanResult, PixelCoord, Rect};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Multipliers of sigma_v for the two region-growing passes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdMultipliers {
    /// Region growing from the 3x3 median seed
    pub pass1: f64,
    /// Re-examination of rejected pixels against the neighbourhood mean
    pub pass2: f64,
}

impl ThresholdMultipliers {
    pub fn for_variant(variant: MatrixVariant) -> Self {
        match variant {
            MatrixVariant::TwoChannel => Self {
                pass1: 4.0 / 3.0,
                pass2: 4.0,
            },
            MatrixVariant::ThreeChannel => Self {
                pass1: 2.0,
                pass2: 6.0,
            },
        }
    }
}

/// IDAN filtering parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdanParams {
    /// Target adaptive neighbourhood size
    pub an_size: usize,
    /// Equivalent number of looks of the input
    pub num_looks: f64,
    /// Tile edge length used by `filter_image`
    pub tile_size: usize,
    /// Overrides the per-variant threshold multipliers
    pub thresholds: Option<ThresholdMultipliers>,
}

impl Default for IdanParams {
    fn default() -> Self {
        Self {
            an_size: 50,
            num_looks: 1.0,
            tile_size: 256,
            thresholds: None,
        }
    }
}

impl IdanParams {
    pub fn validate(&self) -> IdanResult<()> {
        if self.an_size == 0 {
            return Err(IdanError::InvalidParameter(
                "Adaptive neighbourhood size must be positive".to_string(),
            ));
        }
        if !self.num_looks.is_finite() || self.num_looks <= 0.0 {
            return Err(IdanError::InvalidParameter(format!(
                "Number of looks must be positive, got {}",
                self.num_looks
            )));
        }
        if self.tile_size == 0 {
            return Err(IdanError::InvalidParameter("Tile size must be positive".to_string()));
        }
        if let Some(t) = self.thresholds {
            let valid = |m: f64| m.is_finite() && m > 0.0;
            if !valid(t.pass1) || !valid(t.pass2) {
                return Err(IdanError::InvalidParameter(format!(
                    "Threshold multipliers must be positive, got {:?}",
                    t
                )));
            }
        }
        Ok(())
    }
}

/// Absolute distance thresholds for both passes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub pass1: f64,
    pub pass2: f64,
}

/// Channel layout with its resolved thresholds, fixed per filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IdanVariant {
    TwoChannel(Thresholds),
    ThreeChannel(Thresholds),
}

impl IdanVariant {
    pub fn matrix_variant(&self) -> MatrixVariant {
        match self {
            IdanVariant::TwoChannel(_) => MatrixVariant::TwoChannel,
            IdanVariant::ThreeChannel(_) => MatrixVariant::ThreeChannel,
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        match self {
            IdanVariant::TwoChannel(t) | IdanVariant::ThreeChannel(t) => *t,
        }
    }
}

/// Filter output and diagnostics for one pixel
#[derive(Debug, Clone, PartialEq)]
pub struct PixelResult {
    /// Filtered value of every matrix element, in variant order
    pub values: Vec<(MatrixElement, f64)>,
    /// Adaptive neighbourhood the values were estimated over
    pub neighbourhood: Vec<PixelCoord>,
    /// MMSE weight shared by all elements
    pub b: f64,
}

impl PixelResult {
    pub fn an_size(&self) -> usize {
        self.neighbourhood.len()
    }

    pub fn value(&self, element: MatrixElement) -> Option<f64> {
        self.values.iter().find(|(e, _)| *e == element).map(|(_, v)| *v)
    }
}

/// Filtered element grids over a target rectangle
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredTile {
    pub rect: Rect,
    pub elements: BTreeMap<MatrixElement, ElementGrid>,
}

impl FilteredTile {
    fn zeros(rect: Rect, variant: MatrixVariant) -> Self {
        Self {
            rect,
            elements: variant
                .elements()
                .iter()
                .map(|e| (*e, Array2::zeros((rect.height, rect.width))))
                .collect(),
        }
    }

    pub fn element(&self, element: MatrixElement) -> Option<&ElementGrid> {
        self.elements.get(&element)
    }

    /// Filtered value at an absolute pixel position
    pub fn value(&self, element: MatrixElement, x: usize, y: usize) -> Option<f64> {
        if !self.rect.contains(x, y) {
            return None;
        }
        self.elements
            .get(&element)
            .map(|grid| grid[self.rect.local_index(x, y)])
    }

    /// Named output bands, e.g. `T11`, `T12_real`
    pub fn into_bands(self, matrix_type: PolMatrixType) -> Vec<(String, ElementGrid)> {
        self.elements
            .into_iter()
            .map(|(element, grid)| (element.band_name(matrix_type), grid))
            .collect()
    }

    /// Copies this tile into `dest`, which must contain it
    fn write_into(&self, dest: &mut FilteredTile) {
        let r0 = self.rect.y - dest.rect.y;
        let c0 = self.rect.x - dest.rect.x;
        for (element, grid) in &self.elements {
            if let Some(out) = dest.elements.get_mut(element) {
                out.slice_mut(ndarray::s![r0..r0 + self.rect.height, c0..c0 + self.rect.width])
                    .assign(grid);
            }
        }
    }
}

/// IDAN (intensity-driven adaptive neighbourhood) speckle filter
#[derive(Debug, Clone)]
pub struct IdanFilter {
    matrix_type: PolMatrixType,
    params: IdanParams,
    variant: IdanVariant,
    sigma_v: f64,
    sigma_v_sqr: f64,
}

impl IdanFilter {
    /// Create a filter for `matrix_type`; rejects unsupported matrices and
    /// invalid parameters before any pixel is processed
    pub fn new(matrix_type: PolMatrixType, params: IdanParams) -> IdanResult<Self> {
        params.validate()?;
        let matrix_variant = matrix_type.variant()?;

        let sigma_v = 1.0 / params.num_looks.sqrt();
        let multipliers = params
            .thresholds
            .unwrap_or_else(|| ThresholdMultipliers::for_variant(matrix_variant));
        let thresholds = Thresholds {
            pass1: multipliers.pass1 * sigma_v,
            pass2: multipliers.pass2 * sigma_v,
        };
        let variant = match matrix_variant {
            MatrixVariant::TwoChannel => IdanVariant::TwoChannel(thresholds),
            MatrixVariant::ThreeChannel => IdanVariant::ThreeChannel(thresholds),
        };

        log::debug!(
            "IDAN filter for {}: an_size={}, looks={}, sigma_v={:.4}, thresholds={:?}",
            matrix_type,
            params.an_size,
            params.num_looks,
            sigma_v,
            thresholds
        );

        Ok(Self {
            matrix_type,
            params,
            variant,
            sigma_v,
            sigma_v_sqr: sigma_v * sigma_v,
        })
    }

    /// Create a filter with default parameters
    pub fn standard(matrix_type: PolMatrixType) -> IdanResult<Self> {
        Self::new(matrix_type, IdanParams::default())
    }

    pub fn matrix_type(&self) -> PolMatrixType {
        self.matrix_type
    }

    pub fn params(&self) -> &IdanParams {
        &self.params
    }

    pub fn variant(&self) -> IdanVariant {
        self.variant
    }

    pub fn sigma_v(&self) -> f64 {
        self.sigma_v
    }

    /// Padding around a target tile that the search can reach
    pub fn source_margin(&self) -> usize {
        self.params.an_size.saturating_mul(2)
    }

    /// Source rectangle needed to filter `target` inside an image
    pub fn source_rectangle(&self, target: &Rect, image_bounds: &Rect) -> Rect {
        target.expand_within(self.source_margin(), image_bounds)
    }

    /// Filter one pixel and report its neighbourhood and MMSE weight
    pub fn filter_pixel(&self, window: &PolarimetricWindow, x: usize, y: usize) -> IdanResult<PixelResult> {
        self.check_window(window, &Rect::new(x, y, 1, 1))?;

        let rect = window.rect();
        let mut visited = VisitedGrid::new(&rect);
        match self.variant {
            IdanVariant::TwoChannel(t) => {
                let diagonals = window.diagonals::<2>()?;
                Ok(self.process_pixel(window, &diagonals, t, x, y, &mut visited))
            }
            IdanVariant::ThreeChannel(t) => {
                let diagonals = window.diagonals::<3>()?;
                Ok(self.process_pixel(window, &diagonals, t, x, y, &mut visited))
            }
        }
    }

    /// Filter every pixel of `target` using the data in `window`
    pub fn filter_tile(&self, window: &PolarimetricWindow, target: &Rect) -> IdanResult<FilteredTile> {
        self.check_window(window, target)?;
        log::debug!("IDAN filtering tile {} from source {}", target, window.rect());

        match self.variant {
            IdanVariant::TwoChannel(t) => {
                let diagonals = window.diagonals::<2>()?;
                Ok(self.filter_rows(window, &diagonals, t, target))
            }
            IdanVariant::ThreeChannel(t) => {
                let diagonals = window.diagonals::<3>()?;
                Ok(self.filter_rows(window, &diagonals, t, target))
            }
        }
    }

    /// Filter the whole window tile by tile, each tile against its own
    /// padded source rectangle
    pub fn filter_image(&self, window: &PolarimetricWindow) -> IdanResult<FilteredTile> {
        let bounds = window.rect();
        self.check_window(window, &bounds)?;

        let tiles = bounds.tiles(self.params.tile_size);
        log::info!(
            "Applying IDAN filter to {}x{} {} image in {} tiles",
            bounds.width,
            bounds.height,
            self.matrix_type,
            tiles.len()
        );

        let filter_one = |tile: &Rect| -> IdanResult<FilteredTile> {
            let source = self.source_rectangle(tile, &bounds);
            let sub = window.subwindow(source)?;
            self.filter_tile(&sub, tile)
        };

        #[cfg(feature = "parallel")]
        let filtered: IdanResult<Vec<FilteredTile>> = {
            use rayon::prelude::*;
            tiles.par_iter().map(filter_one).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let filtered: IdanResult<Vec<FilteredTile>> = tiles.iter().map(filter_one).collect();

        let mut output = FilteredTile::zeros(bounds, self.variant.matrix_variant());
        for tile in filtered? {
            tile.write_into(&mut output);
        }

        log::info!("IDAN filtering completed successfully");
        Ok(output)
    }

    fn check_window(&self, window: &PolarimetricWindow, target: &Rect) -> IdanResult<()> {
        let expected = self.variant.matrix_variant();
        if window.variant() != expected {
            return Err(IdanError::InvalidInput(format!(
                "Window holds a {:?} matrix but the filter was built for {} ({:?})",
                window.variant(),
                self.matrix_type,
                expected
            )));
        }
        if target.is_empty() || !window.rect().contains_rect(target) {
            return Err(IdanError::InvalidInput(format!(
                "Target rectangle {} is not inside source rectangle {}",
                target,
                window.rect()
            )));
        }
        Ok(())
    }

    fn filter_rows<const N: usize>(
        &self,
        window: &PolarimetricWindow,
        diagonals: &[&ElementGrid; N],
        thresholds: Thresholds,
        target: &Rect,
    ) -> FilteredTile {
        let rect = window.rect();
        let grids = window.element_grids();

        let filter_row = |y: usize, visited: &mut VisitedGrid| -> Vec<Vec<f64>> {
            let mut row = vec![Vec::with_capacity(target.width); grids.len()];
            for x in target.x..target.max_x() {
                let result = self.process_pixel(window, diagonals, thresholds, x, y, visited);
                for (out, (_, value)) in row.iter_mut().zip(result.values) {
                    out.push(value);
                }
            }
            row
        };

        #[cfg(feature = "parallel")]
        let rows: Vec<Vec<Vec<f64>>> = {
            use rayon::prelude::*;
            (target.y..target.max_y())
                .into_par_iter()
                .map_init(|| VisitedGrid::new(&rect), |visited, y| filter_row(y, visited))
                .collect()
        };
        #[cfg(not(feature = "parallel"))]
        let rows: Vec<Vec<Vec<f64>>> = {
            let mut visited = VisitedGrid::new(&rect);
            (target.y..target.max_y())
                .map(|y| filter_row(y, &mut visited))
                .collect()
        };

        let mut output = FilteredTile::zeros(*target, window.variant());
        for (r, row) in rows.into_iter().enumerate() {
            for ((element, _), values) in grids.iter().zip(row) {
                if let Some(out) = output.elements.get_mut(element) {
                    for (c, value) in values.into_iter().enumerate() {
                        out[[r, c]] = value;
                    }
                }
            }
        }
        output
    }

    fn process_pixel<const N: usize>(
        &self,
        window: &PolarimetricWindow,
        diagonals: &[&ElementGrid; N],
        thresholds: Thresholds,
        x: usize,
        y: usize,
        visited: &mut VisitedGrid,
    ) -> PixelResult {
        let rect = window.rect();
        let neighbourhood = adaptive_neighbourhood(
            x,
            y,
            &rect,
            diagonals,
            thresholds.pass1,
            thresholds.pass2,
            self.params.an_size,
            visited,
        );
        let b = filter_scale(&neighbourhood, &rect, window.span(), self.sigma_v_sqr);
        let values = window
            .element_grids()
            .into_iter()
            .map(|(element, grid)| (element, filtered_value(x, y, &neighbourhood, &rect, grid, b)))
            .collect();

        PixelResult {
            values,
            neighbourhood,
            b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn constant_window(rect: Rect, variant: MatrixVariant, value: f64) -> PolarimetricWindow {
        let elements = variant
            .elements()
            .iter()
            .map(|e| (*e, Array2::from_elem((rect.height, rect.width), value)))
            .collect();
        PolarimetricWindow::from_elements(rect, variant, elements).unwrap()
    }

    #[test]
    fn test_thresholds_per_variant() {
        let params = IdanParams {
            num_looks: 4.0,
            ..Default::default()
        };

        let c2 = IdanFilter::new(PolMatrixType::C2, params.clone()).unwrap();
        assert_relative_eq!(c2.sigma_v(), 0.5);
        assert_eq!(
            c2.variant(),
            IdanVariant::TwoChannel(Thresholds {
                pass1: 4.0 / 3.0 * 0.5,
                pass2: 2.0
            })
        );

        let t3 = IdanFilter::new(PolMatrixType::T3, params).unwrap();
        assert_eq!(t3.variant().thresholds(), Thresholds { pass1: 1.0, pass2: 3.0 });
    }

    #[test]
    fn test_threshold_override() {
        let params = IdanParams {
            thresholds: Some(ThresholdMultipliers { pass1: 1.0, pass2: 2.0 }),
            ..Default::default()
        };
        let filter = IdanFilter::new(PolMatrixType::C3, params).unwrap();
        assert_eq!(filter.variant().thresholds(), Thresholds { pass1: 1.0, pass2: 2.0 });
    }

    #[test]
    fn test_invalid_parameters_fail_fast() {
        let zero_an = IdanParams {
            an_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            IdanFilter::new(PolMatrixType::C2, zero_an),
            Err(IdanError::InvalidParameter(_))
        ));

        for looks in [0.0, -1.0, f64::NAN] {
            let params = IdanParams {
                num_looks: looks,
                ..Default::default()
            };
            assert!(IdanFilter::new(PolMatrixType::T3, params).is_err());
        }

        assert!(matches!(
            IdanFilter::standard(PolMatrixType::T4),
            Err(IdanError::UnsupportedMatrix(_))
        ));
    }

    #[test]
    fn test_target_outside_source_is_rejected() {
        let filter = IdanFilter::standard(PolMatrixType::C2).unwrap();
        let window = constant_window(Rect::new(0, 0, 4, 4), MatrixVariant::TwoChannel, 1.0);

        let result = filter.filter_tile(&window, &Rect::new(2, 2, 3, 2));
        assert!(matches!(result, Err(IdanError::InvalidInput(_))));
    }

    #[test]
    fn test_variant_mismatch_is_rejected() {
        let filter = IdanFilter::standard(PolMatrixType::T3).unwrap();
        let window = constant_window(Rect::new(0, 0, 4, 4), MatrixVariant::TwoChannel, 1.0);

        assert!(filter.filter_pixel(&window, 1, 1).is_err());
    }

    #[test]
    fn test_homogeneous_tile_is_unchanged() {
        let params = IdanParams {
            an_size: 9,
            num_looks: 4.0,
            ..Default::default()
        };
        let filter = IdanFilter::new(PolMatrixType::T3, params).unwrap();
        let rect = Rect::new(100, 200, 6, 5);
        let window = constant_window(rect, MatrixVariant::ThreeChannel, 0.75);

        let tile = filter.filter_tile(&window, &Rect::new(101, 201, 4, 3)).unwrap();
        assert_eq!(tile.elements.len(), 9);
        for grid in tile.elements.values() {
            assert!(grid.iter().all(|&v| v == 0.75));
        }
        assert_eq!(tile.value(MatrixElement::M33, 104, 203), Some(0.75));
        assert_eq!(tile.value(MatrixElement::M33, 105, 203), None);
    }

    #[test]
    fn test_source_rectangle_uses_twice_an_size() {
        let params = IdanParams {
            an_size: 5,
            ..Default::default()
        };
        let filter = IdanFilter::new(PolMatrixType::C2, params).unwrap();
        let image = Rect::new(0, 0, 100, 100);

        let source = filter.source_rectangle(&Rect::new(50, 3, 10, 10), &image);
        assert_eq!(source, Rect::new(40, 0, 30, 23));

        let unbounded = IdanFilter::new(
            PolMatrixType::C2,
            IdanParams {
                an_size: usize::MAX,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(unbounded.source_margin(), usize::MAX);
        assert_eq!(unbounded.source_rectangle(&Rect::new(50, 3, 10, 10), &image), image);
    }

    #[test]
    fn test_output_band_names() {
        let filter = IdanFilter::standard(PolMatrixType::C2).unwrap();
        let window = constant_window(Rect::new(0, 0, 3, 3), MatrixVariant::TwoChannel, 2.0);

        let tile = filter.filter_tile(&window, &window.rect()).unwrap();
        let names: Vec<String> = tile.into_bands(PolMatrixType::C2).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["C11", "C12_real", "C12_imag", "C22"]);
    }
}
