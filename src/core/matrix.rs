use crate::types::{ElementGrid, IdanError, IdanResult, Rect, ScatteringGrid};
use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source polarimetric product layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolMatrixType {
    /// 2x2 covariance matrix
    C2,
    /// Dual-pol SLC, HH + HV
    DualHhHv,
    /// Dual-pol SLC, VH + VV
    DualVhVv,
    /// Dual-pol SLC, HH + VV
    DualHhVv,
    /// 3x3 covariance matrix
    C3,
    /// 3x3 coherency matrix
    T3,
    /// Quad-pol SLC
    Full,
    C4,
    T4,
    Unknown,
}

impl PolMatrixType {
    /// Number of diagonal channels the IDAN filter works on
    pub fn variant(&self) -> IdanResult<MatrixVariant> {
        match self {
            PolMatrixType::C2
            | PolMatrixType::DualHhHv
            | PolMatrixType::DualVhVv
            | PolMatrixType::DualHhVv => Ok(MatrixVariant::TwoChannel),
            PolMatrixType::C3 | PolMatrixType::T3 | PolMatrixType::Full => {
                Ok(MatrixVariant::ThreeChannel)
            }
            _ => Err(IdanError::UnsupportedMatrix(format!(
                "{} (for IDAN filtering, only C2, C3 and T3 are currently supported)",
                self
            ))),
        }
    }

    /// Band name prefix of the filtered matrix ("C" or "T")
    pub fn band_prefix(&self) -> &'static str {
        match self {
            PolMatrixType::T3 | PolMatrixType::Full | PolMatrixType::T4 => "T",
            _ => "C",
        }
    }
}

impl std::fmt::Display for PolMatrixType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PolMatrixType::C2 => "C2",
            PolMatrixType::DualHhHv => "DUAL_HH_HV",
            PolMatrixType::DualVhVv => "DUAL_VH_VV",
            PolMatrixType::DualHhVv => "DUAL_HH_VV",
            PolMatrixType::C3 => "C3",
            PolMatrixType::T3 => "T3",
            PolMatrixType::Full => "FULL",
            PolMatrixType::C4 => "C4",
            PolMatrixType::T4 => "T4",
            PolMatrixType::Unknown => "UNKNOWN",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for PolMatrixType {
    type Err = IdanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "C2" => Ok(PolMatrixType::C2),
            "DUAL_HH_HV" => Ok(PolMatrixType::DualHhHv),
            "DUAL_VH_VV" => Ok(PolMatrixType::DualVhVv),
            "DUAL_HH_VV" => Ok(PolMatrixType::DualHhVv),
            "C3" => Ok(PolMatrixType::C3),
            "T3" => Ok(PolMatrixType::T3),
            "FULL" => Ok(PolMatrixType::Full),
            "C4" => Ok(PolMatrixType::C4),
            "T4" => Ok(PolMatrixType::T4),
            _ => Err(IdanError::UnsupportedMatrix(format!("Unknown matrix type: {}", s))),
        }
    }
}

/// Channel layout of the matrix being filtered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatrixVariant {
    TwoChannel,
    ThreeChannel,
}

impl MatrixVariant {
    pub fn channel_count(&self) -> usize {
        match self {
            MatrixVariant::TwoChannel => 2,
            MatrixVariant::ThreeChannel => 3,
        }
    }

    /// All real-valued elements of the matrix, in output order
    pub fn elements(&self) -> &'static [MatrixElement] {
        use MatrixElement::*;
        match self {
            MatrixVariant::TwoChannel => &[M11, M12Real, M12Imag, M22],
            MatrixVariant::ThreeChannel => &[
                M11, M12Real, M12Imag, M13Real, M13Imag, M22, M23Real, M23Imag, M33,
            ],
        }
    }

    pub fn diagonals(&self) -> &'static [MatrixElement] {
        use MatrixElement::*;
        match self {
            MatrixVariant::TwoChannel => &[M11, M22],
            MatrixVariant::ThreeChannel => &[M11, M22, M33],
        }
    }
}

/// Real-valued entry of a Hermitian 2x2 or 3x3 matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MatrixElement {
    M11,
    M12Real,
    M12Imag,
    M13Real,
    M13Imag,
    M22,
    M23Real,
    M23Imag,
    M33,
}

impl MatrixElement {
    pub const ALL: [MatrixElement; 9] = [
        MatrixElement::M11,
        MatrixElement::M12Real,
        MatrixElement::M12Imag,
        MatrixElement::M13Real,
        MatrixElement::M13Imag,
        MatrixElement::M22,
        MatrixElement::M23Real,
        MatrixElement::M23Imag,
        MatrixElement::M33,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            MatrixElement::M11 => "11",
            MatrixElement::M12Real => "12_real",
            MatrixElement::M12Imag => "12_imag",
            MatrixElement::M13Real => "13_real",
            MatrixElement::M13Imag => "13_imag",
            MatrixElement::M22 => "22",
            MatrixElement::M23Real => "23_real",
            MatrixElement::M23Imag => "23_imag",
            MatrixElement::M33 => "33",
        }
    }

    pub fn is_diagonal(&self) -> bool {
        matches!(self, MatrixElement::M11 | MatrixElement::M22 | MatrixElement::M33)
    }

    /// Band name for this element, e.g. `T12_real`
    pub fn band_name(&self, matrix_type: PolMatrixType) -> String {
        format!("{}{}", matrix_type.band_prefix(), self.suffix())
    }

    /// Resolve a band name such as `C12_real`, `T33` or `C22_S` to an element.
    /// The C/T prefix is optional; a trailing qualifier must start with `_`.
    pub fn from_band_name(name: &str) -> Option<MatrixElement> {
        let body = name
            .strip_prefix('C')
            .or_else(|| name.strip_prefix('T'))
            .unwrap_or(name);

        Self::ALL.into_iter().find(|element| {
            body.strip_prefix(element.suffix())
                .map(|rest| rest.is_empty() || rest.starts_with('_'))
                .unwrap_or(false)
        })
    }
}

impl std::fmt::Display for MatrixElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "M{}", self.suffix())
    }
}

/// Read-only matrix element grids and span over one source rectangle
#[derive(Debug, Clone)]
pub struct PolarimetricWindow {
    rect: Rect,
    variant: MatrixVariant,
    elements: BTreeMap<MatrixElement, ElementGrid>,
    span: ElementGrid,
}

impl PolarimetricWindow {
    /// Build a window from per-element grids covering `rect`.
    ///
    /// Every element of the variant must be present with shape
    /// `(rect.height, rect.width)`. Extra elements are ignored.
    pub fn from_elements(
        rect: Rect,
        variant: MatrixVariant,
        mut elements: BTreeMap<MatrixElement, ElementGrid>,
    ) -> IdanResult<Self> {
        if rect.is_empty() {
            return Err(IdanError::InvalidInput(format!("Source rectangle {} is empty", rect)));
        }

        let mut grids = BTreeMap::new();
        for &element in variant.elements() {
            let grid = elements.remove(&element).ok_or_else(|| {
                IdanError::InvalidInput(format!("Missing grid for matrix element {}", element))
            })?;
            if grid.dim() != (rect.height, rect.width) {
                return Err(IdanError::InvalidInput(format!(
                    "Grid for {} has shape {:?}, expected {}x{} for source rectangle {}",
                    element,
                    grid.dim(),
                    rect.height,
                    rect.width,
                    rect
                )));
            }
            grids.insert(element, grid);
        }

        if !elements.is_empty() {
            log::debug!("Ignoring {} element grids not used by {:?}", elements.len(), variant);
        }

        let mut span = Array2::<f64>::zeros((rect.height, rect.width));
        for diagonal in variant.diagonals() {
            span += &grids[diagonal];
        }

        Ok(Self {
            rect,
            variant,
            elements: grids,
            span,
        })
    }

    /// Build a window from named bands (`C11`, `T12_real`, ...)
    pub fn from_bands<I>(rect: Rect, variant: MatrixVariant, bands: I) -> IdanResult<Self>
    where
        I: IntoIterator<Item = (String, ElementGrid)>,
    {
        let mut named: BTreeMap<MatrixElement, (String, ElementGrid)> = BTreeMap::new();
        for (name, grid) in bands {
            let Some(element) = MatrixElement::from_band_name(&name) else {
                log::debug!("Band {} is not a matrix element, skipping", name);
                continue;
            };
            if let Some((previous, _)) = named.get(&element) {
                return Err(IdanError::InvalidInput(format!(
                    "Bands {} and {} both map to matrix element {}",
                    previous, name, element
                )));
            }
            named.insert(element, (name, grid));
        }

        let elements = named
            .into_iter()
            .map(|(element, (_, grid))| (element, grid))
            .collect();
        Self::from_elements(rect, variant, elements)
    }

    /// C2 matrix from a dual-pol scattering vector `[s1, s2]`
    pub fn from_dual_pol(rect: Rect, s1: &ScatteringGrid, s2: &ScatteringGrid) -> IdanResult<Self> {
        check_scattering_shape(rect, &[s1, s2])?;

        let c11 = s1.mapv(|v| v.norm_sqr());
        let c22 = s2.mapv(|v| v.norm_sqr());
        let c12 = Zip::from(s1).and(s2).map_collect(|a, b| a * b.conj());

        let mut elements = BTreeMap::new();
        elements.insert(MatrixElement::M11, c11);
        elements.insert(MatrixElement::M12Real, c12.mapv(|v| v.re));
        elements.insert(MatrixElement::M12Imag, c12.mapv(|v| v.im));
        elements.insert(MatrixElement::M22, c22);

        Self::from_elements(rect, MatrixVariant::TwoChannel, elements)
    }

    /// T3 matrix from quad-pol scattering channels via the Pauli basis
    pub fn from_quad_pol(
        rect: Rect,
        hh: &ScatteringGrid,
        hv: &ScatteringGrid,
        vh: &ScatteringGrid,
        vv: &ScatteringGrid,
    ) -> IdanResult<Self> {
        check_scattering_shape(rect, &[hh, hv, vh, vv])?;

        let scale = std::f64::consts::FRAC_1_SQRT_2;
        let k1 = Zip::from(hh).and(vv).map_collect(|a, b| (a + b) * scale);
        let k2 = Zip::from(hh).and(vv).map_collect(|a, b| (a - b) * scale);
        let k3 = Zip::from(hv).and(vh).map_collect(|a, b| (a + b) * scale);

        let cross = |a: &ScatteringGrid, b: &ScatteringGrid| {
            Zip::from(a).and(b).map_collect(|p, q| p * q.conj())
        };
        let t12 = cross(&k1, &k2);
        let t13 = cross(&k1, &k3);
        let t23 = cross(&k2, &k3);

        let mut elements = BTreeMap::new();
        elements.insert(MatrixElement::M11, k1.mapv(|v| v.norm_sqr()));
        elements.insert(MatrixElement::M12Real, t12.mapv(|v| v.re));
        elements.insert(MatrixElement::M12Imag, t12.mapv(|v| v.im));
        elements.insert(MatrixElement::M13Real, t13.mapv(|v| v.re));
        elements.insert(MatrixElement::M13Imag, t13.mapv(|v| v.im));
        elements.insert(MatrixElement::M22, k2.mapv(|v| v.norm_sqr()));
        elements.insert(MatrixElement::M23Real, t23.mapv(|v| v.re));
        elements.insert(MatrixElement::M23Imag, t23.mapv(|v| v.im));
        elements.insert(MatrixElement::M33, k3.mapv(|v| v.norm_sqr()));

        Self::from_elements(rect, MatrixVariant::ThreeChannel, elements)
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn variant(&self) -> MatrixVariant {
        self.variant
    }

    pub fn span(&self) -> &ElementGrid {
        &self.span
    }

    /// Grid of one element; `None` when the element is not part of the variant
    pub fn element(&self, element: MatrixElement) -> Option<&ElementGrid> {
        self.elements.get(&element)
    }

    /// Element grids in variant output order
    pub fn element_grids(&self) -> Vec<(MatrixElement, &ElementGrid)> {
        self.variant
            .elements()
            .iter()
            .map(|e| (*e, &self.elements[e]))
            .collect()
    }

    /// Diagonal channel grids, fixed-length for the grower
    pub fn diagonals<const N: usize>(&self) -> IdanResult<[&ElementGrid; N]> {
        let diagonals = self.variant.diagonals();
        if diagonals.len() != N {
            return Err(IdanError::Processing(format!(
                "Requested {} diagonal channels from a {:?} window",
                N, self.variant
            )));
        }
        Ok(std::array::from_fn(|i| &self.elements[&diagonals[i]]))
    }

    /// Sub-window over `rect`, which must lie inside this window
    pub fn subwindow(&self, rect: Rect) -> IdanResult<Self> {
        if !self.rect.contains_rect(&rect) || rect.is_empty() {
            return Err(IdanError::InvalidInput(format!(
                "Rectangle {} is not inside window {}",
                rect, self.rect
            )));
        }
        let r0 = rect.y - self.rect.y;
        let c0 = rect.x - self.rect.x;
        let cut = |grid: &ElementGrid| {
            grid.slice(ndarray::s![r0..r0 + rect.height, c0..c0 + rect.width])
                .to_owned()
        };

        Ok(Self {
            rect,
            variant: self.variant,
            elements: self.elements.iter().map(|(e, g)| (*e, cut(g))).collect(),
            span: cut(&self.span),
        })
    }
}

fn check_scattering_shape(rect: Rect, channels: &[&ScatteringGrid]) -> IdanResult<()> {
    for (i, channel) in channels.iter().enumerate() {
        if channel.dim() != (rect.height, rect.width) {
            return Err(IdanError::InvalidInput(format!(
                "Scattering channel {} has shape {:?}, expected {}x{}",
                i,
                channel.dim(),
                rect.height,
                rect.width
            )));
        }
    }
    Ok(())
}
