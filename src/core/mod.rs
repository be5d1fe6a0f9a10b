//! Core IDAN filtering modules

pub mod matrix;
pub mod seed;
pub mod region_growing;
pub mod mmse;
pub mod idan_filter;

// Re-export main types
pub use matrix::{MatrixElement, MatrixVariant, PolMatrixType, PolarimetricWindow};
pub use seed::Seed;
pub use region_growing::{adaptive_neighbourhood, grow_region, reexamine_background, GrowthResult, VisitedGrid};
pub use mmse::{filter_scale, filtered_value, mmse_weight};
pub use idan_filter::{
    FilteredTile, IdanFilter, IdanParams, IdanVariant, PixelResult, ThresholdMultipliers, Thresholds,
};
