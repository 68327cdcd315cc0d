//! Pixel→global coordinate transforms and calibration analytics.
//!
//! This crate is purely numerical: it takes reference correspondences
//! between image pixels and real-world coordinates, fits a homography or an
//! affine model, projects targets, and reports accuracy. It performs no I/O
//! beyond logging.

mod affine;
mod analytics;
mod error;
mod homography;
mod image;
mod logger;
mod point;
mod ransac;
mod transform;

pub use affine::{estimate_affine, Affine, AFFINE_MIN_POINTS};
pub use analytics::{average_pixel_length, deviation, deviation_ratio, CalibrationReport};
pub use error::TransformError;
pub use homography::{
    estimate_homography, homography_from_4pt, reprojection_error_px, Homography, PROJECTION_EPS,
};
pub use image::{GrayImage, GrayImageView, PixelRect};
pub use point::{Point, ReferencePointSet};
pub use ransac::{
    fit_homography_ransac, HomographyFit, RansacHomographyConfig, RansacStats,
    HOMOGRAPHY_MIN_POINTS,
};
pub use transform::{
    apply_affine, apply_homography, fit_affine, fit_homography, fit_homography_until, ModelKind,
    TransformModel,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_from_env, init_with_level, LOG_ENV_VAR};
