//! Calibrate image pixels to real-world (global) coordinates.
//!
//! An operator marks reference points on an image and types the known global
//! coordinates of each. From those correspondences this crate fits a
//! projective (homography) or affine model, maps any other pixel to global
//! coordinates, and reports how far a computed point lies from an
//! independently surveyed one.
//!
//! ## Quickstart
//!
//! ```
//! use geocalib::{CalibrationSession, ModelKind, Point, SessionConfig};
//!
//! # fn main() -> Result<(), geocalib::SessionError> {
//! let mut session = CalibrationSession::new(SessionConfig::default())?;
//! session.load_image([1000.0, 800.0]);
//! for (local, global) in [
//!     ([0.0, 0.0], [48.0, 44.0]),
//!     ([1000.0, 0.0], [48.0, 44.01]),
//!     ([1000.0, 800.0], [47.99, 44.01]),
//!     ([0.0, 800.0], [47.99, 44.0]),
//! ] {
//!     session.add_point(Point::with_global(local, global));
//! }
//! session.solve(ModelKind::Homography)?;
//! let global = session.project([500.0, 400.0])?;
//! assert!((global[1] - 44.005).abs() < 1e-9);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `geocalib::core`: points, homography/affine fitting, analytics.
//! - `geocalib::viewport`: zoom/pan screen↔image mapping.
//! - `geocalib::select`: manual and template-matching point acquisition.
//! - `geocalib::raster` (feature `image`): loading images from disk.

pub use geocalib_core as core;
pub use geocalib_select as select;
pub use geocalib_viewport as viewport;

pub use geocalib_core::{
    CalibrationReport, GrayImage, GrayImageView, ModelKind, Point, RansacHomographyConfig,
    ReferencePointSet, TransformError, TransformModel,
};
pub use geocalib_select::{SelectionStrategy, TemplateMatchParams};
pub use geocalib_viewport::{ViewportConfig, ViewportMapper};

mod io;
mod session;

pub use io::{
    analysis_file_name, load_report, write_report, GeocalibIoError, SessionConfig, SolveRequest,
};
pub use session::{CalibrationSession, SessionError};

#[cfg(feature = "image")]
pub mod raster;
