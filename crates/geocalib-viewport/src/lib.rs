//! Screen↔image coordinate mapping for a zoomable, pannable image view.
//!
//! The view draws a crop rectangle of the image, `viewport_size / scale`
//! pixels large, stretched to fill the viewport. [`ViewportMapper`] owns that
//! state and inverts it, so a click on screen becomes an exact image pixel.

mod config;
mod mapper;

pub use config::{ViewportConfig, ViewportConfigError};
pub use mapper::{fit_scale, CropRect, ViewportMapper};
