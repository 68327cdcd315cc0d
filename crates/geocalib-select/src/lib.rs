//! Ways of acquiring reference points from an image.
//!
//! A [`SelectionStrategy`] turns one image (plus whatever the strategy
//! carries) into candidate [`Point`](geocalib_core::Point)s. Template matching
//! lives in [`template`]; text entry of global coordinates in
//! [`parse_global_coords`].

mod coord_input;
mod strategy;
pub mod template;

pub use coord_input::{parse_global_coords, Axis, CoordInputError};
pub use strategy::SelectionStrategy;
pub use template::{crop_template, find_matches, TemplateMatch, TemplateMatchParams};
