//! Pixel→global model fitting over a [`ReferencePointSet`].
//!
//! The engine fits exactly the model it is asked for. If a homography cannot
//! be fitted the caller decides whether to add points or to fall back to the
//! affine approximation; nothing here switches models on its own.

use std::time::Instant;

use log::debug;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::affine::{estimate_affine, Affine, AFFINE_MIN_POINTS};
use crate::homography::Homography;
use crate::ransac::{
    fit_homography_ransac, HomographyFit, RansacHomographyConfig, HOMOGRAPHY_MIN_POINTS,
};
use crate::{ReferencePointSet, TransformError};

/// Which model family to fit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    Homography,
    Affine,
}

impl ModelKind {
    pub fn min_points(self) -> usize {
        match self {
            ModelKind::Homography => HOMOGRAPHY_MIN_POINTS,
            ModelKind::Affine => AFFINE_MIN_POINTS,
        }
    }
}

/// A fitted pixel→global mapping. Built fresh per solve and never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformModel {
    Homography(Homography),
    Affine(Affine),
}

impl TransformModel {
    /// Fit `kind` on `reference_set`.
    pub fn fit(
        kind: ModelKind,
        reference_set: &ReferencePointSet,
        config: &RansacHomographyConfig,
    ) -> Result<Self, TransformError> {
        match kind {
            ModelKind::Homography => {
                fit_homography(reference_set, config).map(|fit| Self::Homography(fit.homography))
            }
            ModelKind::Affine => fit_affine(reference_set).map(Self::Affine),
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            TransformModel::Homography(_) => ModelKind::Homography,
            TransformModel::Affine(_) => ModelKind::Affine,
        }
    }

    /// Map an image pixel to global coordinates.
    pub fn apply(&self, local: [f64; 2]) -> Result<[f64; 2], TransformError> {
        match self {
            TransformModel::Homography(h) => apply_homography(h, local),
            TransformModel::Affine(a) => Ok(apply_affine(a, local)),
        }
    }
}

fn require_points(set: &ReferencePointSet, needed: usize) -> Result<(), TransformError> {
    if set.len() < needed {
        return Err(TransformError::InsufficientPoints {
            needed,
            got: set.len(),
        });
    }
    Ok(())
}

/// Robust homography fit over all reference points.
pub fn fit_homography(
    reference_set: &ReferencePointSet,
    config: &RansacHomographyConfig,
) -> Result<HomographyFit, TransformError> {
    fit_homography_until(reference_set, config, None)
}

/// [`fit_homography`] with a cooperative deadline checked between trials.
pub fn fit_homography_until(
    reference_set: &ReferencePointSet,
    config: &RansacHomographyConfig,
    deadline: Option<Instant>,
) -> Result<HomographyFit, TransformError> {
    require_points(reference_set, HOMOGRAPHY_MIN_POINTS)?;
    let (local, global) = reference_set.correspondences()?;
    fit_homography_ransac(&local, &global, config, deadline)
}

pub fn apply_homography(model: &Homography, local: [f64; 2]) -> Result<[f64; 2], TransformError> {
    let p = model.apply(Point2::new(local[0], local[1]))?;
    Ok([p.x, p.y])
}

/// Least-squares affine fit over all reference points.
pub fn fit_affine(reference_set: &ReferencePointSet) -> Result<Affine, TransformError> {
    require_points(reference_set, AFFINE_MIN_POINTS)?;
    let (local, global) = reference_set.correspondences()?;
    let affine = estimate_affine(&local, &global).ok_or(TransformError::DegenerateConfiguration)?;
    debug!("affine fit over {} points", local.len());
    Ok(affine)
}

pub fn apply_affine(model: &Affine, local: [f64; 2]) -> [f64; 2] {
    let p = model.apply(Point2::new(local[0], local[1]));
    [p.x, p.y]
}
