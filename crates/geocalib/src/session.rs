//! One operator's calibration workflow over a single image.

use std::time::Instant;

use geocalib_core::{
    fit_homography_until, CalibrationReport, GrayImageView, HomographyFit, ModelKind, Point,
    ReferencePointSet, TransformError, TransformModel,
};
use geocalib_select::SelectionStrategy;
use geocalib_viewport::{fit_scale, ViewportConfigError, ViewportMapper};
use log::{debug, info, warn};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::SessionConfig;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error("no model has been solved since the reference points last changed")]
    NotSolved,
    #[error("no reference point at index {index}")]
    NoSuchPoint { index: usize },
    #[error("no image loaded")]
    NoImage,
    #[error("invalid viewport config: {0}")]
    InvalidConfig(#[from] ViewportConfigError),
}

/// Reference points, viewport and last fitted model for one image.
///
/// Any edit to the reference set drops the fitted model; [`solve`] must run
/// again before projecting. Failed solves leave the session untouched.
///
/// [`solve`]: CalibrationSession::solve
#[derive(Clone, Debug)]
pub struct CalibrationSession {
    config: SessionConfig,
    references: ReferencePointSet,
    viewport: ViewportMapper,
    display_scale: f64,
    model: Option<TransformModel>,
    homography_fit: Option<HomographyFit>,
}

impl CalibrationSession {
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let viewport = ViewportMapper::new(config.display_max, config.viewport.clone())?;
        Ok(Self {
            config,
            references: ReferencePointSet::new(),
            viewport,
            display_scale: 1.0,
            model: None,
            homography_fit: None,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn references(&self) -> &ReferencePointSet {
        &self.references
    }

    pub fn viewport(&self) -> &ViewportMapper {
        &self.viewport
    }

    /// Zoom and pan go through here; they never touch the reference set.
    pub fn viewport_mut(&mut self) -> &mut ViewportMapper {
        &mut self.viewport
    }

    /// Display pixels per image pixel of the fitted-to-screen base image.
    pub fn display_scale(&self) -> f64 {
        self.display_scale
    }

    pub fn model(&self) -> Option<&TransformModel> {
        self.model.as_ref()
    }

    /// Diagnostics of the last homography solve.
    pub fn homography_fit(&self) -> Option<&HomographyFit> {
        self.homography_fit.as_ref()
    }

    /// Start over on a new image: the reference set is cleared, the image is
    /// fitted into `display_max` and the viewport resets to it.
    pub fn load_image(&mut self, image_size: [f64; 2]) {
        self.display_scale = fit_scale(image_size, self.config.display_max);
        let display = [
            image_size[0] * self.display_scale,
            image_size[1] * self.display_scale,
        ];
        self.viewport.resize(display);
        self.viewport.set_base_image(display);
        self.references = ReferencePointSet::new();
        self.invalidate();
        info!(
            "image {}x{} shown at scale {:.4}",
            image_size[0], image_size[1], self.display_scale
        );
    }

    /// Image pixel under a screen position.
    pub fn screen_to_image(&self, cursor: [f64; 2]) -> Result<[f64; 2], SessionError> {
        let p = self
            .viewport
            .screen_to_image(cursor)
            .ok_or(SessionError::NoImage)?;
        Ok([p[0] / self.display_scale, p[1] / self.display_scale])
    }

    /// Screen position of an image pixel.
    pub fn image_to_screen(&self, local: [f64; 2]) -> Result<[f64; 2], SessionError> {
        self.viewport
            .image_to_screen([local[0] * self.display_scale, local[1] * self.display_scale])
            .ok_or(SessionError::NoImage)
    }

    pub fn add_point(&mut self, point: Point) {
        self.references.push(point);
        self.invalidate();
    }

    /// Run `strategy` on `image` and append what it yields. Returns how many
    /// points were added.
    pub fn apply_selection(&mut self, strategy: &SelectionStrategy, image: &GrayImageView<'_>) -> usize {
        let points = strategy.select(image);
        let added = points.len();
        for p in points {
            self.references.push(p);
        }
        if added > 0 {
            self.invalidate();
        }
        debug!("selection added {added} point(s), {} total", self.references.len());
        added
    }

    /// Manual click at a screen position with the global coordinate typed for
    /// it. Returns the new point's index, or `None` when the entry was
    /// cancelled.
    pub fn click_point(
        &mut self,
        cursor: [f64; 2],
        global: Option<[f64; 2]>,
    ) -> Result<Option<usize>, SessionError> {
        let Some(global) = global else {
            return Ok(None);
        };
        let local = self.screen_to_image(cursor)?;
        self.add_point(Point::with_global(local, global));
        Ok(Some(self.references.len() - 1))
    }

    /// Existing point within the pick radius of a screen position.
    pub fn point_at_screen(&self, cursor: [f64; 2]) -> Result<Option<usize>, SessionError> {
        let local = self.screen_to_image(cursor)?;
        Ok(self.references.nearest(local, self.config.pick_radius_px))
    }

    pub fn update_global(&mut self, index: usize, global: [f64; 2]) -> Result<(), SessionError> {
        if !self.references.set_global(index, global) {
            return Err(SessionError::NoSuchPoint { index });
        }
        self.invalidate();
        Ok(())
    }

    pub fn delete_point(&mut self, index: usize) -> Result<Point, SessionError> {
        let removed = self
            .references
            .remove(index)
            .ok_or(SessionError::NoSuchPoint { index })?;
        self.invalidate();
        Ok(removed)
    }

    /// Fit `kind` on the current reference set.
    pub fn solve(&mut self, kind: ModelKind) -> Result<&TransformModel, SessionError> {
        self.solve_until(kind, None)
    }

    /// [`solve`](Self::solve) with a deadline for the robust homography search.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, deadline), fields(points = self.references.len()))
    )]
    pub fn solve_until(
        &mut self,
        kind: ModelKind,
        deadline: Option<Instant>,
    ) -> Result<&TransformModel, SessionError> {
        let (model, fit) = match kind {
            ModelKind::Homography => {
                let fit = fit_homography_until(&self.references, &self.config.ransac, deadline)
                    .inspect_err(|e| warn!("homography solve failed: {e}"))?;
                info!(
                    "homography: {}/{} inliers, mean error {:.3} px",
                    fit.stats.n_inliers, fit.stats.n_candidates, fit.stats.mean_err_px
                );
                (TransformModel::Homography(fit.homography), Some(fit))
            }
            ModelKind::Affine => {
                let model = TransformModel::fit(kind, &self.references, &self.config.ransac)
                    .inspect_err(|e| warn!("affine solve failed: {e}"))?;
                info!("affine over {} points", self.references.len());
                (model, None)
            }
        };
        self.homography_fit = fit;
        Ok(&*self.model.insert(model))
    }

    /// Global coordinates of an image pixel under the solved model.
    pub fn project(&self, local: [f64; 2]) -> Result<[f64; 2], SessionError> {
        let model = self.model.as_ref().ok_or(SessionError::NotSolved)?;
        Ok(model.apply(local)?)
    }

    /// Global coordinates of whatever is under a screen position.
    pub fn project_screen(&self, cursor: [f64; 2]) -> Result<[f64; 2], SessionError> {
        self.project(self.screen_to_image(cursor)?)
    }

    /// Accuracy report for a target pixel whose global position is known.
    pub fn analyze(
        &self,
        target_local: [f64; 2],
        known: [f64; 2],
    ) -> Result<CalibrationReport, SessionError> {
        let model = self.model.as_ref().ok_or(SessionError::NotSolved)?;
        let computed = model.apply(target_local)?;
        let report = CalibrationReport::build(
            self.references.as_slice(),
            target_local,
            computed,
            known,
            model.kind(),
        )?;
        info!(
            "deviation {:.3e} ({:.2} px)",
            report.deviation, report.deviation_to_pixel_ratio
        );
        Ok(report)
    }

    fn invalidate(&mut self) {
        self.model = None;
        self.homography_fit = None;
    }
}
