use log::{debug, trace};
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::{ViewportConfig, ViewportConfigError};

/// Visible image region, in image pixels. May extend past the image when the
/// viewport is larger than the scaled image; the image is then centered.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRect {
    pub fn center(&self) -> [f64; 2] {
        [self.x + 0.5 * self.width, self.y + 0.5 * self.height]
    }

    pub fn contains(&self, p: [f64; 2]) -> bool {
        p[0] >= self.x && p[0] <= self.x + self.width && p[1] >= self.y && p[1] <= self.y + self.height
    }
}

/// Largest scale `<= 1` at which `image_size` fits inside `max_size`,
/// keeping the aspect ratio.
pub fn fit_scale(image_size: [f64; 2], max_size: [f64; 2]) -> f64 {
    if image_size[0] <= 0.0 || image_size[1] <= 0.0 {
        return 1.0;
    }
    (max_size[0] / image_size[0])
        .min(max_size[1] / image_size[1])
        .min(1.0)
}

#[derive(Clone, Copy, Debug)]
struct BaseImage {
    size: Vector2<f64>,
    center: Point2<f64>,
}

/// Current zoom/pan state of one image view.
///
/// The view shows a crop rectangle of size `viewport_size / scale`, centered
/// on `center`, stretched to fill the viewport. Every mutation re-clamps the
/// center so the crop stays inside the image whenever it fits.
#[derive(Clone, Debug)]
pub struct ViewportMapper {
    config: ViewportConfig,
    viewport_size: Vector2<f64>,
    scale: f64,
    image: Option<BaseImage>,
}

impl ViewportMapper {
    /// Fails when `config` does not describe a usable zoom range.
    pub fn new(
        viewport_size: [f64; 2],
        config: ViewportConfig,
    ) -> Result<Self, ViewportConfigError> {
        config.validate()?;
        let scale = config.scale_min;
        Ok(Self {
            config,
            viewport_size: Vector2::new(viewport_size[0], viewport_size[1]),
            scale,
            image: None,
        })
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn viewport_size(&self) -> [f64; 2] {
        [self.viewport_size.x, self.viewport_size.y]
    }

    pub fn image_size(&self) -> Option<[f64; 2]> {
        self.image.map(|img| [img.size.x, img.size.y])
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    /// Install a new base image: scale returns to `scale_min` and the crop is
    /// centered on the image.
    pub fn set_base_image(&mut self, image_size: [f64; 2]) {
        let size = Vector2::new(image_size[0], image_size[1]);
        self.scale = self.config.scale_min;
        self.image = Some(BaseImage {
            size,
            center: Point2::from(size * 0.5),
        });
        debug!(
            "base image {}x{}, viewport {}x{}",
            size.x, size.y, self.viewport_size.x, self.viewport_size.y
        );
        self.clamp_center();
    }

    pub fn clear_base_image(&mut self) {
        self.image = None;
        self.scale = self.config.scale_min;
    }

    /// The widget was resized; keep scale and center, re-clamp.
    pub fn resize(&mut self, viewport_size: [f64; 2]) {
        self.viewport_size = Vector2::new(viewport_size[0], viewport_size[1]);
        self.clamp_center();
    }

    /// Zoom by `delta_steps` wheel steps about `cursor` (screen pixels).
    ///
    /// Each step multiplies the scale by `1 + scale_step`; negative steps
    /// divide, so equal in/out sequences cancel. The result is clamped to
    /// `[scale_min, scale_max]`. The crop center moves toward the cursor by
    /// `(cursor_image - center) * (new_scale / old_scale - 1)`.
    pub fn zoom(&mut self, delta_steps: f64, cursor: [f64; 2]) {
        if delta_steps == 0.0 || !delta_steps.is_finite() {
            return;
        }
        let Some(anchor) = self.screen_to_image(cursor) else {
            return;
        };
        let old = self.scale;
        let new = (old * (1.0 + self.config.scale_step).powf(delta_steps))
            .clamp(self.config.scale_min, self.config.scale_max);
        if new == old {
            trace!("zoom at limit {old}");
            return;
        }
        self.scale = new;
        if let Some(img) = self.image.as_mut() {
            let anchor = Point2::new(anchor[0], anchor[1]);
            img.center += (anchor - img.center) * (new / old - 1.0);
        }
        self.clamp_center();
        trace!("zoom {old:.4} -> {new:.4}");
    }

    /// Drag by `delta` screen pixels. Inactive at `scale_min`.
    pub fn pan(&mut self, delta: [f64; 2]) {
        if self.scale <= self.config.scale_min {
            return;
        }
        let scale = self.scale;
        let Some(img) = self.image.as_mut() else {
            return;
        };
        img.center -= Vector2::new(delta[0], delta[1]) / scale;
        self.clamp_center();
    }

    /// Back to `scale_min` with the image centered.
    pub fn reset_zoom(&mut self) {
        if let Some(size) = self.image_size() {
            self.set_base_image(size);
        }
    }

    pub fn crop_rect(&self) -> Option<CropRect> {
        let img = self.image?;
        let size = self.crop_size();
        let top_left = img.center - size * 0.5;
        Some(CropRect {
            x: top_left.x,
            y: top_left.y,
            width: size.x,
            height: size.y,
        })
    }

    /// Screen position to image position. `None` before a base image is set.
    pub fn screen_to_image(&self, pos: [f64; 2]) -> Option<[f64; 2]> {
        let crop = self.crop_rect()?;
        Some([crop.x + pos[0] / self.scale, crop.y + pos[1] / self.scale])
    }

    /// Exact inverse of [`screen_to_image`](Self::screen_to_image).
    pub fn image_to_screen(&self, p: [f64; 2]) -> Option<[f64; 2]> {
        let crop = self.crop_rect()?;
        Some([(p[0] - crop.x) * self.scale, (p[1] - crop.y) * self.scale])
    }

    fn crop_size(&self) -> Vector2<f64> {
        self.viewport_size / self.scale
    }

    fn clamp_center(&mut self) {
        let crop = self.crop_size();
        let Some(img) = self.image.as_mut() else {
            return;
        };
        for axis in 0..2 {
            let (extent, half) = (img.size[axis], 0.5 * crop[axis]);
            img.center[axis] = if crop[axis] >= extent {
                0.5 * extent
            } else {
                img.center[axis].clamp(half, extent - half)
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn mapper(image: [f64; 2]) -> ViewportMapper {
        let mut m = ViewportMapper::new([640.0, 480.0], ViewportConfig::default()).expect("valid config");
        m.set_base_image(image);
        m
    }

    fn assert_crop_inside(m: &ViewportMapper) {
        let crop = m.crop_rect().expect("image set");
        let [w, h] = m.image_size().expect("image set");
        let tol = 1e-9;
        if crop.width < w {
            assert!(crop.x >= -tol && crop.x + crop.width <= w + tol, "{crop:?}");
        }
        if crop.height < h {
            assert!(crop.y >= -tol && crop.y + crop.height <= h + tol, "{crop:?}");
        }
        assert!(m.scale() >= m.config().scale_min && m.scale() <= m.config().scale_max);
    }

    #[test]
    fn before_image_everything_is_inert() {
        let mut m = ViewportMapper::new([640.0, 480.0], ViewportConfig::default()).expect("valid config");
        m.zoom(3.0, [10.0, 10.0]);
        m.pan([5.0, 5.0]);
        assert_eq!(m.scale(), 1.0);
        assert!(m.screen_to_image([0.0, 0.0]).is_none());
        assert!(m.image_to_screen([0.0, 0.0]).is_none());
        assert!(m.crop_rect().is_none());
    }

    #[test]
    fn unusable_zoom_range_is_rejected() {
        let inverted = ViewportConfig {
            scale_min: 4.0,
            scale_max: 2.0,
            ..Default::default()
        };
        assert!(matches!(
            ViewportMapper::new([640.0, 480.0], inverted),
            Err(ViewportConfigError::InvertedRange { .. })
        ));
        let zero = ViewportConfig {
            scale_min: 0.0,
            ..Default::default()
        };
        assert_eq!(
            ViewportMapper::new([640.0, 480.0], zero).unwrap_err(),
            ViewportConfigError::InvalidMinScale(0.0)
        );
    }

    #[test]
    fn clearing_the_image_makes_mapper_inert_again() {
        let mut m = mapper([640.0, 480.0]);
        m.zoom(5.0, [100.0, 100.0]);
        m.clear_base_image();
        assert!(!m.has_image());
        assert_eq!(m.scale(), 1.0);
        assert!(m.screen_to_image([10.0, 10.0]).is_none());
    }

    #[test]
    fn crop_contains_every_visible_pixel() {
        let mut m = mapper([1600.0, 1200.0]);
        m.zoom(9.0, [500.0, 300.0]);
        let crop = m.crop_rect().expect("image set");
        for s in [[0.0, 0.0], [640.0, 480.0], [320.0, 17.5]] {
            let p = m.screen_to_image(s).expect("image set");
            assert!(crop.contains(p), "{p:?} outside {crop:?}");
        }
        assert!(!crop.contains([crop.x - 1.0, crop.y]));
        assert!(!crop.contains([crop.x, crop.y + crop.height + 1.0]));
    }

    #[test]
    fn base_image_resets_scale_and_centers() {
        let mut m = mapper([640.0, 480.0]);
        m.zoom(10.0, [100.0, 100.0]);
        assert!(m.scale() > 1.0);
        m.set_base_image([640.0, 480.0]);
        assert_eq!(m.scale(), 1.0);
        let crop = m.crop_rect().expect("image set");
        assert_eq!(crop.center(), [320.0, 240.0]);
        assert_eq!(m.screen_to_image([0.0, 0.0]), Some([0.0, 0.0]));
    }

    #[test]
    fn screen_image_round_trip() {
        let mut m = mapper([1600.0, 1200.0]);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            m.zoom(rng.gen_range(-5.0..8.0), [rng.gen_range(0.0..640.0), rng.gen_range(0.0..480.0)]);
            let s = [rng.gen_range(0.0..640.0), rng.gen_range(0.0..480.0)];
            let p = m.screen_to_image(s).expect("image set");
            let back = m.image_to_screen(p).expect("image set");
            assert_relative_eq!(back[0], s[0], epsilon = 1e-9);
            assert_relative_eq!(back[1], s[1], epsilon = 1e-9);
        }
    }

    #[test]
    fn zoom_in_then_out_restores_scale() {
        let mut m = mapper([640.0, 480.0]);
        m.zoom(7.0, [320.0, 240.0]);
        assert_relative_eq!(m.scale(), 1.05f64.powi(7), epsilon = 1e-12);
        m.zoom(-7.0, [320.0, 240.0]);
        assert_relative_eq!(m.scale(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn scale_is_clamped() {
        let mut m = mapper([640.0, 480.0]);
        m.zoom(-3.0, [0.0, 0.0]);
        assert_eq!(m.scale(), 1.0);
        m.zoom(1000.0, [0.0, 0.0]);
        assert_eq!(m.scale(), 20.0);
        assert_crop_inside(&m);
    }

    #[test]
    fn zoom_moves_toward_cursor() {
        let mut m = mapper([640.0, 480.0]);
        let before = m.screen_to_image([600.0, 400.0]).expect("image set");
        m.zoom(10.0, [600.0, 400.0]);
        let after = m.screen_to_image([600.0, 400.0]).expect("image set");
        let center = m.crop_rect().expect("image set").center();
        assert!(center[0] > 320.0 && center[1] > 240.0);
        // stays close to the anchor, not exact
        assert!((after[0] - before[0]).abs() < 60.0);
        assert!((after[1] - before[1]).abs() < 60.0);
    }

    #[test]
    fn pan_only_when_zoomed() {
        let mut m = mapper([640.0, 480.0]);
        m.pan([50.0, 0.0]);
        assert_eq!(m.crop_rect().expect("image set").center(), [320.0, 240.0]);

        m.zoom(14.0, [320.0, 240.0]);
        let before = m.crop_rect().expect("image set").center();
        m.pan([20.0, -10.0]);
        let after = m.crop_rect().expect("image set").center();
        assert_relative_eq!(after[0], before[0] - 20.0 / m.scale(), epsilon = 1e-9);
        assert_relative_eq!(after[1], before[1] + 10.0 / m.scale(), epsilon = 1e-9);

        m.pan([1e6, 1e6]);
        let crop = m.crop_rect().expect("image set");
        assert_relative_eq!(crop.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(crop.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn random_interaction_keeps_crop_inside() {
        let mut m = mapper([2000.0, 900.0]);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..500 {
            if rng.gen_bool(0.5) {
                let cursor = [rng.gen_range(0.0..640.0), rng.gen_range(0.0..480.0)];
                m.zoom(rng.gen_range(-6.0..6.0), cursor);
            } else {
                m.pan([rng.gen_range(-300.0..300.0), rng.gen_range(-300.0..300.0)]);
            }
            assert_crop_inside(&m);
        }
    }

    #[test]
    fn small_image_is_centered_on_its_axis() {
        // 640 px viewport over a 200 px wide image at scale 1
        let mut m = mapper([200.0, 1000.0]);
        let crop = m.crop_rect().expect("image set");
        assert_eq!(crop.center(), [100.0, 500.0]);
        m.zoom(2.0, [0.0, 0.0]);
        assert_eq!(m.crop_rect().expect("image set").center()[0], 100.0);
    }

    #[test]
    fn reset_and_resize() {
        let mut m = mapper([1280.0, 960.0]);
        m.zoom(20.0, [10.0, 10.0]);
        m.reset_zoom();
        assert_eq!(m.scale(), 1.0);
        assert_eq!(m.crop_rect().expect("image set").center(), [640.0, 480.0]);

        m.resize([1280.0, 960.0]);
        let crop = m.crop_rect().expect("image set");
        assert_eq!((crop.x, crop.y, crop.width, crop.height), (0.0, 0.0, 1280.0, 960.0));
    }

    #[test]
    fn fit_scale_never_enlarges() {
        assert_relative_eq!(fit_scale([2560.0, 1440.0], [1280.0, 720.0]), 0.5);
        assert_relative_eq!(fit_scale([1000.0, 2000.0], [1280.0, 720.0]), 0.36);
        assert_eq!(fit_scale([100.0, 100.0], [1280.0, 720.0]), 1.0);
        assert_eq!(fit_scale([0.0, 100.0], [1280.0, 720.0]), 1.0);
    }
}
