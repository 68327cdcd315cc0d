use geocalib_core::{GrayImage, GrayImageView, Point};
use geocalib_viewport::ViewportMapper;
use log::debug;

use crate::template::{find_matches, TemplateMatchParams};

/// How candidate reference points are acquired from an image.
#[derive(Clone, Debug)]
pub enum SelectionStrategy {
    /// One operator click, already mapped to image pixels, and the global
    /// coordinate typed for it. Without a global coordinate the click is
    /// discarded.
    Manual {
        local: [f64; 2],
        global: Option<[f64; 2]>,
    },
    /// Detector-driven selection. No detector is wired in, so it yields
    /// nothing.
    Automatic,
    /// Every occurrence of `template` in the image. Global coordinates are
    /// left for the caller to fill in.
    TemplateMatch {
        template: GrayImage,
        params: TemplateMatchParams,
    },
}

impl SelectionStrategy {
    /// Manual selection from a click at `cursor` in screen pixels. `None`
    /// while the viewport has no image.
    pub fn manual_at_screen(
        viewport: &ViewportMapper,
        cursor: [f64; 2],
        global: Option<[f64; 2]>,
    ) -> Option<Self> {
        let local = viewport.screen_to_image(cursor)?;
        Some(SelectionStrategy::Manual { local, global })
    }

    pub fn select(&self, image: &GrayImageView<'_>) -> Vec<Point> {
        match self {
            SelectionStrategy::Manual { local, global } => match global {
                Some(g) => vec![Point::with_global(*local, *g)],
                None => {
                    debug!("manual point at {local:?} discarded without global coordinates");
                    Vec::new()
                }
            },
            SelectionStrategy::Automatic => Vec::new(),
            SelectionStrategy::TemplateMatch { template, params } => {
                find_matches(image, &template.view(), params)
                    .iter()
                    .map(|m| Point::new(m.local()))
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geocalib_viewport::ViewportConfig;

    fn textured(w: usize, h: usize) -> GrayImage {
        GrayImage {
            width: w,
            height: h,
            data: (0..w * h)
                .map(|i| ((i * 7919 + (i / w) * 104_729) % 256) as u8)
                .collect(),
        }
    }

    #[test]
    fn manual_keeps_only_points_with_global() {
        let image = GrayImage::new(10, 10);
        let with = SelectionStrategy::Manual {
            local: [3.0, 4.0],
            global: Some([48.7, 44.8]),
        };
        assert_eq!(
            with.select(&image.view()),
            vec![Point::with_global([3.0, 4.0], [48.7, 44.8])]
        );

        let without = SelectionStrategy::Manual {
            local: [3.0, 4.0],
            global: None,
        };
        assert!(without.select(&image.view()).is_empty());
    }

    #[test]
    fn automatic_yields_nothing() {
        let image = textured(32, 32);
        assert!(SelectionStrategy::Automatic.select(&image.view()).is_empty());
    }

    #[test]
    fn template_points_have_no_global() {
        let image = textured(64, 48);
        let template = image
            .view()
            .crop(geocalib_core::PixelRect::new(20, 10, 8, 8))
            .expect("non-empty");
        let strategy = SelectionStrategy::TemplateMatch {
            template,
            params: TemplateMatchParams { threshold: 0.999 },
        };
        let points = strategy.select(&image.view());
        assert!(!points.is_empty());
        assert!(points.iter().all(|p| !p.has_global()));
        assert!(points.iter().any(|p| p.local() == [20.0, 10.0]));
    }

    #[test]
    fn manual_click_goes_through_viewport() {
        let mut viewport = ViewportMapper::new([400.0, 300.0], ViewportConfig::default()).expect("valid config");
        assert!(SelectionStrategy::manual_at_screen(&viewport, [1.0, 1.0], None).is_none());

        viewport.set_base_image([800.0, 600.0]);
        let strategy = SelectionStrategy::manual_at_screen(&viewport, [10.0, 20.0], Some([1.0, 2.0]))
            .expect("image set");
        let crop = viewport.crop_rect().expect("image set");
        match strategy {
            SelectionStrategy::Manual { local, .. } => {
                assert_eq!(local, [crop.x + 10.0, crop.y + 20.0]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
