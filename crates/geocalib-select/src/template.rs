//! Template matching by zero-mean normalized cross-correlation.
//!
//! The score at offset `(x, y)` is
//!
//! ```text
//!            Σ (T - mean T)(I - mean I)
//! r = ---------------------------------------
//!     sqrt( Σ (T - mean T)² · Σ (I - mean I)² )
//! ```
//!
//! over the template footprint with its top-left corner at `(x, y)`. Window
//! sums come from integral images and all sums are accumulated in integers,
//! so an exact copy of the template scores 1.

use geocalib_core::{GrayImage, GrayImageView, PixelRect};
use log::debug;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Template matching parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateMatchParams {
    /// Minimum correlation in `[-1, 1]` for an offset to count as a match.
    pub threshold: f64,
}

impl Default for TemplateMatchParams {
    fn default() -> Self {
        Self { threshold: 0.8 }
    }
}

/// One accepted match: top-left offset of the template window and its score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateMatch {
    pub x: usize,
    pub y: usize,
    pub score: f64,
}

impl TemplateMatch {
    #[inline]
    pub fn local(&self) -> [f64; 2] {
        [self.x as f64, self.y as f64]
    }
}

/// Summed-area tables of pixel values and squared values, `(w+1) x (h+1)`.
struct Integral {
    stride: usize,
    sum: Vec<u64>,
    sq: Vec<u64>,
}

impl Integral {
    fn new(img: &GrayImageView<'_>) -> Self {
        let stride = img.width + 1;
        let mut sum = vec![0u64; stride * (img.height + 1)];
        let mut sq = vec![0u64; stride * (img.height + 1)];
        for y in 0..img.height {
            let (mut row_sum, mut row_sq) = (0u64, 0u64);
            for x in 0..img.width {
                let v = img.get(x, y) as u64;
                row_sum += v;
                row_sq += v * v;
                let i = (y + 1) * stride + x + 1;
                sum[i] = sum[i - stride] + row_sum;
                sq[i] = sq[i - stride] + row_sq;
            }
        }
        Self { stride, sum, sq }
    }

    /// `(Σ v, Σ v²)` over the `w x h` window at `(x, y)`.
    #[inline]
    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (u64, u64) {
        let s = self.stride;
        let (a, b) = (y * s + x, y * s + x + w);
        let (c, d) = ((y + h) * s + x, (y + h) * s + x + w);
        (
            self.sum[d] + self.sum[a] - self.sum[b] - self.sum[c],
            self.sq[d] + self.sq[a] - self.sq[b] - self.sq[c],
        )
    }
}

/// Correlation score for every valid offset, row-major over
/// `(W - w + 1) x (H - h + 1)`.
///
/// `None` when the template is empty, larger than the image, or has no
/// contrast. Flat image windows score 0.
///
/// Window means and variances are O(1) per offset, but the cross term is a
/// direct sum, so the whole map costs O(W·H·w·h): a 100x100 template over a
/// 1280x720 image is about 9e9 multiply-adds. Keep templates small, or crop
/// `image` to the search region first.
pub fn correlation_map(
    image: &GrayImageView<'_>,
    template: &GrayImageView<'_>,
) -> Option<(Vec<f64>, usize, usize)> {
    let (tw, th) = (template.width, template.height);
    if tw == 0 || th == 0 || tw > image.width || th > image.height {
        return None;
    }

    let n = (tw * th) as i128;
    let (t_sum, t_sq) = template
        .data
        .iter()
        .fold((0u64, 0u64), |(s, q), &v| (s + v as u64, q + (v as u64) * (v as u64)));
    let t_var = n * t_sq as i128 - (t_sum as i128) * (t_sum as i128);
    if t_var == 0 {
        return None;
    }

    let integral = Integral::new(image);
    let (mw, mh) = (image.width - tw + 1, image.height - th + 1);
    let mut scores = vec![0.0; mw * mh];
    for y in 0..mh {
        for x in 0..mw {
            let (s1, s2) = integral.window(x, y, tw, th);
            let var = n * s2 as i128 - (s1 as i128) * (s1 as i128);
            if var == 0 {
                continue;
            }
            let mut cross = 0u64;
            for v in 0..th {
                let img_row = &image.data[(y + v) * image.width + x..][..tw];
                let tpl_row = &template.data[v * tw..][..tw];
                cross += img_row
                    .iter()
                    .zip(tpl_row)
                    .map(|(&a, &b)| a as u64 * b as u64)
                    .sum::<u64>();
            }
            let num = n * cross as i128 - (t_sum as i128) * (s1 as i128);
            scores[y * mw + x] = num as f64 / ((t_var as f64) * (var as f64)).sqrt();
        }
    }
    Some((scores, mw, mh))
}

/// All offsets scoring at least `params.threshold`, reduced to one peak per
/// cluster: a candidate is dropped when a stronger one already accepted lies
/// within the template footprint. Sorted by descending score.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(image, template, params), fields(width = image.width, height = image.height))
)]
pub fn find_matches(
    image: &GrayImageView<'_>,
    template: &GrayImageView<'_>,
    params: &TemplateMatchParams,
) -> Vec<TemplateMatch> {
    let Some((scores, mw, _)) = correlation_map(image, template) else {
        debug!(
            "template {}x{} cannot match a {}x{} image",
            template.width, template.height, image.width, image.height
        );
        return Vec::new();
    };

    let mut candidates: Vec<TemplateMatch> = scores
        .iter()
        .enumerate()
        .filter(|&(_, &s)| s >= params.threshold)
        .map(|(i, &score)| TemplateMatch {
            x: i % mw,
            y: i / mw,
            score,
        })
        .collect();
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.y.cmp(&b.y))
            .then(a.x.cmp(&b.x))
    });

    let (tw, th) = (template.width, template.height);
    let mut peaks: Vec<TemplateMatch> = Vec::new();
    for c in candidates {
        let overlaps = peaks
            .iter()
            .any(|p| p.x.abs_diff(c.x) < tw && p.y.abs_diff(c.y) < th);
        if !overlaps {
            peaks.push(c);
        }
    }
    debug!(
        "template {}x{}: {} match(es) at threshold {}",
        tw,
        th,
        peaks.len(),
        params.threshold
    );
    peaks
}

/// Copy the template under a selection made on a downscaled display.
///
/// `corner_a`/`corner_b` are opposite corners in display pixels, in any
/// order; `display_scale` is display size over image size. Coordinates are
/// truncated to whole image pixels.
pub fn crop_template(
    image: &GrayImageView<'_>,
    corner_a: [f64; 2],
    corner_b: [f64; 2],
    display_scale: f64,
) -> Option<GrayImage> {
    if !(display_scale.is_finite() && display_scale > 0.0) {
        return None;
    }
    let to_px = |v: f64| (v.max(0.0) / display_scale) as usize;
    let x0 = to_px(corner_a[0].min(corner_b[0]));
    let y0 = to_px(corner_a[1].min(corner_b[1]));
    let x1 = to_px(corner_a[0].max(corner_b[0]));
    let y1 = to_px(corner_a[1].max(corner_b[1]));
    image.crop(PixelRect::new(x0, y0, x1 - x0, y1 - y0))
}
