//! Robust homography fitting.
//!
//! Samples 4-point minimal subsets, fits each exactly, scores candidates by
//! reprojection error in image pixels, keeps the best-supported model, and
//! refits it on all of its inliers.

use std::time::Instant;

use log::debug;
use nalgebra::Point2;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::homography::{
    estimate_homography, homography_from_4pt, normalize_points, reprojection_error_px, Homography,
};
use crate::TransformError;

/// Parameters of the robust homography fit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacHomographyConfig {
    /// Trial-count cap.
    pub max_iters: usize,
    /// Reprojection error threshold, in image pixels.
    pub inlier_threshold: f64,
    /// Minimal number of inliers to accept the best model.
    pub min_inliers: usize,
    /// RNG seed; fits are deterministic for a given seed.
    pub seed: u64,
}

impl Default for RansacHomographyConfig {
    fn default() -> Self {
        Self {
            max_iters: 1000,
            inlier_threshold: 3.0,
            min_inliers: 4,
            seed: 0,
        }
    }
}

/// Summary of a robust fit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RansacStats {
    pub n_candidates: usize,
    pub n_inliers: usize,
    pub threshold_px: f64,
    pub mean_err_px: f64,
    pub trials: usize,
}

/// Output of [`fit_homography_ransac`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HomographyFit {
    pub homography: Homography,
    /// Per-correspondence inlier flags, in input order.
    pub inlier_mask: Vec<bool>,
    /// Per-correspondence reprojection error in pixels, in input order.
    pub errors_px: Vec<f64>,
    pub stats: RansacStats,
}

/// Minimal sample size of a homography.
pub const HOMOGRAPHY_MIN_POINTS: usize = 4;

/// Sine of the smallest angle between two edges of a sample triangle below
/// which the three points count as collinear.
const COLLINEAR_SIN_EPS: f64 = 1e-6;

/// Ratio of the minor to major spread of a whole point set below which it
/// counts as collinear.
const COLLINEAR_SPREAD_EPS: f64 = 1e-9;

struct Candidate {
    homography: Homography,
    mask: Vec<bool>,
    errors: Vec<f64>,
    n_inliers: usize,
    err_sum: f64,
}

impl Candidate {
    fn better_than(&self, other: &Candidate) -> bool {
        self.n_inliers > other.n_inliers
            || (self.n_inliers == other.n_inliers && self.err_sum < other.err_sum)
    }
}

/// Fit a pixel→global homography robustly.
///
/// `deadline` is checked between trials; when it passes the best model so
/// far is kept. Fails with:
/// - [`TransformError::InsufficientPoints`] for fewer than 4 correspondences,
/// - [`TransformError::DegenerateConfiguration`] when either point set is
///   collinear or coincident, or no sample yields a finite model,
/// - [`TransformError::InsufficientInliers`] when the best model has fewer
///   than `config.min_inliers` inliers,
/// - [`TransformError::Cancelled`] when the deadline passed before any model
///   was found.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(level = "debug", skip_all, fields(n = local.len()))
)]
pub fn fit_homography_ransac(
    local: &[Point2<f64>],
    global: &[Point2<f64>],
    config: &RansacHomographyConfig,
    deadline: Option<Instant>,
) -> Result<HomographyFit, TransformError> {
    let n = local.len().min(global.len());
    if n < HOMOGRAPHY_MIN_POINTS {
        return Err(TransformError::InsufficientPoints {
            needed: HOMOGRAPHY_MIN_POINTS,
            got: n,
        });
    }
    let local = &local[..n];
    let global = &global[..n];

    if is_degenerate_layout(local) || is_degenerate_layout(global) {
        return Err(TransformError::DegenerateConfiguration);
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best: Option<Candidate> = None;
    let mut trials = 0usize;
    let max_iters = if n == HOMOGRAPHY_MIN_POINTS {
        1
    } else {
        config.max_iters.max(1)
    };

    for _ in 0..max_iters {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            debug!("ransac deadline reached after {trials} trials");
            break;
        }
        trials += 1;

        let sample = sample_indices(&mut rng, n, HOMOGRAPHY_MIN_POINTS);
        let src = [
            local[sample[0]],
            local[sample[1]],
            local[sample[2]],
            local[sample[3]],
        ];
        let dst = [
            global[sample[0]],
            global[sample[1]],
            global[sample[2]],
            global[sample[3]],
        ];
        if sample_is_degenerate(&src) || sample_is_degenerate(&dst) {
            continue;
        }

        let Some(h) = homography_from_4pt(&src, &dst) else {
            continue;
        };
        let Some(candidate) = score(h, local, global, config.inlier_threshold) else {
            continue;
        };

        if best.as_ref().is_none_or(|b| candidate.better_than(b)) {
            let all_inliers = candidate.n_inliers == n;
            best = Some(candidate);
            if all_inliers {
                break;
            }
        }
    }

    let Some(best) = best else {
        if trials < max_iters {
            return Err(TransformError::Cancelled { trials });
        }
        return Err(TransformError::DegenerateConfiguration);
    };

    if best.n_inliers < config.min_inliers {
        return Err(TransformError::InsufficientInliers {
            needed: config.min_inliers,
            found: best.n_inliers,
        });
    }

    // Refit on all inliers; keep the minimal-sample model if the refit loses support.
    let (in_local, in_global): (Vec<_>, Vec<_>) = best
        .mask
        .iter()
        .zip(local.iter().zip(global.iter()))
        .filter(|(&m, _)| m)
        .map(|(_, (&l, &g))| (l, g))
        .unzip();
    let refined = estimate_homography(&in_local, &in_global)
        .and_then(|h| score(h, local, global, config.inlier_threshold));
    let final_model = match refined {
        Some(r) if r.n_inliers >= best.n_inliers => r,
        _ => best,
    };

    let mean_err_px = mean_masked(&final_model.errors, &final_model.mask);
    debug!(
        "homography fit: {}/{} inliers, mean err {:.3}px, {} trials",
        final_model.n_inliers, n, mean_err_px, trials
    );

    Ok(HomographyFit {
        homography: final_model.homography,
        stats: RansacStats {
            n_candidates: n,
            n_inliers: final_model.n_inliers,
            threshold_px: config.inlier_threshold,
            mean_err_px,
            trials,
        },
        inlier_mask: final_model.mask,
        errors_px: final_model.errors,
    })
}

fn score(
    h: Homography,
    local: &[Point2<f64>],
    global: &[Point2<f64>],
    threshold: f64,
) -> Option<Candidate> {
    let h_inv = h.inverse()?;
    let errors: Vec<f64> = local
        .iter()
        .zip(global)
        .map(|(&l, &g)| reprojection_error_px(&h_inv, l, g))
        .collect();
    let mask: Vec<bool> = errors.iter().map(|&e| e <= threshold).collect();
    let n_inliers = mask.iter().filter(|&&m| m).count();
    let err_sum = errors
        .iter()
        .zip(&mask)
        .filter(|(_, &m)| m)
        .map(|(&e, _)| e)
        .sum::<f64>();
    Some(Candidate {
        homography: h,
        mask,
        errors,
        n_inliers,
        err_sum,
    })
}

fn mean_masked(errors: &[f64], mask: &[bool]) -> f64 {
    let (sum, count) = errors
        .iter()
        .zip(mask)
        .filter(|(e, &m)| m && e.is_finite())
        .fold((0.0, 0usize), |(s, c), (&e, _)| (s + e, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// True when the whole set is coincident or lies on one line.
///
/// Works on Hartley-normalized coordinates so the test is scale-free: the
/// minor eigenvalue of the 2x2 scatter matrix is compared to the major one.
pub(crate) fn is_degenerate_layout(pts: &[Point2<f64>]) -> bool {
    let Some((norm, _)) = normalize_points(pts) else {
        return true;
    };
    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for p in &norm {
        sxx += p.x * p.x;
        sxy += p.x * p.y;
        syy += p.y * p.y;
    }
    let tr = sxx + syy;
    let det = sxx * syy - sxy * sxy;
    let disc = (tr * tr / 4.0 - det).max(0.0).sqrt();
    let major = tr / 2.0 + disc;
    let minor = tr / 2.0 - disc;
    major <= 0.0 || minor <= COLLINEAR_SPREAD_EPS * major
}

/// True when any three of the four sample points are (nearly) collinear.
fn sample_is_degenerate(pts: &[Point2<f64>; 4]) -> bool {
    const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
    TRIPLES.iter().any(|&[a, b, c]| {
        let ab = pts[b] - pts[a];
        let ac = pts[c] - pts[a];
        let bc = pts[c] - pts[b];
        let cross = (ab.x * ac.y - ab.y * ac.x).abs();
        // |ab x ac| = |ab| |ac| sin(angle); use the two longest edges so the
        // test does not depend on which vertex is the pivot.
        let mut lens = [ab.norm(), ac.norm(), bc.norm()];
        lens.sort_by(|x, y| y.total_cmp(x));
        let scale = lens[0] * lens[1];
        scale <= 0.0 || cross <= COLLINEAR_SIN_EPS * scale
    })
}

/// Sample `k` distinct indices from `0..n` using a partial Fisher–Yates shuffle.
fn sample_indices(rng: &mut impl Rng, n: usize, k: usize) -> Vec<usize> {
    debug_assert!(k <= n);
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.gen_range(i..n);
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Matrix3;

    fn ground_truth() -> Homography {
        Homography::new(Matrix3::new(
            0.02, 0.001, 10.0, //
            -0.0005, 0.018, 20.0, //
            0.00004, 0.00002, 1.0,
        ))
    }

    fn grid(n: usize, step: f64) -> Vec<Point2<f64>> {
        (0..n)
            .flat_map(|j| (0..n).map(move |i| Point2::new(i as f64 * step + 7.0, j as f64 * step + 3.0)))
            .collect()
    }

    #[test]
    fn recovers_exact_model_without_outliers() {
        let gt = ground_truth();
        let local = grid(4, 60.0);
        let global: Vec<_> = local.iter().map(|&p| gt.apply(p).expect("finite")).collect();

        let fit = fit_homography_ransac(&local, &global, &RansacHomographyConfig::default(), None)
            .expect("fit");
        assert_eq!(fit.stats.n_inliers, local.len());
        assert!(fit.inlier_mask.iter().all(|&m| m));

        let probe = Point2::new(100.0, 77.0);
        let expected = gt.apply(probe).expect("finite");
        let got = fit.homography.apply(probe).expect("finite");
        assert_abs_diff_eq!(got.x, expected.x, epsilon = 1e-8);
        assert_abs_diff_eq!(got.y, expected.y, epsilon = 1e-8);
    }

    #[test]
    fn rejects_gross_outliers() {
        let gt = ground_truth();
        let local = grid(5, 40.0);
        let mut global: Vec<_> = local.iter().map(|&p| gt.apply(p).expect("finite")).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let outliers = [3usize, 11, 19];
        for &i in &outliers {
            global[i].x += rng.gen_range(2.0..4.0);
            global[i].y -= rng.gen_range(2.0..4.0);
        }

        let fit = fit_homography_ransac(&local, &global, &RansacHomographyConfig::default(), None)
            .expect("fit");
        assert_eq!(fit.stats.n_inliers, local.len() - outliers.len());
        for &i in &outliers {
            assert!(!fit.inlier_mask[i], "point {i} should be an outlier");
        }
        assert!(fit.stats.mean_err_px < 1e-6);
    }

    #[test]
    fn too_few_points_fail() {
        let local = grid(2, 10.0);
        let global = local.clone();
        let err = fit_homography_ransac(&local[..3], &global[..3], &Default::default(), None)
            .unwrap_err();
        assert_eq!(err, TransformError::InsufficientPoints { needed: 4, got: 3 });
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let local: Vec<_> = (0..6).map(|i| Point2::new(i as f64 * 10.0, i as f64 * 5.0)).collect();
        let global: Vec<_> = (0..6).map(|i| Point2::new(i as f64, (i * i) as f64)).collect();
        let err = fit_homography_ransac(&local, &global, &Default::default(), None).unwrap_err();
        assert_eq!(err, TransformError::DegenerateConfiguration);
    }

    #[test]
    fn min_inliers_is_enforced() {
        let gt = ground_truth();
        let local = grid(3, 50.0);
        let global: Vec<_> = local.iter().map(|&p| gt.apply(p).expect("finite")).collect();
        let config = RansacHomographyConfig {
            min_inliers: 20,
            ..Default::default()
        };
        let err = fit_homography_ransac(&local, &global, &config, None).unwrap_err();
        assert_eq!(
            err,
            TransformError::InsufficientInliers {
                needed: 20,
                found: 9
            }
        );
    }

    #[test]
    fn expired_deadline_cancels_before_first_trial() {
        let gt = ground_truth();
        let local = grid(3, 50.0);
        let global: Vec<_> = local.iter().map(|&p| gt.apply(p).expect("finite")).collect();
        let now = Instant::now();
        let err = fit_homography_ransac(&local, &global, &Default::default(), Some(now))
            .unwrap_err();
        assert_eq!(err, TransformError::Cancelled { trials: 0 });
    }

    #[test]
    fn sample_indices_are_distinct() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let mut s = sample_indices(&mut rng, 6, 4);
            s.sort_unstable();
            s.dedup();
            assert_eq!(s.len(), 4);
            assert!(s.iter().all(|&i| i < 6));
        }
    }
}
