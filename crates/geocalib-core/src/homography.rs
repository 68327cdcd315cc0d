use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, Vector2};
use serde::{Deserialize, Serialize};

use crate::TransformError;

/// Below this homogeneous scale a projection is treated as singular.
pub const PROJECTION_EPS: f64 = 1e-12;

/// Projective map from image pixels to global coordinates: `g ~ H * l`.
///
/// Estimated homographies are scaled so that `H[2,2] = 1`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_fn(|r, c| rows[r][c]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        std::array::from_fn(|r| std::array::from_fn(|c| self.h[(r, c)]))
    }

    /// Project `p`, failing when the homogeneous scale vanishes.
    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Result<Point2<f64>, TransformError> {
        let v = self.h * p.to_homogeneous();
        if v.z.abs() < PROJECTION_EPS {
            return Err(TransformError::SingularProjection);
        }
        Ok(Point2::new(v.x / v.z, v.y / v.z))
    }

    /// Global→local map. Scaled to `H[2,2] = 1` unless that entry vanishes,
    /// in which case the Frobenius norm is used instead.
    pub fn inverse(&self) -> Option<Self> {
        let inv = self.h.try_inverse()?;
        let corner = inv[(2, 2)];
        let scale = if corner.abs() > PROJECTION_EPS {
            corner
        } else {
            inv.norm()
        };
        Some(Self::new(inv / scale))
    }
}

/// Similarity moving the centroid to the origin with mean distance `sqrt(2)`.
///
/// Returns the conditioned points and the transform, or `None` when all
/// points coincide (relative to their magnitude, so a tight cluster far from
/// the origin also counts).
pub(crate) fn normalize_points(pts: &[Point2<f64>]) -> Option<(Vec<Point2<f64>>, Matrix3<f64>)> {
    if pts.is_empty() {
        return None;
    }
    let n = pts.len() as f64;
    let centroid = pts.iter().map(|p| p.coords).sum::<Vector2<f64>>() / n;
    let spread = pts.iter().map(|p| (p.coords - centroid).norm()).sum::<f64>() / n;

    let magnitude = centroid.amax().max(1.0);
    if !spread.is_finite() || spread <= 1e-12 * magnitude {
        return None;
    }

    let s = std::f64::consts::SQRT_2 / spread;
    let t = Matrix3::new(
        s, 0.0, -s * centroid.x, //
        0.0, s, -s * centroid.y, //
        0.0, 0.0, 1.0,
    );
    let conditioned = pts
        .iter()
        .map(|p| Point2::from((p.coords - centroid) * s))
        .collect();
    Some((conditioned, t))
}

/// Undo conditioning (`T_dst^-1 * Hn * T_src`) and rescale to `H[2,2] = 1`.
fn uncondition(hn: Matrix3<f64>, t_src: &Matrix3<f64>, t_dst: &Matrix3<f64>) -> Option<Homography> {
    let h = t_dst.try_inverse()? * hn * t_src;
    let corner = h[(2, 2)];
    if corner.abs() < PROJECTION_EPS {
        return None;
    }
    let h = h / corner;
    h.iter().all(|v| v.is_finite()).then_some(Homography::new(h))
}

/// Coefficients of the two linear constraints `(x, y) -> (u, v)` puts on the
/// nine entries of `H` (row-major): `A_k · h = 0`.
fn dlt_rows(src: Point2<f64>, dst: Point2<f64>) -> [[f64; 9]; 2] {
    let (x, y, u, v) = (src.x, src.y, dst.x, dst.y);
    [
        [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, -u],
        [0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, -v],
    ]
}

/// Least-squares `H` with `dst ~ H * src` over all correspondences
/// (normalized DLT, null vector of the stacked constraints).
///
/// Outliers pull this estimate like any other point; robust fitting is
/// [`crate::fit_homography_ransac`].
pub fn estimate_homography(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }
    let (src_n, t_src) = normalize_points(src)?;
    let (dst_n, t_dst) = normalize_points(dst)?;

    // zero rows up to 9 so the thin SVD still yields all nine right vectors
    let mut a = DMatrix::<f64>::zeros((2 * src.len()).max(9), 9);
    for (k, (s, d)) in src_n.iter().zip(&dst_n).enumerate() {
        for (j, row) in dlt_rows(*s, *d).iter().enumerate() {
            for (c, &coef) in row.iter().enumerate() {
                a[(2 * k + j, c)] = coef;
            }
        }
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let (null_idx, _) = svd.singular_values.argmin();
    let hn = Matrix3::from_fn(|r, c| v_t[(null_idx, 3 * r + c)]);
    uncondition(hn, &t_src, &t_dst)
}

/// Exact `H` through four correspondences with `H[2,2]` fixed to 1, solved
/// as an 8x8 linear system. This is the RANSAC minimal solver.
pub fn homography_from_4pt(src: &[Point2<f64>; 4], dst: &[Point2<f64>; 4]) -> Option<Homography> {
    let (src_n, t_src) = normalize_points(src)?;
    let (dst_n, t_dst) = normalize_points(dst)?;

    // move the h33 column to the right-hand side
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for k in 0..4 {
        for (j, row) in dlt_rows(src_n[k], dst_n[k]).iter().enumerate() {
            let r = 2 * k + j;
            for (c, &coef) in row[..8].iter().enumerate() {
                a[(r, c)] = coef;
            }
            b[r] = -row[8];
        }
    }

    let h = a.lu().solve(&b)?;
    let hn = Matrix3::from_fn(|r, c| if (r, c) == (2, 2) { 1.0 } else { h[3 * r + c] });
    uncondition(hn, &t_src, &t_dst)
}

/// Distance in image pixels between `local` and `global` mapped back through
/// `h_inv` (the global→local homography). Infinite if the projection is
/// singular.
#[inline]
pub fn reprojection_error_px(h_inv: &Homography, local: Point2<f64>, global: Point2<f64>) -> f64 {
    h_inv
        .apply(global)
        .map_or(f64::INFINITY, |p| (p - local).norm())
}
