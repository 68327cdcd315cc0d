use nalgebra::{DMatrix, Matrix2, Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Linear map plus offset: `g = M * l + c`. No perspective term.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Affine {
    pub m: Matrix2<f64>,
    pub c: Vector2<f64>,
}

impl Affine {
    pub fn new(m: Matrix2<f64>, c: Vector2<f64>) -> Self {
        Self { m, c }
    }

    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        Point2::from(self.m * p.coords + self.c)
    }
}

/// Minimal number of correspondences for [`estimate_affine`].
pub const AFFINE_MIN_POINTS: usize = 2;

/// Least-squares fit of `dst ≈ M * src + c`, both output axes jointly.
///
/// Each correspondence contributes a row `[x y 1]`; the 3x2 coefficient
/// block is solved with an SVD pseudo-inverse, so underdetermined inputs
/// (two points, or collinear points) yield the minimum-norm solution instead
/// of failing.
pub fn estimate_affine(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Affine> {
    if src.len() != dst.len() || src.len() < AFFINE_MIN_POINTS {
        return None;
    }

    let n = src.len();
    let a = DMatrix::<f64>::from_fn(n, 3, |r, c| match c {
        0 => src[r].x,
        1 => src[r].y,
        _ => 1.0,
    });
    let b = DMatrix::<f64>::from_fn(n, 2, |r, c| if c == 0 { dst[r].x } else { dst[r].y });

    let svd = a.svd(true, true);
    let max_sv = svd.singular_values.max();
    if !(max_sv.is_finite() && max_sv > 0.0) {
        return None;
    }
    // Same cutoff numpy's lstsq applies with rcond=None.
    let eps = max_sv * f64::EPSILON * n.max(3) as f64;
    let x = svd.solve(&b, eps).ok()?;

    // x rows: [coef_x, coef_y, offset]; columns: output axis
    let m = Matrix2::new(x[(0, 0)], x[(1, 0)], x[(0, 1)], x[(1, 1)]);
    let c = Vector2::new(x[(2, 0)], x[(2, 1)]);
    if !(m.iter().all(|v| v.is_finite()) && c.iter().all(|v| v.is_finite())) {
        return None;
    }
    Some(Affine::new(m, c))
}
