//! Calibration accuracy: physical size of a pixel and deviation of a computed
//! point from an independently known one.

use serde::{Deserialize, Serialize};

use crate::{ModelKind, Point, TransformError};

/// Mean ratio `global_distance / local_distance` over consecutive reference
/// pairs: an estimate of real-world units per pixel.
///
/// Pairs that coincide in the image are skipped. If every pair is skipped the
/// result is 0.
pub fn average_pixel_length(reference_points: &[Point]) -> Result<f64, TransformError> {
    if reference_points.len() < 2 {
        return Err(TransformError::InsufficientPoints {
            needed: 2,
            got: reference_points.len(),
        });
    }

    let mut sum = 0.0;
    let mut count = 0usize;
    for (i, pair) in reference_points.windows(2).enumerate() {
        let [a, b] = pair else { continue };
        let ga = a
            .global()
            .ok_or(TransformError::MissingCoordinates { index: i })?;
        let gb = b
            .global()
            .ok_or(TransformError::MissingCoordinates { index: i + 1 })?;
        let local_dist = distance(a.local(), b.local());
        if local_dist <= 0.0 {
            continue;
        }
        sum += distance(ga, gb) / local_dist;
        count += 1;
    }

    Ok(if count == 0 { 0.0 } else { sum / count as f64 })
}

/// Euclidean distance between two global coordinate pairs.
#[inline]
pub fn deviation(computed: [f64; 2], known: [f64; 2]) -> f64 {
    distance(computed, known)
}

/// `deviation / pixel_length`, defined as 0 when `pixel_length == 0`.
#[inline]
pub fn deviation_ratio(deviation: f64, pixel_length: f64) -> f64 {
    if pixel_length == 0.0 {
        0.0
    } else {
        deviation / pixel_length
    }
}

#[inline]
fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

/// Immutable accuracy snapshot for one analysed target.
///
/// Field names follow the analysis records operators already keep, so the
/// JSON form is a flat mapping of strings to numbers and point lists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Target with its independently known global coordinates.
    pub target_point: Point,
    /// Target with the global coordinates the model computed.
    #[serde(rename = "calculate_target_point")]
    pub computed_target_point: Point,
    pub deviation: f64,
    /// Mean real-world length of one pixel.
    pub width_pixel: f64,
    pub deviation_to_pixel_ratio: f64,
    pub num_ref_points: usize,
    pub ref_points: Vec<Point>,
    pub model: ModelKind,
}

impl CalibrationReport {
    /// Assemble a report for a target at `target_local`.
    pub fn build(
        reference_points: &[Point],
        target_local: [f64; 2],
        computed: [f64; 2],
        known: [f64; 2],
        model: ModelKind,
    ) -> Result<Self, TransformError> {
        let width_pixel = average_pixel_length(reference_points)?;
        let deviation = deviation(computed, known);
        Ok(Self {
            target_point: Point::with_global(target_local, known),
            computed_target_point: Point::with_global(target_local, computed),
            deviation,
            width_pixel,
            deviation_to_pixel_ratio: deviation_ratio(deviation, width_pixel),
            num_ref_points: reference_points.len(),
            ref_points: reference_points.to_vec(),
            model,
        })
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn uniform_line_gives_constant_ratio() {
        // 10 px steps map to 0.5 unit steps
        let pts: Vec<Point> = (0..5)
            .map(|i| {
                let i = i as f64;
                Point::with_global([10.0 * i, 0.0], [100.0, 0.5 * i])
            })
            .collect();
        let len = average_pixel_length(&pts).expect("enough points");
        assert_relative_eq!(len, 0.05, epsilon = 1e-12);
    }

    #[test]
    fn single_point_is_insufficient() {
        let pts = [Point::with_global([1.0, 1.0], [2.0, 2.0])];
        assert_eq!(
            average_pixel_length(&pts).unwrap_err(),
            TransformError::InsufficientPoints { needed: 2, got: 1 }
        );
    }

    #[test]
    fn coincident_pixels_are_skipped() {
        let pts = [
            Point::with_global([0.0, 0.0], [0.0, 0.0]),
            Point::with_global([0.0, 0.0], [5.0, 5.0]),
        ];
        assert_eq!(average_pixel_length(&pts), Ok(0.0));
    }

    #[test]
    fn ratio_is_zero_for_zero_pixel_length() {
        assert_eq!(deviation_ratio(0.0, 0.0), 0.0);
        assert_eq!(deviation_ratio(3.5, 0.0), 0.0);
        assert_relative_eq!(deviation_ratio(3.0, 1.5), 2.0);
        assert_relative_eq!(deviation([0.0, 0.0], [3.0, 4.0]), 5.0);
    }

    #[test]
    fn report_uses_analysis_field_names() {
        let refs = vec![
            Point::with_global([0.0, 0.0], [0.0, 0.0]),
            Point::with_global([100.0, 0.0], [1.0, 0.0]),
        ];
        let report =
            CalibrationReport::build(&refs, [50.0, 0.0], [0.5, 0.0], [0.5, 0.03], ModelKind::Affine)
                .expect("report");
        assert_relative_eq!(report.width_pixel, 0.01);
        assert_relative_eq!(report.deviation, 0.03, epsilon = 1e-12);
        assert_relative_eq!(report.deviation_to_pixel_ratio, 3.0, epsilon = 1e-9);

        let v: serde_json::Value =
            serde_json::from_str(&report.to_json_pretty().expect("json")).expect("parse");
        assert_eq!(v["num_ref_points"], 2);
        assert_eq!(v["calculate_target_point"]["global_coords"][0], 0.5);
        assert_eq!(v["target_point"]["local_coords"][0], 50.0);
        assert_eq!(v["model"], "affine");
        assert_eq!(v["ref_points"].as_array().map(Vec::len), Some(2));
    }
}
