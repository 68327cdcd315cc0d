use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::TransformError;

/// A pixel position in the image paired with its real-world coordinates.
///
/// `local_coords` is fixed when the point is created. `global_coords` is
/// either a whole pair or absent; it may be replaced when a reference point
/// is edited.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    local_coords: [f64; 2],
    #[serde(default)]
    global_coords: Option<[f64; 2]>,
}

impl Point {
    /// A pending point: image position only.
    pub fn new(local_coords: [f64; 2]) -> Self {
        Self {
            local_coords,
            global_coords: None,
        }
    }

    pub fn with_global(local_coords: [f64; 2], global_coords: [f64; 2]) -> Self {
        Self {
            local_coords,
            global_coords: Some(global_coords),
        }
    }

    #[inline]
    pub fn local(&self) -> [f64; 2] {
        self.local_coords
    }

    #[inline]
    pub fn global(&self) -> Option<[f64; 2]> {
        self.global_coords
    }

    #[inline]
    pub fn has_global(&self) -> bool {
        self.global_coords.is_some()
    }

    pub fn set_global(&mut self, global_coords: [f64; 2]) {
        self.global_coords = Some(global_coords);
    }

    #[inline]
    pub fn local_point(&self) -> Point2<f64> {
        Point2::new(self.local_coords[0], self.local_coords[1])
    }

    #[inline]
    pub fn global_point(&self) -> Option<Point2<f64>> {
        self.global_coords.map(|[x, y]| Point2::new(x, y))
    }
}

/// Ordered set of reference correspondences.
///
/// Order does not affect the fitted models but is kept for reporting and for
/// [`crate::average_pixel_length`], which walks consecutive pairs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferencePointSet {
    points: Vec<Point>,
}

impl ReferencePointSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Point] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.points.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Point> {
        self.points.get(index)
    }

    pub fn push(&mut self, point: Point) {
        self.points.push(point);
    }

    /// Replace the point at `index`, returning the previous one.
    pub fn replace(&mut self, index: usize, point: Point) -> Option<Point> {
        let slot = self.points.get_mut(index)?;
        Some(std::mem::replace(slot, point))
    }

    pub fn remove(&mut self, index: usize) -> Option<Point> {
        (index < self.points.len()).then(|| self.points.remove(index))
    }

    /// Overwrite the global coordinates of an existing point.
    ///
    /// Returns `false` if `index` is out of range.
    pub fn set_global(&mut self, index: usize, global_coords: [f64; 2]) -> bool {
        match self.points.get_mut(index) {
            Some(p) => {
                p.set_global(global_coords);
                true
            }
            None => false,
        }
    }

    /// Index of the point whose image position is closest to `pos`, if it is
    /// within `max_dist` pixels.
    pub fn nearest(&self, pos: [f64; 2], max_dist: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, p) in self.points.iter().enumerate() {
            let [x, y] = p.local();
            let d = (x - pos[0]).hypot(y - pos[1]);
            if d > max_dist {
                continue;
            }
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Split the set into matching local/global point lists.
    ///
    /// Fails with [`TransformError::MissingCoordinates`] on the first point
    /// that has no global coordinates.
    pub fn correspondences(&self) -> Result<(Vec<Point2<f64>>, Vec<Point2<f64>>), TransformError> {
        let mut local = Vec::with_capacity(self.points.len());
        let mut global = Vec::with_capacity(self.points.len());
        for (index, p) in self.points.iter().enumerate() {
            let g = p
                .global_point()
                .ok_or(TransformError::MissingCoordinates { index })?;
            local.push(p.local_point());
            global.push(g);
        }
        Ok((local, global))
    }
}

impl From<Vec<Point>> for ReferencePointSet {
    fn from(points: Vec<Point>) -> Self {
        Self::from_points(points)
    }
}

impl<'a> IntoIterator for &'a ReferencePointSet {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
