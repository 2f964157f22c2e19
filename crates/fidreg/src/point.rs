//! Point primitives shared by every stage.

/// A 3-D coordinate `[x, y, z]` in the common spatial frame.
pub type Point3 = [f64; 3];

/// Ordered, indexable collection of 3-D points.
///
/// Holds either user-placed reference landmarks or raw detector output.
/// Input order carries no meaning but is preserved so clusters can refer to
/// points by index.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PointSet {
    pub points: Vec<Point3>,
}

impl PointSet {
    pub fn new(points: Vec<Point3>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn as_slice(&self) -> &[Point3] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point3> {
        self.points.iter()
    }

    /// Index of the first point with a non-finite coordinate, if any.
    pub fn first_non_finite(&self) -> Option<usize> {
        self.points
            .iter()
            .position(|p| !p.iter().all(|c| c.is_finite()))
    }
}

impl From<Vec<Point3>> for PointSet {
    fn from(points: Vec<Point3>) -> Self {
        Self { points }
    }
}

impl FromIterator<Point3> for PointSet {
    fn from_iter<I: IntoIterator<Item = Point3>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PointSet {
    type Item = &'a Point3;
    type IntoIter = std::slice::Iter<'a, Point3>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

#[inline]
pub(crate) fn distance_sq(a: &Point3, b: &Point3) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

#[inline]
pub fn distance(a: &Point3, b: &Point3) -> f64 {
    distance_sq(a, b).sqrt()
}

/// Component-wise mean; `None` for an empty slice.
pub(crate) fn mean_point<'a, I>(points: I) -> Option<Point3>
where
    I: IntoIterator<Item = &'a Point3>,
{
    let mut sum = [0.0f64; 3];
    let mut n = 0usize;
    for p in points {
        sum[0] += p[0];
        sum[1] += p[1];
        sum[2] += p[2];
        n += 1;
    }
    if n == 0 {
        return None;
    }
    let n = n as f64;
    Some([sum[0] / n, sum[1] / n, sum[2] / n])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_coordinates_are_located() {
        let set = PointSet::new(vec![[0.0, 0.0, 0.0], [1.0, f64::NAN, 2.0]]);
        assert_eq!(set.first_non_finite(), Some(1));
        assert_eq!(PointSet::default().first_non_finite(), None);
    }

    #[test]
    fn mean_of_empty_is_none() {
        assert!(mean_point(std::iter::empty()).is_none());
        let pts = [[0.0, 0.0, 0.0], [2.0, 4.0, 6.0]];
        assert_eq!(mean_point(pts.iter()), Some([1.0, 2.0, 3.0]));
    }
}
