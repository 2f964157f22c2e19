//! Spatial transform passed between the solvers and the host store.

use nalgebra::{Matrix3, Matrix4, Vector3};

use crate::point::Point3;

/// Homogeneous 4×4 spatial mapping `p' = M · [p, 1]`.
///
/// The shipped solvers only produce rigid transforms, but the pipeline treats
/// the value as opaque and passes it through unchanged. Serialized as a
/// row-major `[[f64; 4]; 4]`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(from = "TransformRepr", into = "TransformRepr")]
pub struct Transform {
    matrix: Matrix4<f64>,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct TransformRepr {
    matrix: [[f64; 4]; 4],
}

impl From<TransformRepr> for Transform {
    fn from(r: TransformRepr) -> Self {
        Self::from_row_major(r.matrix)
    }
}

impl From<Transform> for TransformRepr {
    fn from(t: Transform) -> Self {
        Self {
            matrix: t.to_row_major(),
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    pub fn from_matrix(matrix: Matrix4<f64>) -> Self {
        Self { matrix }
    }

    /// Build `p' = R p + t`.
    pub fn from_rotation_translation(rotation: &Matrix3<f64>, translation: &Vector3<f64>) -> Self {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
        Self { matrix: m }
    }

    pub fn translation_only(t: [f64; 3]) -> Self {
        Self::from_rotation_translation(&Matrix3::identity(), &Vector3::from(t))
    }

    pub fn from_row_major(rows: [[f64; 4]; 4]) -> Self {
        let mut m = Matrix4::zeros();
        for (i, row) in rows.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                m[(i, j)] = *v;
            }
        }
        Self { matrix: m }
    }

    pub fn to_row_major(&self) -> [[f64; 4]; 4] {
        let m = &self.matrix;
        let mut out = [[0.0; 4]; 4];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = m[(i, j)];
            }
        }
        out
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    pub fn rotation(&self) -> Matrix3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.matrix.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// Map a point (the homogeneous row is assumed to be `[0, 0, 0, 1]`).
    pub fn apply(&self, p: &Point3) -> Point3 {
        let v = self.rotation() * Vector3::new(p[0], p[1], p[2]) + self.translation();
        [v[0], v[1], v[2]]
    }

    pub fn apply_all(&self, points: &[Point3]) -> Vec<Point3> {
        let r = self.rotation();
        let t = self.translation();
        points
            .iter()
            .map(|p| {
                let v = r * Vector3::new(p[0], p[1], p[2]) + t;
                [v[0], v[1], v[2]]
            })
            .collect()
    }

    /// `self ∘ first`: apply `first`, then `self`.
    pub fn compose(&self, first: &Transform) -> Transform {
        Self {
            matrix: self.matrix * first.matrix,
        }
    }

    /// Largest absolute entry-wise difference to `other`.
    pub fn max_abs_diff(&self, other: &Transform) -> f64 {
        (self.matrix - other.matrix).amax()
    }

    pub fn is_finite(&self) -> bool {
        self.matrix.iter().all(|v| v.is_finite())
    }
}
