use nalgebra::{Matrix3, Point2, SMatrix, SVector, SymmetricEigen};
use serde::{Deserialize, Serialize};

type Row9 = SVector<f64, 9>;

/// Plane-to-plane projective map `dst ~ H · src`, normalised so `H[2,2] = 1`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub matrix: Matrix3<f64>,
}

impl Homography {
    pub fn new(matrix: Matrix3<f64>) -> Self {
        Self { matrix }
    }

    pub fn to_matrix(&self) -> Matrix3<f64> {
        self.matrix
    }

    #[inline]
    pub fn apply(&self, p: &Point2<f64>) -> Point2<f64> {
        let q = self.matrix * p.to_homogeneous();
        Point2::new(q.x / q.z, q.y / q.z)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(Self::new)
    }
}

/// Similarity moving the centroid to the origin with mean distance √2.
fn hartley(pts: &[Point2<f64>]) -> Matrix3<f64> {
    let n = pts.len() as f64;
    let centroid = pts.iter().fold(Point2::origin(), |acc, p| acc + p.coords / n);
    let spread = pts.iter().map(|p| (p - centroid).norm()).sum::<f64>() / n;
    let s = if spread > 1e-12 {
        std::f64::consts::SQRT_2 / spread
    } else {
        1.0
    };
    Matrix3::new(s, 0.0, -s * centroid.x, 0.0, s, -s * centroid.y, 0.0, 0.0, 1.0)
}

/// Normalised DLT estimate of the homography taking `src` onto `dst`.
///
/// Needs at least four correspondences. The null vector of the stacked DLT
/// system is taken as the eigenvector of `AᵀA` with the smallest eigenvalue.
pub fn estimate_homography(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }
    let ts = hartley(src);
    let td = hartley(dst);

    let mut ata = SMatrix::<f64, 9, 9>::zeros();
    for (p, q) in src.iter().zip(dst) {
        let a = ts * p.to_homogeneous();
        let b = td * q.to_homogeneous();
        let (x, y, u, v) = (a.x / a.z, a.y / a.z, b.x / b.z, b.y / b.z);
        let r1 = Row9::from_column_slice(&[-x, -y, -1.0, 0.0, 0.0, 0.0, u * x, u * y, u]);
        let r2 = Row9::from_column_slice(&[0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v]);
        ata += r1 * r1.transpose() + r2 * r2.transpose();
    }

    let eig = SymmetricEigen::new(ata);
    let (k, _) = eig
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let h: Row9 = eig.eigenvectors.column(k).into_owned();
    let hn = Matrix3::from_row_slice(h.as_slice());

    let h = td.try_inverse()? * hn * ts;
    let scale = h[(2, 2)];
    if !scale.is_finite() || scale.abs() < 1e-12 {
        return None;
    }
    Some(Homography::new(h / scale))
}
